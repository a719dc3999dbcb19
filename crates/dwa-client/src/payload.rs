//! Payload serialization.
//!
//! Rewrites reference fields into the shape the Web API accepts, drops the
//! client-only annotation fields that [`response`](crate::response) adds,
//! and escapes non-ASCII text.

use std::sync::LazyLock;

use regex_lite::Regex;
use serde_json::{Map, Value};

use crate::config::WebApiConfig;
use crate::entity_names::EntityNameMap;
use crate::error::Result;

static BRACED_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(\{([\w-]+)\}\)").unwrap());

static ENTITY_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\w+)(\([\w-]+\))$").unwrap());

const CLIENT_ONLY_SUFFIXES: [&str; 3] = ["_Formatted", "_NavigationProperty", "_LogicalName"];

/// Serialize a payload for the wire.
pub fn stringify(
    data: &Value,
    config: &WebApiConfig,
    entity_names: Option<&EntityNameMap>,
) -> Result<String> {
    let transformed = transform(data, config, entity_names);
    let json = serde_json::to_string(&transformed)?;
    Ok(escape_non_ascii(&json))
}

fn transform(value: &Value, config: &WebApiConfig, names: Option<&EntityNameMap>) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, value) in map {
                if is_client_only(key) {
                    continue;
                }

                let value = match value {
                    Value::String(reference) if is_reference_key(key) && !reference.starts_with('$') => {
                        Value::String(rewrite_reference(key, reference, config, names))
                    }
                    other => transform(other, config, names),
                };
                out.insert(key.clone(), value);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| transform(item, config, names))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn is_client_only(key: &str) -> bool {
    key.starts_with("oData") || CLIENT_ONLY_SUFFIXES.iter().any(|suffix| key.ends_with(suffix))
}

fn is_reference_key(key: &str) -> bool {
    key.ends_with("@odata.bind") || key.ends_with("@odata.id")
}

fn rewrite_reference(
    key: &str,
    reference: &str,
    config: &WebApiConfig,
    names: Option<&EntityNameMap>,
) -> String {
    let mut value = BRACED_KEY.replace_all(reference, "($1)").into_owned();

    if config.use_entity_names {
        if let Some(names) = names {
            let rewritten = ENTITY_REFERENCE.captures(&value).and_then(|caps| {
                let name = caps.get(1)?;
                let collection = names.get(name.as_str())?;
                Some(format!(
                    "{}{}{}",
                    &value[..name.start()],
                    collection,
                    &caps[2]
                ))
            });
            if let Some(rewritten) = rewritten {
                value = rewritten;
            }
        }
    }

    if value.starts_with(config.web_api_url.as_str()) {
        return value;
    }

    if key.ends_with("@odata.bind") {
        if !value.starts_with('/') {
            value.insert(0, '/');
        }
        value
    } else {
        format!(
            "{}{}",
            config.web_api_url,
            value.strip_prefix('/').unwrap_or(&value)
        )
    }
}

/// Escape every character at or above U+007F as `\uXXXX`, using UTF-16
/// code units for characters outside the BMP.
fn escape_non_ascii(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    let mut units = [0u16; 2];

    for c in json.chars() {
        if (c as u32) < 0x7F {
            out.push(c);
        } else {
            for unit in c.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{unit:04x}"));
            }
        }
    }

    out
}
