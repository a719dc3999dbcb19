//! Response parsing.
//!
//! Single JSON bodies, plain-text counts, and `multipart/mixed` batch
//! responses all come back as a [`ResponseBody`]. Parsed objects get
//! client-side annotation fields (`x_Formatted`, `oDataNextLink`, ...) and
//! linked-entity alias columns grouped into nested objects.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, ErrorKind, Result};
use crate::headers::{header_value, HeaderMap};

static ENTITY_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .unwrap()
});

static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"/(\w+)\(([0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12})\)",
    )
    .unwrap()
});

const ALIAS_SEPARATOR: &str = "_x002e_";

/// How to interpret a successful response body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// Return `@odata.count` as a [`ResponseBody::Count`].
    pub to_count: bool,
    /// Convert an `@odata.id` body into a [`Reference`].
    pub is_ref: bool,
}

/// A collection page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub value: Vec<Value>,
    pub count: Option<u64>,
    pub next_link: Option<String>,
    pub delta_link: Option<String>,
    pub context: Option<String>,
}

/// A reference to a record, as returned by `$ref` requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub id: String,
    pub collection: String,
}

/// A parsed response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// No content.
    Empty,
    /// GUID taken from the `OData-EntityId` header of a bodiless response.
    EntityId(String),
    Entity(Value),
    Collection(Collection),
    Count(u64),
    Text(String),
    Reference(Reference),
    /// Batch parts in response order, change-sets flattened.
    Batch(Vec<BatchPartResponse>),
}

impl ResponseBody {
    /// Returns the entity, if this is one.
    pub fn into_entity(self) -> Option<Value> {
        match self {
            ResponseBody::Entity(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the collection page, if this is one.
    pub fn into_collection(self) -> Option<Collection> {
        match self {
            ResponseBody::Collection(collection) => Some(collection),
            _ => None,
        }
    }

    /// Returns the count, if this is one.
    pub fn count(&self) -> Option<u64> {
        match self {
            ResponseBody::Count(count) => Some(*count),
            _ => None,
        }
    }

    /// Returns the created or updated record's GUID.
    pub fn entity_id(&self) -> Option<&str> {
        match self {
            ResponseBody::EntityId(id) => Some(id),
            _ => None,
        }
    }
}

/// One part of a batch response.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchPartResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: HeaderMap,
    pub content_id: Option<String>,
    /// Parsed body. Failed parts keep their raw error body as text.
    pub body: ResponseBody,
}

impl BatchPartResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The parsed body, or the part's error as an [`ErrorKind::Http`].
    pub fn into_result(self) -> Result<ResponseBody> {
        if self.is_success() {
            return Ok(self.body);
        }
        let raw = match &self.body {
            ResponseBody::Text(raw) => raw.as_str(),
            _ => "",
        };
        Err(error_from_body(self.status, &self.status_text, raw))
    }
}

/// Parse a successful response.
pub fn parse_response(
    status: u16,
    headers: &HeaderMap,
    body: &str,
    options: ParseOptions,
) -> Result<ResponseBody> {
    if let Some(boundary) = batch_boundary(headers, body) {
        return Ok(ResponseBody::Batch(parse_batch(body, &boundary, options)?));
    }
    parse_single(status, headers, body, options)
}

/// Normalize a failed response into an [`ErrorKind::Http`] error.
///
/// Understands the Web API error shape `{"error": {"code", "message"}}`;
/// other bodies become the message verbatim.
pub fn error_from_body(status: u16, status_text: &str, body: &str) -> Error {
    let parsed = serde_json::from_str::<Value>(body).ok();
    let error = parsed.as_ref().and_then(|value| value.get("error"));

    let code = error
        .and_then(|error| error.get("code"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let message = error
        .and_then(|error| error.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| {
            let body = body.trim();
            if body.is_empty() {
                status_text.to_string()
            } else {
                body.to_string()
            }
        });

    Error::new(ErrorKind::Http {
        status,
        status_text: status_text.to_string(),
        code,
        message,
    })
}

fn batch_boundary(headers: &HeaderMap, body: &str) -> Option<String> {
    if let Some(content_type) = header_value(headers, "Content-Type") {
        if content_type.contains("multipart/mixed") {
            if let Some(boundary) = boundary_param(content_type) {
                return Some(boundary);
            }
        }
    }

    let first = body.trim_start().lines().next()?;
    first
        .trim()
        .strip_prefix("--")
        .filter(|boundary| boundary.starts_with("batchresponse_"))
        .map(str::to_string)
}

fn boundary_param(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .filter_map(|param| param.trim().strip_prefix("boundary="))
        .map(|boundary| boundary.trim_matches('"').to_string())
        .next()
}

fn parse_single(
    status: u16,
    headers: &HeaderMap,
    body: &str,
    options: ParseOptions,
) -> Result<ResponseBody> {
    let trimmed = body.trim();

    if trimmed.is_empty() || status == 204 {
        return Ok(match header_value(headers, "OData-EntityId") {
            Some(entity_id) => ResponseBody::EntityId(
                ENTITY_ID
                    .find_iter(entity_id)
                    .last()
                    .map_or(entity_id, |m| m.as_str())
                    .to_string(),
            ),
            None => ResponseBody::Empty,
        });
    }

    let is_json = header_value(headers, "Content-Type").is_some_and(|ct| ct.contains("json"))
        || trimmed.starts_with('{')
        || trimmed.starts_with('[');

    if !is_json {
        return Ok(match trimmed.parse::<u64>() {
            Ok(count) => ResponseBody::Count(count),
            Err(_) => ResponseBody::Text(body.to_string()),
        });
    }

    let mut value: Value = serde_json::from_str(trimmed).map_err(|err| {
        Error::with_source(
            ErrorKind::Parse {
                message: err.to_string(),
                raw: body.to_string(),
            },
            err,
        )
    })?;

    if options.to_count {
        if let Some(count) = value.get("@odata.count").and_then(Value::as_u64) {
            return Ok(ResponseBody::Count(count));
        }
    }

    if options.is_ref {
        if let Some(reference) = value
            .get("@odata.id")
            .and_then(Value::as_str)
            .and_then(|id| REFERENCE.captures(id))
        {
            return Ok(ResponseBody::Reference(Reference {
                id: reference[2].to_string(),
                collection: reference[1].to_string(),
            }));
        }
    }

    if value.get("value").is_some_and(Value::is_array) {
        let string = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);
        let count = value.get("@odata.count").and_then(Value::as_u64);
        let next_link = string("@odata.nextLink");
        let delta_link = string("@odata.deltaLink");
        let context = string("@odata.context");

        let mut items = match value.get_mut("value").map(Value::take) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        };
        for item in &mut items {
            format_annotations(item).map_err(|message| parse_error(message, body))?;
        }

        return Ok(ResponseBody::Collection(Collection {
            value: items,
            count,
            next_link,
            delta_link,
            context,
        }));
    }

    format_annotations(&mut value).map_err(|message| parse_error(message, body))?;
    Ok(ResponseBody::Entity(value))
}

fn parse_error(message: String, raw: &str) -> Error {
    Error::new(ErrorKind::Parse {
        message,
        raw: raw.to_string(),
    })
}

/// Add client-side annotation fields and group alias columns, recursively.
///
/// Original keys are kept; the added fields are the ones the payload
/// serializer strips again.
pub fn format_annotations(value: &mut Value) -> std::result::Result<(), String> {
    match value {
        Value::Array(items) => items.iter_mut().try_for_each(format_annotations),
        Value::Object(object) => format_object(object),
        _ => Ok(()),
    }
}

fn format_object(object: &mut Map<String, Value>) -> std::result::Result<(), String> {
    for child in object.values_mut() {
        if child.is_object() || child.is_array() {
            format_annotations(child)?;
        }
    }

    let mut added = Vec::new();
    for (key, value) in object.iter() {
        let Some((base, annotation)) = key.split_once('@') else {
            continue;
        };

        let name = if base.is_empty() {
            match annotation {
                "odata.context" => "oDataContext".to_string(),
                "odata.count" => "oDataCount".to_string(),
                "odata.nextLink" => "oDataNextLink".to_string(),
                "odata.deltaLink" => "oDataDeltaLink".to_string(),
                _ => continue,
            }
        } else {
            match annotation {
                "OData.Community.Display.V1.FormattedValue" => format!("{base}_Formatted"),
                "Microsoft.Dynamics.CRM.associatednavigationproperty" => {
                    format!("{base}_NavigationProperty")
                }
                "Microsoft.Dynamics.CRM.lookuplogicalname" => format!("{base}_LogicalName"),
                _ => continue,
            }
        };
        added.push((name, value.clone()));
    }
    object.extend(added);

    let mut aliases: BTreeMap<String, Map<String, Value>> = BTreeMap::new();
    for (key, value) in object.iter() {
        if key.contains('@') {
            continue;
        }
        if let Some((alias, field)) = key.split_once(ALIAS_SEPARATOR) {
            aliases
                .entry(alias.to_string())
                .or_default()
                .insert(field.to_string(), value.clone());
        }
    }

    for (alias, fields) in aliases {
        if object.contains_key(&alias) {
            return Err(format!(
                "The alias name of the linked entity must be unique: '{alias}'"
            ));
        }
        object.insert(alias, Value::Object(fields));
    }

    Ok(())
}

fn parse_batch(body: &str, boundary: &str, options: ParseOptions) -> Result<Vec<BatchPartResponse>> {
    let delimiter = format!("--{boundary}");
    let mut parts = Vec::new();

    for segment in body.split(delimiter.as_str()).skip(1) {
        if segment.starts_with("--") {
            break;
        }

        let (mime_headers, content) = split_headers(segment.trim_start_matches(['\r', '\n']));

        if let Some(nested) = header_value(&mime_headers, "Content-Type")
            .filter(|ct| ct.contains("multipart/mixed"))
            .and_then(boundary_param)
        {
            parts.extend(parse_batch(content, &nested, options)?);
            continue;
        }

        parts.push(parse_http_part(&mime_headers, content, options)?);
    }

    Ok(parts)
}

fn parse_http_part(
    mime_headers: &HeaderMap,
    content: &str,
    options: ParseOptions,
) -> Result<BatchPartResponse> {
    let content = content.trim_start_matches(['\r', '\n']);
    let (status_line, rest) = content.split_once('\n').unwrap_or((content, ""));

    let mut words = status_line.trim().splitn(3, ' ');
    let _version = words.next();
    let status = words
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| parse_error(format!("invalid batch status line '{}'", status_line.trim()), content))?;
    let status_text = words.next().unwrap_or_default().to_string();

    let (headers, body) = split_headers(rest);
    let body = body.trim_end_matches(['\r', '\n']);

    let content_id = header_value(mime_headers, "Content-ID")
        .or_else(|| header_value(&headers, "Content-ID"))
        .map(str::to_string);

    let body = if (200..300).contains(&status) {
        parse_single(status, &headers, body, options)?
    } else {
        ResponseBody::Text(body.to_string())
    };

    Ok(BatchPartResponse {
        status,
        status_text,
        headers,
        content_id,
        body,
    })
}

/// Split a header block from the content after the first blank line.
fn split_headers(text: &str) -> (HeaderMap, &str) {
    let mut headers = HeaderMap::new();
    let mut rest = text;

    loop {
        let (line, remainder) = match rest.split_once('\n') {
            Some((line, remainder)) => (line, remainder),
            None => (rest, ""),
        };
        let line = line.trim_end_matches('\r');
        rest = remainder;

        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_string(), value.trim().to_string());
        }
        if rest.is_empty() {
            break;
        }
    }

    (headers, rest)
}
