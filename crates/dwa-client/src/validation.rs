//! Parameter validation and URL encoding helpers.
//!
//! Every check is a pure function parameterized by the operation name and
//! the field name, returning a tagged validation error on failure. Nothing
//! here panics or touches shared state.
//!
//! ```rust
//! use dynamics_web_api_client::validation;
//!
//! let id = validation::guid("{00000000-0000-0000-0000-000000000001}", "retrieve", "request.id")
//!     .unwrap();
//! assert_eq!(id, "00000000-0000-0000-0000-000000000001");
//!
//! let key = validation::key("name='x', code=\"y\"", "retrieve", "request.key").unwrap();
//! assert_eq!(key, "name='x',code='y'");
//! ```

use std::sync::LazyLock;

use regex_lite::Regex;

use crate::error::{Error, Result};

const GUID_PATTERN: &str =
    r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}";

static GUID: LazyLock<Regex> = LazyLock::new(|| Regex::new(GUID_PATTERN).unwrap());

static BRACED_GUID_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"^\{{?({})\}}?$", GUID_PATTERN)).unwrap());

static ALTERNATE_KEY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\w+=(.+)$").unwrap());

/// Require a non-empty string parameter.
pub fn string<'a>(value: &'a str, operation: &str, parameter: &str) -> Result<&'a str> {
    if value.trim().is_empty() {
        return Err(Error::invalid(operation, parameter, "String"));
    }
    Ok(value)
}

/// Extract the GUID carried by a parameter.
///
/// Surrounding braces or other decoration are dropped, so `{guid}` and
/// `guid` both yield the bare GUID.
pub fn guid(value: &str, operation: &str, parameter: &str) -> Result<String> {
    GUID.find(value)
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| Error::invalid(operation, parameter, "GUID String"))
}

/// Validate and normalize a record key.
///
/// A GUID (optionally braced) yields the bare GUID. Otherwise the value must
/// be an alternate key: one or more comma-separated `attribute=value` pairs.
/// Pairs are trimmed and double quotes become single quotes, which is the
/// literal quoting OData expects.
pub fn key(value: &str, operation: &str, parameter: &str) -> Result<String> {
    let value = string(value, operation, parameter)?.trim();

    if let Some(caps) = BRACED_GUID_KEY.captures(value) {
        return Ok(caps[1].to_string());
    }

    let mut pairs = Vec::new();
    for pair in value.split(',') {
        let pair = pair.trim().replace('"', "'");
        if !ALTERNATE_KEY.is_match(&pair) {
            return Err(Error::invalid(
                operation,
                parameter,
                "String representing GUID or Alternate Key",
            ));
        }
        pairs.push(pair);
    }

    Ok(pairs.join(","))
}

/// Percent-encode a query parameter value.
///
/// Matches `encodeURIComponent`: unreserved characters plus `!'()*` are
/// left as-is, so OData string literals keep their quotes readable.
#[must_use]
pub fn encode_uri_component(value: &str) -> String {
    urlencoding::encode(value)
        .replace("%21", "!")
        .replace("%27", "'")
        .replace("%28", "(")
        .replace("%29", ")")
        .replace("%2A", "*")
}
