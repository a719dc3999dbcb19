//! Request header composition.

use std::collections::BTreeMap;

use crate::config::WebApiConfig;
use crate::error::{Error, ErrorKind, Result};
use crate::request::{PreferOptions, Request};
use crate::validation;

/// Header name to value, kept sorted so composed output is deterministic.
pub type HeaderMap = BTreeMap<String, String>;

/// Case-insensitive header lookup.
pub fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// Headers sent on every non-batch request.
pub fn standard_headers() -> HeaderMap {
    HeaderMap::from([
        ("Accept".to_string(), "application/json".to_string()),
        ("OData-MaxVersion".to_string(), "4.0".to_string()),
        ("OData-Version".to_string(), "4.0".to_string()),
        (
            "Content-Type".to_string(),
            "application/json; charset=utf-8".to_string(),
        ),
    ])
}

/// Derive the request-specific headers of a descriptor.
pub fn compose_headers(
    request: &Request,
    operation: &str,
    config: &WebApiConfig,
) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();

    if let Some(prefer) = compose_prefer(&request.prefer, config) {
        headers.insert("Prefer".into(), prefer);
    }

    if request.if_match.is_some() && request.if_none_match.is_some() {
        return Err(Error::new(ErrorKind::Usage(format!(
            "{operation}. Either one of request.if_match or request.if_none_match parameters should be used in a call, not both."
        ))));
    }

    if let Some(etag) = &request.if_match {
        headers.insert("If-Match".into(), etag.clone());
    }
    if let Some(etag) = &request.if_none_match {
        headers.insert("If-None-Match".into(), etag.clone());
    }
    if let Some(user) = &request.impersonate {
        let user = validation::guid(user, operation, "request.impersonate")?;
        headers.insert("MSCRMCallerID".into(), user);
    }
    if let Some(token) = &request.token {
        headers.insert("Authorization".into(), format!("Bearer {token}"));
    }
    // The server reads this header as "run duplicate detection".
    if request.duplicate_detection {
        headers.insert("MSCRM.SuppressDuplicateDetection".into(), "false".into());
    }
    if request.no_cache {
        headers.insert("Cache-Control".into(), "no-cache".into());
    }
    if request.merge_labels {
        headers.insert("MSCRM.MergeLabels".into(), "true".into());
    }
    if let Some(content_id) = &request.content_id {
        if !content_id.starts_with('$') {
            headers.insert("Content-ID".into(), content_id.clone());
        }
    }

    Ok(headers)
}

/// Compose the `Prefer` header value, filling unset directives from config.
///
/// Returns `None` when no directive applies.
pub fn compose_prefer(prefer: &PreferOptions, config: &WebApiConfig) -> Option<String> {
    let return_representation = prefer
        .return_representation
        .unwrap_or(config.return_representation);
    let include_annotations = prefer
        .include_annotations
        .as_deref()
        .or(config.include_annotations.as_deref())
        .filter(|annotations| !annotations.is_empty());
    let max_page_size = prefer
        .max_page_size
        .or(config.max_page_size)
        .filter(|size| *size > 0);

    let mut directives = Vec::new();
    if return_representation {
        directives.push("return=representation".to_string());
    }
    if let Some(annotations) = include_annotations {
        directives.push(format!("odata.include-annotations=\"{annotations}\""));
    }
    if let Some(size) = max_page_size {
        directives.push(format!("odata.maxpagesize={size}"));
    }
    if prefer.track_changes {
        directives.push("odata.track-changes".to_string());
    }

    if directives.is_empty() {
        None
    } else {
        Some(directives.join(","))
    }
}
