//! URL composition.
//!
//! Turns a [`Request`] into a relative path with OData system query options
//! plus the headers it implies. Composition only borrows the descriptor, so
//! composing the same request twice yields identical output.

use std::sync::LazyLock;

use regex_lite::Regex;

use crate::config::WebApiConfig;
use crate::error::{Error, Result};
use crate::headers::{compose_headers, HeaderMap};
use crate::request::{Expand, QueryOptions, Request};
use crate::validation::{self, encode_uri_component};

static BRACED_GUID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\{([0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12})\}",
    )
    .unwrap()
});

/// A composed request, ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedRequest {
    /// Path relative to the Web API base, including the query string.
    /// Absolute when the descriptor carried a URL outside the configured base.
    pub path: String,
    /// Request-specific headers.
    pub headers: HeaderMap,
    pub is_async: bool,
}

impl ConvertedRequest {
    /// Absolute URI of the request.
    pub fn uri(&self, config: &WebApiConfig) -> String {
        if self.path.starts_with("http://") || self.path.starts_with("https://") {
            self.path.clone()
        } else {
            format!("{}{}", config.web_api_url, self.path)
        }
    }
}

/// Compose the path, query string, and headers of a request.
///
/// `operation` names the calling operation in validation errors and drives
/// the `retrieve`-only `select` path suffixes.
pub fn compose(
    request: &Request,
    config: &WebApiConfig,
    operation: &str,
) -> Result<ConvertedRequest> {
    let (suffix, params) = compose_query(&request.query, operation, operation == "retrieve")?;

    let mut path = match &request.url {
        Some(url) => {
            if request.collection.is_some() || request.key.is_some() || request.id.is_some() {
                return Err(Error::invalid(
                    operation,
                    "request.url",
                    "String without request.collection, request.key or request.id",
                ));
            }
            let relative = url.strip_prefix(config.web_api_url.as_str()).unwrap_or(url);
            // Path suffixes go before the caller's query string.
            match relative.split_once('?') {
                Some((base, query)) => format!("{base}{suffix}?{query}"),
                None => format!("{relative}{suffix}"),
            }
        }
        None => {
            let mut path = compose_address(request, operation)?;
            path.push_str(&suffix);
            path
        }
    };

    if !params.is_empty() {
        path.push(if path.contains('?') { '&' } else { '?' });
        path.push_str(&params.join("&"));
    }

    if request.url.is_none() {
        if let Some(fetch_xml) = &request.fetch_xml {
            path.push(if path.contains('?') { '&' } else { '?' });
            path.push_str("fetchXml=");
            path.push_str(&encode_uri_component(fetch_xml));
        }
    }

    let headers = compose_headers(request, operation, config)?;

    Ok(ConvertedRequest {
        path,
        headers,
        is_async: request.is_async.unwrap_or(true),
    })
}

/// Collection, key, and sub-resource part of the path.
fn compose_address(request: &Request, operation: &str) -> Result<String> {
    let mut path = String::new();

    match request.collection.as_deref() {
        Some(collection) => {
            path.push_str(validation::string(collection, operation, "request.collection")?);

            if let Some(content_id) = &request.content_id {
                if content_id.starts_with('$') {
                    path = format!("{content_id}/{path}");
                }
            }

            let key = match (&request.key, &request.id) {
                (Some(key), _) => Some(validation::key(key, operation, "request.key")?),
                (None, Some(id)) => Some(validation::guid(id, operation, "request.id")?),
                (None, None) => None,
            };
            if let Some(key) = key {
                path.push('(');
                path.push_str(&key);
                path.push(')');
            }
        }
        None if request.unbound => {}
        None => return Err(Error::missing(operation, "request.collection")),
    }

    if let Some(additional) = &request.additional_url {
        if !path.is_empty() {
            path.push('/');
        }
        path.push_str(additional);
    }

    Ok(path)
}

/// Compose one node of the query tree.
///
/// Returns the path suffix (navigation property, `select` path entries) and
/// the query parameters in wire order. Nested expansions ignore the suffix
/// and join their parameters with `;`.
pub fn compose_query(
    options: &QueryOptions,
    operation: &str,
    is_retrieve: bool,
) -> Result<(String, Vec<String>)> {
    let mut suffix = String::new();
    let mut params = Vec::new();

    if let Some(navigation) = &options.navigation_property {
        suffix.push('/');
        suffix.push_str(validation::string(
            navigation,
            operation,
            "request.navigation_property",
        )?);

        if let Some(key) = &options.navigation_property_key {
            let key = validation::key(key, operation, "request.navigation_property_key")?;
            suffix.push('(');
            suffix.push_str(&key);
            suffix.push(')');
        }

        if navigation == "Attributes" {
            if let Some(cast) = &options.metadata_attribute_type {
                suffix.push('/');
                suffix.push_str(cast);
            }
        }
    }

    if !options.select.is_empty() {
        let mut fields = options.select.as_slice();

        if is_retrieve && fields.len() == 1 && fields[0].ends_with("/$ref") {
            suffix.push('/');
            suffix.push_str(&fields[0]);
            fields = &[];
        } else if is_retrieve && fields[0].starts_with('/') {
            if options.navigation_property.is_none() {
                suffix.push_str(&fields[0]);
            }
            fields = &fields[1..];
        }

        if !fields.is_empty() {
            params.push(format!("$select={}", fields.join(",")));
        }
    }

    if let Some(filter) = &options.filter {
        params.push(format!(
            "$filter={}",
            encode_uri_component(&strip_guid_braces(filter))
        ));
    }

    if let Some(id) = &options.saved_query {
        params.push(format!(
            "savedQuery={}",
            validation::guid(id, operation, "request.saved_query")?
        ));
    }

    if let Some(id) = &options.user_query {
        params.push(format!(
            "userQuery={}",
            validation::guid(id, operation, "request.user_query")?
        ));
    }

    if let Some(apply) = &options.apply {
        params.push(format!("$apply={apply}"));
    }

    if options.count {
        params.push("$count=true".to_string());
    }

    if let Some(top) = options.top.filter(|top| *top > 0) {
        params.push(format!("$top={top}"));
    }

    if !options.order_by.is_empty() {
        params.push(format!("$orderby={}", options.order_by.join(",")));
    }

    match &options.expand {
        Expand::None => {}
        Expand::Raw(raw) => params.push(format!("$expand={raw}")),
        Expand::Items(items) if items.is_empty() => {}
        Expand::Items(items) => {
            let operation = format!("{operation} $expand");
            let mut expanded = Vec::with_capacity(items.len());

            for item in items {
                let property =
                    validation::string(&item.property, &operation, "request.expand.property")?;
                let (_, nested) = compose_query(&item.options, &operation, false)?;

                if nested.is_empty() {
                    expanded.push(property.to_string());
                } else {
                    expanded.push(format!("{property}({})", nested.join(";")));
                }
            }

            params.push(format!("$expand={}", expanded.join(",")));
        }
    }

    Ok((suffix, params))
}

/// Remove curly braces around GUID literals outside quoted strings.
///
/// A word character directly after the closing brace gets a separating
/// space so the literal stays a distinct token.
pub fn strip_guid_braces(filter: &str) -> String {
    let mut out = String::with_capacity(filter.len());
    let mut in_literal = false;
    let mut rest = filter;

    while let Some(c) = rest.chars().next() {
        if c == '{' && !in_literal {
            if let Some(caps) = BRACED_GUID.captures(rest) {
                out.push_str(&caps[1]);
                rest = &rest[caps[0].len()..];
                if rest.starts_with(|next: char| next.is_alphanumeric() || next == '_') {
                    out.push(' ');
                }
                continue;
            }
        }

        if c == '\'' {
            in_literal = !in_literal;
        }
        out.push(c);
        rest = &rest[c.len_utf8()..];
    }

    out
}
