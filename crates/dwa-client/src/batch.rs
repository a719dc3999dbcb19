//! `$batch` request encoding.
//!
//! Parts are written in input order. GET parts stand alone; runs of
//! non-GET parts share a change-set, which a following GET closes.

use tracing::debug;
use uuid::Uuid;

use crate::compose::compose;
use crate::config::WebApiConfig;
use crate::entity_names::EntityNameMap;
use crate::error::{Error, Result};
use crate::headers::HeaderMap;
use crate::payload::stringify;
use crate::request::{Request, RequestMethod};

const OPERATION: &str = "executeBatch";
const CONTENT_ID_START: u32 = 100_000;

/// One operation inside a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchPart {
    pub method: RequestMethod,
    pub request: Request,
}

impl BatchPart {
    pub fn new(method: RequestMethod, request: Request) -> Self {
        Self { method, request }
    }
}

/// An encoded `multipart/mixed` batch body and the headers to send it with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBatch {
    /// Outer boundary token.
    pub boundary: String,
    pub headers: HeaderMap,
    pub body: String,
}

/// Encode batch parts into a `$batch` request.
pub fn encode_batch(
    parts: &[BatchPart],
    config: &WebApiConfig,
    entity_names: Option<&EntityNameMap>,
) -> Result<EncodedBatch> {
    if parts.is_empty() {
        return Err(Error::invalid(OPERATION, "requests", "non-empty Array"));
    }

    let boundary = format!("dwa_batch_{}", Uuid::new_v4());
    let mut lines: Vec<String> = Vec::new();
    let mut change_set: Option<String> = None;
    let mut change_sets = 0usize;
    let mut content_id = CONTENT_ID_START;

    for part in parts {
        let converted = compose(&part.request, config, OPERATION)?;
        let is_get = part.method == RequestMethod::Get;

        if is_get {
            if let Some(open) = change_set.take() {
                delimiter(&mut lines, format!("--{open}--"));
                content_id = CONTENT_ID_START;
            }
        }

        if change_set.is_none() {
            delimiter(&mut lines, format!("--{boundary}"));
            if !is_get {
                let opened = format!("changeset_{}", Uuid::new_v4());
                lines.push(format!("Content-Type: multipart/mixed;boundary={opened}"));
                change_set = Some(opened);
                change_sets += 1;
            }
        }

        if let Some(open) = &change_set {
            delimiter(&mut lines, format!("--{open}"));
        }

        lines.push("Content-Type: application/http".to_string());
        lines.push("Content-Transfer-Encoding: binary".to_string());

        if !is_get {
            let id = match converted.headers.get("Content-ID") {
                Some(id) => id.clone(),
                None => {
                    content_id += 1;
                    content_id.to_string()
                }
            };
            lines.push(format!("Content-ID: {id}"));
        }

        let target = if converted.path.starts_with('$') {
            request_target(&converted.path)
        } else {
            request_target(&converted.uri(config))
        };
        delimiter(&mut lines, format!("{} {} HTTP/1.1", part.method, target));

        if is_get {
            lines.push("Accept: application/json".to_string());
        } else {
            lines.push("Content-Type: application/json".to_string());
        }

        for (name, value) in &converted.headers {
            if name == "Authorization" || name == "Content-ID" {
                continue;
            }
            lines.push(format!("{name}: {value}"));
        }

        if !is_get {
            if let Some(data) = &part.request.data {
                delimiter(&mut lines, stringify(data, config, entity_names)?);
            }
        }
    }

    if let Some(open) = change_set {
        delimiter(&mut lines, format!("--{open}--"));
    }
    delimiter(&mut lines, format!("--{boundary}--"));

    let mut body = lines.join("\r\n");
    body.push_str("\r\n");

    debug!(
        parts = parts.len(),
        change_sets,
        bytes = body.len(),
        "Encoded batch request"
    );

    let headers = HeaderMap::from([
        (
            "Content-Type".to_string(),
            format!("multipart/mixed;boundary={boundary}"),
        ),
        ("Accept".to_string(), "application/json".to_string()),
        ("OData-MaxVersion".to_string(), "4.0".to_string()),
        ("OData-Version".to_string(), "4.0".to_string()),
    ]);

    Ok(EncodedBatch {
        boundary,
        headers,
        body,
    })
}

/// Percent-encode the bytes a request line cannot carry raw.
///
/// Existing escapes and OData punctuation such as `$`, `(`, `'` and `=`
/// pass through, so a target that is already valid is left unchanged.
fn request_target(target: &str) -> String {
    let mut out = String::with_capacity(target.len());
    for byte in target.bytes() {
        match byte {
            b'"' | b'<' | b'>' | b'\\' | b'^' | b'`' | b'{' | b'|' | b'}' | b'#' => {
                out.push_str(&format!("%{byte:02X}"));
            }
            b if b.is_ascii_graphic() => out.push(char::from(b)),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

/// Push a line preceded by a blank line, except at the start of the body.
fn delimiter(lines: &mut Vec<String>, line: String) {
    if !lines.is_empty() {
        lines.push(String::new());
    }
    lines.push(line);
}
