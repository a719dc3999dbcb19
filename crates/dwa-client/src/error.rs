//! Error types for dwa-client.

use std::time::Duration;

/// Result type alias for dwa-client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for dwa-client operations.
#[derive(Debug, thiserror::Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional source error.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Create a new error with the given kind.
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, source: None }
    }

    /// Create a new error with the given kind and source.
    pub fn with_source(
        kind: ErrorKind,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            source: Some(Box::new(source)),
        }
    }

    /// Shorthand for a required parameter that was not supplied.
    pub fn missing(operation: impl Into<String>, parameter: impl Into<String>) -> Self {
        Self::new(ErrorKind::MissingParameter {
            operation: operation.into(),
            parameter: parameter.into(),
        })
    }

    /// Shorthand for a parameter that failed its type or format check.
    pub fn invalid(
        operation: impl Into<String>,
        parameter: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::new(ErrorKind::InvalidParameter {
            operation: operation.into(),
            parameter: parameter.into(),
            expected: expected.into(),
        })
    }

    /// Returns true if this error was raised while validating a request,
    /// before anything was sent.
    pub fn is_validation(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::MissingParameter { .. } | ErrorKind::InvalidParameter { .. }
        )
    }

    /// Returns true if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Returns true if this is a rate limit error.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self.kind, ErrorKind::RateLimited { .. })
    }

    /// Returns the HTTP status carried by a transport error, if any.
    pub fn status(&self) -> Option<u16> {
        match &self.kind {
            ErrorKind::Http { status, .. } => Some(*status),
            ErrorKind::RateLimited { .. } => Some(429),
            _ => None,
        }
    }

    /// Returns the retry-after duration if this is a rate limit error.
    pub fn retry_after(&self) -> Option<Duration> {
        match &self.kind {
            ErrorKind::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// The kind of error that occurred.
#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    /// A required request field is absent.
    #[error("{operation} requires the {parameter} parameter")]
    MissingParameter { operation: String, parameter: String },

    /// A request field has the wrong type or format (bad GUID, bad key).
    #[error("{operation} requires the {parameter} parameter to be of type {expected}")]
    InvalidParameter {
        operation: String,
        parameter: String,
        expected: String,
    },

    /// Mutually exclusive options were combined.
    #[error("Usage error: {0}")]
    Usage(String),

    /// The response body could not be parsed. `raw` holds the unparsed text.
    #[error("Parse error: {message}")]
    Parse { message: String, raw: String },

    /// The server answered with a failure status.
    #[error("HTTP error: {status} {status_text}: {message}")]
    Http {
        status: u16,
        status_text: String,
        code: Option<String>,
        message: String,
    },

    /// Rate limit exceeded (HTTP 429).
    #[error("Rate limited{}", retry_after.map(|d| format!(", retry after {:?}", d)).unwrap_or_default())]
    RateLimited { retry_after: Option<Duration> },

    /// Request timeout.
    #[error("Request timeout")]
    Timeout,

    /// Connection error.
    #[error("Connection error: {0}")]
    Connection(String),

    /// All retries exhausted.
    #[error("All {attempts} retry attempts exhausted")]
    RetriesExhausted { attempts: u32 },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl ErrorKind {
    /// Returns true if this error kind is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            ErrorKind::RateLimited { .. } => true,
            ErrorKind::Timeout => true,
            ErrorKind::Connection(_) => true,
            ErrorKind::Http { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }
}

/// Check if an HTTP status code is typically retryable.
fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            ErrorKind::Timeout
        } else if err.is_connect() {
            ErrorKind::Connection(err.to_string())
        } else if let Some(status) = err.status() {
            ErrorKind::Http {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
                code: None,
                message: err.to_string(),
            }
        } else {
            ErrorKind::Other(err.to_string())
        };

        Error::with_source(kind, err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::with_source(ErrorKind::Json(err.to_string()), err)
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::with_source(ErrorKind::Config(format!("Invalid URL: {}", err)), err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16) -> Error {
        Error::new(ErrorKind::Http {
            status,
            status_text: "Status".into(),
            code: None,
            message: "error".into(),
        })
    }

    #[test]
    fn test_error_is_retryable() {
        let err = Error::new(ErrorKind::RateLimited { retry_after: None });
        assert!(err.is_retryable());

        let err = Error::new(ErrorKind::Timeout);
        assert!(err.is_retryable());

        assert!(http(503).is_retryable());
        assert!(!http(404).is_retryable());

        let err = Error::invalid("retrieve", "id", "GUID String");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_validation_errors_name_operation_and_field() {
        let err = Error::invalid("retrieve", "request.id", "GUID String");
        assert!(err.is_validation());
        assert_eq!(
            err.to_string(),
            "retrieve requires the request.id parameter to be of type GUID String"
        );

        let err = Error::missing("create", "request.collection");
        assert!(err.is_validation());
        assert_eq!(
            err.to_string(),
            "create requires the request.collection parameter"
        );

        let err = Error::new(ErrorKind::Usage("both".into()));
        assert!(!err.is_validation());
    }

    #[test]
    fn test_error_is_rate_limited() {
        let err = Error::new(ErrorKind::RateLimited {
            retry_after: Some(Duration::from_secs(30)),
        });
        assert!(err.is_rate_limited());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(30)));
        assert_eq!(err.status(), Some(429));

        let err = Error::new(ErrorKind::Timeout);
        assert!(!err.is_rate_limited());
        assert_eq!(err.retry_after(), None);
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_error_kind_display_messages() {
        let cases: Vec<(ErrorKind, &str)> = vec![
            (
                ErrorKind::Http {
                    status: 412,
                    status_text: "Precondition Failed".into(),
                    code: Some("0x80060882".into()),
                    message: "The version of the existing record doesn't match".into(),
                },
                "HTTP error: 412 Precondition Failed: The version",
            ),
            (
                ErrorKind::Parse {
                    message: "expected value at line 1 column 1".into(),
                    raw: "<html>".into(),
                },
                "Parse error: expected value",
            ),
            (ErrorKind::Usage("pick one".into()), "Usage error: pick one"),
            (
                ErrorKind::RateLimited {
                    retry_after: Some(Duration::from_secs(30)),
                },
                "retry after",
            ),
            (ErrorKind::RateLimited { retry_after: None }, "Rate limited"),
            (ErrorKind::Timeout, "Request timeout"),
            (
                ErrorKind::Connection("refused".into()),
                "Connection error: refused",
            ),
            (
                ErrorKind::Json("unexpected EOF".into()),
                "JSON error: unexpected EOF",
            ),
            (
                ErrorKind::Config("missing field".into()),
                "Configuration error: missing field",
            ),
            (
                ErrorKind::RetriesExhausted { attempts: 3 },
                "All 3 retry attempts exhausted",
            ),
            (ErrorKind::Other("something else".into()), "something else"),
        ];

        for (kind, expected_substring) in cases {
            let display = kind.to_string();
            assert!(
                display.contains(expected_substring),
                "Expected '{display}' to contain '{expected_substring}'"
            );
        }
    }

    #[test]
    fn test_retryable_http_status_codes() {
        for status in [429, 500, 502, 503, 504] {
            assert!(http(status).is_retryable(), "HTTP {status} should be retryable");
        }

        for status in [400, 401, 403, 404, 405, 409, 412] {
            assert!(
                !http(status).is_retryable(),
                "HTTP {status} should NOT be retryable"
            );
        }
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<String>("not valid json").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err.kind, ErrorKind::Json(_)));
        assert!(err.source.is_some());
    }

    #[test]
    fn test_from_url_parse_error() {
        let url_err = url::Url::parse("not a url").unwrap_err();
        let err: Error = url_err.into();
        assert!(matches!(err.kind, ErrorKind::Config(_)));
        assert!(err.to_string().contains("Invalid URL"));
    }
}
