//! The seam between request composition and the network.

use std::future::Future;
use std::time::Duration;

use crate::error::Result;
use crate::headers::{header_value, HeaderMap};
use crate::request::RequestMethod;

/// A fully composed HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
    pub method: RequestMethod,
    /// Absolute URI.
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Option<String>,
    pub is_async: bool,
    /// Overrides the transport's default timeout.
    pub timeout: Option<Duration>,
}

/// A raw HTTP response with a success or otherwise non-error status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: HeaderMap,
    pub body: String,
}

impl TransportResponse {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        header_value(&self.headers, name)
    }
}

/// Sends composed requests.
///
/// Implementations own retries and timeouts, and report failure statuses
/// as errors (see [`error_from_body`](crate::response::error_from_body)).
/// The engine calls `send` at most once per logical operation.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        request: TransportRequest,
    ) -> impl Future<Output = Result<TransportResponse>> + Send;
}
