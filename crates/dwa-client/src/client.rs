//! HTTP transport over reqwest with retry, compression, and rate limit handling.

use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::config::HttpConfig;
use crate::error::{Error, ErrorKind, Result};
use crate::headers::HeaderMap;
use crate::response::error_from_body;
use crate::retry::RetryPolicy;
use crate::transport::{Transport, TransportRequest, TransportResponse};

/// Production [`Transport`] for the Dataverse Web API.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    inner: reqwest::Client,
    config: HttpConfig,
}

impl HttpTransport {
    /// Create a transport with the given configuration.
    pub fn new(config: HttpConfig) -> Result<Self> {
        let builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .gzip(config.accept_compressed)
            .deflate(config.accept_compressed);

        let inner = builder
            .build()
            .map_err(|e| Error::with_source(ErrorKind::Config(e.to_string()), e))?;

        Ok(Self { inner, config })
    }

    /// Create a transport with default configuration.
    pub fn default_transport() -> Result<Self> {
        Self::new(HttpConfig::default())
    }

    /// Get the transport configuration.
    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// Execute a request with automatic retry handling.
    #[instrument(skip(self, request), fields(method = %request.method, uri = %request.uri))]
    pub async fn execute(&self, request: &TransportRequest) -> Result<TransportResponse> {
        let mut retry_policy = self
            .config
            .retry
            .as_ref()
            .map(|c| RetryPolicy::new(c.clone()));

        loop {
            match self.execute_once(request).await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_retryable() => {
                    let Some(policy) = retry_policy.as_mut() else {
                        return Err(err);
                    };

                    if let Some(delay) = policy.next_delay(err.retry_after()) {
                        warn!(
                            attempt = policy.attempt(),
                            delay_ms = delay.as_millis(),
                            error = %err,
                            "Request failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    return Err(Error::with_source(
                        ErrorKind::RetriesExhausted {
                            attempts: policy.attempt(),
                        },
                        err,
                    ));
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Execute a single request without retry logic.
    async fn execute_once(&self, request: &TransportRequest) -> Result<TransportResponse> {
        let mut req = self
            .inner
            .request(request.method.to_reqwest(), &request.uri);

        for (name, value) in &request.headers {
            req = req.header(name.as_str(), value.as_str());
        }

        if let Some(timeout) = request.timeout {
            req = req.timeout(timeout);
        }

        if let Some(body) = &request.body {
            req = req.body(body.clone());
        }

        if self.config.enable_tracing {
            debug!(
                method = %request.method,
                uri = %request.uri,
                body_bytes = request.body.as_ref().map_or(0, String::len),
                "Sending request"
            );
        }

        let response = req.send().await?;
        let status = response.status();
        let status_text = status.canonical_reason().unwrap_or_default().to_string();

        if self.config.enable_tracing {
            let content_length = response.content_length();
            if status.is_success() {
                debug!(status = status.as_u16(), content_length, "Response received");
            } else {
                info!(status = status.as_u16(), content_length, "Non-success response");
            }
        }

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);

            return Err(Error::new(ErrorKind::RateLimited { retry_after }));
        }

        let headers: HeaderMap = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();

        let body = response.text().await?;

        if status.as_u16() >= 400 {
            return Err(error_from_body(status.as_u16(), &status_text, &body));
        }

        Ok(TransportResponse {
            status: status.as_u16(),
            status_text,
            headers,
            body,
        })
    }
}

impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse> {
        self.execute(&request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestMethod;
    use crate::retry::RetryConfig;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(method: RequestMethod, uri: String) -> TransportRequest {
        TransportRequest {
            method,
            uri,
            headers: HeaderMap::new(),
            body: None,
            is_async: true,
            timeout: None,
        }
    }

    fn no_retry() -> HttpTransport {
        HttpTransport::new(HttpConfig::builder().without_retry().build()).unwrap()
    }

    #[tokio::test]
    async fn test_transport_creation() {
        let transport = HttpTransport::default_transport().unwrap();
        assert!(transport.config().accept_compressed);
        assert!(transport.config().retry.is_some());
    }

    #[tokio::test]
    async fn test_successful_request() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/data/v9.2/accounts"))
            .and(header("Authorization", "Bearer test-token"))
            .and(header("OData-Version", "4.0"))
            .and(body_string("{\"name\":\"x\"}"))
            .respond_with(
                ResponseTemplate::new(204).insert_header(
                    "OData-EntityId",
                    "https://org.api/accounts(00000000-0000-0000-0000-000000000001)",
                ),
            )
            .mount(&mock_server)
            .await;

        let mut req = request(
            RequestMethod::Post,
            format!("{}/api/data/v9.2/accounts", mock_server.uri()),
        );
        req.headers.insert("Authorization".into(), "Bearer test-token".into());
        req.headers.insert("OData-Version".into(), "4.0".into());
        req.body = Some("{\"name\":\"x\"}".into());

        let response = no_retry().send(req).await.unwrap();
        assert_eq!(response.status, 204);
        assert_eq!(response.status_text, "No Content");
        assert!(response.header("odata-entityid").unwrap().ends_with("0001)"));
        assert!(response.body.is_empty());
    }

    #[tokio::test]
    async fn test_error_response_is_normalized() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/accounts"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {
                    "code": "0x0",
                    "message": "Could not find a property named 'foo' on type 'Microsoft.Dynamics.CRM.account'."
                }
            })))
            .mount(&mock_server)
            .await;

        let err = no_retry()
            .send(request(
                RequestMethod::Get,
                format!("{}/accounts", mock_server.uri()),
            ))
            .await
            .unwrap_err();

        match err.kind {
            ErrorKind::Http {
                status,
                status_text,
                code,
                message,
            } => {
                assert_eq!(status, 400);
                assert_eq!(status_text, "Bad Request");
                assert_eq!(code.as_deref(), Some("0x0"));
                assert!(message.contains("property named 'foo'"));
            }
            other => panic!("unexpected error kind: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rate_limiting() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/limited"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
            .mount(&mock_server)
            .await;

        let err = no_retry()
            .send(request(
                RequestMethod::Get,
                format!("{}/limited", mock_server.uri()),
            ))
            .await
            .unwrap_err();

        assert!(err.is_rate_limited());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(30)));
    }

    #[tokio::test]
    async fn test_retry_on_503() {
        let mock_server = MockServer::start().await;
        let call_count = Arc::new(AtomicU32::new(0));
        let call_count_clone = call_count.clone();

        Mock::given(method("GET"))
            .and(path("/retry"))
            .respond_with(move |_: &wiremock::Request| {
                let count = call_count_clone.fetch_add(1, Ordering::SeqCst);
                if count < 2 {
                    ResponseTemplate::new(503)
                } else {
                    ResponseTemplate::new(200).set_body_json(serde_json::json!({"value": []}))
                }
            })
            .mount(&mock_server)
            .await;

        let transport = HttpTransport::new(
            HttpConfig::builder()
                .with_retry(
                    RetryConfig::default()
                        .with_max_attempts(3)
                        .with_initial_delay(Duration::from_millis(10)),
                )
                .build(),
        )
        .unwrap();

        let response = transport
            .send(request(
                RequestMethod::Get,
                format!("{}/retry", mock_server.uri()),
            ))
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(call_count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(502))
            .expect(3)
            .mount(&mock_server)
            .await;

        let transport = HttpTransport::new(
            HttpConfig::builder()
                .with_retry(
                    RetryConfig::default()
                        .with_max_attempts(2)
                        .with_initial_delay(Duration::from_millis(5)),
                )
                .build(),
        )
        .unwrap();

        let err = transport
            .send(request(
                RequestMethod::Get,
                format!("{}/down", mock_server.uri()),
            ))
            .await
            .unwrap_err();

        assert!(matches!(
            err.kind,
            ErrorKind::RetriesExhausted { attempts: 2 }
        ));
        assert!(err.source.is_some());
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let mock_server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&mock_server)
            .await;

        let transport = HttpTransport::default_transport().unwrap();
        let err = transport
            .send(request(
                RequestMethod::Delete,
                format!("{}/gone", mock_server.uri()),
            ))
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(404));
        assert!(err.to_string().contains("Not Found"));
    }
}
