//! Dataverse Web API client.
//!
//! This client wraps a [`Transport`] from `dwa-client` and funnels every
//! operation through the same steps: compose the descriptor, serialize the
//! payload, send once, parse the response.

use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;

use tracing::debug;

use dynamics_web_api_client::{
    compose, error_from_body, parse_response, standard_headers, stringify, EntityNameMap,
    Error, HeaderMap, HttpConfig, HttpTransport, ParseOptions, Request, RequestMethod,
    ResponseBody, Result, Transport, TransportRequest, WebApiConfig,
};

mod associations;
mod batch;
mod crud;
mod metadata;
mod query;

pub(crate) use associations::{associate_request, disassociate_request};

/// Dataverse Web API client.
///
/// Provides typed methods for the common Web API operations:
/// - CRUD on entity sets (create, retrieve, update, upsert, delete)
/// - Collection queries with paging, counts, and FetchXML
/// - Associating and disassociating records
/// - `$batch` requests with change-sets
///
/// # Example
///
/// ```rust,ignore
/// use dynamics_web_api_rest::{Request, WebApiClient, WebApiConfig};
///
/// let config = WebApiConfig::for_organization("https://org.crm.dynamics.com", "9.2")?;
/// let client = WebApiClient::new(config)?.with_access_token(token);
///
/// // Create
/// let created = client
///     .create(Request::new("accounts").data(json!({"name": "Contoso"})))
///     .await?;
///
/// // Query
/// let accounts = client
///     .retrieve_all(Request::new("accounts").select(["name"]).max_page_size(500))
///     .await?;
/// ```
#[derive(Clone)]
pub struct WebApiClient<T: Transport = HttpTransport> {
    config: WebApiConfig,
    transport: T,
    access_token: Option<String>,
    timeout: Option<Duration>,
    entity_names: OnceLock<EntityNameMap>,
}

impl<T: Transport + fmt::Debug> fmt::Debug for WebApiClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebApiClient")
            .field("web_api_url", &self.config.web_api_url)
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("transport", &self.transport)
            .field("entity_names", &self.entity_names.get().map(EntityNameMap::len))
            .finish_non_exhaustive()
    }
}

impl WebApiClient<HttpTransport> {
    /// Create a new client with the default HTTP transport.
    pub fn new(config: WebApiConfig) -> Result<Self> {
        Ok(Self::with_transport(config, HttpTransport::default_transport()?))
    }

    /// Create a new client with custom HTTP configuration.
    pub fn with_http_config(config: WebApiConfig, http: HttpConfig) -> Result<Self> {
        Ok(Self::with_transport(config, HttpTransport::new(http)?))
    }
}

impl<T: Transport> WebApiClient<T> {
    /// Create a client over any transport.
    pub fn with_transport(config: WebApiConfig, transport: T) -> Self {
        Self {
            config,
            transport,
            access_token: None,
            timeout: None,
            entity_names: OnceLock::new(),
        }
    }

    /// Bearer token sent with every request that does not carry its own.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Per-request timeout passed to the transport.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Get the client configuration.
    pub fn config(&self) -> &WebApiConfig {
        &self.config
    }

    /// Get the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The entity-name map, once loaded or set.
    pub fn entity_names(&self) -> Option<&EntityNameMap> {
        self.entity_names.get()
    }

    /// Install an entity-name map. Returns false if one was already set.
    pub fn set_entity_names(&self, names: EntityNameMap) -> bool {
        self.entity_names.set(names).is_ok()
    }

    /// Compose, send, and parse one request.
    pub(crate) async fn execute(
        &self,
        method: RequestMethod,
        request: &Request,
        operation: &str,
        options: ParseOptions,
    ) -> Result<ResponseBody> {
        let converted = compose(request, &self.config, operation)?;

        let body = match &request.data {
            Some(data) if method != RequestMethod::Get => {
                Some(stringify(data, &self.config, self.entity_names())?)
            }
            _ => None,
        };

        let uri = converted.uri(&self.config);
        let mut headers = standard_headers();
        headers.extend(converted.headers);
        self.authorize(&mut headers);

        debug!(
            operation,
            method = %method,
            path = %converted.path,
            "Composed request"
        );

        let response = self
            .transport
            .send(TransportRequest {
                method,
                uri,
                headers,
                body,
                is_async: converted.is_async,
                timeout: self.timeout,
            })
            .await?;

        if response.status >= 400 {
            return Err(error_from_body(
                response.status,
                &response.status_text,
                &response.body,
            ));
        }

        parse_response(response.status, &response.headers, &response.body, options)
    }

    fn authorize(&self, headers: &mut HeaderMap) {
        if headers.contains_key("Authorization") {
            return;
        }
        if let Some(token) = &self.access_token {
            headers.insert("Authorization".to_string(), format!("Bearer {token}"));
        }
    }
}

/// Require a record key on an operation that addresses a single record.
pub(crate) fn require_key(request: &Request, operation: &str) -> Result<()> {
    if request.key.is_none() && request.id.is_none() && request.url.is_none() {
        return Err(Error::missing(operation, "request.key"));
    }
    Ok(())
}

/// Require a payload on a write operation.
pub(crate) fn require_data(request: &Request, operation: &str) -> Result<()> {
    if request.data.is_none() {
        return Err(Error::missing(operation, "request.data"));
    }
    Ok(())
}
