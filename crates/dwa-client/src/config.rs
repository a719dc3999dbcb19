//! Client configuration.

use std::time::Duration;

use crate::error::{Error, ErrorKind, Result};
use crate::retry::RetryConfig;

/// Process-wide defaults for request composition.
///
/// Explicit per-request fields always take precedence over these values.
/// A config is read-only once built; swap the whole value to change it.
#[derive(Debug, Clone, PartialEq)]
pub struct WebApiConfig {
    /// Base Web API URI, always ending with `/`
    /// (e.g. `https://org.crm.dynamics.com/api/data/v9.2/`).
    pub web_api_url: String,
    /// Default for `Prefer: return=representation`.
    pub return_representation: bool,
    /// Default for `Prefer: odata.include-annotations="..."`.
    pub include_annotations: Option<String>,
    /// Default for `Prefer: odata.maxpagesize=N`.
    pub max_page_size: Option<u32>,
    /// Rewrite `@odata.bind` targets from logical entity names to collection names.
    pub use_entity_names: bool,
}

impl WebApiConfig {
    /// Create a config for the given base Web API URL.
    pub fn new(web_api_url: impl AsRef<str>) -> Result<Self> {
        Self::builder(web_api_url).build()
    }

    /// Create a config for an organization URL and Web API version,
    /// e.g. `("https://org.crm.dynamics.com", "9.2")`.
    pub fn for_organization(org_url: impl AsRef<str>, version: impl AsRef<str>) -> Result<Self> {
        let org = org_url.as_ref().trim_end_matches('/');
        Self::new(format!("{}/api/data/v{}/", org, version.as_ref()))
    }

    /// Create a config for an organization URL at [`DEFAULT_API_VERSION`].
    ///
    /// [`DEFAULT_API_VERSION`]: crate::DEFAULT_API_VERSION
    pub fn for_organization_latest(org_url: impl AsRef<str>) -> Result<Self> {
        Self::for_organization(org_url, crate::DEFAULT_API_VERSION)
    }

    /// Create a config builder for the given base Web API URL.
    pub fn builder(web_api_url: impl AsRef<str>) -> WebApiConfigBuilder {
        WebApiConfigBuilder {
            web_api_url: web_api_url.as_ref().to_string(),
            return_representation: false,
            include_annotations: None,
            max_page_size: None,
            use_entity_names: false,
        }
    }
}

/// Builder for WebApiConfig.
#[derive(Debug)]
pub struct WebApiConfigBuilder {
    web_api_url: String,
    return_representation: bool,
    include_annotations: Option<String>,
    max_page_size: Option<u32>,
    use_entity_names: bool,
}

impl WebApiConfigBuilder {
    /// Ask the server to return created/updated records by default.
    pub fn with_return_representation(mut self, enabled: bool) -> Self {
        self.return_representation = enabled;
        self
    }

    /// Request annotations by default (e.g. `"*"` or
    /// `"OData.Community.Display.V1.FormattedValue"`).
    pub fn with_include_annotations(mut self, annotations: impl Into<String>) -> Self {
        self.include_annotations = Some(annotations.into());
        self
    }

    /// Set the default page size for collection queries.
    pub fn with_max_page_size(mut self, size: u32) -> Self {
        self.max_page_size = Some(size);
        self
    }

    /// Rewrite bind targets using the entity-name map.
    pub fn with_entity_names(mut self, enabled: bool) -> Self {
        self.use_entity_names = enabled;
        self
    }

    /// Validate the base URL and build the configuration.
    pub fn build(self) -> Result<WebApiConfig> {
        let parsed = url::Url::parse(&self.web_api_url)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::new(ErrorKind::Config(format!(
                "Web API URL must use http or https, got '{}'",
                parsed.scheme()
            ))));
        }

        let mut web_api_url = self.web_api_url;
        if !web_api_url.ends_with('/') {
            web_api_url.push('/');
        }

        Ok(WebApiConfig {
            web_api_url,
            return_representation: self.return_representation,
            include_annotations: self.include_annotations,
            max_page_size: self.max_page_size,
            use_entity_names: self.use_entity_names,
        })
    }
}

/// Configuration for the HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Retry configuration.
    pub retry: Option<RetryConfig>,
    /// Accept gzip/deflate compressed responses.
    pub accept_compressed: bool,
    /// Request timeout, unless a request carries its own.
    pub timeout: Duration,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// User-Agent header value.
    pub user_agent: String,
    /// Whether to enable request/response tracing.
    pub enable_tracing: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            retry: Some(RetryConfig::default()),
            accept_compressed: true,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agent: crate::USER_AGENT.to_string(),
            enable_tracing: true,
        }
    }
}

impl HttpConfig {
    /// Create a new HTTP config builder.
    pub fn builder() -> HttpConfigBuilder {
        HttpConfigBuilder::default()
    }
}

/// Builder for HttpConfig.
#[derive(Debug, Default)]
pub struct HttpConfigBuilder {
    config: HttpConfig,
}

impl HttpConfigBuilder {
    /// Set the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = Some(retry);
        self
    }

    /// Disable retries.
    pub fn without_retry(mut self) -> Self {
        self.config.retry = None;
        self
    }

    /// Accept compressed responses.
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.config.accept_compressed = enabled;
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set connection timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set custom User-Agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Enable or disable request/response tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.config.enable_tracing = enabled;
        self
    }

    /// Build the HTTP configuration.
    pub fn build(self) -> HttpConfig {
        self.config
    }
}
