//! # dwa-client
//!
//! Request composition engine for the Microsoft Dataverse (Dynamics 365)
//! OData v4 Web API.
//!
//! This crate turns structured request descriptors into HTTP requests and
//! raw responses back into structured results:
//! - URL composition with OData system query options and nested `$expand`
//! - Header composition (`Prefer`, conditional headers, impersonation)
//! - Payload serialization (`@odata.bind` rewriting, annotation stripping)
//! - `$batch` encoding with change-sets
//! - Response parsing, including multipart batch responses
//! - An HTTP transport with retry and rate limit handling
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Application Layer                        │
//! │  (dwa-rest: WebApiClient, Batch)                            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Composition engine                       │
//! │  - compose / compose_headers / stringify                    │
//! │  - encode_batch / parse_response                            │
//! │  - pure functions, no I/O                                   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Transport (HttpTransport)                   │
//! │  - Raw HTTP with retry, compression, rate limiting          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use dynamics_web_api_client::{compose, ExpandItem, Request, WebApiConfig};
//!
//! let config = WebApiConfig::new("https://org.api.crm.dynamics.com/api/data/v9.2/").unwrap();
//! let request = Request::new("accounts")
//!     .select(["name"])
//!     .expand(ExpandItem::new("primarycontactid").select(["fullname"]));
//!
//! let converted = compose(&request, &config, "retrieveMultiple").unwrap();
//! assert_eq!(
//!     converted.path,
//!     "accounts?$select=name&$expand=primarycontactid($select=fullname)"
//! );
//! ```

mod batch;
mod client;
mod compose;
mod config;
mod entity_names;
mod error;
mod headers;
mod payload;
mod request;
pub mod response;
mod retry;
mod transport;
pub mod validation;

pub use batch::{encode_batch, BatchPart, EncodedBatch};
pub use client::HttpTransport;
pub use compose::{compose, compose_query, strip_guid_braces, ConvertedRequest};
pub use config::{HttpConfig, HttpConfigBuilder, WebApiConfig, WebApiConfigBuilder};
pub use entity_names::EntityNameMap;
pub use error::{Error, ErrorKind, Result};
pub use headers::{compose_headers, compose_prefer, header_value, standard_headers, HeaderMap};
pub use payload::stringify;
pub use request::{Expand, ExpandItem, PreferOptions, QueryOptions, Request, RequestMethod};
pub use response::{
    error_from_body, parse_response, BatchPartResponse, Collection, ParseOptions, Reference,
    ResponseBody,
};
pub use retry::{BackoffStrategy, RetryConfig, RetryPolicy};
pub use transport::{Transport, TransportRequest, TransportResponse};

/// Default Web API version
pub const DEFAULT_API_VERSION: &str = "9.2";

/// User-Agent string for the client
pub const USER_AGENT: &str = concat!("dynamics-web-api/", env!("CARGO_PKG_VERSION"));
