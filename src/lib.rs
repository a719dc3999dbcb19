//! # dynamics-web-api
//!
//! A Microsoft Dataverse (Dynamics 365) Web API client library for Rust.
//!
//! This library composes OData v4 requests from structured descriptors,
//! encodes `$batch` bodies, and parses responses back into structured
//! results, with built-in retry logic and error handling.
//!
//! ## Security
//!
//! - Bearer tokens are redacted in Debug output
//! - Tracing spans skip request descriptors and credentials
//! - Token acquisition is left to the caller
//!
//! ## Crates
//!
//! - **dynamics-web-api-client** - Composition engine, response parser, HTTP transport with retry
//! - **dynamics-web-api-rest** - `WebApiClient`: CRUD, paging, counts, FetchXML, associations, `$batch`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dynamics_web_api::{Request, WebApiClient, WebApiConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = WebApiConfig::for_organization("https://myorg.crm.dynamics.com", "9.2")?;
//!     let client = WebApiClient::new(config)?.with_access_token(std::env::var("DATAVERSE_TOKEN")?);
//!
//!     let accounts = client
//!         .retrieve_all(Request::new("accounts").select(["name"]).max_page_size(100))
//!         .await?;
//!
//!     for account in accounts.value {
//!         println!("{}", account["name"]);
//!     }
//!
//!     Ok(())
//! }
//! ```

// Re-export all crates for convenient access
#[cfg(feature = "client")]
pub use dynamics_web_api_client as client;
#[cfg(feature = "rest")]
pub use dynamics_web_api_rest as rest;

// Re-export commonly used types at the top level
#[cfg(feature = "client")]
pub use dynamics_web_api_client::{Error, ErrorKind, Request, Result, WebApiConfig};
#[cfg(feature = "rest")]
pub use dynamics_web_api_rest::{Batch, WebApiClient};
