//! # dwa-rest
//!
//! Dataverse (Dynamics 365) Web API client with CRUD, query paging,
//! associations, FetchXML, and `$batch` support.
//!
//! ## Features
//!
//! - **CRUD** - Create, retrieve, update, upsert, and delete records
//! - **Queries** - Collection queries with automatic paging and counts
//! - **FetchXML** - Run FetchXML queries against an entity set
//! - **Associations** - Associate and disassociate records via `$ref`
//! - **Batch** - Send many operations in one `$batch` request with change-sets
//! - **Entity names** - Load logical-to-collection name mappings from metadata
//!
//! ## Example
//!
//! ```rust,ignore
//! use dynamics_web_api_rest::{Request, WebApiClient, WebApiConfig};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), dynamics_web_api_rest::Error> {
//!     let config = WebApiConfig::for_organization("https://myorg.crm.dynamics.com", "9.2")?;
//!     let client = WebApiClient::new(config)?.with_access_token("access_token_here");
//!
//!     // Create
//!     let id = client
//!         .create(Request::new("accounts").data(json!({"name": "New Account"})))
//!         .await?;
//!
//!     // Query
//!     let accounts = client
//!         .retrieve_all(Request::new("accounts").select(["name"]).top(10))
//!         .await?;
//!
//!     // Update
//!     let id = id.entity_id().unwrap_or_default().to_string();
//!     client
//!         .update(Request::new("accounts").id(&id).data(json!({"name": "Updated"})))
//!         .await?;
//!
//!     // Delete
//!     client.delete(Request::new("accounts").id(&id)).await?;
//!
//!     Ok(())
//! }
//! ```

mod batch;
mod client;

// Main client
pub use client::WebApiClient;

// Batch builder
pub use batch::Batch;

// Engine types used in the client API
pub use dynamics_web_api_client::{
    BatchPart, BatchPartResponse, Collection, EntityNameMap, Error, ErrorKind, Expand, ExpandItem,
    HttpConfig, HttpTransport, PreferOptions, QueryOptions, Reference, Request, RequestMethod,
    ResponseBody, Result, RetryConfig, Transport, WebApiConfig,
};
