//! Single-record operations.

use tracing::instrument;

use dynamics_web_api_client::{ParseOptions, Request, RequestMethod, ResponseBody, Result, Transport};

use super::{require_data, require_key, WebApiClient};

impl<T: Transport> WebApiClient<T> {
    /// Create a record.
    ///
    /// Returns [`ResponseBody::EntityId`] with the new record's GUID, or the
    /// created record when `return=representation` applies.
    #[instrument(skip(self, request), fields(collection = ?request.collection))]
    pub async fn create(&self, request: Request) -> Result<ResponseBody> {
        require_data(&request, "create")?;
        self.execute(RequestMethod::Post, &request, "create", ParseOptions::default())
            .await
    }

    /// Retrieve a record, a single-valued navigation property, or a
    /// `$ref` reference (select `["property/$ref"]`).
    #[instrument(skip(self, request), fields(collection = ?request.collection))]
    pub async fn retrieve(&self, request: Request) -> Result<ResponseBody> {
        let is_ref = matches!(request.query.select.as_slice(), [only] if only.ends_with("/$ref"));
        let options = ParseOptions {
            is_ref,
            ..Default::default()
        };
        self.execute(RequestMethod::Get, &request, "retrieve", options)
            .await
    }

    /// Update a record.
    ///
    /// Sends `If-Match: *` unless the request sets its own condition, so a
    /// missing record fails instead of being created.
    #[instrument(skip(self, request), fields(collection = ?request.collection))]
    pub async fn update(&self, mut request: Request) -> Result<ResponseBody> {
        require_key(&request, "update")?;
        require_data(&request, "update")?;
        if request.if_match.is_none() && request.if_none_match.is_none() {
            request.if_match = Some("*".to_string());
        }
        self.execute(RequestMethod::Patch, &request, "update", ParseOptions::default())
            .await
    }

    /// Create or update a record addressed by key.
    ///
    /// Use `if_none_match("*")` to only create or `if_match("*")` to only update.
    #[instrument(skip(self, request), fields(collection = ?request.collection))]
    pub async fn upsert(&self, request: Request) -> Result<ResponseBody> {
        require_key(&request, "upsert")?;
        require_data(&request, "upsert")?;
        self.execute(RequestMethod::Patch, &request, "upsert", ParseOptions::default())
            .await
    }

    /// Delete a record, or clear a single property when the request
    /// addresses one through `navigation_property`.
    #[instrument(skip(self, request), fields(collection = ?request.collection))]
    pub async fn delete(&self, request: Request) -> Result<()> {
        require_key(&request, "delete")?;
        self.execute(RequestMethod::Delete, &request, "delete", ParseOptions::default())
            .await?;
        Ok(())
    }
}
