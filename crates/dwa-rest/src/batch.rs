//! `$batch` builder.

use dynamics_web_api_client::{BatchPart, Request, RequestMethod, Result};

use crate::client::{associate_request, disassociate_request};

/// An ordered list of operations to send as one `$batch` request.
///
/// GET operations run on their own; consecutive write operations are
/// grouped into one change-set and succeed or fail together. Inside a
/// change-set a later part may address an earlier one by its Content-ID
/// (see [`Request::content_id`]).
///
/// # Example
///
/// ```rust
/// use dynamics_web_api_rest::{Batch, Request};
/// use serde_json::json;
///
/// let batch = Batch::new()
///     .create(Request::new("accounts").data(json!({"name": "Contoso"})))
///     .create(Request::new("contacts").data(json!({"lastname": "Smith"})))
///     .retrieve_multiple(Request::new("accounts").select(["name"]).top(5));
///
/// assert_eq!(batch.len(), 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Batch {
    parts: Vec<BatchPart>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a part with an explicit method.
    pub fn push(mut self, method: RequestMethod, request: Request) -> Self {
        self.parts.push(BatchPart::new(method, request));
        self
    }

    pub fn create(self, request: Request) -> Self {
        self.push(RequestMethod::Post, request)
    }

    pub fn retrieve(self, request: Request) -> Self {
        self.push(RequestMethod::Get, request)
    }

    pub fn retrieve_multiple(self, request: Request) -> Self {
        self.push(RequestMethod::Get, request)
    }

    /// Add an update. Defaults to `If-Match: *` like [`WebApiClient::update`].
    ///
    /// [`WebApiClient::update`]: crate::WebApiClient::update
    pub fn update(self, mut request: Request) -> Self {
        if request.if_match.is_none() && request.if_none_match.is_none() {
            request.if_match = Some("*".to_string());
        }
        self.push(RequestMethod::Patch, request)
    }

    pub fn upsert(self, request: Request) -> Self {
        self.push(RequestMethod::Patch, request)
    }

    pub fn delete(self, request: Request) -> Self {
        self.push(RequestMethod::Delete, request)
    }

    /// Add an association. `related_collection` may be a Content-ID
    /// reference (`$1`) to a record created earlier in the same change-set.
    pub fn associate(
        self,
        request: Request,
        relationship: &str,
        related_collection: &str,
        related_key: &str,
    ) -> Result<Self> {
        let request = associate_request(request, relationship, related_collection, related_key)?;
        Ok(self.push(RequestMethod::Post, request))
    }

    pub fn disassociate(
        self,
        request: Request,
        relationship: &str,
        related_key: Option<&str>,
    ) -> Result<Self> {
        let request = disassociate_request(request, relationship, related_key)?;
        Ok(self.push(RequestMethod::Delete, request))
    }

    pub fn parts(&self) -> &[BatchPart] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn into_parts(self) -> Vec<BatchPart> {
        self.parts
    }
}

impl From<Vec<BatchPart>> for Batch {
    fn from(parts: Vec<BatchPart>) -> Self {
        Self { parts }
    }
}
