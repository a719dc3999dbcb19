//! Relationship operations on `$ref` endpoints.

use serde_json::json;
use tracing::instrument;

use dynamics_web_api_client::{validation, ParseOptions, Request, RequestMethod, Result, Transport};

use super::{require_key, WebApiClient};

impl<T: Transport> WebApiClient<T> {
    /// Associate the record addressed by `request` with a related record
    /// through a collection-valued navigation property.
    ///
    /// `related_collection` may be a Content-ID reference such as `$1`
    /// inside a batch, in which case `related_key` is ignored.
    #[instrument(skip(self, request), fields(collection = ?request.collection))]
    pub async fn associate(
        &self,
        request: Request,
        relationship: &str,
        related_collection: &str,
        related_key: &str,
    ) -> Result<()> {
        let request = associate_request(request, relationship, related_collection, related_key)?;
        self.execute(RequestMethod::Post, &request, "associate", ParseOptions::default())
            .await?;
        Ok(())
    }

    /// Remove an association.
    ///
    /// Pass `related_key` for a collection-valued navigation property; leave
    /// it empty to clear a single-valued one.
    #[instrument(skip(self, request), fields(collection = ?request.collection))]
    pub async fn disassociate(
        &self,
        request: Request,
        relationship: &str,
        related_key: Option<&str>,
    ) -> Result<()> {
        let request = disassociate_request(request, relationship, related_key)?;
        self.execute(RequestMethod::Delete, &request, "disassociate", ParseOptions::default())
            .await?;
        Ok(())
    }
}

pub(crate) fn associate_request(
    request: Request,
    relationship: &str,
    related_collection: &str,
    related_key: &str,
) -> Result<Request> {
    require_key(&request, "associate")?;
    let relationship = validation::string(relationship, "associate", "relationship")?;
    let related_collection =
        validation::string(related_collection, "associate", "related_collection")?;

    let target = if related_collection.starts_with('$') {
        related_collection.to_string()
    } else {
        let key = validation::key(related_key, "associate", "related_key")?;
        format!("{related_collection}({key})")
    };

    Ok(request
        .additional_url(format!("{relationship}/$ref"))
        .data(json!({ "@odata.id": target })))
}

pub(crate) fn disassociate_request(
    request: Request,
    relationship: &str,
    related_key: Option<&str>,
) -> Result<Request> {
    require_key(&request, "disassociate")?;
    let relationship = validation::string(relationship, "disassociate", "relationship")?;

    let path = match related_key {
        Some(key) => {
            let key = validation::key(key, "disassociate", "related_key")?;
            format!("{relationship}({key})/$ref")
        }
        None => format!("{relationship}/$ref"),
    };
    Ok(request.additional_url(path))
}
