//! Entity metadata lookups.

use serde_json::json;
use tracing::{debug, instrument};

use dynamics_web_api_client::{
    EntityNameMap, Error, ErrorKind, ParseOptions, Request, RequestMethod, ResponseBody, Result,
    Transport,
};

use super::WebApiClient;

impl<T: Transport> WebApiClient<T> {
    /// Load the logical-name to collection-name map from `EntityDefinitions`.
    ///
    /// The map is fetched once per client; later calls return the stored map
    /// without a request.
    #[instrument(skip(self))]
    pub async fn load_entity_names(&self) -> Result<&EntityNameMap> {
        if let Some(names) = self.entity_names.get() {
            return Ok(names);
        }

        let request = Request::new("EntityDefinitions").select(["EntitySetName", "LogicalName"]);
        let body = self
            .execute(
                RequestMethod::Get,
                &request,
                "loadEntityNames",
                ParseOptions::default(),
            )
            .await?;

        let definitions = match body {
            ResponseBody::Collection(collection) => collection.value,
            other => {
                return Err(Error::new(ErrorKind::Parse {
                    message: "loadEntityNames: expected a collection response".to_string(),
                    raw: format!("{other:?}"),
                }))
            }
        };

        let names = EntityNameMap::from_metadata(&json!({ "value": definitions }))?;
        debug!(entities = names.len(), "Loaded entity names");

        // A concurrent load may have won; either map is equivalent.
        Ok(self.entity_names.get_or_init(|| names))
    }

    /// Collection name for a logical entity name, loading the map if needed.
    pub async fn collection_name(&self, logical_name: &str) -> Result<Option<String>> {
        let names = self.load_entity_names().await?;
        Ok(names.get(logical_name).map(str::to_string))
    }
}
