//! `$batch` execution.

use tracing::{debug, instrument};

use dynamics_web_api_client::{
    encode_batch, error_from_body, parse_response, BatchPartResponse, Error, ErrorKind,
    ParseOptions, RequestMethod, ResponseBody, Result, Transport, TransportRequest,
};

use super::WebApiClient;
use crate::batch::Batch;

impl<T: Transport> WebApiClient<T> {
    /// Send a batch and return one response per part, in order.
    ///
    /// A failed part inside a change-set is reported through its own
    /// [`BatchPartResponse`]; use [`BatchPartResponse::into_result`] to turn
    /// it into an error.
    #[instrument(skip(self, batch), fields(parts = batch.len()))]
    pub async fn execute_batch(&self, batch: Batch) -> Result<Vec<BatchPartResponse>> {
        let encoded = encode_batch(batch.parts(), &self.config, self.entity_names())?;

        let mut headers = encoded.headers;
        self.authorize(&mut headers);

        let response = self
            .transport
            .send(TransportRequest {
                method: RequestMethod::Post,
                uri: format!("{}$batch", self.config.web_api_url),
                headers,
                body: Some(encoded.body),
                is_async: true,
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

        match parse_response(
            response.status,
            &response.headers,
            &response.body,
            ParseOptions::default(),
        )? {
            ResponseBody::Batch(parts) => {
                debug!(
                    parts = parts.len(),
                    failed = parts.iter().filter(|part| !part.is_success()).count(),
                    "Batch completed"
                );
                Ok(parts)
            }
            other => Err(Error::new(ErrorKind::Parse {
                message: "executeBatch: expected a multipart response".to_string(),
                raw: format!("{other:?}"),
            })),
        }
    }
}
