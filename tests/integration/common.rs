use std::sync::Once;

use dynamics_web_api::{WebApiClient, WebApiConfig};
use wiremock::MockServer;

pub const TOKEN: &str = "integration-token";

static TRACING: Once = Once::new();

/// Install a test subscriber once per process, honoring `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Base Web API path served by the mock server.
pub const API_PATH: &str = "/api/data/v9.2";

/// Start a mock server and a client pointed at it.
pub async fn setup() -> (MockServer, WebApiClient) {
    init_tracing();

    let server = MockServer::start().await;
    let config = WebApiConfig::for_organization_latest(server.uri())
        .expect("mock server URI should be a valid base URL");
    let client = WebApiClient::new(config)
        .expect("Failed to create client")
        .with_access_token(TOKEN);

    (server, client)
}

/// Absolute record URL as the server reports it in `OData-EntityId`.
pub fn entity_url(server: &MockServer, collection: &str, id: &str) -> String {
    format!("{}{API_PATH}/{collection}({id})", server.uri())
}
