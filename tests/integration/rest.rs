//! Client operations end to end over the HTTP transport.

use std::time::Duration;

use super::common::{entity_url, init_tracing, setup, API_PATH, TOKEN};
use dynamics_web_api::client::{BackoffStrategy, HttpConfig, RetryConfig};
use dynamics_web_api::rest::ExpandItem;
use dynamics_web_api::{ErrorKind, Request, WebApiClient, WebApiConfig};
use serde_json::json;
use wiremock::matchers::{body_json, header, header_regex, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ACCOUNT: &str = "6a3bd55d-e5e5-4e2a-a0e2-4bd2e3c2b4a1";
const CONTACT: &str = "1c4f8b0e-8d15-4f40-9b1e-0f3a5d0a7c22";

// ============================================================================
// Record lifecycle
// ============================================================================

#[tokio::test]
async fn test_record_lifecycle() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(format!("{API_PATH}/accounts")))
        .and(header("Authorization", format!("Bearer {TOKEN}").as_str()))
        .and(header("OData-Version", "4.0"))
        .and(body_json(json!({"name": "Fourth Coffee", "description": "café"})))
        .respond_with(
            ResponseTemplate::new(204)
                .insert_header("OData-EntityId", entity_url(&server, "accounts", ACCOUNT).as_str()),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("{API_PATH}/accounts({ACCOUNT})")))
        .and(query_param("$select", "name,statecode"))
        .and(query_param("$expand", "primarycontactid($select=fullname)"))
        .and(header_regex("Prefer", r#"odata\.include-annotations="\*""#))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "@odata.context": "ctx",
            "@odata.etag": "W/\"1001\"",
            "name": "Fourth Coffee",
            "statecode": 0,
            "statecode@OData.Community.Display.V1.FormattedValue": "Active",
            "primarycontactid": {"fullname": "Ada Lovelace"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path(format!("{API_PATH}/accounts({ACCOUNT})")))
        .and(header("If-Match", "W/\"1001\""))
        .and(body_json(json!({"name": "Fourth Coffee Ltd"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path(format!("{API_PATH}/accounts({ACCOUNT})")))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    // Create
    let created = client
        .create(Request::new("accounts").data(json!({"name": "Fourth Coffee", "description": "café"})))
        .await
        .expect("create should succeed");
    let id = created.entity_id().expect("create should return an id").to_string();
    assert_eq!(id, ACCOUNT);

    // Retrieve with annotations
    let mut record = client
        .retrieve(
            Request::new("accounts")
                .id(format!("{{{id}}}"))
                .select(["name", "statecode"])
                .expand(ExpandItem::new("primarycontactid").select(["fullname"]))
                .include_annotations("*"),
        )
        .await
        .expect("retrieve should succeed")
        .into_entity()
        .expect("retrieve should return an entity");
    assert_eq!(record["statecode_Formatted"], "Active");
    assert_eq!(record["primarycontactid"]["fullname"], "Ada Lovelace");

    // Update the retrieved record; client-side annotation fields are not sent
    let etag = record["@odata.etag"].as_str().unwrap().to_string();
    record["name"] = json!("Fourth Coffee Ltd");
    let changes = json!({
        "name": record["name"],
        "statecode_Formatted": record["statecode_Formatted"],
        "oDataContext": record["oDataContext"]
    });
    client
        .update(Request::new("accounts").id(&id).if_match(etag).data(changes))
        .await
        .expect("update should succeed");

    // Delete
    client
        .delete(Request::new("accounts").id(&id))
        .await
        .expect("delete should succeed");
}

#[tokio::test]
async fn test_not_found_error_is_normalized() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(format!("{API_PATH}/accounts({ACCOUNT})")))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {
                "code": "0x80040217",
                "message": format!("account With Id = {ACCOUNT} Does Not Exist")
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client
        .retrieve(Request::new("accounts").id(ACCOUNT))
        .await
        .unwrap_err();

    match err.kind {
        ErrorKind::Http { status, code, message, .. } => {
            assert_eq!(status, 404);
            assert_eq!(code.as_deref(), Some("0x80040217"));
            assert!(message.contains("Does Not Exist"));
        }
        other => panic!("unexpected error kind: {other:?}"),
    }
}

// ============================================================================
// Queries
// ============================================================================

#[tokio::test]
async fn test_paging_and_count() {
    let (server, client) = setup().await;
    let next_link = format!(
        "{}{API_PATH}/contacts?$select=fullname&$filter=statecode%20eq%200&$skiptoken=2",
        server.uri()
    );

    Mock::given(method("GET"))
        .and(path(format!("{API_PATH}/contacts")))
        .and(query_param("$skiptoken", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{"fullname": "C"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("{API_PATH}/contacts")))
        .and(query_param("$select", "fullname"))
        .and(query_param("$filter", "statecode eq 0"))
        .and(header("Prefer", "odata.maxpagesize=2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{"fullname": "A"}, {"fullname": "B"}],
            "@odata.nextLink": next_link
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("{API_PATH}/contacts/$count")))
        .respond_with(ResponseTemplate::new(200).set_body_string("3"))
        .expect(1)
        .mount(&server)
        .await;

    let all = client
        .retrieve_all(
            Request::new("contacts")
                .select(["fullname"])
                .filter("statecode eq 0")
                .max_page_size(2),
        )
        .await
        .expect("retrieve_all should succeed");
    assert_eq!(all.value.len(), 3);

    let count = client
        .count(Request::new("contacts"))
        .await
        .expect("count should succeed");
    assert_eq!(count, all.value.len() as u64);
}

#[tokio::test]
async fn test_filter_guid_braces_are_stripped() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(format!("{API_PATH}/contacts")))
        .and(query_param(
            "$filter",
            format!("_parentcustomerid_value eq {ACCOUNT} and fullname eq '{{x}}'").as_str(),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": []})))
        .expect(1)
        .mount(&server)
        .await;

    let page = client
        .retrieve_multiple(Request::new("contacts").filter(format!(
            "_parentcustomerid_value eq {{{ACCOUNT}}} and fullname eq '{{x}}'"
        )))
        .await
        .expect("retrieve_multiple should succeed");
    assert!(page.value.is_empty());
}

// ============================================================================
// Relationships and metadata
// ============================================================================

#[tokio::test]
async fn test_entity_names_rewrite_binds() {
    init_tracing();
    let server = MockServer::start().await;
    let config = WebApiConfig::builder(format!("{}{API_PATH}/", server.uri()))
        .with_entity_names(true)
        .build()
        .unwrap();
    let client = WebApiClient::new(config).unwrap().with_access_token(TOKEN);

    Mock::given(method("GET"))
        .and(path(format!("{API_PATH}/EntityDefinitions")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                {"LogicalName": "account", "EntitySetName": "accounts"},
                {"LogicalName": "contact", "EntitySetName": "contacts"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(format!("{API_PATH}/contacts")))
        .and(body_json(json!({
            "lastname": "Lovelace",
            "parentcustomerid_account@odata.bind": format!("/accounts({ACCOUNT})")
        })))
        .respond_with(
            ResponseTemplate::new(204)
                .insert_header("OData-EntityId", entity_url(&server, "contacts", CONTACT).as_str()),
        )
        .expect(1)
        .mount(&server)
        .await;

    client.load_entity_names().await.expect("metadata should load");

    let created = client
        .create(Request::new("contacts").data(json!({
            "lastname": "Lovelace",
            "parentcustomerid_account@odata.bind": format!("account({{{ACCOUNT}}})")
        })))
        .await
        .expect("create should succeed");
    assert_eq!(created.entity_id(), Some(CONTACT));
}

#[tokio::test]
async fn test_associate_and_disassociate() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(format!("{API_PATH}/accounts({ACCOUNT})/contact_customer_accounts/$ref")))
        .and(body_json(json!({"@odata.id": entity_url(&server, "contacts", CONTACT)})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path(format!(
            "{API_PATH}/accounts({ACCOUNT})/contact_customer_accounts({CONTACT})/$ref"
        )))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client
        .associate(Request::new("accounts").id(ACCOUNT), "contact_customer_accounts", "contacts", CONTACT)
        .await
        .expect("associate should succeed");
    client
        .disassociate(Request::new("accounts").id(ACCOUNT), "contact_customer_accounts", Some(CONTACT))
        .await
        .expect("disassociate should succeed");
}

// ============================================================================
// Transport behavior
// ============================================================================

#[tokio::test]
async fn test_service_protection_limit_is_retried() {
    init_tracing();
    let server = MockServer::start().await;
    let config = WebApiConfig::new(format!("{}{API_PATH}/", server.uri())).unwrap();
    let http = HttpConfig::builder()
        .with_retry(
            RetryConfig::default()
                .with_max_attempts(2)
                .with_initial_delay(Duration::from_millis(10))
                .with_backoff(BackoffStrategy::Constant),
        )
        .build();
    let client = WebApiClient::with_http_config(config, http).unwrap();

    Mock::given(method("GET"))
        .and(path(format!("{API_PATH}/WhoAmI")))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("{API_PATH}/WhoAmI")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "UserId": CONTACT
        })))
        .expect(1)
        .mount(&server)
        .await;

    let who = client
        .retrieve(Request::unbound("WhoAmI"))
        .await
        .expect("request should succeed after retry")
        .into_entity()
        .unwrap();
    assert_eq!(who["UserId"], CONTACT);
}

#[tokio::test]
async fn test_validation_error_makes_no_request() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = client
        .retrieve(Request::new("accounts").id("not-a-guid"))
        .await
        .unwrap_err();
    assert!(err.is_validation());
    assert_eq!(
        err.to_string(),
        "retrieve requires the request.id parameter to be of type GUID String"
    );
}
