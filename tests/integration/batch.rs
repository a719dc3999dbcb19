//! `$batch` round trips.

use super::common::{setup, API_PATH, TOKEN};
use dynamics_web_api::Batch;
use dynamics_web_api::Request;
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, header_regex, method, path};
use wiremock::{Mock, ResponseTemplate};

const ACCOUNT: &str = "6a3bd55d-e5e5-4e2a-a0e2-4bd2e3c2b4a1";
const CONTACT: &str = "1c4f8b0e-8d15-4f40-9b1e-0f3a5d0a7c22";

fn response_body() -> String {
    [
        "--batchresponse_a1",
        "Content-Type: multipart/mixed; boundary=changesetresponse_b2",
        "",
        "--changesetresponse_b2",
        "Content-Type: application/http",
        "Content-Transfer-Encoding: binary",
        "Content-ID: 1",
        "",
        "HTTP/1.1 204 No Content",
        &format!("OData-EntityId: https://org.api/contacts({CONTACT})"),
        "",
        "",
        "--changesetresponse_b2",
        "Content-Type: application/http",
        "Content-Transfer-Encoding: binary",
        "Content-ID: 100001",
        "",
        "HTTP/1.1 204 No Content",
        "",
        "",
        "--changesetresponse_b2--",
        "--batchresponse_a1",
        "Content-Type: application/http",
        "Content-Transfer-Encoding: binary",
        "",
        "HTTP/1.1 404 Not Found",
        "Content-Type: application/json; odata.metadata=minimal",
        "",
        r#"{"error":{"code":"0x80040217","message":"contact Does Not Exist"}}"#,
        "--batchresponse_a1--",
        "",
    ]
    .join("\r\n")
}

#[tokio::test]
async fn test_batch_with_change_set_and_failed_part() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(format!("{API_PATH}/$batch")))
        .and(header("Authorization", format!("Bearer {TOKEN}").as_str()))
        .and(header_regex("Content-Type", r"^multipart/mixed;boundary=dwa_batch_[0-9a-f-]{36}$"))
        .and(body_string_contains("Content-Type: multipart/mixed;boundary=changeset_"))
        .and(body_string_contains(&format!(
            "POST {}{API_PATH}/contacts HTTP/1.1",
            server.uri()
        )))
        .and(body_string_contains("Content-ID: 1\r\n"))
        .and(body_string_contains(r#"{"lastname":"Batch \u00e9"}"#))
        .and(body_string_contains(&format!(
            "POST {}{API_PATH}/accounts({ACCOUNT})/contact_customer_accounts/$ref HTTP/1.1",
            server.uri()
        )))
        .and(body_string_contains(r#"{"@odata.id":"$1"}"#))
        .and(body_string_contains("GET "))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(response_body(), "multipart/mixed; boundary=batchresponse_a1"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let batch = Batch::new()
        .create(
            Request::new("contacts")
                .content_id("1")
                .data(json!({"lastname": "Batch é"})),
        )
        .associate(
            Request::new("accounts").id(ACCOUNT),
            "contact_customer_accounts",
            "$1",
            "",
        )
        .expect("associate part should validate")
        .retrieve(Request::new("contacts").id("00000000-0000-0000-0000-000000000000"));

    let parts = client.execute_batch(batch).await.expect("batch should succeed");
    assert_eq!(parts.len(), 3);

    assert_eq!(parts[0].content_id.as_deref(), Some("1"));
    assert_eq!(parts[0].body.entity_id(), Some(CONTACT));
    assert_eq!(parts[1].content_id.as_deref(), Some("100001"));
    assert!(parts[1].is_success());

    let err = parts[2].clone().into_result().unwrap_err();
    assert_eq!(err.status(), Some(404));
}
