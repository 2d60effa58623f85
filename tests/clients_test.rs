//! HTTP clients against a local mock server

use dealflow::clients::{
    CrmClient, CrmCredentials, DocumentStore, DriveClient, MessagingClient, PipedriveClient,
    SlackClient,
};
use dealflow::notify::{component, Attributes, HttpTopicPublisher, Notification, Publisher};
use dealflow::FlowError;
use serde_json::{json, Map};
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(5);

fn credentials() -> CrmCredentials {
    CrmCredentials {
        token: "tok".to_string(),
        domain: "acme".to_string(),
    }
}

fn pipedrive(server: &MockServer) -> PipedriveClient {
    PipedriveClient::with_endpoints(server.uri(), Some(server.uri()), TIMEOUT).unwrap()
}

#[tokio::test]
async fn test_pipedrive_company_domain() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/users/me"))
        .and(query_param("api_token", "tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {"id": 1, "company_domain": "acme"}
        })))
        .mount(&server)
        .await;

    let domain = pipedrive(&server).company_domain("tok").await.unwrap();
    assert_eq!(domain, "acme");
}

#[tokio::test]
async fn test_pipedrive_deal_fields() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/dealFields"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": [
                {"key": "abc", "name": "Territory", "options": [{"id": 1, "label": "USWEST"}]},
                {"key": "sow", "name": "SOW Link", "options": null}
            ]
        })))
        .mount(&server)
        .await;

    let fields = pipedrive(&server).deal_fields(&credentials()).await.unwrap();
    assert_eq!(fields.len(), 2);
    assert_eq!(fields[0].name, "Territory");
    assert!(fields[1].options.is_none());
}

#[tokio::test]
async fn test_pipedrive_unsuccessful_envelope_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v1/deals/42"))
        .and(body_json(json!({"sow": "https://sow"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "error": "Deal not editable",
            "error_info": "Please check the deal"
        })))
        .mount(&server)
        .await;

    let err = pipedrive(&server)
        .update_deal_field(&credentials(), 42, "sow", &json!("https://sow"))
        .await
        .unwrap_err();

    match &err {
        FlowError::ApiRejected { error, detail, .. } => {
            assert_eq!(error, "Deal not editable");
            assert_eq!(detail.as_deref(), Some("Please check the deal"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_pipedrive_server_error_is_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/dealFields"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let err = pipedrive(&server)
        .deal_fields(&credentials())
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::HttpStatus { status: 502, .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_slack_creates_channel_with_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/conversations.create"))
        .and(header("authorization", "Bearer xoxb-test"))
        .and(body_json(json!({"name": "acme-data-lake"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "channel": {"id": "C123", "name": "acme-data-lake", "is_channel": true}
        })))
        .mount(&server)
        .await;

    let client = SlackClient::with_endpoint(server.uri(), "xoxb-test".to_string(), TIMEOUT).unwrap();
    let channel = client.create_channel("acme-data-lake").await.unwrap();
    assert_eq!(channel.id, "C123");
}

#[tokio::test]
async fn test_slack_not_ok_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users.lookupByEmail"))
        .and(query_param("email", "nobody@example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": false,
            "error": "users_not_found"
        })))
        .mount(&server)
        .await;

    let client = SlackClient::with_endpoint(server.uri(), "xoxb-test".to_string(), TIMEOUT).unwrap();
    let err = client
        .lookup_user_by_email("nobody@example.com")
        .await
        .unwrap_err();

    assert!(matches!(
        &err,
        FlowError::ApiRejected { error, .. } if error == "users_not_found"
    ));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_slack_direct_message_flow() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/conversations.open"))
        .and(body_json(json!({"users": "U1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "channel": {"id": "D1"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat.postMessage"))
        .and(body_json(json!({"channel": "D1", "text": "hello"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "ts": "1"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = SlackClient::with_endpoint(server.uri(), "xoxb-test".to_string(), TIMEOUT).unwrap();
    let channel_id = client.open_direct_message("U1").await.unwrap();
    client.post_message(&channel_id, "hello").await.unwrap();
    assert_eq!(channel_id, "D1");
}

#[tokio::test]
async fn test_drive_lists_and_copies() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param("q", "'root-1' in parents and trashed = false"))
        .and(header("authorization", "Bearer drive-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [
                {"id": "f1", "name": "_SALES", "mimeType": "application/vnd.google-apps.folder"},
                {"id": "d1", "name": "Notes", "mimeType": "application/vnd.google-apps.document"}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/drive/v3/files/tpl-1/copy"))
        .and(body_json(json!({"name": "Risk Log", "parents": ["f1"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "copy-1",
            "name": "Risk Log",
            "mimeType": "application/vnd.google-apps.document",
            "webViewLink": "https://docs.example.com/copy-1"
        })))
        .mount(&server)
        .await;

    let client =
        DriveClient::with_endpoint(server.uri(), "drive-token".to_string(), TIMEOUT).unwrap();

    let children = client.list_children("root-1").await.unwrap();
    assert_eq!(children.len(), 2);
    assert!(children[0].is_folder());
    assert!(!children[1].is_folder());

    let copy = client.copy_file("tpl-1", "Risk Log", "f1").await.unwrap();
    assert_eq!(copy.web_link(), "https://docs.example.com/copy-1");
}

#[tokio::test]
async fn test_drive_missing_file_is_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": 404, "message": "File not found: gone."}
        })))
        .mount(&server)
        .await;

    let client =
        DriveClient::with_endpoint(server.uri(), "drive-token".to_string(), TIMEOUT).unwrap();
    let err = client.get_file("gone").await.unwrap_err();

    assert!(err.is_not_found());
    assert!(!err.is_retryable());
}

fn notification() -> Notification {
    let mut payload = Map::new();
    payload.insert("CustomerName".to_string(), json!("Acme"));
    Notification::new(
        payload,
        Attributes::new(component::SLACK, "create_channel", "lead_in"),
    )
}

#[tokio::test]
async fn test_topic_publish_returns_message_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/topics/slack"))
        .and(body_json(json!({
            "message": "{\"CustomerName\":\"Acme\"}",
            "attributes": {
                "action": {"DataType": "String", "StringValue": "create_channel"},
                "component": {"DataType": "String", "StringValue": "slack"},
                "stage": {"DataType": "String", "StringValue": "lead_in"}
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"MessageId": "msg-1"})))
        .mount(&server)
        .await;

    let topic = format!("{}/topics/slack", server.uri());
    let receipt = HttpTopicPublisher::with_timeout(TIMEOUT)
        .unwrap()
        .publish(&topic, &notification())
        .await
        .unwrap();

    assert_eq!(receipt.message_id, "msg-1");
    assert_eq!(receipt.topic, topic);
}

#[tokio::test]
async fn test_topic_publish_failure_is_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/topics/slack"))
        .respond_with(ResponseTemplate::new(503).set_body_string("throttled"))
        .mount(&server)
        .await;

    let topic = format!("{}/topics/slack", server.uri());
    let err = HttpTopicPublisher::with_timeout(TIMEOUT)
        .unwrap()
        .publish(&topic, &notification())
        .await
        .unwrap_err();

    assert!(matches!(err, FlowError::Publish { .. }));
    assert!(err.is_retryable());
}
