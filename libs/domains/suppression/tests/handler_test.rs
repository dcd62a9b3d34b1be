//! Handler tests for the suppression domain
//!
//! These drive the relay router in-process with an in-memory feedback store
//! and a recording mail provider:
//! - Query and body parsing
//! - Status codes and error bodies
//! - Suppression taking effect on later sends

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum_helpers::{ErrorResponse, create_router, health_router};
use core_config::AppInfo;
use domain_suppression::handlers::{AddressesResponse, BouncedResponse, ComplainedResponse};
use domain_suppression::models::SuppressionDocument;
use domain_suppression::*;
use http_body_util::BodyExt;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use test_utils::TestDataBuilder;
use tower::ServiceExt; // For oneshot()

struct Relay {
    app: Router,
    store: Arc<InMemoryFeedbackStore>,
    provider: Arc<RecordingMailProvider>,
    suppression: Arc<SuppressionSet>,
}

impl Relay {
    async fn new() -> Self {
        Self::with_provider(RecordingMailProvider::new()).await
    }

    async fn with_provider(provider: RecordingMailProvider) -> Self {
        let store = Arc::new(InMemoryFeedbackStore::with_document(SuppressionDocument::default()));
        let lifecycle = ServiceLifecycle::new(vec![store.clone() as Arc<dyn Collaborator>]);
        lifecycle.start().await.unwrap();

        let suppression = Arc::new(SuppressionSet::new(store.clone()));
        suppression.load().await.unwrap();

        let provider = Arc::new(provider);
        let state = RelayState::new(
            Arc::new(FeedbackRecorder::new(store.clone(), suppression.clone())),
            Arc::new(MailDispatcher::new(provider.clone(), suppression.clone(), template())),
        );

        Self {
            app: handlers::router(state),
            store,
            provider,
            suppression,
        }
    }

    async fn call(&self, request: Request<Body>) -> axum::response::Response {
        self.app.clone().oneshot(request).await.unwrap()
    }

    /// Poll until the background send lands or give up.
    async fn wait_for_sent(&self, count: usize) -> Vec<MailEnvelope> {
        for _ in 0..100 {
            let sent = self.provider.sent().await;
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("expected {} sent mail(s)", count);
    }

    async fn wait_until_suppressed(&self, address: &str) {
        for _ in 0..100 {
            if self.suppression.contains(address) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("{} never became suppressed", address);
    }
}

fn template() -> MailTemplate {
    MailTemplate {
        from: "relay@x.com".into(),
        to: vec!["ops@x.com".into()],
        cc: vec![],
        bcc: vec!["a@x.com".into(), "audit@x.com".into()],
        subject: "Daily report".into(),
        html: Some("<p>ok</p>".into()),
        text: Some("ok".into()),
        reply_to: vec!["relay@x.com".into()],
    }
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

// Helper to parse JSON response body
async fn json_body<T: serde::de::DeserializeOwned>(body: Body) -> T {
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_bounced_requires_mail_id() {
    let relay = Relay::new().await;

    let response = relay.call(get("/bounced")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let error: ErrorResponse = json_body(response.into_body()).await;
    assert_eq!(error.message, "mailId is required");
    assert_eq!(relay.store.document().unwrap(), SuppressionDocument::default());
}

#[tokio::test]
async fn test_complained_requires_mail_id_and_complaint() {
    let relay = Relay::new().await;

    let response = relay
        .call(post("/complained", json!({"complaint": {"type": "abuse"}})))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = relay.call(post("/complained?mailId=c@x.com", json!({}))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: ErrorResponse = json_body(response.into_body()).await;
    assert_eq!(error.message, "complaint is required");

    assert!(relay.store.feedback().is_empty());
    assert!(relay.store.document().unwrap().complained_mails.is_empty());
}

#[tokio::test]
async fn test_bounce_then_default_send_drops_bcc() {
    let relay = Relay::new().await;

    let response = relay.call(get("/bounced?mailId=a@x.com")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: BouncedResponse = json_body(response.into_body()).await;
    assert!(body.updated.added());

    relay.wait_until_suppressed("a@x.com").await;

    let request = Request::builder()
        .method("POST")
        .uri("/send")
        .body(Body::empty())
        .unwrap();
    let response = relay.call(request).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let sent = relay.wait_for_sent(1).await;
    let destination = sent[0].destination.as_ref().unwrap();
    assert_eq!(destination.bcc_addresses, vec!["audit@x.com"]);
    assert_eq!(destination.to_addresses, vec!["ops@x.com"]);
}

#[tokio::test]
async fn test_send_with_destination_is_unmodified() {
    let relay = Relay::new().await;

    let body = json!({"Destination": {"ToAddresses": ["b@x.com"]}});
    let response = relay.call(post("/send", body.clone())).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let sent = relay.wait_for_sent(1).await;
    let expected: MailEnvelope = serde_json::from_value(body).unwrap();
    assert_eq!(sent[0], expected);
}

#[tokio::test]
async fn test_send_rejects_malformed_body() {
    let relay = Relay::new().await;

    let request = Request::builder()
        .method("POST")
        .uri("/send")
        .header("content-type", "application/json")
        .body(Body::from("{\"Destination\": "))
        .unwrap();
    let response = relay.call(request).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(relay.provider.sent_count().await, 0);
}

#[tokio::test]
async fn test_complaint_is_logged_and_suppressed() {
    let relay = Relay::new().await;
    let builder = TestDataBuilder::from_test_name("handler_complaint");
    let address = builder.address("complainer");

    let response = relay
        .call(post(
            &format!("/complained?mailId={}", address),
            json!({"complaint": {"complaintFeedbackType": "abuse"}}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: ComplainedResponse = json_body(response.into_body()).await;
    assert!(body.config.added());
    assert!(!body.complaint.inserted_id.is_empty());

    let log = relay.store.feedback();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].mail_id, address);
    assert_eq!(log[0].complaint, Some(json!({"complaintFeedbackType": "abuse"})));

    relay.wait_until_suppressed(&address).await;

    let response = relay
        .call(post(
            "/send",
            json!({"Destination": {"ToAddresses": [address.clone(), "keep@x.com"]}}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let sent = relay.wait_for_sent(1).await;
    assert_eq!(sent[0].destination.as_ref().unwrap().to_addresses, vec!["keep@x.com"]);
}

#[tokio::test]
async fn test_store_failure_maps_to_bad_request() {
    let relay = Relay::new().await;
    relay.store.close().await.unwrap();

    let response = relay.call(get("/bounced?mailId=a@x.com")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let error: ErrorResponse = json_body(response.into_body()).await;
    assert_eq!(error.error, "STORE_ERROR");
}

#[tokio::test]
async fn test_provider_passthroughs() {
    let relay = Relay::new().await;

    let response = relay.call(get("/verify")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = json_body(response.into_body()).await;
    assert_eq!(body, json!({"verified": "relay@x.com"}));

    let response = relay.call(get("/list")).await;
    let body: AddressesResponse = json_body(response.into_body()).await;
    assert_eq!(body.addresses, vec!["relay@x.com"]);

    let response = relay.call(get("/delete")).await;
    let body: serde_json::Value = json_body(response.into_body()).await;
    assert_eq!(body, json!({"deleted": "relay@x.com"}));
}

#[tokio::test]
async fn test_provider_failures_map_to_bad_gateway() {
    let relay = Relay::with_provider(RecordingMailProvider::failing("AccessDenied")).await;

    for uri in ["/verify", "/list", "/delete"] {
        let response = relay.call(get(uri)).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY, "{}", uri);
    }

    // send failures are logged by the dispatcher, the client already has its 202
    let response = relay.call(post("/send", json!({}))).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(relay.provider.sent_count().await, 0);
    let response = relay.call(get("/verify")).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_health_is_served_next_to_relay_routes() {
    let relay = Relay::new().await;
    let app = create_router(relay.app.clone().merge(health_router(AppInfo {
        name: "relay",
        version: "0.1.0",
    })));

    let response = app.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = json_body(response.into_body()).await;
    assert_eq!(body["status"], "OK");

    let response = app.oneshot(get("/nope")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
