use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use crate::audit::MemoryAuditSink;
use crate::core::{Config, ServerState};
use crate::notify::MockSender;
use crate::waitlist::{EntryStore, FixedTurnTime, QueueManager};

struct TestApp {
    app: Router,
    state: ServerState,
    sender: Arc<MockSender>,
}

fn test_app() -> TestApp {
    let mut config = Config::with_overrides("/tmp/waitlist-api-test", 0);
    config.restaurant_name = "Luigi's".into();
    config.reminder_minutes_before = 15;

    let store = EntryStore::open_in_memory().unwrap();
    let manager = Arc::new(QueueManager::new(store, Arc::new(FixedTurnTime(None)), 64));
    let sender = Arc::new(MockSender::new());
    let state = ServerState::new(
        config,
        manager,
        sender.clone(),
        Arc::new(MemoryAuditSink::new()),
    )
    .unwrap();

    TestApp {
        app: super::build_app(state.clone()),
        state,
        sender,
    }
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-actor", "host-1");
    let body = match body {
        Some(v) => {
            builder = builder.header("content-type", "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn add(app: &Router, name: &str) -> Value {
    let (status, body) = call(
        app,
        "POST",
        "/api/waitlist",
        Some(json!({"guestName": name, "guestPhone": "+15550100", "partySize": 2})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["data"].clone()
}

#[tokio::test]
async fn test_add_and_list() {
    let t = test_app();
    let a = add(&t.app, "Ana").await;
    let b = add(&t.app, "Ben").await;
    assert_eq!(a["position"], 1);
    assert_eq!(a["etaMinutes"], 15);
    assert_eq!(a["status"], "waiting");
    assert_eq!(a["source"], "admin");
    assert_eq!(b["position"], 2);
    assert_eq!(b["etaMinutes"], 30);

    let (status, body) = call(&t.app, "GET", "/api/waitlist", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_validation_error_lists_fields() {
    let t = test_app();
    let (status, body) = call(
        &t.app,
        "POST",
        "/api/waitlist",
        Some(json!({"guestName": "", "guestPhone": "", "partySize": 0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 2);
    let fields: Vec<&str> = body["details"]["violations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"guestName"));
    assert!(fields.contains(&"guestPhone"));
    assert!(fields.contains(&"partySize"));
}

#[tokio::test]
async fn test_malformed_json() {
    let t = test_app();
    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/waitlist")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_status_transition_and_errors() {
    let t = test_app();
    let a = add(&t.app, "Ana").await;
    let b = add(&t.app, "Ben").await;
    let a_id = a["id"].as_u64().unwrap();
    let uri = format!("/api/waitlist/{a_id}/status");

    // Stale version
    let (status, body) = call(
        &t.app,
        "PATCH",
        &uri,
        Some(json!({"status": "seated", "expectedVersion": 9})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["details"]["actualVersion"], 0);

    let (status, body) = call(
        &t.app,
        "PATCH",
        &uri,
        Some(json!({"status": "seated", "expectedVersion": 0})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "seated");
    assert_eq!(body["data"]["position"], Value::Null);

    // Ben moved up
    let b_id = b["id"].as_u64().unwrap();
    let (_, body) = call(&t.app, "GET", &format!("/api/waitlist/{b_id}/eta"), None).await;
    assert_eq!(body["data"]["position"], 1);
    assert_eq!(body["data"]["etaMinutes"], 15);

    // Terminal is terminal
    let (status, body) = call(
        &t.app,
        "PATCH",
        &uri,
        Some(json!({"status": "waiting", "expectedVersion": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"]["from"], "seated");
    assert_eq!(body["details"]["to"], "waiting");

    // Unknown status name
    let (status, _) = call(
        &t.app,
        "PATCH",
        &uri,
        Some(json!({"status": "gone", "expectedVersion": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = call(&t.app, "GET", "/api/waitlist?status=seated", None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_not_found() {
    let t = test_app();
    let (status, body) = call(&t.app, "GET", "/api/waitlist/42", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 4001);
}

#[tokio::test]
async fn test_reorder_and_vip() {
    let t = test_app();
    let a = add(&t.app, "Ana").await["id"].as_u64().unwrap();
    let b = add(&t.app, "Ben").await["id"].as_u64().unwrap();

    let (status, body) = call(
        &t.app,
        "POST",
        "/api/waitlist/reorder",
        Some(json!({"order": [b, a]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["id"], b);
    assert_eq!(body["data"][0]["position"], 1);

    let (status, body) = call(
        &t.app,
        "POST",
        "/api/waitlist/reorder",
        Some(json!({"order": [a]})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["details"]["missing"], json!([b]));

    let version = body_version(&t.app, a).await;
    let (status, body) = call(
        &t.app,
        "PATCH",
        &format!("/api/waitlist/{a}/vip"),
        Some(json!({"vip": true, "expectedVersion": version})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["vip"], true);
    assert_eq!(body["data"]["position"], 2);
}

async fn body_version(app: &Router, id: u64) -> u64 {
    let (_, body) = call(app, "GET", &format!("/api/waitlist/{id}"), None).await;
    body["data"]["version"].as_u64().unwrap()
}

#[tokio::test]
async fn test_snapshot_poll() {
    let t = test_app();
    add(&t.app, "Ana").await;
    let gateway = Arc::clone(&t.state.gateway);
    tokio::task::spawn_blocking(move || gateway.refresh())
        .await
        .unwrap()
        .unwrap();

    let (_, body) = call(&t.app, "GET", "/api/waitlist/snapshot", None).await;
    assert_eq!(body["data"]["changed"], true);
    let revision = body["data"]["revision"].as_u64().unwrap();
    assert_eq!(
        body["data"]["snapshot"]["entries"].as_array().unwrap().len(),
        1
    );

    let (_, body) = call(
        &t.app,
        "GET",
        &format!("/api/waitlist/snapshot?since={revision}"),
        None,
    )
    .await;
    assert_eq!(body["data"]["changed"], false);
    assert!(body["data"].get("snapshot").is_none());
}

#[tokio::test]
async fn test_stream_opens_with_snapshot_event() {
    let t = test_app();
    add(&t.app, "Ana").await;
    let gateway = Arc::clone(&t.state.gateway);
    tokio::task::spawn_blocking(move || gateway.refresh())
        .await
        .unwrap()
        .unwrap();
    let revision = t.state.gateway.latest().revision;

    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/waitlist/stream")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/event-stream");

    // The stream never ends; read only the first frame
    let mut body = response.into_body();
    let frame = tokio::time::timeout(std::time::Duration::from_secs(5), body.frame())
        .await
        .expect("first SSE frame")
        .unwrap()
        .unwrap();
    let text = String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap();

    let lines: Vec<&str> = text.lines().collect();
    assert!(lines.contains(&"event: snapshot"), "{text}");
    assert!(lines.contains(&format!("id: {revision}").as_str()), "{text}");
    let data = lines
        .iter()
        .find_map(|line| line.strip_prefix("data: "))
        .unwrap();
    let snapshot: Value = serde_json::from_str(data).unwrap();
    assert_eq!(snapshot["revision"], revision);
    assert_eq!(snapshot["entries"].as_array().unwrap().len(), 1);
    assert_eq!(snapshot["entries"][0]["guestName"], "Ana");
}

#[tokio::test]
async fn test_notifications() {
    let t = test_app();
    let a = add(&t.app, "Ana").await["id"].as_u64().unwrap();

    let (status, body) = call(&t.app, "POST", &format!("/api/notifications/ready/{a}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "sent");
    let record_id = body["data"]["id"].as_u64().unwrap();
    assert_eq!(
        t.sender.sent_messages()[0].message,
        "Hi Ana! Your table at Luigi's is ready. Please check in with the host."
    );

    let (status, body) = call(&t.app, "POST", &format!("/api/notifications/ready/{a}"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 5001);

    let (_, body) = call(&t.app, "GET", &format!("/api/notifications/entry/{a}"), None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, _) = call(&t.app, "GET", &format!("/api/notifications/{record_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&t.app, "GET", "/api/notifications/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_notification_failure_and_custom_message() {
    let t = test_app();
    let a = add(&t.app, "Ana").await["id"].as_u64().unwrap();
    t.sender.set_should_fail(true);

    let uri = format!("/api/notifications/ready/{a}");
    let (status, body) = call(&t.app, "POST", &uri, Some(json!({"message": "Bar is ready"}))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], 5002);

    t.sender.set_should_fail(false);
    let (status, _) = call(&t.app, "POST", &uri, Some(json!({"message": "Bar is ready"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(t.sender.sent_messages()[0].message, "Bar is ready");

    let (status, _) = call(
        &t.app,
        "POST",
        "/api/notifications/ready/1",
        Some(json!({"message": "x".repeat(501)})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_reminders() {
    let t = test_app();
    let a = add(&t.app, "Ana").await["id"].as_u64().unwrap();
    add(&t.app, "Ben").await;

    let (_, body) = call(&t.app, "GET", "/api/reminders/pending", None).await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["pending"][0]["entryId"], a);
    assert_eq!(body["data"]["reminderMinutesBefore"], 15);

    let (_, body) = call(&t.app, "POST", "/api/reminders/check", None).await;
    assert_eq!(body["data"]["entriesProcessed"], 2);
    assert_eq!(body["data"]["remindersSent"], json!([a]));

    let (status, _) = call(&t.app, "POST", &format!("/api/reminders/send/{a}"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_health() {
    let t = test_app();
    add(&t.app, "Ana").await;
    let (status, body) = call(&t.app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["waitingCount"], 1);
    assert_eq!(body["data"]["revision"], 1);
    assert_eq!(body["data"]["smsAdapter"], "mock");
    assert_eq!(body["data"]["epoch"], t.state.manager.epoch());
}
