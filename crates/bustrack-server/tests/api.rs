//! HTTP-level tests for the bustrack API.

use std::time::Duration;

use axum::http::StatusCode;
use axum_test::TestServer;
use bustrack_core::AppConfig;
use bustrack_server::api::create_router;
use bustrack_server::state::{AppState, SharedState};
use serde_json::{json, Value};
use tempfile::TempDir;

struct Harness {
    server: TestServer,
    state: SharedState,
    _data_dir: Option<TempDir>,
}

fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.tracking.interval_ms = 20;
    config.tracking.sample_timeout_ms = 200;
    config.tracking.unresolved_tick_threshold = 2;
    config
}

fn harness() -> Harness {
    let data_dir = TempDir::new().unwrap();
    let mut config = test_config();
    config.storage.data_dir = Some(data_dir.path().to_path_buf());
    build(config, Some(data_dir))
}

fn harness_without_storage() -> Harness {
    let mut config = test_config();
    config.storage.enabled = false;
    build(config, None)
}

fn build(config: AppConfig, data_dir: Option<TempDir>) -> Harness {
    let state = AppState::shared(config);
    let server = TestServer::new(create_router(state.clone())).unwrap();
    Harness {
        server,
        state,
        _data_dir: data_dir,
    }
}

async fn seed_positions(server: &TestServer) {
    server
        .post("/api/positions/observer")
        .json(&json!({ "latitude": 0.0, "longitude": 0.0 }))
        .await
        .assert_status_ok();
    server
        .post("/api/positions/targets/bus-42")
        .json(&json!({
            "latitude": 0.0,
            "longitude": 0.0046,
            "speed_kmh": 30.0,
            "route_label": "Route 12"
        }))
        .await
        .assert_status_ok();
}

/// Poll `GET /api/tracking` until the snapshot carries an ETA.
async fn wait_for_eta(server: &TestServer) -> Value {
    for _ in 0..100 {
        let body: Value = server.get("/api/tracking").await.json();
        if !body["snapshot"]["eta_minutes"].is_null() {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("no ETA published");
}

#[tokio::test]
async fn test_health() {
    let h = harness();
    let response = h.server.get("/health").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["demo_mode"], false);
    assert_eq!(body["tracking_active"], false);
}

#[tokio::test]
async fn test_start_without_observer_is_forbidden_and_error_is_surfaced() {
    let h = harness();

    let response = h
        .server
        .post("/api/tracking/start")
        .json(&json!({ "target_id": "bus-42", "observer_id": "rider-7" }))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
    assert_eq!(response.json::<Value>()["error"], "PERMISSION_DENIED");

    let error: Value = h.server.get("/api/tracking/error").await.json();
    assert_eq!(error["error"]["kind"], "permission_denied");

    let cleared: Value = h.server.delete("/api/tracking/error").await.json();
    assert_eq!(cleared["cleared"], true);
    let error: Value = h.server.get("/api/tracking/error").await.json();
    assert!(error["error"].is_null());

    let tracking: Value = h.server.get("/api/tracking").await.json();
    assert_eq!(tracking["active"], false);
}

#[tokio::test]
async fn test_tracking_flow_publishes_eta_and_stops() {
    let h = harness();
    seed_positions(&h.server).await;

    let started = h
        .server
        .post("/api/tracking/start")
        .json(&json!({ "target_id": "bus-42", "observer_id": "rider-7" }))
        .await;
    started.assert_status_ok();
    let started: Value = started.json();
    assert_eq!(started["status"], "active");
    assert_eq!(started["route_label"], "Route 12");

    let tracking = wait_for_eta(&h.server).await;
    assert_eq!(tracking["active"], true);
    assert_eq!(tracking["snapshot"]["eta_minutes"], 1);
    assert_eq!(tracking["snapshot"]["eta_text"], "1 min");
    assert_eq!(tracking["snapshot"]["distance_text"], "511m");

    let notification: Value = h.server.get("/api/tracking/notification").await.json();
    assert_eq!(notification["visible"], true);
    assert_eq!(notification["payload"]["route_label"], "Route 12");
    assert_eq!(notification["payload"]["eta_text"], "1 min");

    let stopped = h.server.post("/api/tracking/stop").await;
    stopped.assert_status_ok();
    assert_eq!(stopped.json::<Value>()["status"], "completed");

    let notification: Value = h.server.get("/api/tracking/notification").await.json();
    assert_eq!(notification["visible"], false);

    let sessions: Value = h.server.get("/api/sessions").await.json();
    assert_eq!(sessions["total"], 1);
    assert_eq!(sessions["sessions"][0]["status"], "completed");

    let id = started["session_id"].as_str().unwrap();
    let session: Value = h.server.get(&format!("/api/sessions/{id}")).await.json();
    assert_eq!(session["target_id"], "bus-42");
    assert!(!session["ended_at"].is_null());
}

#[tokio::test]
async fn test_second_start_returns_existing_session() {
    let h = harness();
    seed_positions(&h.server).await;

    let first: Value = h
        .server
        .post("/api/tracking/start")
        .json(&json!({ "target_id": "bus-42", "observer_id": "rider-7" }))
        .await
        .json();
    let second: Value = h
        .server
        .post("/api/tracking/start")
        .json(&json!({ "target_id": "bus-99", "observer_id": "rider-7" }))
        .await
        .json();
    assert_eq!(first["session_id"], second["session_id"]);
    assert_eq!(second["target_id"], "bus-42");

    h.state.controller.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_and_cancel_without_session_conflict() {
    let h = harness();
    for path in ["/api/tracking/stop", "/api/tracking/cancel"] {
        let response = h.server.post(path).await;
        response.assert_status(StatusCode::CONFLICT);
        assert_eq!(response.json::<Value>()["error"], "NO_ACTIVE_SESSION");
    }
}

#[tokio::test]
async fn test_cancel_marks_session_cancelled() {
    let h = harness();
    seed_positions(&h.server).await;
    h.server
        .post("/api/tracking/start")
        .json(&json!({ "target_id": "bus-42", "observer_id": "rider-7" }))
        .await
        .assert_status_ok();

    let cancelled: Value = h.server.post("/api/tracking/cancel").await.json();
    assert_eq!(cancelled["status"], "cancelled");

    let tracking: Value = h.server.get("/api/tracking").await.json();
    assert_eq!(tracking["active"], false);
    assert_eq!(tracking["snapshot"]["status"], "cancelled");
}

#[tokio::test]
async fn test_notification_actions() {
    let h = harness();

    let view: Value = h
        .server
        .post("/api/tracking/actions")
        .json(&json!({ "action": "open_tracking_view" }))
        .await
        .json();
    assert!(view["snapshot"].is_null());

    h.server
        .post("/api/tracking/actions")
        .json(&json!({ "action": "stop_tracking" }))
        .await
        .assert_status(StatusCode::CONFLICT);

    seed_positions(&h.server).await;
    h.server
        .post("/api/tracking/start")
        .json(&json!({ "target_id": "bus-42", "observer_id": "rider-7" }))
        .await
        .assert_status_ok();

    let stopped: Value = h
        .server
        .post("/api/tracking/actions")
        .json(&json!({ "action": "stop_tracking" }))
        .await
        .json();
    assert_eq!(stopped["action"], "stop_tracking");
    assert_eq!(stopped["snapshot"]["status"], "completed");
}

#[tokio::test]
async fn test_invalid_inputs_rejected() {
    let h = harness();

    let response = h
        .server
        .post("/api/positions/observer")
        .json(&json!({ "latitude": 91.0, "longitude": 0.0 }))
        .await;
    response.assert_status_bad_request();
    assert_eq!(response.json::<Value>()["error"], "INVALID_COORDINATE");

    let response = h
        .server
        .post("/api/positions/targets/bus-42")
        .json(&json!({ "latitude": 0.0, "longitude": 0.0, "speed_kmh": -5.0 }))
        .await;
    response.assert_status_bad_request();
    assert_eq!(response.json::<Value>()["error"], "INVALID_SPEED");

    let response = h
        .server
        .post("/api/tracking/start")
        .json(&json!({ "target_id": "bus 42", "observer_id": "rider-7" }))
        .await;
    response.assert_status_bad_request();
    assert_eq!(response.json::<Value>()["error"], "INVALID_IDENTIFIER");
}

#[tokio::test]
async fn test_target_listing_and_clearing() {
    let h = harness();
    seed_positions(&h.server).await;

    let listed: Value = h.server.get("/api/positions/targets").await.json();
    assert_eq!(listed["targets"][0]["id"], "bus-42");

    h.server
        .delete("/api/positions/targets/bus-42")
        .await
        .assert_status(StatusCode::NO_CONTENT);
    let listed: Value = h.server.get("/api/positions/targets").await.json();
    assert_eq!(listed["targets"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn test_unresolved_bus_surfaces_error_while_session_stays_active() {
    let h = harness();
    h.server
        .post("/api/positions/observer")
        .json(&json!({ "latitude": 0.0, "longitude": 0.0 }))
        .await
        .assert_status_ok();
    h.server
        .post("/api/tracking/start")
        .json(&json!({ "target_id": "ghost-bus", "observer_id": "rider-7" }))
        .await
        .assert_status_ok();

    let mut kind = Value::Null;
    for _ in 0..100 {
        let body: Value = h.server.get("/api/tracking/error").await.json();
        if !body["error"].is_null() {
            kind = body["error"]["kind"].clone();
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(kind, "target_unresolvable");

    let tracking: Value = h.server.get("/api/tracking").await.json();
    assert_eq!(tracking["active"], true);
    h.state.controller.cancel().await.unwrap();
}

#[tokio::test]
async fn test_session_history_errors() {
    let h = harness();
    let response = h
        .server
        .get("/api/sessions/6f1c2b1e-8d4e-4c1a-9b7e-2f0d3c4a5b6c")
        .await;
    response.assert_status_not_found();
    assert_eq!(response.json::<Value>()["error"], "SESSION_NOT_FOUND");

    let h = harness_without_storage();
    let response = h.server.get("/api/sessions").await;
    response.assert_status_not_found();
    assert_eq!(response.json::<Value>()["error"], "PERSISTENCE_DISABLED");
}

#[tokio::test]
async fn test_openapi_document_served() {
    let h = harness();
    let response = h.server.get("/api/openapi.json").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["info"]["title"], "bustrack API");
}
