//! Health endpoint integration tests
//!
//! Tests for the health check endpoints:
//! - GET /health - Full health check with dependency status
//! - GET /health/ready - Readiness probe
//! - GET /health/live - Liveness probe
//! - GET /metrics - Prometheus exposition

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::Value;

use crate::common::{chat_body, constants, TestHarness};

#[tokio::test]
async fn test_health_endpoint_returns_proper_structure() {
    let harness = TestHarness::new();

    let response = harness.server.get("/health").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["uptime_seconds"].is_u64());
    assert!(body["timestamp"].is_string());
    assert_eq!(body["checks"]["counter_store"]["status"], "healthy");
    assert_eq!(body["checks"]["counter_store"]["backend"], "memory");
    assert_eq!(body["checks"]["ledger"]["status"], "healthy");
    assert_eq!(body["stats"]["completion_backend"], "scripted");
}

#[tokio::test]
async fn test_health_degraded_when_one_store_is_down() {
    let harness = TestHarness::new();
    harness.ledger.set_offline(true);

    let response = harness.server.get("/health").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["checks"]["ledger"]["status"], "unhealthy");
    assert!(body["checks"]["ledger"]["error"].is_string());

    harness.server.get("/health/ready").await.assert_status_ok();
}

#[tokio::test]
async fn test_health_unhealthy_when_both_stores_are_down() {
    let harness = TestHarness::new();
    harness.store.set_offline(true);
    harness.ledger.set_offline(true);

    let response = harness.server.get("/health").await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json();
    assert_eq!(body["status"], "unhealthy");

    let ready = harness.server.get("/health/ready").await;
    ready.assert_status(StatusCode::SERVICE_UNAVAILABLE);

    // Completions still go through with both stores down
    harness
        .chat(&chat_body(constants::FREE_IDENTITY, constants::FREE_MODEL))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_liveness_endpoint() {
    let harness = TestHarness::new();

    let response = harness.server.get("/health/live").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_health_endpoints_reject_post() {
    let harness = TestHarness::new();

    harness
        .server
        .post("/health")
        .await
        .assert_status(StatusCode::METHOD_NOT_ALLOWED);
    harness
        .server
        .post("/health/live")
        .await
        .assert_status(StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_metrics_endpoint_is_public() {
    let harness = TestHarness::new();
    harness
        .chat(&chat_body(constants::FREE_IDENTITY, constants::FREE_MODEL))
        .await
        .assert_status_ok();

    harness.server.get("/metrics").await.assert_status_ok();
}
