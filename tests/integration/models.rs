//! Models endpoint integration tests
//!
//! GET /v1/models lists the catalog models available to the caller's tier.

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::Value;

use crate::common::{constants, TestHarness};

fn model_ids(body: &Value) -> Vec<String> {
    body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_free_identity_sees_free_models() {
    let harness = TestHarness::new();

    let response = harness
        .get(&format!("/v1/models?user={}", constants::FREE_IDENTITY))
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["object"], "list");
    assert_eq!(body["tier"], "free");
    assert_eq!(
        model_ids(&body),
        vec!["free-gemini-flash", "free-gemini-pro", "free-deepseek"]
    );
}

#[tokio::test]
async fn test_pro_identity_sees_all_models() {
    let harness = TestHarness::new();

    let body: Value = harness
        .get(&format!("/v1/models?user={}", constants::PRO_IDENTITY))
        .await
        .json();

    assert_eq!(body["tier"], "pro");
    let ids = model_ids(&body);
    assert_eq!(ids.len(), 7);
    assert!(ids.contains(&"scalix-engine".to_string()));
    assert!(ids.contains(&"free-deepseek".to_string()));
}

#[tokio::test]
async fn test_no_user_lists_free_models() {
    let harness = TestHarness::new();

    let body: Value = harness.get("/v1/models").await.json();

    assert_eq!(body["tier"], "free");
    assert_eq!(model_ids(&body).len(), 3);
}

#[tokio::test]
async fn test_models_requires_auth() {
    let harness = TestHarness::new();

    harness
        .server
        .get("/v1/models")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}
