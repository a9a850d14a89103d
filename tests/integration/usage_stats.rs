//! Usage reporting and upgrade prompt integration tests
//!
//! Tests for:
//! - GET /v1/usage/:identity - Counters, ledger, cost and limits
//! - GET /v1/upgrade-prompt/:identity - Read-once upgrade flag

use axum::http::StatusCode;
use chrono::Duration;
use pretty_assertions::assert_eq;
use serde_json::Value;

use scalix_gateway::backend::BackendError;

use crate::common::{chat_body, constants, test_config, TestHarness};

#[tokio::test]
async fn test_usage_stats_for_pro_identity() {
    let harness = TestHarness::new();
    let body = chat_body(constants::PRO_IDENTITY, "scalix-engine");
    harness.chat(&body).await.assert_status_ok();
    harness.chat(&body).await.assert_status_ok();

    let response = harness
        .get(&format!("/v1/usage/{}", constants::PRO_IDENTITY))
        .await;
    response.assert_status_ok();

    let stats: Value = response.json();
    assert_eq!(stats["identity"], constants::PRO_IDENTITY);
    assert_eq!(stats["tier"], "pro");
    assert_eq!(stats["usage"]["requests_today"], 2);
    assert_eq!(stats["usage"]["tokens_today"], 1000);
    assert_eq!(stats["usage"]["requests_this_hour"], 2);
    assert_eq!(stats["ledger"]["total_requests"], 2);
    assert_eq!(stats["ledger"]["tier"], "pro");
    assert_eq!(stats["limits"]["daily_requests"], Value::Null);
    assert_eq!(stats["upgrade_recommended"], false);

    let cost = stats["cost_today_usd"].as_f64().unwrap();
    assert!((cost - 0.02).abs() < 1e-9);
}

#[tokio::test]
async fn test_hourly_counter_rolls_over() {
    let harness = TestHarness::new();
    harness
        .chat(&chat_body(constants::FREE_IDENTITY, constants::FREE_MODEL))
        .await
        .assert_status_ok();

    harness.clock.advance(Duration::hours(1));

    let stats: Value = harness
        .get(&format!("/v1/usage/{}", constants::FREE_IDENTITY))
        .await
        .json();
    assert_eq!(stats["usage"]["requests_today"], 1);
    assert_eq!(stats["usage"]["requests_this_hour"], 0);
    assert_eq!(stats["ledger"]["requests_this_hour"], 0);
    assert_eq!(stats["ledger"]["total_requests"], 1);
}

#[tokio::test]
async fn test_unknown_identity_reads_as_zero() {
    let harness = TestHarness::new();

    let stats: Value = harness.get("/v1/usage/nobody").await.json();

    assert_eq!(stats["tier"], "free");
    assert_eq!(stats["usage"]["requests_today"], 0);
    assert_eq!(stats["ledger"]["total_requests"], 0);
    assert_eq!(stats["cost_today_usd"], 0.0);
    assert_eq!(stats["limits"]["daily_requests"], 50);
    assert_eq!(stats["recent_errors"], Value::Array(vec![]));
}

#[tokio::test]
async fn test_blank_identity_returns_400() {
    let harness = TestHarness::new();

    harness
        .get("/v1/usage/%20")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_recent_errors_are_reported() {
    let harness = TestHarness::new();
    harness
        .backend
        .fail_next(BackendError::Transport("connection reset".to_string()));
    harness
        .chat(&chat_body(constants::FREE_IDENTITY, constants::FREE_MODEL))
        .await
        .assert_status_ok();

    let stats: Value = harness
        .get(&format!("/v1/usage/{}", constants::FREE_IDENTITY))
        .await
        .json();

    let errors = stats["recent_errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["kind"], "network_error");
    assert_eq!(errors[0]["model"], constants::FREE_MODEL);
    assert_eq!(errors[0]["tier"], "free");
    assert_eq!(stats["usage"]["requests_today"], 0);
}

// =============================================================================
// Upgrade prompts
// =============================================================================

#[tokio::test]
async fn test_daily_limit_prompt_is_read_once() {
    let mut config = test_config();
    config.free_daily_request_limit = 5;
    let harness = TestHarness::with_config(config);
    let body = chat_body(constants::FREE_IDENTITY, constants::FREE_MODEL);

    // 3/5 stays below the threshold
    for _ in 0..3 {
        let reply: Value = harness.chat(&body).await.json();
        assert_eq!(reply["tier_metadata"]["upgrade_prompt"], false);
    }

    // 4/5 crosses 80%
    let reply: Value = harness.chat(&body).await.json();
    assert_eq!(reply["tier_metadata"]["upgrade_prompt"], true);
    assert_eq!(reply["tier_metadata"]["upgrade_reason"], "daily_limit_approaching");

    let stats: Value = harness
        .get(&format!("/v1/usage/{}", constants::FREE_IDENTITY))
        .await
        .json();
    assert_eq!(stats["upgrade_recommended"], true);

    let path = format!("/v1/upgrade-prompt/{}", constants::FREE_IDENTITY);
    let first: Value = harness.get(&path).await.json();
    assert_eq!(first["upgrade_prompt"], true);
    assert_eq!(first["reason"], "daily_limit_approaching");

    let second: Value = harness.get(&path).await.json();
    assert_eq!(second["upgrade_prompt"], false);
    assert_eq!(second["reason"], Value::Null);
}

#[tokio::test]
async fn test_token_limit_prompt() {
    let mut config = test_config();
    config.free_daily_token_limit = 1000;
    let harness = TestHarness::with_config(config);
    let body = chat_body(constants::FREE_IDENTITY, constants::FREE_MODEL);

    let first: Value = harness.chat(&body).await.json();
    assert_eq!(first["tier_metadata"]["upgrade_prompt"], false);

    let second: Value = harness.chat(&body).await.json();
    assert_eq!(second["tier_metadata"]["upgrade_reason"], "token_limit_approaching");
}

#[tokio::test]
async fn test_upgrade_prompt_requires_auth() {
    let harness = TestHarness::new();

    harness
        .server
        .get("/v1/upgrade-prompt/alice")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_upgrade_prompt_store_outage_is_unavailable() {
    let harness = TestHarness::new();
    harness.store.set_offline(true);

    let response = harness.get("/v1/upgrade-prompt/alice").await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json();
    assert_eq!(body["code"], "STORAGE_UNAVAILABLE");
}
