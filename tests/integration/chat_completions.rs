//! Chat completions endpoint integration tests
//!
//! Covers the completion flow end to end: authentication, tier resolution,
//! model validation, metering and degraded replies on backend failure.

use axum::http::{header, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use scalix_gateway::{backend::BackendError, store::keys, CounterStore, UsageLedger};

use crate::common::{chat_body, constants, start_time, TestHarness};

// =============================================================================
// Successful completions
// =============================================================================

#[tokio::test]
async fn test_pro_completion_is_metered_without_quota() {
    let harness = TestHarness::new();

    let response = harness
        .chat(&chat_body(constants::PRO_IDENTITY, "scalix-engine"))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["object"], "chat.completion");
    assert_eq!(body["model"], "scalix-engine");
    assert_eq!(body["choices"][0]["message"]["role"], "assistant");
    assert_eq!(body["usage"]["total_tokens"], 500);
    assert_eq!(body["tier_metadata"]["tier"], "pro");
    assert_eq!(body["tier_metadata"]["remaining_requests"], Value::Null);
    assert_eq!(body["tier_metadata"]["upgrade_prompt"], false);
    assert_eq!(body["tier_metadata"]["degraded"], false);

    let cost = body["tier_metadata"]["cost_usd"].as_f64().unwrap();
    assert!((cost - 0.01).abs() < 1e-9);

    // Pro callers carry no rate limit headers
    assert!(response.headers().get("x-ratelimit-limit").is_none());

    // The gating counter is never touched, the ledger is
    let gate = harness
        .store
        .get(&keys::quota_day(constants::PRO_IDENTITY, "2025-03-01"))
        .await
        .unwrap();
    assert_eq!(gate, None);

    let record = harness
        .ledger
        .read(constants::PRO_IDENTITY, start_time())
        .await
        .unwrap();
    assert_eq!(record.requests_today, 1);
    assert_eq!(record.tokens_today, 500);

    // Backend saw the provider model id
    let forwarded = harness.backend.last_request().unwrap();
    assert_eq!(forwarded.provider_model, "openai-compatible/scalix-engine");
    assert_eq!(forwarded.identity, constants::PRO_IDENTITY);
}

#[tokio::test]
async fn test_free_completion_reports_quota_headers() {
    let harness = TestHarness::new();

    let response = harness
        .chat(&chat_body(constants::FREE_IDENTITY, constants::FREE_MODEL))
        .await;

    response.assert_status_ok();
    assert_eq!(response.headers()["x-ratelimit-limit"], "50");
    assert_eq!(response.headers()["x-ratelimit-remaining"], "49");
    assert!(response.headers().get("x-ratelimit-reset").is_some());

    let body: Value = response.json();
    assert_eq!(body["tier_metadata"]["tier"], "free");
    assert_eq!(body["tier_metadata"]["remaining_requests"], 49);
    assert_eq!(body["tier_metadata"]["cost_usd"], 0.0);
}

#[tokio::test]
async fn test_allowlisted_identity_is_pro() {
    let harness = TestHarness::new();

    let response = harness.chat(&chat_body("vip@example.com", "gpt-4")).await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["tier_metadata"]["tier"], "pro");
}

#[tokio::test]
async fn test_missing_user_defaults_to_anonymous() {
    let harness = TestHarness::new();

    let response = harness
        .chat(&json!({
            "model": constants::FREE_MODEL,
            "messages": [{"role": "user", "content": "Hello!"}]
        }))
        .await;

    response.assert_status_ok();
    assert_eq!(harness.backend.last_request().unwrap().identity, "anonymous");
    assert_eq!(harness.backend.last_request().unwrap().max_tokens, 100);
}

// =============================================================================
// Rejections
// =============================================================================

#[tokio::test]
async fn test_unknown_model_returns_404_without_quota() {
    let harness = TestHarness::new();

    let response = harness
        .chat(&chat_body(constants::FREE_IDENTITY, "gpt-17"))
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["code"], "NOT_FOUND");
    assert!(harness.store.is_empty());
    assert_eq!(harness.backend.calls(), 0);
}

#[tokio::test]
async fn test_missing_authorization_returns_401() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/chat/completions")
        .json(&chat_body(constants::FREE_IDENTITY, constants::FREE_MODEL))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["code"], "UNAUTHORIZED");
    assert_eq!(harness.backend.calls(), 0);
}

#[tokio::test]
async fn test_unknown_api_key_returns_401() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/chat/completions")
        .add_header(header::AUTHORIZATION, "Bearer sk-wrong".parse::<axum::http::HeaderValue>().unwrap())
        .json(&chat_body(constants::FREE_IDENTITY, constants::FREE_MODEL))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["code"], "INVALID_TOKEN");
}

#[tokio::test]
async fn test_malformed_body_returns_400() {
    let harness = TestHarness::new();

    let response = harness
        .chat(&json!({"user": constants::FREE_IDENTITY, "messages": "hello"}))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "BAD_REQUEST");
    assert!(harness.store.is_empty());
}

#[tokio::test]
async fn test_empty_messages_returns_400() {
    let harness = TestHarness::new();

    let response = harness
        .chat(&json!({
            "user": constants::FREE_IDENTITY,
            "model": constants::FREE_MODEL,
            "messages": []
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

// =============================================================================
// Backend failures
// =============================================================================

#[tokio::test]
async fn test_backend_failure_returns_degraded_reply() {
    let harness = TestHarness::new();
    harness
        .backend
        .fail_next(BackendError::Transport("connection refused".to_string()));

    let response = harness
        .chat(&chat_body(constants::FREE_IDENTITY, constants::FREE_MODEL))
        .await;

    response.assert_status_ok();
    assert_eq!(response.headers()["x-scalix-degraded"], "true");

    let body: Value = response.json();
    assert_eq!(body["tier_metadata"]["degraded"], true);
    assert_eq!(body["tier_metadata"]["error_kind"], "network_error");
    assert_eq!(body["tier_metadata"]["cost_usd"], 0.0);
    assert_eq!(body["usage"]["total_tokens"], 0);
    assert_eq!(body["choices"][0]["finish_reason"], "error");

    // No usage recorded for the failed completion
    let usage = harness.state.usage.current_usage(constants::FREE_IDENTITY).await;
    assert_eq!(usage.requests_today, 0);
    assert_eq!(usage.tokens_today, 0);

    // The quota slot stays reserved
    assert_eq!(
        harness.state.quota.reserved_today(constants::FREE_IDENTITY).await,
        Some(1)
    );
}

#[tokio::test]
async fn test_upstream_quota_failure_raises_upgrade_prompt() {
    let harness = TestHarness::new();
    harness.backend.fail_next(BackendError::Upstream {
        status: 402,
        body: "insufficient_quota".to_string(),
    });

    let response = harness
        .chat(&chat_body(constants::FREE_IDENTITY, constants::FREE_MODEL))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["tier_metadata"]["error_kind"], "quota_exceeded");
    assert_eq!(body["tier_metadata"]["upgrade_prompt"], true);
    assert_eq!(body["tier_metadata"]["upgrade_reason"], "quota_exceeded");

    let prompt: Value = harness
        .get(&format!("/v1/upgrade-prompt/{}", constants::FREE_IDENTITY))
        .await
        .json();
    assert_eq!(prompt["upgrade_prompt"], true);
    assert_eq!(prompt["reason"], "quota_exceeded");
}

#[tokio::test]
async fn test_upstream_rate_limit_is_classified() {
    let harness = TestHarness::new();
    harness.backend.fail_next(BackendError::Upstream {
        status: 429,
        body: "slow down".to_string(),
    });

    let body: Value = harness
        .chat(&chat_body(constants::PRO_IDENTITY, "gpt-4"))
        .await
        .json();

    assert_eq!(body["tier_metadata"]["error_kind"], "rate_limit");
    assert_eq!(body["tier_metadata"]["upgrade_prompt"], false);
}
