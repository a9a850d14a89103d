//! Daily quota integration tests
//!
//! Free callers are gated by a fixed UTC-day request counter; Pro callers
//! are never gated.

use axum::http::{header, StatusCode};
use chrono::{Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use scalix_gateway::UsageLedger;

use crate::common::{chat_body, constants, start_time, test_config, TestHarness};

fn harness_with_limit(limit: u64) -> TestHarness {
    let mut config = test_config();
    config.free_daily_request_limit = limit;
    TestHarness::with_config(config)
}

#[tokio::test]
async fn test_denied_after_daily_limit() {
    let harness = harness_with_limit(3);
    let body = chat_body(constants::FREE_IDENTITY, constants::FREE_MODEL);

    for expected_remaining in ["2", "1", "0"] {
        let response = harness.chat(&body).await;
        response.assert_status_ok();
        assert_eq!(response.headers()["x-ratelimit-remaining"], expected_remaining);
    }

    let response = harness.chat(&body).await;
    response.assert_status(StatusCode::TOO_MANY_REQUESTS);

    // 12:00 UTC, twelve hours until the window resets
    assert_eq!(response.headers()[header::RETRY_AFTER], "43200");
    assert_eq!(response.headers()["x-ratelimit-remaining"], "0");

    let denial: Value = response.json();
    assert_eq!(
        denial,
        json!({
            "error": "Daily limit exceeded (3/3). Upgrade to Pro for unlimited access.",
            "code": "QUOTA_EXCEEDED",
            "details": {"limit": 3, "used": 3, "retry_after": 43200}
        })
    );

    // The denied request never reached the backend
    assert_eq!(harness.backend.calls(), 3);
}

#[tokio::test]
async fn test_quota_resets_on_new_utc_day() {
    let harness = harness_with_limit(1);
    let body = chat_body(constants::FREE_IDENTITY, constants::FREE_MODEL);

    harness.chat(&body).await.assert_status_ok();
    harness
        .chat(&body)
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);

    harness
        .clock
        .set(Utc.with_ymd_and_hms(2025, 3, 2, 0, 0, 1).unwrap());

    let response = harness.chat(&body).await;
    response.assert_status_ok();
    assert_eq!(response.headers()["x-ratelimit-remaining"], "0");
}

#[tokio::test]
async fn test_identities_have_separate_quotas() {
    let harness = harness_with_limit(1);

    harness
        .chat(&chat_body("alice", constants::FREE_MODEL))
        .await
        .assert_status_ok();
    harness
        .chat(&chat_body("bob", constants::FREE_MODEL))
        .await
        .assert_status_ok();
    harness
        .chat(&chat_body("alice", constants::FREE_MODEL))
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_concurrent_requests_admit_exactly_the_limit() {
    let harness = harness_with_limit(5);
    let body = chat_body(constants::FREE_IDENTITY, constants::FREE_MODEL);

    let responses = futures::future::join_all((0..20).map(|_| harness.chat(&body))).await;

    let admitted = responses
        .iter()
        .filter(|r| r.status_code() == StatusCode::OK)
        .count();
    let denied = responses
        .iter()
        .filter(|r| r.status_code() == StatusCode::TOO_MANY_REQUESTS)
        .count();

    assert_eq!(admitted, 5);
    assert_eq!(denied, 15);
    assert_eq!(harness.backend.calls(), 5);
}

#[tokio::test]
async fn test_pro_is_never_denied() {
    let harness = harness_with_limit(1);
    let body = chat_body(constants::PRO_IDENTITY, "scalix-gateway");

    for _ in 0..5 {
        harness.chat(&body).await.assert_status_ok();
    }

    assert_eq!(
        harness.state.quota.reserved_today(constants::PRO_IDENTITY).await,
        Some(0)
    );
}

#[tokio::test]
async fn test_counter_store_outage_fails_open() {
    let harness = TestHarness::new();
    harness.store.set_offline(true);

    let response = harness
        .chat(&chat_body(constants::FREE_IDENTITY, constants::FREE_MODEL))
        .await;

    response.assert_status_ok();
    assert_eq!(response.headers()["x-ratelimit-limit"], "50");
    assert!(response.headers().get("x-ratelimit-remaining").is_none());

    let body: Value = response.json();
    assert_eq!(body["tier_metadata"]["remaining_requests"], Value::Null);
    assert_eq!(body["tier_metadata"]["degraded"], false);

    // The ledger write still lands
    let record = harness
        .ledger
        .read(constants::FREE_IDENTITY, start_time() + Duration::minutes(1))
        .await
        .unwrap();
    assert_eq!(record.requests_today, 1);
}
