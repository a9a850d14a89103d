//! Common test utilities for the gateway
//!
//! Builds the real router over in-memory stores, a manual clock and a
//! scripted completion backend.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum_test::TestServer;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};

use scalix_gateway::{
    backend::{BackendCompletion, BackendError, BackendRequest, CompletionBackend, TokenUsage},
    routes, AppState, Config, ManualClock, MemoryCounterStore, MemoryLedger, StoreBackend,
};

/// Test configuration constants
pub mod constants {
    /// Accepted API key
    pub const TEST_API_KEY: &str = "sk-scalix-test";
    /// Identity resolved as Pro by the default prefix
    pub const PRO_IDENTITY: &str = "scalix_pro_42";
    /// Identity resolved as Free
    pub const FREE_IDENTITY: &str = "alice";
    /// Free catalog model
    pub const FREE_MODEL: &str = "free-gemini-flash";
}

/// Bearer header value for the test key
pub fn auth_header() -> String {
    format!("Bearer {}", constants::TEST_API_KEY)
}

/// Instant the manual clock starts at
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
}

/// Gateway configuration used by integration tests
pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        store_backend: StoreBackend::Memory,
        redis_url: None,
        memory_sweep_seconds: 300,
        api_keys: vec![constants::TEST_API_KEY.to_string()],
        pro_identity_prefixes: vec!["scalix_".to_string()],
        pro_identities: vec!["vip@example.com".to_string()],
        free_daily_request_limit: 50,
        free_hourly_request_limit: 10,
        free_daily_token_limit: 10_000,
        backend_url: None,
        backend_api_key: None,
        backend_timeout_seconds: 5,
        upgrade_prompt_ttl_seconds: 3600,
        cost_retention_days: 30,
        error_history_len: 10,
    }
}

/// Completion body for `user` and `model`
pub fn chat_body(user: &str, model: &str) -> Value {
    json!({
        "user": user,
        "model": model,
        "messages": [
            {"role": "user", "content": "Hello!"}
        ],
        "max_tokens": 100
    })
}

/// Backend that answers from a queue of scripted results
///
/// Once the queue is empty every call succeeds with `default_usage`.
pub struct ScriptedBackend {
    queue: Mutex<VecDeque<Result<BackendCompletion, BackendError>>>,
    default_usage: TokenUsage,
    calls: AtomicUsize,
    last_request: Mutex<Option<BackendRequest>>,
}

impl ScriptedBackend {
    pub fn new(default_usage: TokenUsage) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            default_usage,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Queue a failure for the next call
    pub fn fail_next(&self, error: BackendError) {
        self.queue.lock().unwrap().push_back(Err(error));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<BackendRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn complete(&self, request: &BackendRequest) -> Result<BackendCompletion, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());

        if let Some(result) = self.queue.lock().unwrap().pop_front() {
            return result;
        }
        Ok(BackendCompletion {
            content: "Hi there!".to_string(),
            finish_reason: "stop".to_string(),
            usage: self.default_usage,
        })
    }
}

/// Router plus handles on everything behind it
pub struct TestHarness {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub store: Arc<MemoryCounterStore>,
    pub ledger: Arc<MemoryLedger>,
    pub backend: Arc<ScriptedBackend>,
    pub clock: Arc<ManualClock>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: Config) -> Self {
        let store = Arc::new(MemoryCounterStore::new());
        let ledger = Arc::new(MemoryLedger::new());
        let backend = Arc::new(ScriptedBackend::new(TokenUsage::new(200, 300)));
        let clock = Arc::new(ManualClock::new(start_time()));

        let state = Arc::new(AppState::with_components(
            config,
            store.clone(),
            ledger.clone(),
            backend.clone(),
            clock.clone(),
        ));
        let app = routes::create_router(state.clone());
        let server = TestServer::new(app).expect("Failed to create test server");

        Self {
            server,
            state,
            store,
            ledger,
            backend,
            clock,
        }
    }

    /// POST an authenticated completion request
    pub async fn chat(&self, body: &Value) -> axum_test::TestResponse {
        self.server
            .post("/v1/chat/completions")
            .add_header(
                axum::http::header::AUTHORIZATION,
                auth_header().parse::<axum::http::HeaderValue>().unwrap(),
            )
            .json(body)
            .await
    }

    /// Authenticated GET
    pub async fn get(&self, path: &str) -> axum_test::TestResponse {
        self.server
            .get(path)
            .add_header(
                axum::http::header::AUTHORIZATION,
                auth_header().parse::<axum::http::HeaderValue>().unwrap(),
            )
            .await
    }
}
