//! Scalix gateway - tiered quota enforcement and usage metering
//!
//! This library provides the core of the gateway server. Every completion
//! request is resolved to a service tier, checked against the tier's daily
//! quota, forwarded to the completion backend and then metered: tokens and
//! requests into fast TTL counters and a durable ledger, cost into a daily
//! running total, and upgrade prompts as Free callers approach their limits.

pub mod backend;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod cost;
pub mod error;
pub mod failures;
pub mod gateway;
pub mod ledger;
pub mod middleware;
pub mod quota;
pub mod routes;
pub mod store;
pub mod tiers;
pub mod upgrade;
pub mod usage;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::info;

pub use crate::backend::{CompletionBackend, EchoBackend, OpenAiBackend};
pub use crate::catalog::ModelCatalog;
pub use crate::clock::{ManualClock, SharedClock, SystemClock};
pub use crate::config::{Config, StoreBackend};
pub use crate::gateway::{GatewayParts, RequestGateway};
pub use crate::ledger::{MemoryLedger, RedisLedger, UsageLedger};
pub use crate::store::{CounterStore, MemoryCounterStore, RedisCounterStore};

use crate::{
    cost::{CostCalculator, PriceTable},
    failures::ErrorClassifier,
    middleware::auth::ApiKeys,
    quota::QuotaEnforcer,
    tiers::{PrefixTierResolver, TierPolicy, TierResolver},
    upgrade::UpgradePrompts,
    usage::UsageRecorder,
};

/// Application state shared across all request handlers
pub struct AppState {
    pub config: Config,
    pub start_time: Instant,
    pub clock: SharedClock,
    /// Fast TTL counter store
    pub store: Arc<dyn CounterStore>,
    /// Durable per-identity usage ledger
    pub ledger: Arc<dyn UsageLedger>,
    pub backend: Arc<dyn CompletionBackend>,
    pub api_keys: ApiKeys,
    pub tiers: Arc<dyn TierResolver>,
    pub policy: TierPolicy,
    pub catalog: Arc<ModelCatalog>,
    pub quota: Arc<QuotaEnforcer>,
    pub usage: Arc<UsageRecorder>,
    pub costs: Arc<CostCalculator>,
    pub failures: Arc<ErrorClassifier>,
    pub upgrades: Arc<UpgradePrompts>,
    pub gateway: Arc<RequestGateway>,
}

impl AppState {
    /// Create a new application state
    pub async fn new(config: Config) -> Result<Self> {
        let (store, ledger): (Arc<dyn CounterStore>, Arc<dyn UsageLedger>) =
            match config.store_backend {
                StoreBackend::Memory => {
                    let store = Arc::new(MemoryCounterStore::new());
                    store.spawn_sweeper(config.memory_sweep_interval());
                    (store, Arc::new(MemoryLedger::new()))
                }
                StoreBackend::Redis => {
                    let url = config
                        .redis_url
                        .as_deref()
                        .context("REDIS_URL must be set when STORE_BACKEND=redis")?;
                    let client = redis::Client::open(url)?;
                    let conn = redis::aio::ConnectionManager::new(client).await?;
                    (
                        Arc::new(RedisCounterStore::new(conn.clone())),
                        Arc::new(RedisLedger::new(conn)),
                    )
                }
            };
        info!(store = store.backend(), ledger = ledger.backend(), "Stores initialized");

        let backend: Arc<dyn CompletionBackend> = match &config.backend_url {
            Some(url) => {
                // Initialize HTTP client with connection pooling
                let http_client = reqwest::Client::builder()
                    .pool_max_idle_per_host(100)
                    .connect_timeout(Duration::from_secs(10))
                    .build()?;
                Arc::new(OpenAiBackend::new(
                    http_client,
                    url.clone(),
                    config.backend_api_key.clone(),
                    config.backend_timeout(),
                ))
            }
            None => Arc::new(EchoBackend),
        };
        info!(backend = backend.name(), "Completion backend initialized");

        Ok(Self::with_components(
            config,
            store,
            ledger,
            backend,
            Arc::new(SystemClock),
        ))
    }

    /// Assemble the state from already-built stores, backend and clock
    pub fn with_components(
        config: Config,
        store: Arc<dyn CounterStore>,
        ledger: Arc<dyn UsageLedger>,
        backend: Arc<dyn CompletionBackend>,
        clock: SharedClock,
    ) -> Self {
        let api_keys = ApiKeys::new(&config.api_keys);
        let tiers: Arc<dyn TierResolver> = Arc::new(PrefixTierResolver::new(
            config.pro_identity_prefixes.clone(),
            config.pro_identities.clone(),
        ));
        let policy = TierPolicy::new(config.free_limits());
        let catalog = Arc::new(ModelCatalog::default());

        let upgrades = Arc::new(UpgradePrompts::new(
            store.clone(),
            config.upgrade_prompt_ttl_seconds,
        ));
        let failures = Arc::new(ErrorClassifier::new(
            store.clone(),
            upgrades.clone(),
            clock.clone(),
            config.error_history_len,
        ));
        let quota = Arc::new(QuotaEnforcer::new(
            store.clone(),
            clock.clone(),
            policy,
            failures.clone(),
        ));
        let usage = Arc::new(UsageRecorder::new(
            store.clone(),
            ledger.clone(),
            clock.clone(),
        ));
        let costs = Arc::new(CostCalculator::new(
            store.clone(),
            clock.clone(),
            PriceTable::default(),
            config.cost_retention_days,
        ));

        let gateway = Arc::new(RequestGateway::new(GatewayParts {
            tiers: tiers.clone(),
            quota: quota.clone(),
            usage: usage.clone(),
            costs: costs.clone(),
            failures: failures.clone(),
            upgrades: upgrades.clone(),
            backend: backend.clone(),
            catalog: catalog.clone(),
            policy,
            clock: clock.clone(),
            backend_timeout: config.backend_timeout(),
        }));

        Self {
            config,
            start_time: Instant::now(),
            clock,
            store,
            ledger,
            backend,
            api_keys,
            tiers,
            policy,
            catalog,
            quota,
            usage,
            costs,
            failures,
            upgrades,
            gateway,
        }
    }
}
