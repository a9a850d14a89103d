//! Upstream failure classification
//!
//! Maps free-form failure messages onto a fixed [`ErrorKind`] taxonomy and
//! records every handled failure: a global counter per kind, a per-identity
//! counter per kind, and a bounded per-identity history.
//!
//! Local storage failures are recorded in the same history but are never
//! run through [`classify`]: they always land as [`ErrorKind::Unknown`] and
//! trigger no kind-specific side effect.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use crate::{
    clock::SharedClock,
    routes::metrics,
    store::{keys, CounterStore, StoreError},
    tiers::Tier,
    upgrade::{UpgradePrompts, UpgradeReason},
};

/// Failure category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    RateLimit,
    QuotaExceeded,
    ModelUnavailable,
    NetworkError,
    TimeoutError,
    Unknown,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 6] = [
        ErrorKind::RateLimit,
        ErrorKind::QuotaExceeded,
        ErrorKind::ModelUnavailable,
        ErrorKind::NetworkError,
        ErrorKind::TimeoutError,
        ErrorKind::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::QuotaExceeded => "quota_exceeded",
            ErrorKind::ModelUnavailable => "model_unavailable",
            ErrorKind::NetworkError => "network_error",
            ErrorKind::TimeoutError => "timeout_error",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a failure message
///
/// Case-insensitive substring rules, checked in order; the first match wins.
pub fn classify(message: &str) -> ErrorKind {
    let lower = message.to_lowercase();
    let has = |pattern: &str| lower.contains(pattern);

    if has("rate limit") || has("429") {
        ErrorKind::RateLimit
    } else if has("quota") || has("insufficient") {
        ErrorKind::QuotaExceeded
    } else if has("model") && (has("not found") || has("unavailable")) {
        ErrorKind::ModelUnavailable
    } else if has("network") || has("connection") {
        ErrorKind::NetworkError
    } else if has("timeout") {
        ErrorKind::TimeoutError
    } else {
        ErrorKind::Unknown
    }
}

/// One handled failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub identity: String,
    pub model: String,
    pub kind: ErrorKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub tier: Option<Tier>,
}

/// Extra facts about the failing request
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorContext {
    pub tier: Option<Tier>,
}

impl ErrorContext {
    pub fn for_tier(tier: Tier) -> Self {
        Self { tier: Some(tier) }
    }
}

/// Classifies and records failures
pub struct ErrorClassifier {
    store: Arc<dyn CounterStore>,
    upgrades: Arc<UpgradePrompts>,
    clock: SharedClock,
    history_len: usize,
}

impl ErrorClassifier {
    pub fn new(
        store: Arc<dyn CounterStore>,
        upgrades: Arc<UpgradePrompts>,
        clock: SharedClock,
        history_len: usize,
    ) -> Self {
        Self {
            store,
            upgrades,
            clock,
            history_len: history_len.max(1),
        }
    }

    /// Classify `message`, record it and run the kind-specific side effect
    ///
    /// Recording is best effort; storage failures here are logged and dropped.
    #[instrument(skip(self, message, context))]
    pub async fn handle(
        &self,
        identity: &str,
        model: &str,
        message: &str,
        context: ErrorContext,
    ) -> ErrorKind {
        let kind = classify(message);
        self.record(identity, model, kind, message, context).await;

        match kind {
            ErrorKind::QuotaExceeded => {
                if let Err(e) = self.upgrades.flag(identity, UpgradeReason::QuotaExceeded).await {
                    warn!(identity = %identity, error = %e, "Failed to flag upgrade prompt");
                }
                info!(identity = %identity, model = %model, "Upstream quota exceeded, upgrade prompt raised");
            }
            ErrorKind::RateLimit => {
                warn!(identity = %identity, model = %model, "Upstream rate limited");
            }
            ErrorKind::ModelUnavailable => {
                error!(identity = %identity, model = %model, message = %message, "Model unavailable");
            }
            _ => {
                warn!(identity = %identity, model = %model, kind = %kind, message = %message, "Upstream failure");
            }
        }

        kind
    }

    /// Record a local storage failure observed while serving `identity`
    /// with `model`
    ///
    /// `component` names the failing sink and is kept in the message.
    pub async fn record_storage_failure(
        &self,
        identity: &str,
        model: &str,
        component: &'static str,
        error: &StoreError,
        context: ErrorContext,
    ) -> ErrorKind {
        metrics::record_storage_failure(component);
        let message = format!("{} storage failure: {}", component, error);
        warn!(identity = %identity, model = %model, component = component, error = %error, "Storage failure");

        let kind = ErrorKind::Unknown;
        self.record(identity, model, kind, &message, context).await;
        kind
    }

    async fn record(
        &self,
        identity: &str,
        model: &str,
        kind: ErrorKind,
        message: &str,
        context: ErrorContext,
    ) {
        metrics::record_classified_error(kind.as_str());

        let record = ErrorRecord {
            identity: identity.to_string(),
            model: model.to_string(),
            kind,
            message: message.to_string(),
            timestamp: self.clock.now(),
            tier: context.tier,
        };

        if let Err(e) = self.persist(&record).await {
            warn!(identity = %identity, kind = %kind, error = %e, "Failed to record error");
        }
    }

    async fn persist(&self, record: &ErrorRecord) -> Result<(), StoreError> {
        let kind = record.kind.as_str();
        let entry = serde_json::to_string(record)?;
        let total_key = keys::error_kind_total(kind);
        let identity_key = keys::error_kind_for(&record.identity, kind);
        let history_key = keys::recent_errors(&record.identity);

        futures::try_join!(
            self.store.increment_with_expiry(&total_key, 1, 0),
            self.store.increment_with_expiry(&identity_key, 1, 0),
            self.store.push_capped(&history_key, &entry, self.history_len),
        )?;
        Ok(())
    }

    /// Most recent failures for `identity`, newest first
    pub async fn recent_errors(&self, identity: &str) -> Result<Vec<ErrorRecord>, StoreError> {
        let raw = self.store.list(&keys::recent_errors(identity)).await?;
        Ok(raw
            .iter()
            .filter_map(|entry| serde_json::from_str(entry).ok())
            .collect())
    }

    /// Failures of `kind` across all identities
    pub async fn kind_total(&self, kind: ErrorKind) -> Result<u64, StoreError> {
        let total = self.store.get(&keys::error_kind_total(kind.as_str())).await?;
        Ok(total.unwrap_or(0).max(0) as u64)
    }

    /// Failures of `kind` for one identity
    pub async fn kind_count_for(&self, identity: &str, kind: ErrorKind) -> Result<u64, StoreError> {
        let count = self
            .store
            .get(&keys::error_kind_for(identity, kind.as_str()))
            .await?;
        Ok(count.unwrap_or(0).max(0) as u64)
    }
}
