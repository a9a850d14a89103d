//! Upgrade prompts
//!
//! Decides when a caller is close enough to a tier limit to be nudged toward
//! an upgrade, and keeps a short-lived per-identity flag that clients can
//! pick up once.

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    store::{keys, CounterStore, StoreError},
    tiers::TierLimits,
    usage::UsageCounter,
};

/// Fraction of a limit at which prompting starts
pub const PROMPT_THRESHOLD: f64 = 0.8;

/// Why a prompt was raised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeReason {
    DailyLimitApproaching,
    TokenLimitApproaching,
    QuotaExceeded,
}

impl UpgradeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpgradeReason::DailyLimitApproaching => "daily_limit_approaching",
            UpgradeReason::TokenLimitApproaching => "token_limit_approaching",
            UpgradeReason::QuotaExceeded => "quota_exceeded",
        }
    }
}

impl FromStr for UpgradeReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily_limit_approaching" => Ok(UpgradeReason::DailyLimitApproaching),
            "token_limit_approaching" => Ok(UpgradeReason::TokenLimitApproaching),
            "quota_exceeded" => Ok(UpgradeReason::QuotaExceeded),
            other => Err(format!("unknown upgrade reason: {}", other)),
        }
    }
}

fn reached(used: u64, limit: Option<u64>) -> bool {
    match limit {
        None => false,
        Some(0) => true,
        Some(limit) => used as f64 / limit as f64 >= PROMPT_THRESHOLD,
    }
}

/// Which threshold, if any, `usage` has crossed
///
/// The daily request limit is checked before the token limit.
pub fn prompt_reason(usage: &UsageCounter, limits: &TierLimits) -> Option<UpgradeReason> {
    if reached(usage.requests_today, limits.daily_requests) {
        Some(UpgradeReason::DailyLimitApproaching)
    } else if reached(usage.tokens_today, limits.daily_tokens) {
        Some(UpgradeReason::TokenLimitApproaching)
    } else {
        None
    }
}

/// True when either daily ratio is at or above [`PROMPT_THRESHOLD`]
pub fn should_prompt(usage: &UsageCounter, limits: &TierLimits) -> bool {
    prompt_reason(usage, limits).is_some()
}

/// Short-lived upgrade flags
pub struct UpgradePrompts {
    store: Arc<dyn CounterStore>,
    ttl_seconds: u64,
}

impl UpgradePrompts {
    pub fn new(store: Arc<dyn CounterStore>, ttl_seconds: u64) -> Self {
        Self { store, ttl_seconds }
    }

    /// Raise (or refresh) the flag for `identity`
    pub async fn flag(&self, identity: &str, reason: UpgradeReason) -> Result<(), StoreError> {
        self.store
            .set_with_expiry(&keys::upgrade_prompt(identity), reason.as_str(), self.ttl_seconds)
            .await?;
        debug!(identity = %identity, reason = reason.as_str(), "Upgrade prompt flagged");
        Ok(())
    }

    /// Read and clear the flag for `identity`
    pub async fn take(&self, identity: &str) -> Result<Option<UpgradeReason>, StoreError> {
        let raw = self.store.take(&keys::upgrade_prompt(identity)).await?;
        Ok(raw.and_then(|r| r.parse().ok()))
    }
}
