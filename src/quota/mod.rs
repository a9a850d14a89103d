//! Quota enforcement
//!
//! Fixed-window daily request quota. Free callers are admitted through an
//! atomic check-and-increment on a per-identity, per-UTC-day admission
//! counter; Pro callers bypass the store entirely.
//!
//! The admission counter is reserved at check time and is not refunded if
//! the forwarded call later fails, so it only ever grows within a day.

use std::sync::Arc;

use axum::http::{header, HeaderName, HeaderValue};
use tracing::{debug, instrument, warn};

use crate::{
    clock::SharedClock,
    failures::{ErrorClassifier, ErrorContext},
    routes::metrics,
    store::{keys, CounterStore},
    tiers::{Tier, TierPolicy},
    usage::window::{day_stamp, next_day_start, seconds_until_next_day, DAY_TTL_SECONDS},
};

/// Request admitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaAllowance {
    /// Daily limit, `None` when unlimited
    pub limit: Option<u64>,
    /// Remaining requests today, `None` when unlimited or unknown
    pub remaining: Option<u64>,
    /// Unix timestamp of the next window start
    pub reset_at: i64,
}

/// Request rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaDenial {
    pub reason: String,
    pub limit: u64,
    pub used: u64,
    /// Seconds until the daily window resets
    pub retry_after: u64,
    pub reset_at: i64,
}

/// Result of [`QuotaEnforcer::check_and_reserve`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaDecision {
    Allowed(QuotaAllowance),
    Denied(QuotaDenial),
}

impl QuotaDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, QuotaDecision::Allowed(_))
    }
}

impl QuotaAllowance {
    /// Rate limit headers; empty for unlimited callers
    pub fn headers(&self) -> Vec<(HeaderName, HeaderValue)> {
        let Some(limit) = self.limit else {
            return Vec::new();
        };
        let mut headers = vec![(
            HeaderName::from_static("x-ratelimit-limit"),
            HeaderValue::from(limit),
        )];
        if let Some(remaining) = self.remaining {
            headers.push((
                HeaderName::from_static("x-ratelimit-remaining"),
                HeaderValue::from(remaining),
            ));
        }
        headers.push((
            HeaderName::from_static("x-ratelimit-reset"),
            HeaderValue::from(self.reset_at),
        ));
        headers
    }
}

impl QuotaDenial {
    /// Rate limit headers plus `Retry-After`
    pub fn headers(&self) -> Vec<(HeaderName, HeaderValue)> {
        vec![
            (
                HeaderName::from_static("x-ratelimit-limit"),
                HeaderValue::from(self.limit),
            ),
            (
                HeaderName::from_static("x-ratelimit-remaining"),
                HeaderValue::from(0u64),
            ),
            (
                HeaderName::from_static("x-ratelimit-reset"),
                HeaderValue::from(self.reset_at),
            ),
            (header::RETRY_AFTER, HeaderValue::from(self.retry_after)),
        ]
    }
}

/// Daily request quota gate
pub struct QuotaEnforcer {
    store: Arc<dyn CounterStore>,
    clock: SharedClock,
    policy: TierPolicy,
    failures: Arc<ErrorClassifier>,
}

impl QuotaEnforcer {
    pub fn new(
        store: Arc<dyn CounterStore>,
        clock: SharedClock,
        policy: TierPolicy,
        failures: Arc<ErrorClassifier>,
    ) -> Self {
        Self {
            store,
            clock,
            policy,
            failures,
        }
    }

    /// Admit or reject one request, reserving a slot when admitted
    ///
    /// Storage failures fail open: the request is admitted with an unknown
    /// remaining budget and the failure is recorded against `model`.
    #[instrument(skip(self, tier), fields(tier = %tier))]
    pub async fn check_and_reserve(&self, identity: &str, tier: Tier, model: &str) -> QuotaDecision {
        let now = self.clock.now();
        let reset_at = next_day_start(now).timestamp();
        let limits = self.policy.limits_for(tier);

        let Some(daily_limit) = limits.daily_requests else {
            return QuotaDecision::Allowed(QuotaAllowance {
                limit: None,
                remaining: None,
                reset_at,
            });
        };

        let key = keys::quota_day(identity, &day_stamp(now));
        let limit = i64::try_from(daily_limit).unwrap_or(i64::MAX);

        match self.store.increment_below(&key, limit, DAY_TTL_SECONDS).await {
            Ok(admission) if admission.admitted => {
                let used = admission.current.max(0) as u64;
                debug!(identity = %identity, used = used, limit = daily_limit, "Quota reserved");
                QuotaDecision::Allowed(QuotaAllowance {
                    limit: Some(daily_limit),
                    remaining: Some(daily_limit.saturating_sub(used)),
                    reset_at,
                })
            }
            Ok(admission) => {
                let used = admission.current.max(0) as u64;
                warn!(identity = %identity, used = used, limit = daily_limit, "Daily quota exceeded");
                metrics::record_quota_denial(tier.as_str());
                QuotaDecision::Denied(QuotaDenial {
                    reason: format!(
                        "Daily limit exceeded ({}/{}). Upgrade to Pro for unlimited access.",
                        used, daily_limit
                    ),
                    limit: daily_limit,
                    used,
                    retry_after: seconds_until_next_day(now),
                    reset_at,
                })
            }
            Err(e) => {
                warn!(identity = %identity, error = %e, "Quota check failed, allowing request");
                self.failures
                    .record_storage_failure(
                        identity,
                        model,
                        "quota",
                        &e,
                        ErrorContext::for_tier(tier),
                    )
                    .await;
                QuotaDecision::Allowed(QuotaAllowance {
                    limit: Some(daily_limit),
                    remaining: None,
                    reset_at,
                })
            }
        }
    }

    /// Requests reserved today, without reserving
    pub async fn reserved_today(&self, identity: &str) -> Option<u64> {
        let key = keys::quota_day(identity, &day_stamp(self.clock.now()));
        match self.store.get(&key).await {
            Ok(value) => Some(value.unwrap_or(0).max(0) as u64),
            Err(_) => None,
        }
    }
}
