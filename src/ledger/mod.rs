//! Durable usage ledger
//!
//! One record per identity holding cumulative usage. Records are only ever
//! added to; the "today" and "this hour" fields roll over implicitly when a
//! write or read lands in a later window than the one stored.

pub mod memory;
pub mod redis;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::StoreError;
use crate::tiers::Tier;
use crate::usage::window::{day_stamp, hour_stamp};

pub use self::memory::MemoryLedger;
pub use self::redis::RedisLedger;

/// Amounts added by one completed request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageDelta {
    pub tier: Tier,
    pub requests: u64,
    pub tokens: u64,
}

/// Cumulative usage for one identity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub identity: String,
    pub tier: Option<Tier>,
    pub requests_today: u64,
    pub tokens_today: u64,
    pub requests_this_hour: u64,
    pub total_requests: u64,
    pub total_tokens: u64,
    pub last_request_timestamp: Option<DateTime<Utc>>,
    #[serde(skip)]
    day: Option<String>,
    #[serde(skip)]
    hour: Option<String>,
}

impl UsageRecord {
    /// An empty record
    pub fn zeroed(identity: &str) -> Self {
        Self {
            identity: identity.to_string(),
            ..Self::default()
        }
    }

    /// Add `delta` at time `at`, resetting window fields that are stale
    pub fn apply(&mut self, delta: &UsageDelta, at: DateTime<Utc>) {
        self.roll_windows(at);
        self.day = Some(day_stamp(at));
        self.hour = Some(hour_stamp(at));
        self.tier = Some(delta.tier);
        self.requests_today += delta.requests;
        self.tokens_today += delta.tokens;
        self.requests_this_hour += delta.requests;
        self.total_requests += delta.requests;
        self.total_tokens += delta.tokens;
        self.last_request_timestamp = Some(at);
    }

    /// Zero the window fields that no longer describe the window containing
    /// `now`
    pub fn roll_windows(&mut self, now: DateTime<Utc>) {
        if self.day.as_deref() != Some(day_stamp(now).as_str()) {
            self.requests_today = 0;
            self.tokens_today = 0;
        }
        if self.hour.as_deref() != Some(hour_stamp(now).as_str()) {
            self.requests_this_hour = 0;
        }
    }

    pub(crate) fn with_windows(mut self, day: Option<String>, hour: Option<String>) -> Self {
        self.day = day;
        self.hour = hour;
        self
    }
}

/// Record store keyed by identity
#[async_trait]
pub trait UsageLedger: Send + Sync {
    /// Backend name for logs and health output
    fn backend(&self) -> &'static str;

    /// Add `delta` to the identity's record, creating it when absent
    async fn upsert_add(
        &self,
        identity: &str,
        delta: &UsageDelta,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Read the identity's record as of `now`; absent records read as zeroed
    async fn read(&self, identity: &str, now: DateTime<Utc>) -> Result<UsageRecord, StoreError>;

    /// Connectivity check
    async fn ping(&self) -> Result<(), StoreError>;
}
