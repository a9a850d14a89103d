//! In-memory usage ledger

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use super::{UsageDelta, UsageLedger, UsageRecord};
use crate::store::StoreError;

/// In-memory [`UsageLedger`]
#[derive(Debug, Default)]
pub struct MemoryLedger {
    records: DashMap<String, UsageRecord>,
    offline: AtomicBool,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail with [`StoreError::Unavailable`]
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory ledger offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl UsageLedger for MemoryLedger {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn upsert_add(
        &self,
        identity: &str,
        delta: &UsageDelta,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.ensure_online()?;
        self.records
            .entry(identity.to_string())
            .or_insert_with(|| UsageRecord::zeroed(identity))
            .apply(delta, at);
        Ok(())
    }

    async fn read(&self, identity: &str, now: DateTime<Utc>) -> Result<UsageRecord, StoreError> {
        self.ensure_online()?;
        let mut record = self
            .records
            .get(identity)
            .map(|r| r.value().clone())
            .unwrap_or_else(|| UsageRecord::zeroed(identity));
        record.roll_windows(now);
        Ok(record)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.ensure_online()
    }
}
