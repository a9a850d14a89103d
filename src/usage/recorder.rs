//! Usage recorder
//!
//! Writes each completed request to the windowed counters in the
//! [`CounterStore`] and to the durable [`UsageLedger`]. The two writes are
//! independent: either may fail without affecting the other, and failures
//! are handed back to the caller instead of aborting the request.

use std::sync::Arc;

use futures::future::try_join_all;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use super::window::{day_stamp, hour_stamp, DAY_TTL_SECONDS, HOUR_TTL_SECONDS};
use crate::{
    clock::SharedClock,
    ledger::{UsageDelta, UsageLedger, UsageRecord},
    store::{keys, CounterStore, StoreError},
    tiers::Tier,
};

/// Live usage for one identity in the current windows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UsageCounter {
    pub requests_today: u64,
    pub tokens_today: u64,
    pub requests_this_hour: u64,
    pub tokens_this_hour: u64,
}

impl From<&UsageRecord> for UsageCounter {
    fn from(record: &UsageRecord) -> Self {
        Self {
            requests_today: record.requests_today,
            tokens_today: record.tokens_today,
            requests_this_hour: record.requests_this_hour,
            tokens_this_hour: 0,
        }
    }
}

/// Which write failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageSink {
    CounterStore,
    Ledger,
}

impl UsageSink {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageSink::CounterStore => "counter_store",
            UsageSink::Ledger => "ledger",
        }
    }
}

/// A non-fatal write failure
#[derive(Debug)]
pub struct SinkFailure {
    pub sink: UsageSink,
    pub error: StoreError,
}

/// Outcome of [`UsageRecorder::record`]
#[derive(Debug, Default)]
pub struct RecordOutcome {
    pub failures: Vec<SinkFailure>,
}

impl RecordOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Dual-writes usage to the counter store and the ledger
pub struct UsageRecorder {
    store: Arc<dyn CounterStore>,
    ledger: Arc<dyn UsageLedger>,
    clock: SharedClock,
}

impl UsageRecorder {
    pub fn new(store: Arc<dyn CounterStore>, ledger: Arc<dyn UsageLedger>, clock: SharedClock) -> Self {
        Self { store, ledger, clock }
    }

    /// Record one completed request of `tokens` tokens
    #[instrument(skip(self, tier), fields(tier = %tier))]
    pub async fn record(&self, identity: &str, tier: Tier, model: &str, tokens: u64) -> RecordOutcome {
        let now = self.clock.now();
        let day = day_stamp(now);
        let hour = hour_stamp(now);
        let tokens_i64 = i64::try_from(tokens).unwrap_or(i64::MAX);

        let counters = async {
            let writes = [
                (keys::requests_day(identity, &day), 1, DAY_TTL_SECONDS),
                (keys::tokens_day(identity, &day), tokens_i64, DAY_TTL_SECONDS),
                (keys::requests_hour(identity, &hour), 1, HOUR_TTL_SECONDS),
                (keys::tokens_hour(identity, &hour), tokens_i64, HOUR_TTL_SECONDS),
            ];
            try_join_all(writes.iter().map(|(key, amount, ttl)| {
                self.store.increment_with_expiry(key, *amount, *ttl)
            }))
            .await
            .map(|_| ())
        };

        let delta = UsageDelta {
            tier,
            requests: 1,
            tokens,
        };
        let ledger = self.ledger.upsert_add(identity, &delta, now);

        let (counters, ledger) = futures::join!(counters, ledger);

        let mut outcome = RecordOutcome::default();
        if let Err(error) = counters {
            warn!(identity = %identity, error = %error, "Failed to write usage counters");
            outcome.failures.push(SinkFailure {
                sink: UsageSink::CounterStore,
                error,
            });
        }
        if let Err(error) = ledger {
            warn!(identity = %identity, error = %error, "Failed to write usage ledger");
            outcome.failures.push(SinkFailure {
                sink: UsageSink::Ledger,
                error,
            });
        }

        debug!(
            identity = %identity,
            tokens = tokens,
            complete = outcome.is_complete(),
            "Recorded usage"
        );

        outcome
    }

    /// Current usage; never fails
    ///
    /// Reads the counter store, then the ledger when the store is unreachable,
    /// then reports zero.
    pub async fn current_usage(&self, identity: &str) -> UsageCounter {
        let now = self.clock.now();
        let day = day_stamp(now);
        let hour = hour_stamp(now);

        let reads = futures::future::try_join4(
            self.store.get(&keys::requests_day(identity, &day)),
            self.store.get(&keys::tokens_day(identity, &day)),
            self.store.get(&keys::requests_hour(identity, &hour)),
            self.store.get(&keys::tokens_hour(identity, &hour)),
        )
        .await;

        let as_count = |v: Option<i64>| v.unwrap_or(0).max(0) as u64;

        match reads {
            Ok((requests_today, tokens_today, requests_this_hour, tokens_this_hour)) => UsageCounter {
                requests_today: as_count(requests_today),
                tokens_today: as_count(tokens_today),
                requests_this_hour: as_count(requests_this_hour),
                tokens_this_hour: as_count(tokens_this_hour),
            },
            Err(error) => {
                warn!(identity = %identity, error = %error, "Counter store unreachable, reading ledger");
                match self.ledger.read(identity, now).await {
                    Ok(record) => UsageCounter::from(&record),
                    Err(error) => {
                        warn!(identity = %identity, error = %error, "Ledger unreachable, reporting zero usage");
                        UsageCounter::default()
                    }
                }
            }
        }
    }

    /// Historical usage from the ledger
    pub async fn ledger_usage(&self, identity: &str) -> Result<UsageRecord, StoreError> {
        self.ledger.read(identity, self.clock.now()).await
    }
}
