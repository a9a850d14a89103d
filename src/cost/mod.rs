//! Cost attribution
//!
//! Prices completions and accumulates a per-identity daily spend total.

pub mod pricing;

use std::sync::Arc;

use tracing::debug;

use crate::{
    clock::SharedClock,
    routes::metrics,
    store::{keys, CounterStore, StoreError},
    usage::window::{day_stamp, DAY_TTL_SECONDS},
};

pub use pricing::{PriceTable, FALLBACK_PRICE_PER_1K};

/// Prices completions and tracks daily spend
pub struct CostCalculator {
    store: Arc<dyn CounterStore>,
    clock: SharedClock,
    prices: PriceTable,
    retention_seconds: u64,
}

impl CostCalculator {
    pub fn new(
        store: Arc<dyn CounterStore>,
        clock: SharedClock,
        prices: PriceTable,
        retention_days: u64,
    ) -> Self {
        Self {
            store,
            clock,
            prices,
            retention_seconds: retention_days.max(1) * DAY_TTL_SECONDS,
        }
    }

    /// Cost in USD of `tokens` tokens on `model`
    pub fn price(&self, model: &str, tokens: u64) -> f64 {
        self.prices.price(model, tokens)
    }

    /// Add `amount` to today's total for `identity`; returns the new total
    pub async fn track_cost(&self, identity: &str, amount: f64) -> Result<f64, StoreError> {
        let key = keys::cost_day(identity, &day_stamp(self.clock.now()));
        let total = self
            .store
            .increment_float_with_expiry(&key, amount, self.retention_seconds)
            .await?;
        metrics::record_cost(amount);
        debug!(identity = %identity, amount = amount, total = total, "Tracked cost");
        Ok(total)
    }

    /// Today's total for `identity`
    pub async fn daily_cost(&self, identity: &str) -> Result<f64, StoreError> {
        let key = keys::cost_day(identity, &day_stamp(self.clock.now()));
        Ok(self.store.get_float(&key).await?.unwrap_or(0.0))
    }
}
