//! Per-model pricing
//!
//! Prices are USD per 1,000 tokens, prompt and completion tokens alike.

use std::collections::HashMap;

/// Rate applied to models missing from the table
pub const FALLBACK_PRICE_PER_1K: f64 = 0.01;

const DEFAULT_PRICES: &[(&str, f64)] = &[
    ("free-gemini-flash", 0.0),
    ("free-gemini-pro", 0.0),
    ("free-deepseek", 0.0),
    ("free-deepseek-chat", 0.0),
    ("free-wizardlm", 0.0),
    ("scalix-engine", 0.02),
    ("scalix-gateway", 0.015),
    ("gpt-4", 0.03),
    ("gpt-4-turbo", 0.01),
    ("claude-3-opus", 0.015),
    ("claude-3-sonnet", 0.002),
    ("gemini-pro", 0.005),
];

/// Model id to price table
#[derive(Debug, Clone)]
pub struct PriceTable {
    prices: HashMap<String, f64>,
    fallback: f64,
}

impl PriceTable {
    pub fn new(prices: HashMap<String, f64>, fallback: f64) -> Self {
        Self { prices, fallback }
    }

    /// Price per 1k tokens for `model`
    pub fn per_1k(&self, model: &str) -> f64 {
        self.prices.get(model).copied().unwrap_or(self.fallback)
    }

    pub fn is_priced(&self, model: &str) -> bool {
        self.prices.contains_key(model)
    }

    /// `(tokens / 1000) * per_1k(model)`
    pub fn price(&self, model: &str, tokens: u64) -> f64 {
        (tokens as f64 / 1000.0) * self.per_1k(model)
    }
}

impl Default for PriceTable {
    fn default() -> Self {
        Self::new(
            DEFAULT_PRICES
                .iter()
                .map(|(model, price)| (model.to_string(), *price))
                .collect(),
            FALLBACK_PRICE_PER_1K,
        )
    }
}
