//! Counter store
//!
//! Fast key-value storage with per-key expiry. Holds the quota admission
//! counters, the windowed usage counters, daily cost totals, upgrade flags
//! and the per-identity error history.
//!
//! Two implementations are provided: [`MemoryCounterStore`] for single-node
//! deployments and tests, and [`RedisCounterStore`] for shared state.

pub mod keys;
pub mod memory;
pub mod redis;

use async_trait::async_trait;
use thiserror::Error;

pub use self::memory::MemoryCounterStore;
pub use self::redis::RedisCounterStore;

/// Storage failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("key {0} holds a value of the wrong type")]
    WrongType(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result of an atomic check-and-increment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    /// Whether the increment happened
    pub admitted: bool,
    /// Counter value after the operation
    pub current: i64,
}

/// Key-value store with per-key expiry
///
/// Absent and expired keys read as `None`; counters start from zero. The
/// expiry of a counter is set when the key is created and is not extended by
/// later increments, so a counter lives exactly as long as its window.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Backend name for logs and health output
    fn backend(&self) -> &'static str;

    /// Add `amount` to an integer counter and return the new value
    async fn increment_with_expiry(
        &self,
        key: &str,
        amount: i64,
        ttl_seconds: u64,
    ) -> Result<i64, StoreError>;

    /// Add `amount` to a float counter and return the new value
    async fn increment_float_with_expiry(
        &self,
        key: &str,
        amount: f64,
        ttl_seconds: u64,
    ) -> Result<f64, StoreError>;

    /// Increment by one only while the counter is below `limit`
    ///
    /// The read and the increment happen as a single atomic step per key.
    async fn increment_below(
        &self,
        key: &str,
        limit: i64,
        ttl_seconds: u64,
    ) -> Result<Admission, StoreError>;

    /// Read an integer counter
    async fn get(&self, key: &str) -> Result<Option<i64>, StoreError>;

    /// Read a float counter
    async fn get_float(&self, key: &str) -> Result<Option<f64>, StoreError>;

    /// Store a string value that expires after `ttl_seconds`
    async fn set_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: u64,
    ) -> Result<(), StoreError>;

    /// Read and delete a string value
    async fn take(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Push to the front of a list and trim it to `cap` entries
    async fn push_capped(&self, key: &str, value: &str, cap: usize) -> Result<(), StoreError>;

    /// Read a list, newest first
    async fn list(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// Connectivity check
    async fn ping(&self) -> Result<(), StoreError>;
}
