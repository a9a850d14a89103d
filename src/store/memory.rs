//! In-memory counter store
//!
//! Entries live in a sharded [`DashMap`]; every operation on a key runs under
//! that key's shard lock, which makes check-and-increment atomic per key
//! while different identities proceed in parallel.
//!
//! Window keys carry their day or hour stamp, so expired entries are never
//! touched again once their window closes. [`MemoryCounterStore::spawn_sweeper`]
//! removes them periodically.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use super::{Admission, CounterStore, StoreError};

#[derive(Debug, Clone)]
enum Slot {
    Int(i64),
    Float(f64),
    Text(String),
    List(VecDeque<String>),
}

#[derive(Debug)]
struct Entry {
    slot: Slot,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(slot: Slot, ttl_seconds: u64) -> Self {
        let expires_at = if ttl_seconds > 0 {
            Some(Instant::now() + Duration::from_secs(ttl_seconds))
        } else {
            None
        };
        Self { slot, expires_at }
    }

    fn is_expired(&self) -> bool {
        self.expires_at
            .map(|exp| Instant::now() >= exp)
            .unwrap_or(false)
    }
}

/// In-memory [`CounterStore`]
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    data: DashMap<String, Entry>,
    offline: AtomicBool,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail with [`StoreError::Unavailable`]
    ///
    /// Lets tests exercise the fail-open and fallback paths.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        self.data.iter().filter(|e| !e.is_expired()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired entry, returning how many were removed
    pub fn sweep_expired(&self) -> usize {
        let before = self.data.len();
        self.data.retain(|_, entry| !entry.is_expired());
        before.saturating_sub(self.data.len())
    }

    /// Sweep expired entries every `every` until the store is dropped
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                let Some(store) = weak.upgrade() else {
                    break;
                };
                let removed = store.sweep_expired();
                if removed > 0 {
                    debug!(removed, "Swept expired counter entries");
                }
            }
        })
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory store offline".to_string()))
        } else {
            Ok(())
        }
    }

    /// Run `f` against the live entry for `key`, creating it with `init` when
    /// absent or expired
    fn with_entry<T>(
        &self,
        key: &str,
        init: Slot,
        ttl_seconds: u64,
        f: impl FnOnce(&mut Entry) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut entry = self
            .data
            .entry(key.to_string())
            .or_insert_with(|| Entry::new(init.clone(), ttl_seconds));
        if entry.is_expired() {
            *entry = Entry::new(init, ttl_seconds);
        }
        f(&mut entry)
    }

    fn read_slot(&self, key: &str) -> Option<Slot> {
        self.data
            .get(key)
            .filter(|e| !e.is_expired())
            .map(|e| e.slot.clone())
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn increment_with_expiry(
        &self,
        key: &str,
        amount: i64,
        ttl_seconds: u64,
    ) -> Result<i64, StoreError> {
        self.ensure_online()?;
        self.with_entry(key, Slot::Int(0), ttl_seconds, |entry| match entry.slot {
            Slot::Int(current) => {
                let next = current + amount;
                entry.slot = Slot::Int(next);
                Ok(next)
            }
            _ => Err(StoreError::WrongType(key.to_string())),
        })
    }

    async fn increment_float_with_expiry(
        &self,
        key: &str,
        amount: f64,
        ttl_seconds: u64,
    ) -> Result<f64, StoreError> {
        self.ensure_online()?;
        self.with_entry(key, Slot::Float(0.0), ttl_seconds, |entry| {
            let current = match entry.slot {
                Slot::Float(v) => v,
                Slot::Int(v) => v as f64,
                _ => return Err(StoreError::WrongType(key.to_string())),
            };
            let next = current + amount;
            entry.slot = Slot::Float(next);
            Ok(next)
        })
    }

    async fn increment_below(
        &self,
        key: &str,
        limit: i64,
        ttl_seconds: u64,
    ) -> Result<Admission, StoreError> {
        self.ensure_online()?;
        self.with_entry(key, Slot::Int(0), ttl_seconds, |entry| match entry.slot {
            Slot::Int(current) if current >= limit => Ok(Admission {
                admitted: false,
                current,
            }),
            Slot::Int(current) => {
                entry.slot = Slot::Int(current + 1);
                Ok(Admission {
                    admitted: true,
                    current: current + 1,
                })
            }
            _ => Err(StoreError::WrongType(key.to_string())),
        })
    }

    async fn get(&self, key: &str) -> Result<Option<i64>, StoreError> {
        self.ensure_online()?;
        match self.read_slot(key) {
            None => Ok(None),
            Some(Slot::Int(v)) => Ok(Some(v)),
            Some(Slot::Float(v)) => Ok(Some(v as i64)),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    async fn get_float(&self, key: &str) -> Result<Option<f64>, StoreError> {
        self.ensure_online()?;
        match self.read_slot(key) {
            None => Ok(None),
            Some(Slot::Float(v)) => Ok(Some(v)),
            Some(Slot::Int(v)) => Ok(Some(v as f64)),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    async fn set_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: u64,
    ) -> Result<(), StoreError> {
        self.ensure_online()?;
        self.data.insert(
            key.to_string(),
            Entry::new(Slot::Text(value.to_string()), ttl_seconds),
        );
        Ok(())
    }

    async fn take(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.ensure_online()?;
        match self.data.remove(key) {
            Some((_, entry)) if !entry.is_expired() => match entry.slot {
                Slot::Text(v) => Ok(Some(v)),
                Slot::Int(v) => Ok(Some(v.to_string())),
                Slot::Float(v) => Ok(Some(v.to_string())),
                Slot::List(_) => Err(StoreError::WrongType(key.to_string())),
            },
            _ => Ok(None),
        }
    }

    async fn push_capped(&self, key: &str, value: &str, cap: usize) -> Result<(), StoreError> {
        self.ensure_online()?;
        self.with_entry(key, Slot::List(VecDeque::new()), 0, |entry| match &mut entry.slot {
            Slot::List(items) => {
                items.push_front(value.to_string());
                items.truncate(cap);
                Ok(())
            }
            _ => Err(StoreError::WrongType(key.to_string())),
        })
    }

    async fn list(&self, key: &str) -> Result<Vec<String>, StoreError> {
        self.ensure_online()?;
        match self.read_slot(key) {
            None => Ok(Vec::new()),
            Some(Slot::List(items)) => Ok(items.into_iter().collect()),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.ensure_online()
    }
}
