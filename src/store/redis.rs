//! Redis counter store
//!
//! Check-and-increment and increment-with-expiry run as Lua scripts so each
//! is a single atomic step on the server.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use redis::AsyncCommands;
use tracing::instrument;

use super::{Admission, CounterStore, StoreError};

/// INCRBY, setting the expiry only when the key was just created; a zero
/// TTL leaves the key without expiry
static INCREMENT_WITH_EXPIRY: Lazy<redis::Script> = Lazy::new(|| {
    redis::Script::new(
        r#"
local value = redis.call('INCRBY', KEYS[1], ARGV[1])
if tonumber(ARGV[2]) > 0 and redis.call('TTL', KEYS[1]) == -1 then
  redis.call('EXPIRE', KEYS[1], ARGV[2])
end
return value
"#,
    )
});

/// INCRBYFLOAT, same expiry rule
static INCREMENT_FLOAT_WITH_EXPIRY: Lazy<redis::Script> = Lazy::new(|| {
    redis::Script::new(
        r#"
local value = redis.call('INCRBYFLOAT', KEYS[1], ARGV[1])
if tonumber(ARGV[2]) > 0 and redis.call('TTL', KEYS[1]) == -1 then
  redis.call('EXPIRE', KEYS[1], ARGV[2])
end
return value
"#,
    )
});

/// Returns {admitted, current}
static INCREMENT_BELOW: Lazy<redis::Script> = Lazy::new(|| {
    redis::Script::new(
        r#"
local current = tonumber(redis.call('GET', KEYS[1]) or '0')
if current >= tonumber(ARGV[1]) then
  return {0, current}
end
local value = redis.call('INCR', KEYS[1])
if redis.call('TTL', KEYS[1]) == -1 then
  redis.call('EXPIRE', KEYS[1], ARGV[2])
end
return {1, value}
"#,
    )
});

/// Redis-backed [`CounterStore`]
#[derive(Clone)]
pub struct RedisCounterStore {
    conn: redis::aio::ConnectionManager,
}

impl RedisCounterStore {
    pub fn new(conn: redis::aio::ConnectionManager) -> Self {
        Self { conn }
    }

    /// Connect to `url` and wrap the connection in a manager
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let conn = redis::aio::ConnectionManager::new(client).await?;
        Ok(Self::new(conn))
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    fn backend(&self) -> &'static str {
        "redis"
    }

    #[instrument(skip(self), level = "debug")]
    async fn increment_with_expiry(
        &self,
        key: &str,
        amount: i64,
        ttl_seconds: u64,
    ) -> Result<i64, StoreError> {
        let mut conn = self.conn.clone();
        let value: i64 = INCREMENT_WITH_EXPIRY
            .key(key)
            .arg(amount)
            .arg(ttl_seconds)
            .invoke_async(&mut conn)
            .await?;
        Ok(value)
    }

    #[instrument(skip(self), level = "debug")]
    async fn increment_float_with_expiry(
        &self,
        key: &str,
        amount: f64,
        ttl_seconds: u64,
    ) -> Result<f64, StoreError> {
        let mut conn = self.conn.clone();
        let value: f64 = INCREMENT_FLOAT_WITH_EXPIRY
            .key(key)
            .arg(amount)
            .arg(ttl_seconds)
            .invoke_async(&mut conn)
            .await?;
        Ok(value)
    }

    #[instrument(skip(self), level = "debug")]
    async fn increment_below(
        &self,
        key: &str,
        limit: i64,
        ttl_seconds: u64,
    ) -> Result<Admission, StoreError> {
        let mut conn = self.conn.clone();
        let (admitted, current): (i64, i64) = INCREMENT_BELOW
            .key(key)
            .arg(limit)
            .arg(ttl_seconds)
            .invoke_async(&mut conn)
            .await?;
        Ok(Admission {
            admitted: admitted == 1,
            current,
        })
    }

    async fn get(&self, key: &str) -> Result<Option<i64>, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<i64> = conn.get(key).await?;
        Ok(value)
    }

    async fn get_float(&self, key: &str) -> Result<Option<f64>, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<f64> = conn.get(key).await?;
        Ok(value)
    }

    async fn set_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: u64,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_seconds).await?;
        Ok(())
    }

    async fn take(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("GETDEL")
            .arg(key)
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }

    async fn push_capped(&self, key: &str, value: &str, cap: usize) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let stop = cap.saturating_sub(1) as isize;
        redis::pipe()
            .atomic()
            .lpush(key, value)
            .ignore()
            .ltrim(key, 0, stop)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn list(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        let items: Vec<String> = conn.lrange(key, 0, -1).await?;
        Ok(items)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }
}
