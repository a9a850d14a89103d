//! Redis usage ledger
//!
//! Each record is a hash at `scalix:ledger:{identity}`. The upsert runs as a
//! Lua script so the window rollover and the increments land together.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use redis::AsyncCommands;
use tracing::instrument;

use super::{UsageDelta, UsageLedger, UsageRecord};
use crate::store::{keys, StoreError};
use crate::tiers::Tier;
use crate::usage::window::{day_stamp, hour_stamp};

/// ARGV: day, hour, requests, tokens, tier, timestamp
static UPSERT_ADD: Lazy<redis::Script> = Lazy::new(|| {
    redis::Script::new(
        r#"
local key = KEYS[1]
if redis.call('HGET', key, 'day') ~= ARGV[1] then
  redis.call('HSET', key, 'day', ARGV[1], 'requests_today', 0, 'tokens_today', 0)
end
if redis.call('HGET', key, 'hour') ~= ARGV[2] then
  redis.call('HSET', key, 'hour', ARGV[2], 'requests_this_hour', 0)
end
redis.call('HINCRBY', key, 'requests_today', ARGV[3])
redis.call('HINCRBY', key, 'tokens_today', ARGV[4])
redis.call('HINCRBY', key, 'requests_this_hour', ARGV[3])
redis.call('HINCRBY', key, 'total_requests', ARGV[3])
redis.call('HINCRBY', key, 'total_tokens', ARGV[4])
redis.call('HSET', key, 'tier', ARGV[5], 'last_request_timestamp', ARGV[6])
return 1
"#,
    )
});

/// Redis-backed [`UsageLedger`]
#[derive(Clone)]
pub struct RedisLedger {
    conn: redis::aio::ConnectionManager,
}

impl RedisLedger {
    pub fn new(conn: redis::aio::ConnectionManager) -> Self {
        Self { conn }
    }
}

fn parse_count(fields: &HashMap<String, String>, name: &str) -> u64 {
    fields
        .get(name)
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

/// Build a record from the stored hash fields
fn record_from_fields(identity: &str, fields: &HashMap<String, String>) -> UsageRecord {
    UsageRecord {
        identity: identity.to_string(),
        tier: fields.get("tier").and_then(|t| Tier::from_name(t)),
        requests_today: parse_count(fields, "requests_today"),
        tokens_today: parse_count(fields, "tokens_today"),
        requests_this_hour: parse_count(fields, "requests_this_hour"),
        total_requests: parse_count(fields, "total_requests"),
        total_tokens: parse_count(fields, "total_tokens"),
        last_request_timestamp: fields
            .get("last_request_timestamp")
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|ts| ts.with_timezone(&Utc)),
        ..UsageRecord::default()
    }
    .with_windows(fields.get("day").cloned(), fields.get("hour").cloned())
}

#[async_trait]
impl UsageLedger for RedisLedger {
    fn backend(&self) -> &'static str {
        "redis"
    }

    #[instrument(skip(self, delta), fields(tokens = delta.tokens))]
    async fn upsert_add(
        &self,
        identity: &str,
        delta: &UsageDelta,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        UPSERT_ADD
            .key(keys::ledger(identity))
            .arg(day_stamp(at))
            .arg(hour_stamp(at))
            .arg(delta.requests)
            .arg(delta.tokens)
            .arg(delta.tier.as_str())
            .arg(at.to_rfc3339())
            .invoke_async::<_, i64>(&mut conn)
            .await?;
        Ok(())
    }

    async fn read(&self, identity: &str, now: DateTime<Utc>) -> Result<UsageRecord, StoreError> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn.hgetall(keys::ledger(identity)).await?;
        let mut record = record_from_fields(identity, &fields);
        record.roll_windows(now);
        Ok(record)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }
}
