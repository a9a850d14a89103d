//! Fixed calendar windows
//!
//! Daily windows are UTC calendar days, hourly windows are UTC calendar
//! hours. A window is identified by a stamp string that becomes part of the
//! counter key, so a new window always starts from an absent (zero) counter.

use chrono::{DateTime, Duration, DurationRound, Utc};

/// Lifetime of a daily counter in seconds
pub const DAY_TTL_SECONDS: u64 = 86_400;

/// Lifetime of an hourly counter in seconds
pub const HOUR_TTL_SECONDS: u64 = 3_600;

/// Stamp for the UTC day containing `now`, e.g. `2025-03-01`
pub fn day_stamp(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d").to_string()
}

/// Stamp for the UTC hour containing `now`, e.g. `2025-03-01T13`
pub fn hour_stamp(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%dT%H").to_string()
}

/// Start of the next UTC day
pub fn next_day_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let today = now
        .duration_trunc(Duration::days(1))
        .unwrap_or(now);
    today + Duration::days(1)
}

/// Whole seconds until the daily window resets (at least 1)
pub fn seconds_until_next_day(now: DateTime<Utc>) -> u64 {
    (next_day_start(now) - now).num_seconds().max(1) as u64
}
