//! Store key layout
//!
//! Every key is namespaced under `scalix:` and, where it is windowed, carries
//! the window stamp so a new window reads from a fresh key.

/// Quota admission counter for one identity and day
pub fn quota_day(identity: &str, day: &str) -> String {
    format!("scalix:quota:{}:{}", identity, day)
}

/// Daily request counter
pub fn requests_day(identity: &str, day: &str) -> String {
    format!("scalix:usage:{}:requests:day:{}", identity, day)
}

/// Daily token counter
pub fn tokens_day(identity: &str, day: &str) -> String {
    format!("scalix:usage:{}:tokens:day:{}", identity, day)
}

/// Hourly request counter
pub fn requests_hour(identity: &str, hour: &str) -> String {
    format!("scalix:usage:{}:requests:hour:{}", identity, hour)
}

/// Hourly token counter
pub fn tokens_hour(identity: &str, hour: &str) -> String {
    format!("scalix:usage:{}:tokens:hour:{}", identity, hour)
}

/// Daily cost total
pub fn cost_day(identity: &str, day: &str) -> String {
    format!("scalix:cost:{}:{}", identity, day)
}

/// Pending upgrade prompt flag
pub fn upgrade_prompt(identity: &str) -> String {
    format!("scalix:upgrade_prompt:{}", identity)
}

/// Global error counter for one kind
pub fn error_kind_total(kind: &str) -> String {
    format!("scalix:errors:{}:total", kind)
}

/// Per-identity error counter for one kind
pub fn error_kind_for(identity: &str, kind: &str) -> String {
    format!("scalix:errors:{}:{}", identity, kind)
}

/// Bounded per-identity error history
pub fn recent_errors(identity: &str) -> String {
    format!("scalix:recent_errors:{}", identity)
}

/// Durable usage record
pub fn ledger(identity: &str) -> String {
    format!("scalix:ledger:{}", identity)
}
