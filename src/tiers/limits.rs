//! Per-tier quota limits

use serde::Serialize;

use super::Tier;

/// Quota ceilings for one tier; `None` means unlimited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TierLimits {
    pub daily_requests: Option<u64>,
    pub hourly_requests: Option<u64>,
    pub daily_tokens: Option<u64>,
}

impl TierLimits {
    pub fn unlimited() -> Self {
        Self {
            daily_requests: None,
            hourly_requests: None,
            daily_tokens: None,
        }
    }

    pub fn is_unlimited(&self) -> bool {
        self.daily_requests.is_none() && self.hourly_requests.is_none() && self.daily_tokens.is_none()
    }
}

impl Default for TierLimits {
    /// Free tier defaults: 50 requests/day, 10 requests/hour, 10k tokens/day
    fn default() -> Self {
        Self {
            daily_requests: Some(50),
            hourly_requests: Some(10),
            daily_tokens: Some(10_000),
        }
    }
}

/// Limits for every tier
#[derive(Debug, Clone, Copy, Default)]
pub struct TierPolicy {
    pub free: TierLimits,
}

impl TierPolicy {
    pub fn new(free: TierLimits) -> Self {
        Self { free }
    }

    pub fn limits_for(&self, tier: Tier) -> TierLimits {
        match tier {
            Tier::Free => self.free,
            Tier::Pro => TierLimits::unlimited(),
        }
    }
}
