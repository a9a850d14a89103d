//! Service tiers
//!
//! Maps a caller identity to a [`Tier`] and a tier to its [`TierLimits`].

pub mod limits;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

pub use limits::{TierLimits, TierPolicy};

/// Service tier
///
/// Ordered so that `Free < Pro`; a model whose minimum tier is `t` is
/// available to every tier `>= t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    #[default]
    Free,
    Pro,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Pro => "pro",
        }
    }

    /// Parse a stored tier name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "free" => Some(Tier::Free),
            "pro" => Some(Tier::Pro),
            _ => None,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolves the tier of a caller
///
/// Resolution is infallible: anything not recognized as a paying account is
/// [`Tier::Free`].
pub trait TierResolver: Send + Sync {
    fn resolve(&self, identity: &str) -> Tier;
}

/// Identity-prefix and allowlist tier rule
#[derive(Debug, Clone)]
pub struct PrefixTierResolver {
    prefixes: Vec<String>,
    allowlist: HashSet<String>,
}

impl PrefixTierResolver {
    pub fn new(prefixes: Vec<String>, allowlist: impl IntoIterator<Item = String>) -> Self {
        Self {
            prefixes: prefixes.into_iter().filter(|p| !p.is_empty()).collect(),
            allowlist: allowlist.into_iter().collect(),
        }
    }
}

impl Default for PrefixTierResolver {
    fn default() -> Self {
        Self::new(vec!["scalix_".to_string()], Vec::new())
    }
}

impl TierResolver for PrefixTierResolver {
    fn resolve(&self, identity: &str) -> Tier {
        let is_pro = self.allowlist.contains(identity)
            || self.prefixes.iter().any(|p| identity.starts_with(p.as_str()));
        if is_pro {
            Tier::Pro
        } else {
            Tier::Free
        }
    }
}
