//! Configuration management for the gateway
//!
//! Configuration is loaded from environment variables.

use anyhow::{bail, Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::tiers::TierLimits;

/// Counter store and ledger implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Process-local maps; state is lost on restart
    Memory,
    Redis,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "redis" => Ok(StoreBackend::Redis),
            other => bail!("unknown store backend '{}', expected 'memory' or 'redis'", other),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,

    pub store_backend: StoreBackend,
    /// Redis connection URL, required for the Redis backend
    pub redis_url: Option<String>,
    /// How often the memory store drops expired keys
    pub memory_sweep_seconds: u64,

    /// Accepted bearer API keys
    pub api_keys: Vec<String>,

    /// Identity prefixes resolved as Pro
    pub pro_identity_prefixes: Vec<String>,
    /// Identities resolved as Pro regardless of prefix
    pub pro_identities: Vec<String>,

    pub free_daily_request_limit: u64,
    pub free_hourly_request_limit: u64,
    pub free_daily_token_limit: u64,

    /// OpenAI-compatible backend base URL; the echo backend is used when unset
    pub backend_url: Option<String>,
    pub backend_api_key: Option<String>,
    pub backend_timeout_seconds: u64,

    pub upgrade_prompt_ttl_seconds: u64,
    pub cost_retention_days: u64,
    /// Per-identity error history length
    pub error_history_len: usize,
}

/// Split a comma-separated list, dropping empty items
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());
        let optional = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let store_backend: StoreBackend = var("STORE_BACKEND", "memory")
            .parse()
            .context("Invalid STORE_BACKEND")?;
        let redis_url = optional("REDIS_URL");
        if store_backend == StoreBackend::Redis && redis_url.is_none() {
            bail!("REDIS_URL must be set when STORE_BACKEND=redis");
        }

        let api_keys = parse_list(&lookup("GATEWAY_API_KEYS").context("GATEWAY_API_KEYS must be set")?);
        if api_keys.is_empty() {
            bail!("GATEWAY_API_KEYS must contain at least one key");
        }

        Ok(Self {
            host: var("SCALIX_HOST", "0.0.0.0"),
            port: var("SCALIX_PORT", "4000")
                .parse()
                .context("Invalid SCALIX_PORT")?,

            store_backend,
            redis_url,
            memory_sweep_seconds: var("MEMORY_SWEEP_SECONDS", "300")
                .parse()
                .context("Invalid MEMORY_SWEEP_SECONDS")?,

            api_keys,

            pro_identity_prefixes: parse_list(&var("PRO_IDENTITY_PREFIXES", "scalix_")),
            pro_identities: parse_list(&var("PRO_IDENTITIES", "")),

            free_daily_request_limit: var("FREE_DAILY_REQUEST_LIMIT", "50")
                .parse()
                .context("Invalid FREE_DAILY_REQUEST_LIMIT")?,
            free_hourly_request_limit: var("FREE_HOURLY_REQUEST_LIMIT", "10")
                .parse()
                .context("Invalid FREE_HOURLY_REQUEST_LIMIT")?,
            free_daily_token_limit: var("FREE_DAILY_TOKEN_LIMIT", "10000")
                .parse()
                .context("Invalid FREE_DAILY_TOKEN_LIMIT")?,

            backend_url: optional("BACKEND_URL"),
            backend_api_key: optional("BACKEND_API_KEY"),
            backend_timeout_seconds: var("BACKEND_TIMEOUT_SECONDS", "60")
                .parse()
                .context("Invalid BACKEND_TIMEOUT_SECONDS")?,

            upgrade_prompt_ttl_seconds: var("UPGRADE_PROMPT_TTL_SECONDS", "3600")
                .parse()
                .context("Invalid UPGRADE_PROMPT_TTL_SECONDS")?,
            cost_retention_days: var("COST_RETENTION_DAYS", "30")
                .parse()
                .context("Invalid COST_RETENTION_DAYS")?,
            error_history_len: var("ERROR_HISTORY_LEN", "10")
                .parse()
                .context("Invalid ERROR_HISTORY_LEN")?,
        })
    }

    pub fn memory_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.memory_sweep_seconds.max(1))
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout_seconds)
    }

    /// Free tier quota ceilings
    pub fn free_limits(&self) -> TierLimits {
        TierLimits {
            daily_requests: Some(self.free_daily_request_limit),
            hourly_requests: Some(self.free_hourly_request_limit),
            daily_tokens: Some(self.free_daily_token_limit),
        }
    }
}
