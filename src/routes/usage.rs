//! Usage reporting endpoints
//!
//! - `/v1/usage/:identity` - Live counters, ledger record, cost and limits
//! - `/v1/upgrade-prompt/:identity` - Read-once upgrade prompt flag

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    error::{AppError, AppResult},
    failures::ErrorRecord,
    ledger::UsageRecord,
    tiers::{Tier, TierLimits},
    upgrade::{prompt_reason, UpgradeReason},
    usage::UsageCounter,
    AppState,
};

/// Usage statistics for one identity
///
/// Reporting is best effort: a section whose store is unreachable is
/// reported as `null` (or empty) instead of failing the whole response.
#[derive(Debug, Serialize)]
pub struct UsageStatsResponse {
    pub identity: String,
    pub tier: Tier,
    pub usage: UsageCounter,
    pub ledger: Option<UsageRecord>,
    pub cost_today_usd: Option<f64>,
    pub limits: TierLimits,
    pub upgrade_recommended: bool,
    pub upgrade_reason: Option<UpgradeReason>,
    pub recent_errors: Vec<ErrorRecord>,
}

/// Upgrade prompt flag, cleared on read
#[derive(Debug, Serialize, Deserialize)]
pub struct UpgradePromptResponse {
    pub identity: String,
    pub upgrade_prompt: bool,
    pub reason: Option<UpgradeReason>,
}

fn non_empty(identity: &str) -> AppResult<&str> {
    let identity = identity.trim();
    if identity.is_empty() {
        return Err(AppError::BadRequest("identity must not be empty".to_string()));
    }
    Ok(identity)
}

/// Usage statistics handler
pub async fn usage_stats(
    State(state): State<Arc<AppState>>,
    Path(identity): Path<String>,
) -> AppResult<(StatusCode, Json<UsageStatsResponse>)> {
    let identity = non_empty(&identity)?;
    let tier = state.tiers.resolve(identity);
    let limits = state.policy.limits_for(tier);

    let (usage, ledger, cost, errors) = tokio::join!(
        state.usage.current_usage(identity),
        state.usage.ledger_usage(identity),
        state.costs.daily_cost(identity),
        state.failures.recent_errors(identity),
    );

    let ledger = ledger
        .map_err(|e| warn!(identity = %identity, error = %e, "Ledger read failed"))
        .ok();
    let cost_today_usd = cost
        .map_err(|e| warn!(identity = %identity, error = %e, "Cost read failed"))
        .ok();
    let recent_errors = errors
        .map_err(|e| warn!(identity = %identity, error = %e, "Error history read failed"))
        .unwrap_or_default();

    let upgrade_reason = prompt_reason(&usage, &limits);

    Ok((
        StatusCode::OK,
        Json(UsageStatsResponse {
            identity: identity.to_string(),
            tier,
            usage,
            ledger,
            cost_today_usd,
            limits,
            upgrade_recommended: upgrade_reason.is_some(),
            upgrade_reason,
            recent_errors,
        }),
    ))
}

/// Upgrade prompt handler
pub async fn upgrade_prompt(
    State(state): State<Arc<AppState>>,
    Path(identity): Path<String>,
) -> AppResult<(StatusCode, Json<UpgradePromptResponse>)> {
    let identity = non_empty(&identity)?;
    let reason = state.upgrades.take(identity).await?;

    Ok((
        StatusCode::OK,
        Json(UpgradePromptResponse {
            identity: identity.to_string(),
            upgrade_prompt: reason.is_some(),
            reason,
        }),
    ))
}
