//! Models endpoint
//!
//! Lists the catalog models available to a caller's tier.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{error::AppResult, gateway::types::DEFAULT_IDENTITY, tiers::Tier, AppState};

/// Model information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    pub id: String,
    pub object: String,
    pub owned_by: String,
    pub min_tier: Tier,
}

/// Models list response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsResponse {
    pub object: String,
    pub tier: Tier,
    pub data: Vec<Model>,
}

#[derive(Debug, Deserialize)]
pub struct ModelsQuery {
    pub user: Option<String>,
}

/// List models available to `?user=`
///
/// Without a user the anonymous identity is assumed, which resolves to Free.
pub async fn list_models(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ModelsQuery>,
) -> AppResult<(StatusCode, Json<ModelsResponse>)> {
    let identity = query.user.as_deref().unwrap_or(DEFAULT_IDENTITY);
    let tier = state.tiers.resolve(identity);

    let data = state
        .catalog
        .available_to(tier)
        .into_iter()
        .map(|entry| Model {
            id: entry.id.clone(),
            object: "model".to_string(),
            owned_by: entry.owned_by.clone(),
            min_tier: entry.min_tier,
        })
        .collect();

    Ok((
        StatusCode::OK,
        Json(ModelsResponse {
            object: "list".to_string(),
            tier,
            data,
        }),
    ))
}
