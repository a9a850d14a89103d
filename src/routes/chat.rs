//! Chat completions endpoint
//!
//! Tier-aware completion API. Quota state is reported in `X-RateLimit-*`
//! headers for Free callers; degraded replies carry `X-Scalix-Degraded`.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use tracing::debug;

use crate::{
    error::{AppError, AppResult},
    gateway::CompletionRequest,
    middleware::auth::AuthenticatedClient,
    AppState,
};

/// Header set on replies produced after a backend failure
pub const DEGRADED_HEADER: &str = "x-scalix-degraded";

/// Chat completions handler
pub async fn chat_completions(
    State(state): State<Arc<AppState>>,
    Extension(client): Extension<AuthenticatedClient>,
    payload: Result<Json<CompletionRequest>, JsonRejection>,
) -> AppResult<Response> {
    let Json(request) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    debug!(
        key = %client.key_fingerprint,
        identity = %request.user,
        model = %request.model,
        "Chat completion request"
    );

    let reply = state.gateway.handle(request).await?;
    let degraded = reply.is_degraded();

    let mut response = (StatusCode::OK, Json(reply.response)).into_response();
    let headers = response.headers_mut();
    for (name, value) in reply.quota.headers() {
        headers.insert(name, value);
    }
    if degraded {
        headers.insert(
            HeaderName::from_static(DEGRADED_HEADER),
            HeaderValue::from_static("true"),
        );
    }

    Ok(response)
}
