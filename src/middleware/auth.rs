//! Authentication middleware
//!
//! Validates bearer API keys against the configured key set. Keys are held
//! and compared as SHA-256 digests.

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};

use crate::{error::AppError, AppState};

/// Authenticated client info passed to handlers
#[derive(Debug, Clone)]
pub struct AuthenticatedClient {
    /// Leading hex digits of the key digest, safe to log
    pub key_fingerprint: String,
}

/// Extract the Authorization header and return the bearer token
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header.strip_prefix("Bearer ")
}

/// SHA-256 hex digest of an API key
pub fn hash_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Accepted API keys, stored as digests
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    digests: HashSet<String>,
}

impl ApiKeys {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            digests: keys
                .into_iter()
                .filter(|k| !k.as_ref().is_empty())
                .map(|k| hash_key(k.as_ref()))
                .collect(),
        }
    }

    /// Digest of `key` if it is accepted
    pub fn verify(&self, key: &str) -> Option<String> {
        let digest = hash_key(key);
        self.digests.contains(&digest).then_some(digest)
    }

    pub fn len(&self) -> usize {
        self.digests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }
}

/// Authentication middleware
///
/// Rejects requests without an `Authorization` header (`UNAUTHORIZED`) and
/// requests whose bearer key is malformed or unknown (`INVALID_TOKEN`).
/// Accepted requests carry an [`AuthenticatedClient`] extension.
#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::Unauthorized)?;

    let token = extract_bearer_token(auth_header).ok_or(AppError::InvalidToken)?;

    let digest = match state.api_keys.verify(token) {
        Some(digest) => digest,
        None => {
            warn!("Rejected unknown API key");
            return Err(AppError::InvalidToken);
        }
    };

    let client = AuthenticatedClient {
        key_fingerprint: digest[..12].to_string(),
    };
    debug!(key = %client.key_fingerprint, "Client authenticated");

    request.extensions_mut().insert(client);

    Ok(next.run(request).await)
}
