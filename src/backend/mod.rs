//! Model-completion backends
//!
//! The gateway forwards admitted requests to a [`CompletionBackend`]. Backend
//! failures are reported as [`BackendError`]s whose messages the failure
//! classifier understands.

pub mod echo;
pub mod openai;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use echo::EchoBackend;
pub use openai::OpenAiBackend;

/// One chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Token usage reported by the backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Request sent to a backend
#[derive(Debug, Clone)]
pub struct BackendRequest {
    /// Provider model id, already resolved from the public model id
    pub provider_model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub identity: String,
}

/// Successful backend response
#[derive(Debug, Clone)]
pub struct BackendCompletion {
    pub content: String,
    pub finish_reason: String,
    pub usage: TokenUsage,
}

/// Backend failures
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("network error: {0}")]
    Transport(String),

    #[error("backend timeout after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("invalid backend response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            BackendError::Timeout(Duration::ZERO)
        } else if e.is_decode() {
            BackendError::Decode(e.to_string())
        } else {
            BackendError::Transport(e.to_string())
        }
    }
}

/// A model-completion backend
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &'static str;

    async fn complete(&self, request: &BackendRequest) -> Result<BackendCompletion, BackendError>;
}
