//! Completion request and response bodies

use serde::{Deserialize, Serialize};

use crate::{
    backend::{ChatMessage, TokenUsage},
    failures::ErrorKind,
    tiers::Tier,
    upgrade::UpgradeReason,
};

/// Identity used when the request names none
pub const DEFAULT_IDENTITY: &str = "anonymous";

/// Completion length used when the request sets none
pub const DEFAULT_MAX_TOKENS: u32 = 100;

fn default_identity() -> String {
    DEFAULT_IDENTITY.to_string()
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

/// Inbound completion request
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionRequest {
    #[serde(default = "default_identity", alias = "identity")]
    pub user: String,
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default = "default_max_tokens", alias = "maxTokens")]
    pub max_tokens: u32,
}

/// One returned choice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub index: u32,
    pub message: ChatMessage,
    pub finish_reason: String,
}

/// Tier and metering facts attached to every completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierMetadata {
    pub tier: Tier,
    pub cost_usd: f64,
    pub remaining_requests: Option<u64>,
    pub upgrade_prompt: bool,
    pub upgrade_reason: Option<UpgradeReason>,
    pub degraded: bool,
    pub error_kind: Option<ErrorKind>,
}

/// Completion response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: TokenUsage,
    pub tier_metadata: TierMetadata,
}
