//! Local echo backend
//!
//! Answers every request with a canned reply; token counts are word counts.
//! Used when no backend URL is configured.

use async_trait::async_trait;

use super::{BackendCompletion, BackendError, BackendRequest, CompletionBackend, TokenUsage};

fn word_count(text: &str) -> u64 {
    text.split_whitespace().count() as u64
}

/// Canned-reply backend
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoBackend;

#[async_trait]
impl CompletionBackend for EchoBackend {
    fn name(&self) -> &'static str {
        "echo"
    }

    async fn complete(&self, request: &BackendRequest) -> Result<BackendCompletion, BackendError> {
        let last_user = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or_default();

        let full = format!("[{}] {}", request.provider_model, last_user);
        let content = full
            .split_whitespace()
            .take(request.max_tokens as usize)
            .collect::<Vec<_>>()
            .join(" ");
        let finish_reason = if word_count(&full) > u64::from(request.max_tokens) {
            "length"
        } else {
            "stop"
        };

        let prompt_tokens = request.messages.iter().map(|m| word_count(&m.content)).sum();
        let completion_tokens = word_count(&content);

        Ok(BackendCompletion {
            content,
            finish_reason: finish_reason.to_string(),
            usage: TokenUsage::new(prompt_tokens, completion_tokens),
        })
    }
}
