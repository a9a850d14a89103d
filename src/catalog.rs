//! Model catalog
//!
//! Public model ids accepted by the gateway, the provider model each one
//! resolves to, and the minimum tier that lists it.

use serde::Serialize;

use crate::tiers::Tier;

/// One servable model
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelEntry {
    pub id: String,
    pub provider_model: String,
    pub owned_by: String,
    pub min_tier: Tier,
}

impl ModelEntry {
    fn new(id: &str, provider_model: &str, owned_by: &str, min_tier: Tier) -> Self {
        Self {
            id: id.to_string(),
            provider_model: provider_model.to_string(),
            owned_by: owned_by.to_string(),
            min_tier,
        }
    }

    pub fn available_to(&self, tier: Tier) -> bool {
        tier >= self.min_tier
    }
}

/// Known models
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    models: Vec<ModelEntry>,
}

impl ModelCatalog {
    pub fn new(models: Vec<ModelEntry>) -> Self {
        Self { models }
    }

    /// Look up a public model id
    pub fn resolve(&self, model: &str) -> Option<&ModelEntry> {
        self.models.iter().find(|m| m.id == model)
    }

    /// Models listed for `tier`, in catalog order
    pub fn available_to(&self, tier: Tier) -> Vec<&ModelEntry> {
        self.models.iter().filter(|m| m.available_to(tier)).collect()
    }

    pub fn all(&self) -> &[ModelEntry] {
        &self.models
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::new(vec![
            ModelEntry::new("free-gemini-flash", "gemini/gemini-2.5-flash", "google", Tier::Free),
            ModelEntry::new("free-gemini-pro", "gemini/gemini-pro", "google", Tier::Free),
            ModelEntry::new(
                "free-deepseek",
                "openrouter/deepseek/deepseek-chat-v3-0324:free",
                "deepseek",
                Tier::Free,
            ),
            ModelEntry::new("scalix-engine", "openai-compatible/scalix-engine", "scalix", Tier::Pro),
            ModelEntry::new("scalix-gateway", "openai-compatible/scalix-gateway", "scalix", Tier::Pro),
            ModelEntry::new("gpt-4", "gpt-4", "openai", Tier::Pro),
            ModelEntry::new("claude-3-opus", "claude-3-opus-20240229", "anthropic", Tier::Pro),
        ])
    }
}
