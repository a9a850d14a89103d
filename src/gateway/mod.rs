//! Request gateway
//!
//! Drives one completion request through tier resolution, the quota gate,
//! the backend call and metering:
//!
//! ```text
//! Received -> TierResolved -> QuotaChecked --Denied--> 429
//!                                 |
//!                              Allowed -> Forwarded --Failed--> Classified -> degraded 200
//!                                             |
//!                                         Succeeded -> Metered -> 200
//! ```
//!
//! Nothing is retried. Metering runs in its own task once the backend has
//! answered, so a caller that disconnects mid-request cannot leave it
//! half-written.

pub mod types;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::{
    backend::{BackendError, BackendRequest, ChatMessage, CompletionBackend, TokenUsage},
    catalog::ModelCatalog,
    clock::SharedClock,
    cost::CostCalculator,
    error::{AppError, AppResult},
    failures::{ErrorClassifier, ErrorContext, ErrorKind},
    quota::{QuotaAllowance, QuotaDecision, QuotaEnforcer},
    routes::metrics,
    tiers::{Tier, TierPolicy, TierResolver},
    upgrade::{prompt_reason, UpgradePrompts, UpgradeReason},
    usage::UsageRecorder,
};

pub use types::{ChatCompletionResponse, Choice, CompletionRequest, TierMetadata};

/// Reply body served when the backend fails
pub const DEGRADED_REPLY: &str =
    "The model is temporarily unavailable. Your request was not completed; please try again shortly.";

/// Gateway result plus the quota state used for response headers
#[derive(Debug, Clone)]
pub struct GatewayReply {
    pub response: ChatCompletionResponse,
    pub quota: QuotaAllowance,
}

impl GatewayReply {
    pub fn is_degraded(&self) -> bool {
        self.response.tier_metadata.degraded
    }
}

/// Metering facts produced after a successful completion
#[derive(Debug, Clone, Copy)]
struct MeterOutcome {
    cost_usd: f64,
    upgrade_reason: Option<UpgradeReason>,
}

/// Post-completion bookkeeping, detached from the request task
#[derive(Clone)]
struct Meter {
    usage: Arc<UsageRecorder>,
    costs: Arc<CostCalculator>,
    upgrades: Arc<UpgradePrompts>,
    failures: Arc<ErrorClassifier>,
    policy: TierPolicy,
}

impl Meter {
    async fn run(self, identity: String, tier: Tier, model: String, tokens: u64) -> MeterOutcome {
        let context = ErrorContext::for_tier(tier);

        let recorded = self.usage.record(&identity, tier, &model, tokens).await;
        for failure in &recorded.failures {
            self.failures
                .record_storage_failure(
                    &identity,
                    &model,
                    failure.sink.as_str(),
                    &failure.error,
                    context,
                )
                .await;
        }

        let cost_usd = self.costs.price(&model, tokens);
        if let Err(e) = self.costs.track_cost(&identity, cost_usd).await {
            self.failures
                .record_storage_failure(&identity, &model, "cost", &e, context)
                .await;
        }

        let usage = self.usage.current_usage(&identity).await;
        let upgrade_reason = prompt_reason(&usage, &self.policy.limits_for(tier));
        if let Some(reason) = upgrade_reason {
            if let Err(e) = self.upgrades.flag(&identity, reason).await {
                self.failures
                    .record_storage_failure(&identity, &model, "upgrade_prompt", &e, context)
                    .await;
            }
        }

        MeterOutcome {
            cost_usd,
            upgrade_reason,
        }
    }
}

/// Components the gateway orchestrates
pub struct GatewayParts {
    pub tiers: Arc<dyn TierResolver>,
    pub quota: Arc<QuotaEnforcer>,
    pub usage: Arc<UsageRecorder>,
    pub costs: Arc<CostCalculator>,
    pub failures: Arc<ErrorClassifier>,
    pub upgrades: Arc<UpgradePrompts>,
    pub backend: Arc<dyn CompletionBackend>,
    pub catalog: Arc<ModelCatalog>,
    pub policy: TierPolicy,
    pub clock: SharedClock,
    pub backend_timeout: Duration,
}

/// Completion request orchestrator
pub struct RequestGateway {
    tiers: Arc<dyn TierResolver>,
    quota: Arc<QuotaEnforcer>,
    failures: Arc<ErrorClassifier>,
    backend: Arc<dyn CompletionBackend>,
    catalog: Arc<ModelCatalog>,
    clock: SharedClock,
    backend_timeout: Duration,
    meter: Meter,
}

impl RequestGateway {
    pub fn new(parts: GatewayParts) -> Self {
        let meter = Meter {
            usage: parts.usage,
            costs: parts.costs,
            upgrades: parts.upgrades,
            failures: parts.failures.clone(),
            policy: parts.policy,
        };
        Self {
            tiers: parts.tiers,
            quota: parts.quota,
            failures: parts.failures,
            backend: parts.backend,
            catalog: parts.catalog,
            clock: parts.clock,
            backend_timeout: parts.backend_timeout,
            meter,
        }
    }

    /// Serve one completion request
    #[instrument(skip(self, request), fields(identity = %request.user, model = %request.model))]
    pub async fn handle(&self, request: CompletionRequest) -> AppResult<GatewayReply> {
        let started = Instant::now();

        let identity = request.user.trim().to_string();
        if identity.is_empty() {
            return Err(AppError::BadRequest("user must not be empty".to_string()));
        }
        if request.messages.is_empty() {
            return Err(AppError::BadRequest("messages must not be empty".to_string()));
        }

        let entry = self
            .catalog
            .resolve(&request.model)
            .ok_or_else(|| AppError::NotFound(format!("Model '{}' not found", request.model)))?;

        let tier = self.tiers.resolve(&identity);

        let quota = match self.quota.check_and_reserve(&identity, tier, &request.model).await {
            QuotaDecision::Allowed(allowance) => allowance,
            QuotaDecision::Denied(denial) => {
                metrics::record_request(
                    "denied",
                    tier.as_str(),
                    &request.model,
                    started.elapsed().as_secs_f64(),
                );
                return Err(AppError::QuotaDenied(denial));
            }
        };

        let backend_request = BackendRequest {
            provider_model: entry.provider_model.clone(),
            messages: request.messages.clone(),
            max_tokens: request.max_tokens,
            identity: identity.clone(),
        };

        let result = match tokio::time::timeout(
            self.backend_timeout,
            self.backend.complete(&backend_request),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout(self.backend_timeout)),
        };

        let response = match result {
            Ok(completion) => {
                let tokens = completion.usage.total_tokens;
                let metering = tokio::spawn(self.meter.clone().run(
                    identity.clone(),
                    tier,
                    request.model.clone(),
                    tokens,
                ));
                let metered = match metering.await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        error!(identity = %identity, error = %e, "Metering task failed");
                        MeterOutcome {
                            cost_usd: self.meter.costs.price(&request.model, tokens),
                            upgrade_reason: None,
                        }
                    }
                };

                metrics::record_tokens(&completion.usage, &request.model);
                metrics::record_request(
                    "success",
                    tier.as_str(),
                    &request.model,
                    started.elapsed().as_secs_f64(),
                );
                info!(
                    identity = %identity,
                    tier = %tier,
                    model = %request.model,
                    total_tokens = tokens,
                    cost_usd = metered.cost_usd,
                    "Completion served"
                );

                self.build_response(
                    &request.model,
                    completion.content,
                    completion.finish_reason,
                    completion.usage,
                    TierMetadata {
                        tier,
                        cost_usd: metered.cost_usd,
                        remaining_requests: quota.remaining,
                        upgrade_prompt: metered.upgrade_reason.is_some(),
                        upgrade_reason: metered.upgrade_reason,
                        degraded: false,
                        error_kind: None,
                    },
                )
            }
            Err(e) => {
                let kind = self
                    .failures
                    .handle(&identity, &request.model, &e.to_string(), ErrorContext::for_tier(tier))
                    .await;
                metrics::record_request(
                    "degraded",
                    tier.as_str(),
                    &request.model,
                    started.elapsed().as_secs_f64(),
                );

                let upgrade_reason =
                    (kind == ErrorKind::QuotaExceeded).then_some(UpgradeReason::QuotaExceeded);
                self.build_response(
                    &request.model,
                    DEGRADED_REPLY.to_string(),
                    "error".to_string(),
                    TokenUsage::default(),
                    TierMetadata {
                        tier,
                        cost_usd: 0.0,
                        remaining_requests: quota.remaining,
                        upgrade_prompt: upgrade_reason.is_some(),
                        upgrade_reason,
                        degraded: true,
                        error_kind: Some(kind),
                    },
                )
            }
        };

        Ok(GatewayReply { response, quota })
    }

    fn build_response(
        &self,
        model: &str,
        content: String,
        finish_reason: String,
        usage: TokenUsage,
        tier_metadata: TierMetadata,
    ) -> ChatCompletionResponse {
        ChatCompletionResponse {
            id: format!("chatcmpl-{}", Uuid::new_v4().simple()),
            object: "chat.completion".to_string(),
            created: self.clock.now().timestamp(),
            model: model.to_string(),
            choices: vec![Choice {
                index: 0,
                message: ChatMessage {
                    role: "assistant".to_string(),
                    content,
                },
                finish_reason,
            }],
            usage,
            tier_metadata,
        }
    }
}
