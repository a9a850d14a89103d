//! Prometheus metrics endpoint
//!
//! Exposes gateway metrics in Prometheus format for monitoring.

use axum::response::IntoResponse;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;

use crate::backend::TokenUsage;

/// Global Prometheus handle for metrics export
static PROMETHEUS_HANDLE: Lazy<PrometheusHandle> = Lazy::new(|| {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
});

/// Initialize metrics (call once at startup)
pub fn init_metrics() {
    let _ = &*PROMETHEUS_HANDLE;

    register_metrics();
}

fn register_metrics() {
    metrics::describe_counter!(
        "scalix_requests_total",
        "Completion requests by outcome, tier and model"
    );
    metrics::describe_histogram!(
        "scalix_request_duration_seconds",
        "Completion request duration in seconds"
    );
    metrics::describe_counter!("scalix_tokens_total", "Tokens metered");
    metrics::describe_counter!(
        "scalix_quota_denials_total",
        "Requests rejected by the daily quota"
    );
    metrics::describe_counter!(
        "scalix_errors_total",
        "Classified failures by kind"
    );
    metrics::describe_counter!(
        "scalix_storage_failures_total",
        "Counter store and ledger failures by component"
    );
    metrics::describe_counter!(
        "scalix_cost_micro_usd_total",
        "Attributed cost in millionths of a dollar"
    );
}

/// Prometheus metrics endpoint handler
pub async fn prometheus_metrics() -> impl IntoResponse {
    PROMETHEUS_HANDLE.render()
}

/// Record a completion request outcome (`success`, `degraded` or `denied`)
pub fn record_request(outcome: &str, tier: &str, model: &str, duration_secs: f64) {
    metrics::counter!(
        "scalix_requests_total",
        "outcome" => outcome.to_string(),
        "tier" => tier.to_string(),
        "model" => model.to_string()
    )
    .increment(1);
    metrics::histogram!("scalix_request_duration_seconds", "model" => model.to_string())
        .record(duration_secs);
}

/// Record metered tokens
pub fn record_tokens(usage: &TokenUsage, model: &str) {
    metrics::counter!("scalix_tokens_total", "type" => "prompt", "model" => model.to_string())
        .increment(usage.prompt_tokens);
    metrics::counter!("scalix_tokens_total", "type" => "completion", "model" => model.to_string())
        .increment(usage.completion_tokens);
}

pub fn record_quota_denial(tier: &str) {
    metrics::counter!("scalix_quota_denials_total", "tier" => tier.to_string()).increment(1);
}

pub fn record_classified_error(kind: &str) {
    metrics::counter!("scalix_errors_total", "kind" => kind.to_string()).increment(1);
}

pub fn record_storage_failure(component: &str) {
    metrics::counter!("scalix_storage_failures_total", "component" => component.to_string())
        .increment(1);
}

/// Record attributed cost; negative or non-finite amounts are ignored
pub fn record_cost(amount_usd: f64) {
    if !amount_usd.is_finite() || amount_usd <= 0.0 {
        return;
    }
    let micro = (amount_usd * 1_000_000.0).round() as u64;
    metrics::counter!("scalix_cost_micro_usd_total").increment(micro);
}
