//! Prometheus metrics
//!
//! The recorder is installed once at startup; until then every `record_*`
//! helper is a no-op and `/metrics` answers 503.

use std::sync::OnceLock;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder
pub fn init_metrics() -> Option<PrometheusHandle> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Some(handle.clone());
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            let _ = PROMETHEUS_HANDLE.set(handle.clone());
            Some(handle)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install Prometheus recorder");
            None
        }
    }
}

/// GET /metrics
pub async fn metrics_handler() -> impl IntoResponse {
    match PROMETHEUS_HANDLE.get() {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Metrics recorder not initialized".to_string(),
        ),
    }
}

pub fn record_chat_request(company: &str, intent: &str) {
    metrics::counter!(
        "helpdesk_chat_requests_total",
        "company" => company.to_string(),
        "intent" => intent.to_string()
    )
    .increment(1);
}

pub fn record_completion_latency(latency: Duration) {
    metrics::histogram!("helpdesk_completion_latency_seconds").record(latency.as_secs_f64());
}

pub fn record_completion_error(kind: &'static str) {
    metrics::counter!("helpdesk_completion_errors_total", "kind" => kind).increment(1);
}

pub fn record_archive_failure(sheet: &str) {
    metrics::counter!("helpdesk_archive_failures_total", "sheet" => sheet.to_string()).increment(1);
}

pub fn record_feedback(escalated: bool) {
    metrics::counter!(
        "helpdesk_feedback_total",
        "escalated" => if escalated { "yes" } else { "no" }
    )
    .increment(1);
}
