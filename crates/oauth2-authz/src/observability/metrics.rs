//! Metrics definitions for the OAuth2 authorization service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `authz_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `method`: HTTP methods
//! - `endpoint`: known routes, everything else is `/other`
//! - `outcome`: permit, missing_token, invalid_token, insufficient_scope, error
//! - `result`: hit, miss
//! - `status`: valid, invalid, error
//!
//! Tokens never appear in labels.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus recorder and return the handle used to
/// serve `/metrics`.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("authz_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // Remote validation includes up to two upstream round trips
        .set_buckets_for_metric(
            Matcher::Prefix("authz_token_validation".to_string()),
            &[
                0.010, 0.025, 0.050, 0.100, 0.200, 0.500, 1.000, 2.000, 5.000, 10.000,
            ],
        )
        .map_err(|e| format!("Failed to set token validation buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `authz_http_requests_total`, `authz_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("authz_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("authz_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Normalize endpoint path to prevent label cardinality explosion
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/" => "/",
        "/health" => "/health",
        "/metrics" => "/metrics",
        "/api/v1/me" => "/api/v1/me",
        _ => "/other",
    }
}

// ============================================================================
// Authorization Metrics
// ============================================================================

/// Record an authorization decision
///
/// Metric: `authz_decisions_total`
/// Labels: `outcome`
pub fn record_authorization(outcome: &'static str) {
    counter!("authz_decisions_total", "outcome" => outcome).increment(1);
}

/// Record a validation cache lookup
///
/// Metric: `authz_token_cache_lookups_total`
/// Labels: `result`
pub fn record_token_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("authz_token_cache_lookups_total", "result" => result).increment(1);
}

/// Set current number of cached validation results
///
/// Metric: `authz_token_cache_entries`
pub fn set_token_cache_entries(count: usize) {
    gauge!("authz_token_cache_entries").set(count as f64);
}

/// Record a remote token validation
///
/// Metric: `authz_token_validations_total`, `authz_token_validation_duration_seconds`
/// Labels: `status`
pub fn record_token_validation(status: &'static str, duration: Duration) {
    histogram!("authz_token_validation_duration_seconds", "status" => status)
        .record(duration.as_secs_f64());
    counter!("authz_token_validations_total", "status" => status).increment(1);
}
