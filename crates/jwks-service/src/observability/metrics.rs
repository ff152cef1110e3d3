//! Metrics definitions for the JWKS service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `jwks_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `status`: success, error (plus `skipped` for rotation)
//! - `key_selection`: valid, expired
//! - `endpoint`: the fixed route table, everything else is `/other`
//! - `error_category`: see [`super::ErrorCategory`]

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the Prometheus recorder and return the handle `/metrics` renders.
///
/// # Errors
///
/// Returns error if a recorder is already installed in this process.
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("jwks_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.200, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // RSA signing is a few milliseconds; larger keys push it up
        .set_buckets_for_metric(
            Matcher::Prefix("jwks_token_issuance".to_string()),
            &[0.001, 0.002, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250],
        )
        .map_err(|e| format!("Failed to set token issuance buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `jwks_http_requests_total`, `jwks_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status_code`
pub fn record_http_request(method: &str, path: &str, status_code: u16, duration: Duration) {
    let endpoint = normalize_endpoint(path);

    histogram!("jwks_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => endpoint,
        "status_code" => status_code.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("jwks_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/.well-known/jwks.json" => "/.well-known/jwks.json",
        "/jwks" => "/jwks",
        "/auth" => "/auth",
        "/health" => "/health",
        "/ready" => "/ready",
        "/metrics" => "/metrics",
        _ => "/other",
    }
}

// ============================================================================
// JWKS Metrics
// ============================================================================

/// Record a JWKS document request
///
/// Metric: `jwks_requests_total`
/// Labels: `status`
pub fn record_jwks_request(status: &str) {
    counter!("jwks_requests_total", "status" => status.to_string()).increment(1);
}

// ============================================================================
// Token Metrics
// ============================================================================

/// Record token issuance duration and outcome
///
/// Metric: `jwks_token_issuance_duration_seconds`, `jwks_token_issuance_total`
/// Labels: `key_selection`, `status`
pub fn record_token_issuance(key_selection: &str, status: &str, duration: Duration) {
    histogram!("jwks_token_issuance_duration_seconds", "key_selection" => key_selection.to_string())
        .record(duration.as_secs_f64());

    counter!("jwks_token_issuance_total", "key_selection" => key_selection.to_string(), "status" => status.to_string())
        .increment(1);
}

// ============================================================================
// Key Management Metrics
// ============================================================================

/// Metric: `jwks_key_generation_total`
/// Labels: `status`
pub fn record_key_generation(status: &str) {
    counter!("jwks_key_generation_total", "status" => status.to_string()).increment(1);
}

/// Metric: `jwks_key_rotation_total`
/// Labels: `status` (success, error, skipped)
pub fn record_key_rotation(status: &str) {
    counter!("jwks_key_rotation_total", "status" => status.to_string()).increment(1);
}

/// Metric: `jwks_valid_signing_keys`
pub fn set_valid_signing_keys(count: u64) {
    gauge!("jwks_valid_signing_keys").set(count as f64);
}

// ============================================================================
// Error Metrics
// ============================================================================

/// Record error by category
///
/// Metric: `jwks_errors_total`
/// Labels: `operation`, `error_category`, `status_code`
pub fn record_error(operation: &str, error_category: &str, status_code: u16) {
    counter!("jwks_errors_total",
        "operation" => operation.to_string(),
        "error_category" => error_category.to_string(),
        "status_code" => status_code.to_string()
    )
    .increment(1);
}
