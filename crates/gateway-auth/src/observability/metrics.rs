//! Metrics definitions for the gateway auth service
//!
//! All metrics follow Prometheus naming conventions:
//! - `ga_` prefix for Gateway Auth
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `grant_type`: password, refresh_token
//! - `status`: success, rejected, error
//! - `outcome`: valid, expired, invalid, error
//! - `operation`: rotate, find, ping
//! - `path`: known routes, everything else collapses to `/other`

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the global Prometheus recorder and return the handle served at
/// `/metrics`.
///
/// Must run before any metric is recorded; fails if a recorder is already
/// installed.
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("ga_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // Password logins include a bcrypt verification
        .set_buckets_for_metric(
            Matcher::Prefix("ga_token_issuance".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500,
            ],
        )
        .map_err(|e| format!("Failed to set token issuance buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("ga_store_operation".to_string()),
            &[
                0.001, 0.002, 0.005, 0.010, 0.020, 0.050, 0.100, 0.250, 0.500, 1.000, 5.000,
            ],
        )
        .map_err(|e| format!("Failed to set store operation buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// Token Metrics
// ============================================================================

/// Record token pair issuance duration and outcome
///
/// Metric: `ga_token_issuance_duration_seconds`, `ga_token_issuance_total`
/// Labels: `grant_type`, `status`
pub fn record_token_issuance(grant_type: &str, status: &str, duration: Duration) {
    histogram!("ga_token_issuance_duration_seconds", "grant_type" => grant_type.to_string(), "status" => status.to_string())
        .record(duration.as_secs_f64());

    counter!("ga_token_issuance_total", "grant_type" => grant_type.to_string(), "status" => status.to_string())
        .increment(1);
}

/// Record a refresh token classification
///
/// Metric: `ga_refresh_validations_total`
/// Labels: `outcome`
pub fn record_refresh_validation(outcome: &str) {
    counter!("ga_refresh_validations_total", "outcome" => outcome.to_string()).increment(1);
}

// ============================================================================
// Store Metrics
// ============================================================================

/// Record a refresh token store operation
///
/// Metric: `ga_store_operation_duration_seconds`, `ga_store_operations_total`
/// Labels: `operation`, `status`
pub fn record_store_operation(operation: &str, status: &str, duration: Duration) {
    histogram!("ga_store_operation_duration_seconds", "operation" => operation.to_string())
        .record(duration.as_secs_f64());

    counter!("ga_store_operations_total", "operation" => operation.to_string(), "status" => status.to_string())
        .increment(1);
}

/// Record a refresh token store invariant violation
///
/// Metric: `ga_integrity_violations_total`
///
/// ALERT: Any non-zero value indicates a bug and should page oncall
pub fn record_integrity_violation(operation: &str) {
    counter!("ga_integrity_violations_total", "operation" => operation.to_string()).increment(1);
}

// ============================================================================
// Error Metrics
// ============================================================================

/// Record error by category
///
/// Metric: `ga_errors_total`
/// Labels: `operation`, `error_category`, `status_code`
pub fn record_error(operation: &str, error_category: &str, status_code: u16) {
    counter!("ga_errors_total",
        "operation" => operation.to_string(),
        "error_category" => error_category.to_string(),
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `ga_http_requests_total`, `ga_http_request_duration_seconds`
/// Labels: `method`, `path`, `status_code`
///
/// Captures framework-level rejections too (415, 400 on bad JSON, 404, 405).
pub fn record_http_request(method: &str, path: &str, status_code: u16, duration: Duration) {
    let normalized_path = normalize_path(path);

    histogram!("ga_http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => normalized_path.to_string(),
        "status_code" => status_code.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("ga_http_requests_total",
        "method" => method.to_string(),
        "path" => normalized_path.to_string(),
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Collapse unknown paths so arbitrary URLs cannot grow label cardinality.
fn normalize_path(path: &str) -> &'static str {
    match path {
        "/" => "/",
        "/health" => "/health",
        "/ready" => "/ready",
        "/metrics" => "/metrics",
        "/.well-known/jwks.json" => "/.well-known/jwks.json",
        "/api/v1/auth/token" => "/api/v1/auth/token",
        "/api/v1/auth/refresh" => "/api/v1/auth/refresh",
        _ => "/other",
    }
}
