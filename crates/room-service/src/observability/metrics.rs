//! Metrics definitions for the room service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `room_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `method`: HTTP methods
//! - `endpoint`: parameterized paths (session codes never appear as labels)
//! - `operation`: get, create, remove
//! - `outcome`: success plus the closed error taxonomies

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the Prometheus recorder and return its render handle.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("room_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("room_store_operation".to_string()),
            &[
                0.0001, 0.0005, 0.001, 0.002, 0.005, 0.010, 0.025, 0.050, 0.100,
            ],
        )
        .map_err(|e| format!("Failed to set store operation buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `room_http_requests_total`, `room_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("room_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("room_http_requests_total",
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
        "/health" => "/health",
        "/metrics" => "/metrics",
        "/api/session" => "/api/session",
        "/api/mediamtx/auth" => "/api/mediamtx/auth",
        _ if is_room_path(path) => "/room/{key}",
        _ => "/other",
    }
}

fn is_room_path(path: &str) -> bool {
    path.strip_prefix("/room/")
        .is_some_and(|key| !key.is_empty() && !key.contains('/'))
}

// ============================================================================
// Store Metrics
// ============================================================================

/// Record one operation processed by a room actor.
///
/// Metric: `room_store_operation_duration_seconds`, `room_store_operations_total`
/// Labels: `operation`, `outcome`
///
/// Outcomes: "success", "absent" (remove only), or a store error code
pub fn record_store_operation(operation: &'static str, outcome: &'static str, duration: Duration) {
    histogram!("room_store_operation_duration_seconds",
        "operation" => operation
    )
    .record(duration.as_secs_f64());

    counter!("room_store_operations_total",
        "operation" => operation,
        "outcome" => outcome
    )
    .increment(1);
}

// ============================================================================
// Session Metrics
// ============================================================================

/// Record a session issuance attempt.
///
/// Metric: `room_sessions_issued_total`
/// Labels: `outcome` ("success", a verification code, or a store error code)
pub fn record_session_issued(outcome: &'static str) {
    counter!("room_sessions_issued_total",
        "outcome" => outcome
    )
    .increment(1);
}

/// Record a relay authorization decision.
///
/// Metric: `room_relay_auth_total`
/// Labels: `action` ("read", "publish", "other"), `decision` ("allow", "deny", "error")
pub fn record_relay_auth(action: &'static str, decision: &'static str) {
    counter!("room_relay_auth_total",
        "action" => action,
        "decision" => decision
    )
    .increment(1);
}
