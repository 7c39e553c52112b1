//! Metrics definitions for the NomNom service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `nomnom_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `method`: 7 values max (GET, POST, PATCH, DELETE, PUT, HEAD, OPTIONS)
//! - `endpoint`: parameterized paths, unknown paths collapse to `/other`
//! - `status`: success, error, timeout
//! - `operation`: bounded by code (get_election, list_objects, ...)
//! - `guard` / `decision`: bounded by the access predicates

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("nomnom_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("nomnom_db_query".to_string()),
            &[
                0.001, 0.002, 0.005, 0.010, 0.020, 0.050, 0.100, 0.250, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set DB query buckets: {e}"))?
        // Listing a large packet directory can take a few round trips
        .set_buckets_for_metric(
            Matcher::Prefix("nomnom_storage_request".to_string()),
            &[
                0.010, 0.025, 0.050, 0.100, 0.200, 0.500, 1.000, 2.000, 5.000,
            ],
        )
        .map_err(|e| format!("Failed to set storage request buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `nomnom_http_requests_total`, `nomnom_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
///
/// Captures ALL HTTP responses, including redirects issued by the guards and
/// framework-level 404/405s.
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("nomnom_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint.clone(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("nomnom_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/timeout
///
/// Redirects count as success: the login and mode redirects are normal flow.
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=399 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Normalize endpoint path to prevent label cardinality explosion
fn normalize_endpoint(path: &str) -> String {
    match path {
        "/" => "/".to_string(),
        "/health" => "/health".to_string(),
        "/ready" => "/ready".to_string(),
        "/metrics" => "/metrics".to_string(),
        "/api/v1/elections" => "/api/v1/elections".to_string(),
        _ => normalize_dynamic_endpoint(path),
    }
}

/// Normalize paths with dynamic segments
///
/// Replaces election slugs and packet file ids with placeholders.
fn normalize_dynamic_endpoint(path: &str) -> String {
    let Some(rest) = path.strip_prefix("/api/v1/elections/") else {
        return "/other".to_string();
    };

    let parts: Vec<&str> = rest.split('/').collect();

    match parts.as_slice() {
        [election] if !election.is_empty() => "/api/v1/elections/{election_id}".to_string(),
        [_, action @ ("closed" | "nominate" | "vote" | "packet")] => {
            format!("/api/v1/elections/{{election_id}}/{action}")
        }
        [_, "packet", "files", file_id] if !file_id.is_empty() => {
            "/api/v1/elections/{election_id}/packet/files/{packet_file_id}".to_string()
        }
        _ => "/other".to_string(),
    }
}

// ============================================================================
// Database Metrics
// ============================================================================

/// Record database query execution
///
/// Metric: `nomnom_db_query_duration_seconds`, `nomnom_db_queries_total`
/// Labels: `operation`, `status`
pub fn record_db_query(operation: &str, status: &str, duration: Duration) {
    histogram!("nomnom_db_query_duration_seconds",
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("nomnom_db_queries_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

// ============================================================================
// Storage Metrics
// ============================================================================

/// Record a packet storage request.
///
/// Metric: `nomnom_storage_request_duration_seconds`, `nomnom_storage_requests_total`
/// Labels: `operation`, `status`
///
/// Operations: "list_objects", "presign_download"
pub fn record_storage_request(operation: &str, status: &str, duration: Duration) {
    histogram!("nomnom_storage_request_duration_seconds",
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("nomnom_storage_requests_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

// ============================================================================
// Packet and Access Metrics
// ============================================================================

/// Record a packet download redirect.
///
/// Metric: `nomnom_packet_downloads_total`
/// Labels: `status` ("redirected", "not_found", "error")
pub fn record_packet_download(status: &str) {
    counter!("nomnom_packet_downloads_total",
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record an election guard refusing a request.
///
/// Metric: `nomnom_access_denials_total`
/// Labels: `guard` (predicate name), `decision` ("redirect_to_auth", "forbidden")
pub fn record_access_denial(guard: &str, decision: &str) {
    counter!("nomnom_access_denials_total",
        "guard" => guard.to_string(),
        "decision" => decision.to_string()
    )
    .increment(1);
}
