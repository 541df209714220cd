//! Prometheus metrics for monitoring the tournament server.
//!
//! Metrics are exposed in Prometheus text format for scraping by monitoring systems.
//!
//! # Metrics Categories
//!
//! - **HTTP Metrics**: Request counts, duration, status codes
//! - **Engine Metrics**: Active tournaments, published events, finished matches
//! - **Command Metrics**: Rejected commands by reason
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use tourney_server::metrics;
//! use std::net::SocketAddr;
//!
//! // Initialize metrics exporter
//! let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
//! metrics::init_metrics(addr).unwrap();
//!
//! // Record HTTP request
//! metrics::http_requests_total("POST", "/api/v1/tournaments", 201);
//! ```

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tourney::{EngineEvent, tournament::Resolution};

/// Initialize Prometheus metrics exporter.
///
/// Sets up a Prometheus scrape endpoint on the specified address.
/// Metrics will be available at `http://<addr>/metrics`.
///
/// # Arguments
///
/// - `addr`: Address to bind the metrics server to (e.g., `0.0.0.0:9090`)
///
/// # Returns
///
/// Result indicating success or error message
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

// ============================================================================
// HTTP Metrics
// ============================================================================

/// Record HTTP request.
///
/// Increments the total HTTP request counter with method, path, and status labels.
pub fn http_requests_total(method: &str, path: &str, status: u16) {
    metrics::counter!("http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record HTTP request duration in milliseconds.
pub fn http_request_duration_ms(method: &str, path: &str, duration_ms: f64) {
    metrics::histogram!("http_request_duration_ms",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration_ms);
}

// ============================================================================
// Engine Metrics
// ============================================================================

/// Set current live tournament actors count.
pub fn active_tournaments(count: usize) {
    metrics::gauge!("active_tournaments").set(count as f64);
}

/// Count a published engine event, plus the way each finished match was decided.
pub fn engine_event(event: &EngineEvent) {
    metrics::counter!("engine_events_total", "kind" => event.kind()).increment(1);

    if let EngineEvent::MatchFinished { resolution, .. } = event {
        let decided_by = match resolution {
            Resolution::Bye => "bye",
            Resolution::Organizer => "organizer",
            Resolution::Vote { tie_broken: true, .. } => "vote_tie_break",
            Resolution::Vote { .. } => "vote",
        };
        metrics::counter!("matches_finished_total", "decided_by" => decided_by).increment(1);
    }
}

// ============================================================================
// Command Metrics
// ============================================================================

/// Increment rejected commands counter.
pub fn commands_rejected_total(status: u16) {
    metrics::counter!("commands_rejected_total",
        "status" => status.to_string()
    )
    .increment(1);
}
