//! Metrics collection and exposition.
//!
//! # Metrics
//! - `certdash_query_fetch_total` (counter): fetch outcomes by operation kind
//! - `certdash_query_retries_total` (counter): retry attempts by operation kind
//! - `certdash_query_cache_entries` (gauge): live cache entries
//! - `certdash_session_transitions_total` (counter): session transitions by kind and resulting status
//! - `certdash_notifications_total` (counter): user notifications by kind

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus exporter on `addr`. Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_fetch(kind: &'static str, outcome: &'static str) {
    metrics::counter!("certdash_query_fetch_total", "kind" => kind, "outcome" => outcome).increment(1);
}

pub fn record_retry(kind: &'static str) {
    metrics::counter!("certdash_query_retries_total", "kind" => kind).increment(1);
}

pub fn record_cache_size(entries: usize) {
    metrics::gauge!("certdash_query_cache_entries").set(entries as f64);
}

pub fn record_session_transition(transition: &'static str, status: &'static str) {
    metrics::counter!(
        "certdash_session_transitions_total",
        "transition" => transition,
        "status" => status
    )
    .increment(1);
}

pub fn record_notification(kind: &'static str) {
    metrics::counter!("certdash_notifications_total", "kind" => kind).increment(1);
}
