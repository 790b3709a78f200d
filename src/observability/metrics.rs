//! Metrics collection and exposition.
//!
//! # Metrics
//! - `ribbon_tasks_submitted_total` (counter): tasks accepted by a worker pool, by kind
//! - `ribbon_tasks_rejected_total` (counter): tasks refused after shutdown, by kind
//! - `ribbon_rule_selections_total` (counter): selections by rule and winning tier
//! - `ribbon_config_reloads_total` (counter): hot reload attempts, by outcome
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; no recorder means no cost
//! - The Prometheus exporter is only installed when enabled in config

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_task_submitted(kind: &'static str) {
    metrics::counter!("ribbon_tasks_submitted_total", "kind" => kind).increment(1);
}

pub fn record_task_rejected(kind: &'static str) {
    metrics::counter!("ribbon_tasks_rejected_total", "kind" => kind).increment(1);
}

pub fn record_rule_selection(rule: &str, tier: usize) {
    metrics::counter!(
        "ribbon_rule_selections_total",
        "rule" => rule.to_string(),
        "tier" => tier.to_string()
    )
    .increment(1);
}

pub fn record_config_reload(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    metrics::counter!("ribbon_config_reloads_total", "outcome" => outcome).increment(1);
}
