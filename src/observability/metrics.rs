//! Metrics collection and exposition.
//!
//! # Metrics
//! - `nqkd_passes_total` (counter): passes started, by kind
//! - `nqkd_pass_failures_total` (counter): passes that failed, by kind
//! - `nqkd_unit_outcomes_total` (counter): per-unit apply outcomes
//! - `nqkd_events_total` (counter): classified runtime events, by rule
//! - `nqkd_binding_files_written_total` (counter)
//! - `nqkd_proxy_reloads_total` (counter): by result
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - Prometheus exposition is opt-in

use std::net::SocketAddr;

use metrics::counter;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder with its own scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_pass(kind: &str) {
    counter!("nqkd_passes_total", "kind" => kind.to_string()).increment(1);
}

pub fn record_pass_failure(kind: &str) {
    counter!("nqkd_pass_failures_total", "kind" => kind.to_string()).increment(1);
}

pub fn record_unit_outcome(outcome: &str) {
    counter!("nqkd_unit_outcomes_total", "outcome" => outcome.to_string()).increment(1);
}

pub fn record_event(rule: &str) {
    counter!("nqkd_events_total", "rule" => rule.to_string()).increment(1);
}

pub fn record_binding_file_written() {
    counter!("nqkd_binding_files_written_total").increment(1);
}

pub fn record_proxy_reload(result: &str) {
    counter!("nqkd_proxy_reloads_total", "result" => result.to_string()).increment(1);
}
