//! Metrics collection and exposition.
//!
//! # Metrics
//! - `registry_token_refresh_total` (counter): successful logins
//! - `registry_config_reload_total` (counter): reloads by outcome (applied, rejected)
//! - `registry_longpoll_total` (counter): long-polls by result (changed, unchanged, error)
//! - `registry_heartbeat_total` (counter): beats by outcome (ok, error)
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;

use metrics::counter;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and serve it on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_token_refresh() {
    counter!("registry_token_refresh_total").increment(1);
}

pub fn record_config_reload(outcome: &'static str) {
    counter!("registry_config_reload_total", "outcome" => outcome).increment(1);
}

pub fn record_longpoll(result: &'static str) {
    counter!("registry_longpoll_total", "result" => result).increment(1);
}

pub fn record_heartbeat(outcome: &'static str) {
    counter!("registry_heartbeat_total", "outcome" => outcome).increment(1);
}
