//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_pool_writes_total` (counter): writes by endpoint, outcome
//! - `relay_pool_failovers_total` (counter): writes moved to another slot
//! - `relay_pool_restarts_total` (counter): replacement connections created
//! - `relay_pool_connected_slots` (gauge): slots currently connected
//! - `relay_pool_retry_count` (gauge): pool-wide reconnect retry count

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with an HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_write(endpoint: &str, outcome: &'static str) {
    counter!(
        "relay_pool_writes_total",
        "endpoint" => endpoint.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_failover(endpoint: &str) {
    counter!("relay_pool_failovers_total", "endpoint" => endpoint.to_string()).increment(1);
}

pub fn record_restart(endpoint: &str) {
    counter!("relay_pool_restarts_total", "endpoint" => endpoint.to_string()).increment(1);
}

pub fn record_connected_slots(endpoint: &str, connected: usize) {
    gauge!("relay_pool_connected_slots", "endpoint" => endpoint.to_string()).set(connected as f64);
}

pub fn record_retry_count(endpoint: &str, retry_count: u32) {
    gauge!("relay_pool_retry_count", "endpoint" => endpoint.to_string()).set(f64::from(retry_count));
}
