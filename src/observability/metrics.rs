//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define watcher metrics (health, checks, policy changes, cycle time)
//! - Expose a Prometheus-compatible scrape endpoint when enabled
//!
//! # Metrics
//! - `path_watcher_interface_healthy` (gauge): 1=healthy, 0=unhealthy
//! - `path_watcher_check_total` (counter): check runs by interface, check, result
//! - `path_watcher_policy_changes_total` (counter): distribution rules installed
//! - `path_watcher_apply_failures_total` (counter): failed installs
//! - `path_watcher_cycle_duration_seconds` (histogram): evaluation cycle latency
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Labels are interface and check names only

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its HTTP listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_interface_health(interface: &str, healthy: bool) {
    gauge!("path_watcher_interface_healthy", "interface" => interface.to_string()).set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_check(interface: &str, check: &str, passed: bool) {
    counter!(
        "path_watcher_check_total",
        "interface" => interface.to_string(),
        "check" => check.to_string(),
        "result" => if passed { "pass" } else { "fail" }
    )
    .increment(1);
}

pub fn record_policy_change() {
    counter!("path_watcher_policy_changes_total").increment(1);
}

pub fn record_apply_failure() {
    counter!("path_watcher_apply_failures_total").increment(1);
}

pub fn record_cycle(start: Instant) {
    histogram!("path_watcher_cycle_duration_seconds").record(start.elapsed().as_secs_f64());
}
