//! Configuration schema definitions.
//!
//! This module defines the on-disk configuration structure for the watcher.
//! Field names follow the YAML keys operators already use (`lbtable`,
//! `minimumTimeOut`, `matchRegEx`, ...). Durations stay as strings here and are
//! resolved into typed values by `config::resolve`.

use serde::{Deserialize, Deserializer, Serialize};

/// Root configuration for the path watcher.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default, rename_all = "lowercase")]
pub struct WatcherConfig {
    /// Time between evaluation cycles (e.g. "1m", "30s").
    pub interval: String,

    /// Minimum time an unhealthy interface stays out before it is re-probed.
    #[serde(rename = "minimumTimeOut")]
    pub minimum_time_out: String,

    /// Optional upper bound on one interface's evaluation within a cycle.
    #[serde(rename = "cycleTimeout")]
    pub cycle_timeout: String,

    /// Table holding the distribution chain.
    pub lbtable: TableConfig,

    /// Name of the chain holding the weighted distribution rule.
    pub lbchain: String,

    /// Candidate paths, in priority/serialisation order.
    pub interfaces: Vec<InterfaceConfig>,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,
}

/// Classification table location.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TableConfig {
    /// `ip`, `ip6` or `inet`.
    pub family: String,

    /// Name of the table.
    pub name: String,
}

/// Configuration for each outbound interface, most likely WireGuard tunnels.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default, rename_all = "lowercase")]
pub struct InterfaceConfig {
    /// Kernel interface name.
    pub name: String,

    /// Expected address with prefix length (e.g. "10.8.0.2/24").
    pub address: String,

    /// Legacy flag: adds a WireGuard peer-liveness check for this interface.
    pub wireguard: bool,

    /// Legacy flag: peer public key required by the WireGuard check.
    pub wgpeer: String,

    /// Legacy flag: max time since the last peer handshake.
    #[serde(rename = "wgLastHandshake")]
    pub wg_last_handshake: String,

    /// Share of traffic relative to the other interfaces.
    pub ratio: u32,

    /// Chain packets are sent to when this interface is selected.
    pub target: String,

    /// Packet mark stamped in the target chain. `0` means no managed rule.
    pub mark: u32,

    /// Add a counter to the managed mark rule.
    pub counter: bool,

    /// Health checks, executed in order.
    pub checks: Vec<CheckConfig>,
}

/// Configuration of a single health check.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default, rename_all = "lowercase")]
pub struct CheckConfig {
    /// Unique (per interface) check name.
    pub name: String,

    /// `tcp`, `icmp`, `http` or `wireguard`.
    #[serde(rename = "type")]
    pub kind: String,

    /// Target host (HTTP hosts may carry a port).
    pub host: String,

    /// TCP port, written either as a number or a string.
    #[serde(deserialize_with = "string_or_number")]
    pub port: String,

    /// Interval between retries, or between pings for ICMP.
    pub interval: String,

    /// Per attempt timeout. For ICMP, total time for all echo requests.
    pub timeout: String,

    /// Additional attempts after the first one fails.
    pub retries: u32,

    /// ICMP: number of echo requests.
    pub count: u32,

    /// ICMP: max average round-trip time in milliseconds.
    pub maxrtt: u64,

    /// ICMP: max tolerated packet loss percentage.
    pub maxlosspcnt: f64,

    /// HTTP: use https.
    pub tls: bool,

    /// HTTP: skip certificate verification.
    pub insecure: bool,

    /// HTTP: request method.
    pub method: String,

    /// HTTP: request path (e.g. "/healthz").
    pub path: String,

    /// HTTP: regular expression the response body must match.
    #[serde(rename = "matchRegEx")]
    pub match_regex: String,

    /// HTTP: expected status code.
    #[serde(rename = "responseCode")]
    pub response_code: u16,

    /// WireGuard: device to inspect, defaults to the interface name.
    pub device: String,

    /// WireGuard: peer public key (base64).
    pub peer: String,

    /// WireGuard: max time since the last handshake.
    #[serde(rename = "maxHandshake")]
    pub max_handshake: String,
}

/// Logging and metrics configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Enable the Prometheus endpoint.
    #[serde(rename = "metricsEnabled")]
    pub metrics_enabled: bool,

    /// Prometheus endpoint bind address.
    #[serde(rename = "metricsAddress")]
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9273".to_string(),
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Number(n) => n.to_string(),
        Raw::Text(s) => s,
    })
}
