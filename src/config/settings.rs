//! Resolved runtime settings.
//!
//! `Settings` is the immutable snapshot the control loop owns. It is built once
//! from a validated `WatcherConfig` and replaced wholesale on reload; probing
//! tasks borrow interfaces through `Arc` clones.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::config::schema::ObservabilityConfig;
use crate::resilience::retries::RetryPolicy;

/// Table family accepted by the classification backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableFamily {
    Ip,
    Ip6,
    Inet,
}

impl TableFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableFamily::Ip => "ip",
            TableFamily::Ip6 => "ip6",
            TableFamily::Inet => "inet",
        }
    }
}

impl fmt::Display for TableFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TableFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ip" => Ok(TableFamily::Ip),
            "ip6" => Ok(TableFamily::Ip6),
            "inet" => Ok(TableFamily::Inet),
            other => Err(other.to_string()),
        }
    }
}

/// Location of the distribution chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub family: TableFamily,
    pub name: String,
}

/// Complete runtime configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Time between evaluation cycles.
    pub interval: Duration,
    /// Flap damping quiet period.
    pub quiet_period: Duration,
    /// Optional bound on a single interface's evaluation.
    pub cycle_timeout: Option<Duration>,
    pub table: TableSpec,
    /// Chain holding the weighted distribution rule.
    pub chain: String,
    /// Interfaces in configuration order.
    pub interfaces: Vec<Arc<Interface>>,
    pub observability: ObservabilityConfig,
}

impl Settings {
    /// Look up an interface by name.
    pub fn interface(&self, name: &str) -> Option<&Arc<Interface>> {
        self.interfaces.iter().find(|i| i.name == name)
    }

    /// Devices referenced by peer-liveness checks.
    pub fn wireguard_devices(&self) -> Vec<&str> {
        let mut devices: Vec<&str> = self
            .interfaces
            .iter()
            .flat_map(|i| i.checks.iter())
            .filter_map(|c| match &c.kind {
                CheckKind::PeerLiveness(p) => Some(p.device.as_str()),
                _ => None,
            })
            .collect();
        devices.sort_unstable();
        devices.dedup();
        devices
    }
}

/// One candidate outbound path.
#[derive(Debug, Clone, PartialEq)]
pub struct Interface {
    pub name: String,
    /// Expected `address/prefix` string.
    pub address: String,
    pub ratio: u32,
    /// Chain traffic jumps to when this interface is selected.
    pub target: String,
    /// Mark stamped by the managed rule in `target`.
    pub mark: Option<u32>,
    pub counter: bool,
    pub checks: Vec<HealthCheckSpec>,
}

/// A resolved health check.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthCheckSpec {
    pub name: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub kind: CheckKind,
}

/// Kind specific parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckKind {
    Tcp(TcpCheck),
    Icmp(IcmpCheck),
    Http(HttpCheck),
    PeerLiveness(PeerCheck),
}

impl CheckKind {
    /// Short label used in logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            CheckKind::Tcp(_) => "tcp",
            CheckKind::Icmp(_) => "icmp",
            CheckKind::Http(_) => "http",
            CheckKind::PeerLiveness(_) => "wireguard",
        }
    }

    /// Whatever the check talks to, for logs.
    pub fn target(&self) -> String {
        match self {
            CheckKind::Tcp(t) => format!("{}:{}", t.host, t.port),
            CheckKind::Icmp(i) => i.host.clone(),
            CheckKind::Http(h) => h.host.clone(),
            CheckKind::PeerLiveness(p) => p.device.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpCheck {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IcmpCheck {
    pub host: String,
    /// Echo requests to send.
    pub count: u32,
    /// Spacing between echo requests.
    pub interval: Duration,
    /// Max average round-trip time; `None` disables the check.
    pub max_rtt: Option<Duration>,
    /// Max loss percentage; `None` means only total loss fails.
    pub max_loss_percent: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpCheck {
    /// Host, optionally with a port.
    pub host: String,
    pub path: String,
    pub tls: bool,
    /// Skip certificate verification.
    pub insecure: bool,
    pub method: String,
    pub expected_status: u16,
    pub body_pattern: Option<String>,
}

impl HttpCheck {
    /// `http(s)://host` + path.
    pub fn uri(&self) -> String {
        let scheme = if self.tls { "https" } else { "http" };
        format!("{}://{}{}", scheme, self.host, self.path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerCheck {
    pub device: String,
    /// Base64 public key of the peer that must be alive.
    pub peer: Option<String>,
    pub max_handshake_age: Duration,
}
