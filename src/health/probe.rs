//! Probe dispatch and verdicts.
//!
//! # Responsibilities
//! - Route a `HealthCheckSpec` to the strategy for its kind
//! - Carry the collaborators strategies need (VPN inventory)
//!
//! # Design Decisions
//! - Probes never return errors; every failure is a failed verdict
//! - Strategies are stateless free functions

use std::sync::Arc;

use crate::config::settings::{CheckKind, HealthCheckSpec};
use crate::health::{http, icmp, peer, tcp};
use crate::vpn::PeerInventory;

/// Outcome of one health check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeVerdict {
    pub passed: bool,
    /// Attempts made, including the first one.
    pub attempts: u32,
    /// Human readable context for logs.
    pub detail: String,
}

impl ProbeVerdict {
    pub fn pass(attempts: u32, detail: impl Into<String>) -> Self {
        Self {
            passed: true,
            attempts,
            detail: detail.into(),
        }
    }

    pub fn fail(attempts: u32, detail: impl Into<String>) -> Self {
        Self {
            passed: false,
            attempts,
            detail: detail.into(),
        }
    }
}

/// Shared collaborators for probes.
pub struct ProbeContext {
    pub inventory: Arc<dyn PeerInventory>,
}

impl ProbeContext {
    pub fn new(inventory: Arc<dyn PeerInventory>) -> Self {
        Self { inventory }
    }
}

/// Execute one configured check.
pub async fn run_check(check: &HealthCheckSpec, ctx: &ProbeContext) -> ProbeVerdict {
    match &check.kind {
        CheckKind::Tcp(target) => tcp::probe(&check.name, target, check.timeout, &check.retry).await,
        CheckKind::Icmp(target) => icmp::probe(&check.name, target, check.timeout).await,
        CheckKind::Http(target) => http::probe(&check.name, target, check.timeout, &check.retry).await,
        CheckKind::PeerLiveness(target) => peer::probe(&check.name, target, Arc::clone(&ctx.inventory)).await,
    }
}

/// `host:port`, bracketing bare IPv6 literals.
pub fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}
