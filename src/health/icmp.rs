//! ICMP echo probe.
//!
//! # Responsibilities
//! - Send `count` echo requests spaced by `interval`
//! - Stop sending once the overall timeout is spent
//! - Judge the run on average RTT and packet loss
//!
//! # Design Decisions
//! - The timeout bounds the whole run, not each request
//! - Loss is computed over requests actually sent
//! - Without a loss threshold only a fully lost run fails

use std::net::IpAddr;
use std::time::Duration;

use surge_ping::{Client, Config, PingIdentifier, PingSequence, ICMP};
use thiserror::Error;
use tokio::time::{self, Instant};

use crate::config::settings::IcmpCheck;
use crate::health::probe::ProbeVerdict;

const PAYLOAD: [u8; 56] = [0; 56];

/// Counters of one ping run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PingStats {
    pub sent: u32,
    pub received: u32,
    pub rtts: Vec<Duration>,
}

impl PingStats {
    /// Percentage of lost requests; a run that sent nothing counts as total loss.
    pub fn loss_percent(&self) -> f64 {
        if self.sent == 0 {
            return 100.0;
        }
        f64::from(self.sent.saturating_sub(self.received)) * 100.0 / f64::from(self.sent)
    }

    pub fn average_rtt(&self) -> Option<Duration> {
        if self.rtts.is_empty() {
            return None;
        }
        let total: Duration = self.rtts.iter().sum();
        Some(total / self.rtts.len() as u32)
    }
}

#[derive(Debug, Error)]
pub enum PingError {
    #[error("failed to resolve {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} resolved to no address")]
    NoAddress(String),
    #[error("failed to open icmp socket: {0}")]
    Socket(#[source] std::io::Error),
}

/// Judge a finished run against the check thresholds.
pub fn evaluate(check: &IcmpCheck, stats: &PingStats) -> Result<(), String> {
    if let (Some(max_rtt), Some(avg)) = (check.max_rtt, stats.average_rtt()) {
        if avg > max_rtt {
            return Err(format!("average rtt {:?} above {:?}", avg, max_rtt));
        }
    }

    let loss = stats.loss_percent();
    match check.max_loss_percent {
        Some(max_loss) if loss > max_loss => Err(format!("{:.1}% loss above {}%", loss, max_loss)),
        None if loss >= 100.0 => Err("all echo requests lost".to_string()),
        _ => Ok(()),
    }
}

pub async fn probe(name: &str, check: &IcmpCheck, timeout: Duration) -> ProbeVerdict {
    let stats = match ping(check, timeout).await {
        Ok(stats) => stats,
        Err(e) => {
            tracing::warn!(check = %name, host = %check.host, error = %e, "Ping failed");
            return ProbeVerdict::fail(1, e.to_string());
        }
    };

    tracing::debug!(
        check = %name,
        host = %check.host,
        sent = stats.sent,
        received = stats.received,
        avg_rtt = ?stats.average_rtt(),
        "Ping finished"
    );

    match evaluate(check, &stats) {
        Ok(()) => ProbeVerdict::pass(1, format!("{}/{} replies", stats.received, stats.sent)),
        Err(reason) => {
            tracing::warn!(check = %name, host = %check.host, reason = %reason, "Ping check failed");
            ProbeVerdict::fail(1, reason)
        }
    }
}

async fn ping(check: &IcmpCheck, timeout: Duration) -> Result<PingStats, PingError> {
    let deadline = Instant::now() + timeout;
    let addr = resolve(&check.host).await?;

    let config = match addr {
        IpAddr::V4(_) => Config::default(),
        IpAddr::V6(_) => Config::builder().kind(ICMP::V6).build(),
    };
    let client = Client::new(&config).map_err(PingError::Socket)?;
    let mut pinger = client.pinger(addr, PingIdentifier(fastrand::u16(..))).await;

    let mut stats = PingStats::default();
    for seq in 0..check.count {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }

        pinger.timeout(remaining);
        stats.sent += 1;
        match pinger.ping(PingSequence(seq as u16), &PAYLOAD).await {
            Ok((_, rtt)) => {
                stats.received += 1;
                stats.rtts.push(rtt);
            }
            Err(e) => tracing::trace!(host = %check.host, seq, error = %e, "No echo reply"),
        }

        if seq + 1 < check.count {
            let pause = check.interval.min(deadline.saturating_duration_since(Instant::now()));
            time::sleep(pause).await;
        }
    }

    Ok(stats)
}

async fn resolve(host: &str) -> Result<IpAddr, PingError> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }
    let mut addrs = tokio::net::lookup_host((host, 0))
        .await
        .map_err(|source| PingError::Resolve {
            host: host.to_string(),
            source,
        })?;
    addrs
        .next()
        .map(|a| a.ip())
        .ok_or_else(|| PingError::NoAddress(host.to_string()))
}
