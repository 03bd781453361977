//! Per-interface evaluation.
//!
//! # Responsibilities
//! - Run the basic link checks (exists, up, addressed)
//! - Run configured checks in order when the basics pass
//! - Bound the probes by an optional deadline
//!
//! # Design Decisions
//! - Configured checks are skipped when a basic check fails
//! - A missed deadline records a failed `cycle_deadline` check

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::time;

use crate::config::settings::Interface;
use crate::health::probe::{run_check, ProbeContext};
use crate::health::state::{CheckResult, InterfaceStatus};
use crate::net::LinkInspector;
use crate::observability::metrics;

/// Name of the synthetic check recorded when probing overruns its deadline.
pub const DEADLINE_CHECK: &str = "cycle_deadline";

pub struct InterfaceMonitor {
    interface: Arc<Interface>,
    links: Arc<dyn LinkInspector>,
    probes: Arc<ProbeContext>,
    deadline: Option<Duration>,
}

impl InterfaceMonitor {
    pub fn new(interface: Arc<Interface>, links: Arc<dyn LinkInspector>, probes: Arc<ProbeContext>) -> Self {
        Self {
            interface,
            links,
            probes,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Produce a fresh status for the interface.
    pub async fn evaluate(&self) -> InterfaceStatus {
        let mut status = InterfaceStatus::new(&self.interface.name);
        self.basic_checks(&mut status);

        if status.basic_ok() {
            match self.deadline {
                Some(deadline) => {
                    let probes = self.run_probes(&mut status);
                    if time::timeout(deadline, probes).await.is_err() {
                        tracing::warn!(nif = %self.interface.name, deadline = ?deadline, "Checks overran deadline");
                        status.record(CheckResult {
                            name: DEADLINE_CHECK.to_string(),
                            kind: "deadline",
                            passed: false,
                            attempts: 0,
                            detail: format!("checks did not finish within {:?}", deadline),
                        });
                    }
                }
                None => self.run_probes(&mut status).await,
            }
        }

        status.evaluated_at = SystemTime::now();
        status
    }

    fn basic_checks(&self, status: &mut InterfaceStatus) {
        let name = &self.interface.name;
        match self.links.lookup(name) {
            Ok(Some(link)) => {
                status.exists = true;
                status.up = link.up;
                status.addressed = link.has_address(&self.interface.address);
                tracing::debug!(
                    nif = %name,
                    up = status.up,
                    addressed = status.addressed,
                    "Basic checks done"
                );
            }
            Ok(None) => {
                tracing::debug!(nif = %name, "Interface does not exist");
            }
            Err(e) => {
                tracing::error!(nif = %name, error = %e, "Failed to inspect interface");
            }
        }
    }

    async fn run_probes(&self, status: &mut InterfaceStatus) {
        for check in &self.interface.checks {
            tracing::debug!(
                nif = %self.interface.name,
                check = %check.name,
                kind = check.kind.label(),
                target = %check.kind.target(),
                "Running check"
            );
            let verdict = run_check(check, &self.probes).await;
            metrics::record_check(&self.interface.name, &check.name, verdict.passed);
            status.record(CheckResult::from_verdict(check, verdict));
        }
    }
}
