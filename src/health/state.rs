//! Interface health status.
//!
//! # States
//! - Healthy: exists, up, addressed and every check passed
//! - Unhealthy: anything else
//!
//! # State Transitions
//! ```text
//! Healthy → Unhealthy: any basic or configured check fails (arms flap damping)
//! Unhealthy → Healthy: a full evaluation passes after the quiet period
//! ```
//!
//! # Design Decisions
//! - A status is rebuilt from scratch on every evaluation
//! - Check results keep configuration order and unique names
//! - Failure reasons name the exact failing condition

use std::time::SystemTime;

use crate::config::settings::HealthCheckSpec;
use crate::health::probe::ProbeVerdict;

/// Result of one named check within a status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub name: String,
    pub kind: &'static str,
    pub passed: bool,
    pub attempts: u32,
    pub detail: String,
}

impl CheckResult {
    pub fn from_verdict(check: &HealthCheckSpec, verdict: ProbeVerdict) -> Self {
        Self {
            name: check.name.clone(),
            kind: check.kind.label(),
            passed: verdict.passed,
            attempts: verdict.attempts,
            detail: verdict.detail,
        }
    }
}

/// Snapshot of one interface evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceStatus {
    pub interface: String,
    pub exists: bool,
    pub up: bool,
    pub addressed: bool,
    pub checks: Vec<CheckResult>,
    pub evaluated_at: SystemTime,
}

impl InterfaceStatus {
    /// A status with every basic flag false and no checks.
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            exists: false,
            up: false,
            addressed: false,
            checks: Vec::new(),
            evaluated_at: SystemTime::now(),
        }
    }

    pub fn basic_ok(&self) -> bool {
        self.exists && self.up && self.addressed
    }

    /// Add or replace the result for a check name.
    pub fn record(&mut self, result: CheckResult) {
        match self.checks.iter_mut().find(|c| c.name == result.name) {
            Some(existing) => *existing = result,
            None => self.checks.push(result),
        }
    }

    pub fn check(&self, name: &str) -> Option<&CheckResult> {
        self.checks.iter().find(|c| c.name == name)
    }

    pub fn healthy(&self) -> bool {
        self.basic_ok() && self.checks.iter().all(|c| c.passed)
    }

    /// Why the interface is unhealthy; empty when healthy.
    pub fn failure_reasons(&self) -> Vec<String> {
        if !self.exists {
            return vec!["interface does not exist".to_string()];
        }

        let mut reasons = Vec::new();
        if !self.up {
            reasons.push("interface is not up".to_string());
        }
        if !self.addressed {
            reasons.push("interface not properly addressed".to_string());
        }
        reasons.extend(
            self.checks
                .iter()
                .filter(|c| !c.passed)
                .map(|c| format!("failed {} check {}", c.kind, c.name)),
        );
        reasons
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str, passed: bool) -> CheckResult {
        CheckResult {
            name: name.into(),
            kind: "tcp",
            passed,
            attempts: 1,
            detail: String::new(),
        }
    }

    fn basic_ok(name: &str) -> InterfaceStatus {
        InterfaceStatus {
            exists: true,
            up: true,
            addressed: true,
            ..InterfaceStatus::new(name)
        }
    }

    #[test]
    fn test_healthy_requires_everything() {
        let mut status = basic_ok("wg0");
        status.record(result("ssh", true));
        status.record(result("web", true));
        assert!(status.healthy());
        assert!(status.failure_reasons().is_empty());

        status.record(result("web", false));
        assert_eq!(status.checks.len(), 2);
        assert!(!status.healthy());
        assert_eq!(status.failure_reasons(), vec!["failed tcp check web".to_string()]);
    }

    #[test]
    fn test_missing_interface_reason() {
        let status = InterfaceStatus::new("wg9");
        assert!(!status.healthy());
        assert_eq!(status.failure_reasons(), vec!["interface does not exist".to_string()]);
    }

    #[test]
    fn test_basic_reasons() {
        let status = InterfaceStatus {
            exists: true,
            ..InterfaceStatus::new("wg0")
        };
        assert_eq!(
            status.failure_reasons(),
            vec![
                "interface is not up".to_string(),
                "interface not properly addressed".to_string()
            ]
        );
    }

    #[test]
    fn test_no_checks_is_healthy_when_basic_ok() {
        assert!(basic_ok("wg0").healthy());
    }
}
