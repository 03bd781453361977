//! Cycle results and control errors.

use std::fmt;

use thiserror::Error;

use crate::classifier::TableError;
use crate::policy::{Policy, PolicyError};

/// What one evaluation cycle ended with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A new distribution rule was committed.
    Applied(Policy),
    /// The target policy was already installed.
    Unchanged(Policy),
    /// Nothing healthy; the installed rule was left alone.
    NoHealthy,
    /// The backend failed; retried next cycle.
    ApplyFailed(Policy),
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleOutcome::Applied(p) => write!(f, "applied {}", p),
            CycleOutcome::Unchanged(p) => write!(f, "unchanged {}", p),
            CycleOutcome::NoHealthy => f.write_str("no healthy interfaces"),
            CycleOutcome::ApplyFailed(p) => write!(f, "failed to apply {}", p),
        }
    }
}

/// Errors that stop the control loop.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("classification table: {0}")]
    Table(#[from] TableError),
    #[error("policy: {0}")]
    Policy(#[from] PolicyError),
}
