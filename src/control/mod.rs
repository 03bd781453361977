//! Control loop subsystem.
//!
//! # Data Flow
//! ```text
//! Ticker / LifecycleEvent
//!     → runner.rs: one cycle
//!         → health (per-interface tasks, joined)
//!         → policy::compute_policy
//!         → policy::PolicyApplier
//!     → cycle.rs: CycleOutcome
//! ```

pub mod cycle;
pub mod runner;

pub use cycle::{ControlError, CycleOutcome};
pub use runner::ControlLoop;
