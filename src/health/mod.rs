//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Per interface, every cycle (monitor.rs):
//!     Basic checks via LinkInspector
//!     → Configured checks in order (probe.rs → tcp/icmp/http/peer)
//!     → InterfaceStatus (state.rs)
//!
//! Flap damping (flap.rs):
//!     Healthy → Unhealthy transition
//!     → Interface skipped until the quiet period passes
//! ```
//!
//! # Design Decisions
//! - Probes report verdicts, never errors
//! - Health state is per-interface, rebuilt each evaluation
//! - Retries live inside a check, damping lives across cycles

pub mod flap;
pub mod http;
pub mod icmp;
pub mod monitor;
pub mod peer;
pub mod probe;
pub mod state;
pub mod tcp;

pub use flap::FlapDamper;
pub use monitor::InterfaceMonitor;
pub use probe::{run_check, ProbeContext, ProbeVerdict};
pub use state::{CheckResult, InterfaceStatus};
