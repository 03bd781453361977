//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Terminate → drain in-flight cycle → exit 0
//!     SIGHUP         → Reload    → drain in-flight cycle → reload config
//!                                  → re-initialise table → continue
//! ```
//!
//! # Design Decisions
//! - Startup is fail fast: config and table errors are fatal
//! - A cycle is never abandoned mid-flight

pub mod signals;

pub use signals::LifecycleEvent;
