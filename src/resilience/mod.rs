//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Health probe attempt:
//!     → per attempt timeout (inside the probe)
//!     → On failure: retries.rs (retryable? sleep interval, try again)
//!     → Verdict with the number of attempts made
//! ```
//!
//! # Design Decisions
//! - Every network attempt has a deadline
//! - Retries are bounded; the worst case of a check is known up front

pub mod retries;
