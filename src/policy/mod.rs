//! Load-balancing policy.
//!
//! # Data Flow
//! ```text
//! Healthy set
//!     → compute.rs (All | Subset | nothing)
//!     → rule.rs (weighted jhash/vmap rule)
//!     → apply.rs (install through a ClassificationTable, once per change)
//! ```

pub mod apply;
pub mod compute;
pub mod rule;

pub use apply::{ApplyError, ApplyOutcome, PolicyApplier};
pub use compute::{compute_policy, Policy};
pub use rule::{PolicyError, Rule};
