//! Network facts about local interfaces.
//!
//! # Data Flow
//! ```text
//! InterfaceMonitor basic checks
//!     → link.rs (exists? up? expected address?)
//!     → LinkInfo
//! ```

pub mod link;

pub use link::{LinkInfo, LinkInspector, SystemLinks};
