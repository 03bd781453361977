//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (YAML/TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → resolve.rs (defaults, durations via duration.rs)
//!     → Settings (validated, immutable)
//!     → owned by the control loop, shared via Arc with probe tasks
//!
//! On reload (SIGHUP or watcher.rs):
//!     → in-flight cycle drains
//!     → loader.rs loads new config
//!     → snapshot replaced wholesale
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Malformed durations fall back to defaults, malformed structure is fatal

pub mod duration;
pub mod loader;
pub mod resolve;
pub mod schema;
pub mod settings;
pub mod validation;
pub mod watcher;

pub use loader::{load_settings, ConfigError};
pub use schema::WatcherConfig;
pub use settings::{CheckKind, HealthCheckSpec, Interface, Settings, TableFamily, TableSpec};
