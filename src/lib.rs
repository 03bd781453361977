//! VPN path health-check controller library.

// Core subsystems
pub mod config;
pub mod control;
pub mod net;
pub mod vpn;

// Health and traffic policy
pub mod classifier;
pub mod health;
pub mod policy;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::Settings;
pub use control::ControlLoop;
pub use lifecycle::LifecycleEvent;
