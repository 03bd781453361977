//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Table family, table and chain names
//! - Unique interface names and unique check names per interface
//! - Per check required fields (host, port)
//! - Interface ratios bounded by `MAX_RATIO`
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: WatcherConfig → Result<(), Vec<ValidationError>>
//! - Unknown check types are not errors here; resolution skips them

use std::collections::HashSet;

use thiserror::Error;

use crate::config::schema::{CheckConfig, WatcherConfig};
use crate::config::settings::TableFamily;

/// Largest accepted interface ratio; keeps the hash modulus far from overflow.
pub const MAX_RATIO: u32 = 255;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("unsupported table family '{0}' (expected ip, ip6 or inet)")]
    UnsupportedFamily(String),

    #[error("lbtable.name must not be empty")]
    MissingTableName,

    #[error("lbchain must not be empty")]
    MissingChain,

    #[error("no interfaces configured")]
    NoInterfaces,

    #[error("interface #{0} has no name")]
    UnnamedInterface(usize),

    #[error("interface '{0}' is declared more than once")]
    DuplicateInterface(String),

    #[error("interface '{interface}' ratio {ratio} exceeds {max}", max = MAX_RATIO)]
    RatioTooLarge { interface: String, ratio: u32 },

    #[error("interface '{0}' has no target chain")]
    MissingTarget(String),

    #[error("interface '{0}' target chain is the distribution chain")]
    TargetIsDistributionChain(String),

    #[error("interface '{interface}' has a check without a name")]
    UnnamedCheck { interface: String },

    #[error("interface '{interface}' declares check '{check}' more than once")]
    DuplicateCheck { interface: String, check: String },

    #[error("check '{check}' on '{interface}' has no host")]
    MissingHost { interface: String, check: String },

    #[error("check '{check}' on '{interface}' has invalid port '{port}'")]
    InvalidPort {
        interface: String,
        check: String,
        port: String,
    },

    #[error("check '{check}' on '{interface}' has negative maxlosspcnt")]
    NegativeLoss { interface: String, check: String },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &WatcherConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.lbtable.family.parse::<TableFamily>().is_err() {
        errors.push(ValidationError::UnsupportedFamily(config.lbtable.family.clone()));
    }
    if config.lbtable.name.trim().is_empty() {
        errors.push(ValidationError::MissingTableName);
    }
    if config.lbchain.trim().is_empty() {
        errors.push(ValidationError::MissingChain);
    }
    if config.interfaces.is_empty() {
        errors.push(ValidationError::NoInterfaces);
    }

    let mut names = HashSet::new();
    for (idx, nif) in config.interfaces.iter().enumerate() {
        if nif.name.trim().is_empty() {
            errors.push(ValidationError::UnnamedInterface(idx));
            continue;
        }
        if !names.insert(nif.name.as_str()) {
            errors.push(ValidationError::DuplicateInterface(nif.name.clone()));
        }
        if nif.ratio > MAX_RATIO {
            errors.push(ValidationError::RatioTooLarge {
                interface: nif.name.clone(),
                ratio: nif.ratio,
            });
        }
        if nif.target.trim().is_empty() {
            errors.push(ValidationError::MissingTarget(nif.name.clone()));
        } else if nif.target == config.lbchain {
            errors.push(ValidationError::TargetIsDistributionChain(nif.name.clone()));
        }

        let mut checks = HashSet::new();
        for check in &nif.checks {
            if check.name.trim().is_empty() {
                errors.push(ValidationError::UnnamedCheck {
                    interface: nif.name.clone(),
                });
                continue;
            }
            if !checks.insert(check.name.as_str()) {
                errors.push(ValidationError::DuplicateCheck {
                    interface: nif.name.clone(),
                    check: check.name.clone(),
                });
            }
            validate_check(&nif.name, check, &mut errors);
        }

        // The legacy wireguard flag synthesises a check with this name.
        if nif.wireguard && checks.contains("wireguard") {
            errors.push(ValidationError::DuplicateCheck {
                interface: nif.name.clone(),
                check: "wireguard".to_string(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_check(interface: &str, check: &CheckConfig, errors: &mut Vec<ValidationError>) {
    let needs_host = matches!(check.kind.as_str(), "tcp" | "icmp" | "http");
    if needs_host && check.host.trim().is_empty() {
        errors.push(ValidationError::MissingHost {
            interface: interface.to_string(),
            check: check.name.clone(),
        });
    }

    if check.kind == "tcp" && check.port.parse::<u16>().map_or(true, |p| p == 0) {
        errors.push(ValidationError::InvalidPort {
            interface: interface.to_string(),
            check: check.name.clone(),
            port: check.port.clone(),
        });
    }

    if check.kind == "icmp" && check.maxlosspcnt < 0.0 {
        errors.push(ValidationError::NegativeLoss {
            interface: interface.to_string(),
            check: check.name.clone(),
        });
    }
}
