//! Target policy computation.
//!
//! `All` when every configured interface is healthy, otherwise the healthy
//! subset in configuration order. No healthy interface yields no policy: the
//! caller keeps whatever is installed.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::config::settings::Interface;

/// Set of interfaces admitted to the distribution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Policy {
    All,
    /// Healthy interfaces in configuration order.
    Subset(Vec<String>),
}

impl Policy {
    /// Interfaces carrying traffic under this policy, in configuration order.
    pub fn members<'a>(&self, interfaces: &'a [Arc<Interface>]) -> Vec<&'a Interface> {
        match self {
            Policy::All => interfaces.iter().map(Arc::as_ref).collect(),
            Policy::Subset(names) => interfaces
                .iter()
                .filter(|i| names.contains(&i.name))
                .map(Arc::as_ref)
                .collect(),
        }
    }

    /// Whether installing `self` changes anything given the last applied policy.
    pub fn requires_update(&self, last_applied: Option<&Policy>) -> bool {
        last_applied != Some(self)
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Policy::All => f.write_str("all"),
            Policy::Subset(names) => f.write_str(&names.join("|")),
        }
    }
}

pub fn compute_policy(interfaces: &[Arc<Interface>], healthy: &HashSet<String>) -> Option<Policy> {
    let admitted: Vec<String> = interfaces
        .iter()
        .filter(|i| healthy.contains(&i.name))
        .map(|i| i.name.clone())
        .collect();

    if admitted.is_empty() {
        None
    } else if admitted.len() == interfaces.len() {
        Some(Policy::All)
    } else {
        Some(Policy::Subset(admitted))
    }
}
