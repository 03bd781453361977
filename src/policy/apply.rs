//! Idempotent policy installation.
//!
//! # Responsibilities
//! - Prepare the table: distribution chain, target chains, mark rules
//! - Install a policy only when it differs from the last applied one
//! - Remember the last applied policy only after a successful commit
//!
//! # Data Flow
//! ```text
//! initialize:  add table → commit → add chain → commit
//!              per interface: add target chain → commit
//!                             [flush target → mark rule → commit]
//! apply:       build rule → flush distribution chain + install → commit
//! ```

use std::sync::Arc;

use thiserror::Error;

use crate::classifier::{ClassificationTable, TableError};
use crate::config::settings::{Interface, TableSpec};
use crate::policy::compute::Policy;
use crate::policy::rule::{ChainRef, PolicyError, Rule};

#[derive(Debug, Error)]
pub enum ApplyError {
    /// The policy cannot be expressed; configuration must change.
    #[error(transparent)]
    Policy(#[from] PolicyError),
    /// The backend refused or failed; worth retrying next cycle.
    #[error(transparent)]
    Table(#[from] TableError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Unchanged,
    Installed(Rule),
}

pub struct PolicyApplier {
    table: Box<dyn ClassificationTable>,
    spec: TableSpec,
    chain: String,
    initialized: bool,
    last_applied: Option<Policy>,
}

impl PolicyApplier {
    pub fn new(table: Box<dyn ClassificationTable>, spec: TableSpec, chain: impl Into<String>) -> Self {
        Self {
            table,
            spec,
            chain: chain.into(),
            initialized: false,
            last_applied: None,
        }
    }

    pub fn last_applied(&self) -> Option<&Policy> {
        self.last_applied.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Point at a (possibly new) table location and forget what was applied.
    pub fn reset(&mut self, spec: TableSpec, chain: impl Into<String>) {
        self.spec = spec;
        self.chain = chain.into();
        self.initialized = false;
        self.last_applied = None;
    }

    pub async fn connect(&mut self) -> Result<(), TableError> {
        self.table.connect().await
    }

    /// Current rules of the distribution chain, for diagnostics.
    pub async fn list_distribution_rules(&mut self) -> Result<Vec<String>, TableError> {
        self.table.list_rules(&self.spec, &self.chain).await
    }

    /// Create the table, the distribution chain and every target chain, and
    /// install the mark rules.
    pub async fn initialize(&mut self, interfaces: &[Arc<Interface>]) -> Result<(), TableError> {
        match self.list_distribution_rules().await {
            Ok(rules) => {
                for rule in rules {
                    tracing::debug!(chain = %self.chain, rule = %rule, "Existing rule");
                }
            }
            Err(e) => tracing::debug!(chain = %self.chain, error = %e, "No existing distribution chain"),
        }

        tracing::info!(table = %self.spec.name, family = %self.spec.family, "Creating table");
        self.table.add_table(&self.spec);
        self.table.commit().await?;

        tracing::info!(chain = %self.chain, "Creating distribution chain");
        self.table.add_chain(&self.spec, &self.chain);
        self.table.commit().await?;

        for interface in interfaces {
            tracing::info!(nif = %interface.name, chain = %interface.target, "Creating target chain");
            self.table.add_chain(&self.spec, &interface.target);
            self.table.commit().await?;

            if let Some(mark) = interface.mark {
                let rule = Rule::mark(ChainRef::new(&self.spec, &interface.target), mark, interface.counter);
                tracing::info!(nif = %interface.name, rule = %rule, "Installing mark rule");
                self.table.flush_chain(&self.spec, &interface.target);
                self.table.install_rule(&rule);
                self.table.commit().await?;
            }
        }

        self.initialized = true;
        Ok(())
    }

    /// Install `policy` unless it is already in place.
    pub async fn apply(&mut self, policy: &Policy, interfaces: &[Arc<Interface>]) -> Result<ApplyOutcome, ApplyError> {
        if !policy.requires_update(self.last_applied.as_ref()) {
            return Ok(ApplyOutcome::Unchanged);
        }

        if !self.initialized {
            self.initialize(interfaces).await?;
        }

        let members = policy.members(interfaces);
        let rule = Rule::distribution(ChainRef::new(&self.spec, &self.chain), &policy.to_string(), &members)?;

        tracing::info!(policy = %policy, rule = %rule, "Installing distribution rule");
        self.table.flush_chain(&self.spec, &self.chain);
        self.table.install_rule(&rule);
        self.table.commit().await?;

        self.last_applied = Some(policy.clone());
        Ok(ApplyOutcome::Installed(rule))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::MemoryTable;
    use crate::config::settings::TableFamily;

    fn spec() -> TableSpec {
        TableSpec {
            family: TableFamily::Inet,
            name: "vps".into(),
        }
    }

    fn iface(name: &str, ratio: u32, mark: Option<u32>) -> Arc<Interface> {
        Arc::new(Interface {
            name: name.into(),
            address: "10.8.0.2/24".into(),
            ratio,
            target: format!("to_{}", name),
            mark,
            counter: false,
            checks: Vec::new(),
        })
    }

    #[tokio::test]
    async fn test_initialize_creates_chains_and_marks() {
        let table = MemoryTable::new();
        let mut applier = PolicyApplier::new(Box::new(table.clone()), spec(), "lb");
        let interfaces = vec![iface("wg0", 1, Some(16)), iface("wg1", 1, None)];

        applier.initialize(&interfaces).await.unwrap();
        assert!(applier.is_initialized());
        assert!(table.has_chain(&spec(), "lb"));
        assert!(table.has_chain(&spec(), "to_wg1"));
        assert_eq!(
            table.rules(&spec(), "to_wg0"),
            vec!["add rule inet vps to_wg0 meta mark set 16 return".to_string()]
        );
        assert!(table.rules(&spec(), "to_wg1").is_empty());
    }

    #[tokio::test]
    async fn test_apply_is_idempotent() {
        let table = MemoryTable::new();
        let mut applier = PolicyApplier::new(Box::new(table.clone()), spec(), "lb");
        let interfaces = vec![iface("wg0", 3, None), iface("wg1", 7, None)];

        let first = applier.apply(&Policy::All, &interfaces).await.unwrap();
        assert!(matches!(first, ApplyOutcome::Installed(_)));
        let commits = table.commits();

        assert_eq!(applier.apply(&Policy::All, &interfaces).await.unwrap(), ApplyOutcome::Unchanged);
        assert_eq!(table.commits(), commits);
        assert_eq!(table.rules(&spec(), "lb").len(), 1);
    }

    #[tokio::test]
    async fn test_failed_commit_keeps_last_applied() {
        let table = MemoryTable::new();
        let mut applier = PolicyApplier::new(Box::new(table.clone()), spec(), "lb");
        let interfaces = vec![iface("wg0", 1, None), iface("wg1", 1, None)];
        applier.apply(&Policy::All, &interfaces).await.unwrap();

        let degraded = Policy::Subset(vec!["wg1".into()]);
        table.fail_next_commits(1);
        assert!(matches!(applier.apply(&degraded, &interfaces).await, Err(ApplyError::Table(_))));
        assert_eq!(applier.last_applied(), Some(&Policy::All));

        applier.apply(&degraded, &interfaces).await.unwrap();
        assert_eq!(applier.last_applied(), Some(&degraded));
        assert_eq!(
            table.rules(&spec(), "lb"),
            vec!["add rule inet vps lb jhash ip saddr . ether saddr . meta l4proto . th sport mod 1 vmap { 0-0 : goto to_wg1 }".to_string()]
        );
    }

    #[tokio::test]
    async fn test_zero_ratio_policy_is_an_error() {
        let table = MemoryTable::new();
        let mut applier = PolicyApplier::new(Box::new(table.clone()), spec(), "lb");
        let interfaces = vec![iface("wg0", 0, None), iface("wg1", 2, None)];
        let result = applier.apply(&Policy::Subset(vec!["wg0".into()]), &interfaces).await;
        assert!(matches!(result, Err(ApplyError::Policy(PolicyError::ZeroRatioSum { .. }))));
        assert!(applier.last_applied().is_none());
        assert!(table.rules(&spec(), "lb").is_empty());
    }

    #[tokio::test]
    async fn test_reset_forgets_last_applied() {
        let table = MemoryTable::new();
        let mut applier = PolicyApplier::new(Box::new(table.clone()), spec(), "lb");
        let interfaces = vec![iface("wg0", 1, None)];
        applier.apply(&Policy::All, &interfaces).await.unwrap();

        applier.reset(spec(), "lb2");
        assert!(applier.last_applied().is_none());
        assert!(!applier.is_initialized());
        assert!(matches!(applier.apply(&Policy::All, &interfaces).await.unwrap(), ApplyOutcome::Installed(_)));
        assert_eq!(table.rules(&spec(), "lb2").len(), 1);
    }
}
