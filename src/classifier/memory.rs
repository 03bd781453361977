//! In-process classification table.
//!
//! Keeps tables, chains and rules in memory and logs every committed
//! operation. Used by `--dry-run` and by tests; clones share state so a caller
//! can inspect the table after handing a boxed clone to the control loop.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::classifier::{ClassificationTable, TableError};
use crate::config::settings::TableSpec;
use crate::policy::rule::{ChainRef, Rule};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Op {
    AddTable(String),
    AddChain(String),
    Flush(String),
    Install(String, String),
}

#[derive(Debug, Default)]
struct State {
    tables: BTreeSet<String>,
    chains: BTreeMap<String, Vec<String>>,
    pending: Vec<Op>,
    journal: Vec<String>,
    commits: usize,
    failures_left: u32,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    state: Arc<Mutex<State>>,
}

fn table_key(table: &TableSpec) -> String {
    format!("{} {}", table.family, table.name)
}

fn chain_key(table: &TableSpec, chain: &str) -> String {
    ChainRef::new(table, chain).to_string()
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // A panicking holder cannot leave the maps half-updated; keep going.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make the next `n` commits fail.
    pub fn fail_next_commits(&self, n: u32) {
        self.state().failures_left = n;
    }

    /// Rules of `chain` in `family table chain` form.
    pub fn rules(&self, table: &TableSpec, chain: &str) -> Vec<String> {
        self.state()
            .chains
            .get(&chain_key(table, chain))
            .cloned()
            .unwrap_or_default()
    }

    pub fn has_chain(&self, table: &TableSpec, chain: &str) -> bool {
        self.state().chains.contains_key(&chain_key(table, chain))
    }

    pub fn has_table(&self, table: &TableSpec) -> bool {
        self.state().tables.contains(&table_key(table))
    }

    /// Every operation committed so far, in order.
    pub fn journal(&self) -> Vec<String> {
        self.state().journal.clone()
    }

    /// Successful commits so far.
    pub fn commits(&self) -> usize {
        self.state().commits
    }

    fn stage(&self, op: Op) {
        self.state().pending.push(op);
    }
}

#[async_trait]
impl ClassificationTable for MemoryTable {
    async fn connect(&mut self) -> Result<(), TableError> {
        Ok(())
    }

    fn add_table(&mut self, table: &TableSpec) {
        self.stage(Op::AddTable(table_key(table)));
    }

    fn add_chain(&mut self, table: &TableSpec, chain: &str) {
        self.stage(Op::AddChain(chain_key(table, chain)));
    }

    fn flush_chain(&mut self, table: &TableSpec, chain: &str) {
        self.stage(Op::Flush(chain_key(table, chain)));
    }

    fn install_rule(&mut self, rule: &Rule) {
        self.stage(Op::Install(rule.location.to_string(), rule.to_string()));
    }

    async fn commit(&mut self) -> Result<(), TableError> {
        let mut state = self.state();
        let ops = std::mem::take(&mut state.pending);
        if ops.is_empty() {
            return Ok(());
        }

        if state.failures_left > 0 {
            state.failures_left -= 1;
            return Err(TableError::Rejected {
                status: "injected".to_string(),
                stderr: "commit refused".to_string(),
            });
        }

        // Validate the whole batch before touching state, like a kernel transaction.
        let mut known: BTreeSet<String> = state.chains.keys().cloned().collect();
        for op in &ops {
            match op {
                Op::AddChain(chain) => {
                    known.insert(chain.clone());
                }
                Op::Flush(chain) | Op::Install(chain, _) if !known.contains(chain) => {
                    return Err(TableError::Rejected {
                        status: "1".to_string(),
                        stderr: format!("no such chain: {}", chain),
                    });
                }
                _ => {}
            }
        }

        for op in ops {
            match op {
                Op::AddTable(table) => {
                    state.journal.push(format!("add table {}", table));
                    state.tables.insert(table);
                }
                Op::AddChain(chain) => {
                    state.journal.push(format!("add chain {}", chain));
                    state.chains.entry(chain).or_default();
                }
                Op::Flush(chain) => {
                    state.journal.push(format!("flush chain {}", chain));
                    if let Some(rules) = state.chains.get_mut(&chain) {
                        rules.clear();
                    }
                }
                Op::Install(chain, text) => {
                    tracing::info!(rule = %text, "Installed rule");
                    state.journal.push(text.clone());
                    state.chains.entry(chain).or_default().push(text);
                }
            }
        }
        state.commits += 1;
        Ok(())
    }

    async fn list_rules(&mut self, table: &TableSpec, chain: &str) -> Result<Vec<String>, TableError> {
        Ok(self.rules(table, chain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::TableFamily;

    fn table() -> TableSpec {
        TableSpec {
            family: TableFamily::Inet,
            name: "vps".into(),
        }
    }

    #[tokio::test]
    async fn test_commit_applies_staged_ops() {
        let handle = MemoryTable::new();
        let mut table_ops = handle.clone();
        table_ops.add_table(&table());
        table_ops.add_chain(&table(), "to_wg0");
        table_ops.install_rule(&Rule::mark(ChainRef::new(&table(), "to_wg0"), 16, true));
        assert!(handle.rules(&table(), "to_wg0").is_empty());

        table_ops.commit().await.unwrap();
        assert!(handle.has_table(&table()));
        assert_eq!(
            handle.rules(&table(), "to_wg0"),
            vec!["add rule inet vps to_wg0 meta mark set 16 counter return".to_string()]
        );
        assert_eq!(handle.commits(), 1);
    }

    #[tokio::test]
    async fn test_failed_commit_discards_batch() {
        let mut table_ops = MemoryTable::new();
        table_ops.fail_next_commits(1);
        table_ops.add_chain(&table(), "lb");
        assert!(table_ops.commit().await.is_err());
        assert!(!table_ops.has_chain(&table(), "lb"));
        assert!(table_ops.commit().await.is_ok());
        assert!(table_ops.journal().is_empty());
    }

    #[tokio::test]
    async fn test_flush_unknown_chain_rejected() {
        let mut table_ops = MemoryTable::new();
        table_ops.flush_chain(&table(), "lb");
        assert!(matches!(table_ops.commit().await, Err(TableError::Rejected { .. })));
    }
}
