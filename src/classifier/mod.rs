//! Packet classification backends.
//!
//! # Responsibilities
//! - Stage table, chain, flush and rule operations
//! - Submit staged operations atomically on `commit`
//! - List the rules of a chain for diagnostics
//!
//! # Design Decisions
//! - Staging calls never fail; errors surface on `commit`
//! - Backend I/O is async so a slow `nft` never stalls the runtime
//! - A failed commit discards the staged batch
//! - `nft.rs` drives the system `nft` binary, `memory.rs` keeps state in process
//!   for dry runs

pub mod memory;
pub mod nft;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::settings::TableSpec;
use crate::policy::rule::Rule;

pub use memory::MemoryTable;
pub use nft::NftTable;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("classification backend unavailable: {0}")]
    Unavailable(String),
    #[error("nftables: {0}")]
    Nft(#[from] nftables::helper::NftablesError),
    #[error("batch rejected ({status}): {stderr}")]
    Rejected { status: String, stderr: String },
    #[error("backend task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Staged, transactional access to the classification table.
#[async_trait]
pub trait ClassificationTable: Send + Sync {
    /// Open the backend; called once before any other operation.
    async fn connect(&mut self) -> Result<(), TableError>;

    fn add_table(&mut self, table: &TableSpec);

    fn add_chain(&mut self, table: &TableSpec, chain: &str);

    fn flush_chain(&mut self, table: &TableSpec, chain: &str);

    fn install_rule(&mut self, rule: &Rule);

    /// Submit everything staged since the last commit.
    async fn commit(&mut self) -> Result<(), TableError>;

    /// Current rules of `chain`, one description per rule.
    async fn list_rules(&mut self, table: &TableSpec, chain: &str) -> Result<Vec<String>, TableError>;
}
