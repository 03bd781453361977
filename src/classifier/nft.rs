//! nftables backend.
//!
//! Staged operations are collected as `nftables` schema objects and submitted
//! through `nftables::helper` on commit, so each commit is one kernel
//! transaction. The helper runs `nft` synchronously; it is moved onto the
//! blocking pool.

use std::borrow::Cow;

use async_trait::async_trait;
use nftables::{helper, schema};

use crate::classifier::{ClassificationTable, TableError};
use crate::config::settings::TableSpec;
use crate::policy::rule::{nf_family, ChainRef, Rule};

pub const DEFAULT_PROGRAM: &str = "nft";

const NO_ARGS: &[&str] = &[];

#[derive(Debug, Clone)]
pub struct NftTable {
    program: String,
    batch: Vec<schema::NfObject<'static>>,
}

impl Default for NftTable {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

impl NftTable {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            batch: Vec::new(),
        }
    }

    /// Commands staged since the last commit.
    pub fn staged(&self) -> &[schema::NfObject<'static>] {
        &self.batch
    }

    /// The document `commit` would submit.
    pub fn document(&self) -> schema::Nftables<'static> {
        schema::Nftables {
            objects: Cow::Owned(self.batch.clone()),
        }
    }

    fn stage(&mut self, command: schema::NfCmd<'static>) {
        self.batch.push(schema::NfObject::CmdObject(command));
    }

    async fn list(&self, args: Vec<String>) -> Result<schema::Nftables<'static>, TableError> {
        let program = self.program.clone();
        let listing = tokio::task::spawn_blocking(move || {
            helper::get_current_ruleset_with_args(Some(program.as_str()), &args)
        })
        .await??;
        Ok(listing)
    }
}

fn table_schema(table: &TableSpec) -> schema::Table<'static> {
    schema::Table {
        family: nf_family(table.family),
        name: Cow::Owned(table.name.clone()),
        ..Default::default()
    }
}

#[async_trait]
impl ClassificationTable for NftTable {
    async fn connect(&mut self) -> Result<(), TableError> {
        let tables = self
            .list(vec!["list".into(), "tables".into()])
            .await
            .map_err(|e| TableError::Unavailable(e.to_string()))?;
        tracing::debug!(objects = tables.objects.len(), "Connected to nftables");
        Ok(())
    }

    fn add_table(&mut self, table: &TableSpec) {
        self.stage(schema::NfCmd::Add(schema::NfListObject::Table(table_schema(table))));
    }

    fn add_chain(&mut self, table: &TableSpec, chain: &str) {
        let chain = ChainRef::new(table, chain);
        self.stage(schema::NfCmd::Add(schema::NfListObject::Chain(chain.to_schema())));
    }

    fn flush_chain(&mut self, table: &TableSpec, chain: &str) {
        let chain = ChainRef::new(table, chain);
        self.stage(schema::NfCmd::Flush(schema::FlushObject::Chain(chain.to_schema())));
    }

    fn install_rule(&mut self, rule: &Rule) {
        self.stage(schema::NfCmd::Add(schema::NfListObject::Rule(rule.to_schema())));
    }

    async fn commit(&mut self) -> Result<(), TableError> {
        if self.batch.is_empty() {
            return Ok(());
        }

        let document = schema::Nftables {
            objects: Cow::Owned(std::mem::take(&mut self.batch)),
        };
        let program = self.program.clone();
        tokio::task::spawn_blocking(move || {
            helper::apply_ruleset_with_args(&document, Some(program.as_str()), NO_ARGS)
        })
        .await??;
        Ok(())
    }

    async fn list_rules(&mut self, table: &TableSpec, chain: &str) -> Result<Vec<String>, TableError> {
        let listing = self
            .list(vec![
                "list".into(),
                "chain".into(),
                table.family.as_str().into(),
                table.name.clone(),
                chain.to_string(),
            ])
            .await?;
        Ok(describe_rules(&listing))
    }
}

/// One line per rule object of a listing: handle and expression JSON.
fn describe_rules(listing: &schema::Nftables<'_>) -> Vec<String> {
    listing
        .objects
        .iter()
        .filter_map(|object| match object {
            schema::NfObject::ListObject(schema::NfListObject::Rule(rule)) => Some(rule),
            _ => None,
        })
        .map(|rule| {
            let expr = serde_json::to_string(&rule.expr).unwrap_or_default();
            match rule.handle {
                Some(handle) => format!("handle {} {}", handle, expr),
                None => expr,
            }
        })
        .collect()
}
