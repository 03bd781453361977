//! path-watcher
//!
//! Keeps traffic spread over the VPN paths that are currently healthy.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────┐
//!   │                          CONTROL LOOP                            │
//!   │                                                                  │
//!   │  ticker ──▶ per-interface tasks ──▶ join ──▶ policy ──▶ applier  │
//!   │               │                               │          │       │
//!   │               ▼                               ▼          ▼       │
//!   │        ┌─────────────┐                 ┌──────────┐ ┌────────┐  │
//!   │        │ link checks │                 │ all |    │ │  nft   │  │
//!   │        │ tcp / icmp  │                 │ a|b|...  │ │ -j -f  │  │
//!   │        │ http / peer │                 └──────────┘ └────────┘  │
//!   │        └─────────────┘                                          │
//!   │                                                                  │
//!   │  SIGHUP / file watch ──▶ reload (between cycles)                 │
//!   │  SIGINT / SIGTERM    ──▶ drain and exit                          │
//!   └──────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;

use path_watcher::classifier::{ClassificationTable, MemoryTable, NftTable};
use path_watcher::config::watcher::ConfigWatcher;
use path_watcher::config::{load_settings, Settings};
use path_watcher::control::ControlLoop;
use path_watcher::lifecycle::signals::spawn_signal_listener;
use path_watcher::net::SystemLinks;
use path_watcher::observability::{logging, metrics};
use path_watcher::policy::rule::{ChainRef, Rule};
use path_watcher::policy::{Policy, PolicyError};
use path_watcher::vpn::WireguardInventory;

#[derive(Parser, Debug)]
#[command(name = "path-watcher", version)]
#[command(about = "Health-checks VPN paths and spreads traffic over the healthy ones", long_about = None)]
struct Cli {
    /// Configuration file (YAML, or TOML with a .toml extension)
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Log level or filter directive; RUST_LOG takes precedence
    #[arg(long = "log-level", visible_alias = "logLevel", default_value = logging::DEFAULT_LEVEL)]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    /// Reload when the configuration file changes
    #[arg(long)]
    watch: bool,

    /// Keep rules in memory and log them instead of calling nft
    #[arg(long)]
    dry_run: bool,

    /// Validate the configuration, print the rules for the all-healthy case and exit
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init(&cli.log_level, cli.log_json);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "path-watcher starting");

    let settings = load_settings(&cli.config).inspect_err(|e| {
        tracing::error!(path = %cli.config.display(), error = %e, "Failed to load configuration");
    })?;

    tracing::info!(
        path = %cli.config.display(),
        interfaces = settings.interfaces.len(),
        table = %settings.table.name,
        chain = %settings.chain,
        "Configuration loaded"
    );

    if cli.check_config {
        print_plan(&settings)?;
        return Ok(());
    }

    if settings.observability.metrics_enabled {
        if let Ok(addr) = settings.observability.metrics_address.parse() {
            metrics::init_metrics(addr)?;
        } else {
            tracing::error!(
                metrics_address = %settings.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let table: Box<dyn ClassificationTable> = if cli.dry_run {
        tracing::warn!("Dry run: rules are kept in memory only");
        Box::new(MemoryTable::new())
    } else {
        Box::new(NftTable::default())
    };

    let mut control = ControlLoop::new(
        settings,
        Arc::new(SystemLinks),
        Arc::new(WireguardInventory::default()),
        table,
    )
    .with_config_path(cli.config.clone());
    control.start().await?;

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let _signals = spawn_signal_listener(events_tx.clone())?;
    let _watcher = if cli.watch {
        Some(ConfigWatcher::new(&cli.config, events_tx.clone()).run()?)
    } else {
        None
    };
    drop(events_tx);

    control.run(events_rx).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Print the mark rules and the distribution rule for the all-healthy case.
fn print_plan(settings: &Settings) -> Result<(), PolicyError> {
    for interface in &settings.interfaces {
        if let Some(mark) = interface.mark {
            let location = ChainRef::new(&settings.table, &interface.target);
            println!("{}", Rule::mark(location, mark, interface.counter));
        }
    }

    let members = Policy::All.members(&settings.interfaces);
    let location = ChainRef::new(&settings.table, &settings.chain);
    println!("{}", Rule::distribution(location, &Policy::All.to_string(), &members)?);
    Ok(())
}
