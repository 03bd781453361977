//! The control loop.
//!
//! # Responsibilities
//! - Tick every `interval` and run one evaluation cycle
//! - Fan out one task per non-damped interface, join them all
//! - Compute the target policy and hand it to the applier
//! - React to reload and terminate events between cycles
//!
//! # Design Decisions
//! - Events are only read between cycles, so a cycle is never interrupted
//! - Missed ticks are skipped; cycles never overlap
//! - Flap state, statuses and the applier are owned here and mutated only
//!   after the join

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::Instrument;
use uuid::Uuid;

use crate::classifier::ClassificationTable;
use crate::config::{load_settings, Settings};
use crate::control::cycle::{ControlError, CycleOutcome};
use crate::health::{FlapDamper, InterfaceMonitor, InterfaceStatus, ProbeContext};
use crate::lifecycle::LifecycleEvent;
use crate::net::LinkInspector;
use crate::observability::metrics;
use crate::policy::{compute_policy, ApplyError, ApplyOutcome, Policy, PolicyApplier};
use crate::vpn::{find_device, list_devices_blocking, PeerInventory};

pub struct ControlLoop {
    settings: Arc<Settings>,
    config_path: Option<PathBuf>,
    links: Arc<dyn LinkInspector>,
    probes: Arc<ProbeContext>,
    applier: PolicyApplier,
    damper: FlapDamper,
    statuses: HashMap<String, InterfaceStatus>,
}

impl ControlLoop {
    pub fn new(
        settings: Settings,
        links: Arc<dyn LinkInspector>,
        inventory: Arc<dyn PeerInventory>,
        table: Box<dyn ClassificationTable>,
    ) -> Self {
        let applier = PolicyApplier::new(table, settings.table.clone(), settings.chain.clone());
        Self {
            damper: FlapDamper::new(settings.quiet_period),
            settings: Arc::new(settings),
            config_path: None,
            links,
            probes: Arc::new(ProbeContext::new(inventory)),
            applier,
            statuses: HashMap::new(),
        }
    }

    /// File re-read on reload.
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn last_applied(&self) -> Option<&Policy> {
        self.applier.last_applied()
    }

    /// Latest status of an interface, if it was ever evaluated.
    pub fn status(&self, name: &str) -> Option<&InterfaceStatus> {
        self.statuses.get(name)
    }

    pub fn is_damped(&self, name: &str) -> bool {
        self.damper.is_damped(name, Instant::now())
    }

    /// Connect to the backend and prepare the table. Failures are fatal at startup.
    pub async fn start(&mut self) -> Result<(), ControlError> {
        self.applier.connect().await?;
        self.check_inventory().await;
        self.applier.initialize(&self.settings.interfaces).await?;
        tracing::info!(
            interfaces = self.settings.interfaces.len(),
            interval = ?self.settings.interval,
            quiet_period = ?self.settings.quiet_period,
            "Control loop ready"
        );
        Ok(())
    }

    /// Run until a terminate event arrives or the event channel closes.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<LifecycleEvent>) -> Result<(), ControlError> {
        let mut ticker = new_ticker(self.settings.interval);

        loop {
            tokio::select! {
                biased;
                event = events.recv() => match event {
                    Some(LifecycleEvent::Reload) => {
                        self.reload().await;
                        ticker = new_ticker(self.settings.interval);
                    }
                    Some(LifecycleEvent::Terminate) | None => {
                        tracing::info!("Stopping, no cycle in flight");
                        return Ok(());
                    }
                },
                _ = ticker.tick() => {
                    self.run_cycle().await?;
                }
            }
        }
    }

    /// Evaluate every eligible interface and converge the installed policy.
    ///
    /// Only unexpressible policies are returned as errors; backend failures
    /// are reported as `CycleOutcome::ApplyFailed`.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome, ControlError> {
        let span = tracing::info_span!("cycle", id = %Uuid::new_v4());
        self.evaluate_and_apply().instrument(span).await
    }

    async fn evaluate_and_apply(&mut self) -> Result<CycleOutcome, ControlError> {
        let started = std::time::Instant::now();
        let settings = Arc::clone(&self.settings);
        let now = Instant::now();

        let mut names = Vec::new();
        let mut tasks = Vec::new();
        for interface in &settings.interfaces {
            if let Some(remaining) = self.damper.remaining(&interface.name, now) {
                tracing::info!(nif = %interface.name, remaining = ?remaining, "Skipping interface in quiet period");
                continue;
            }

            let monitor = InterfaceMonitor::new(Arc::clone(interface), Arc::clone(&self.links), Arc::clone(&self.probes))
                .with_deadline(settings.cycle_timeout);
            names.push(interface.name.clone());
            tasks.push(tokio::spawn(async move { monitor.evaluate().await }));
        }

        let results = join_all(tasks).await;
        for (name, joined) in names.into_iter().zip(results) {
            let status = joined.unwrap_or_else(|e| {
                tracing::error!(nif = %name, error = %e, "Interface evaluation task failed");
                InterfaceStatus::new(&name)
            });
            self.record_status(status);
        }

        let healthy: HashSet<String> = settings
            .interfaces
            .iter()
            .filter(|i| self.statuses.get(&i.name).is_some_and(InterfaceStatus::healthy))
            .map(|i| i.name.clone())
            .collect();

        let outcome = match compute_policy(&settings.interfaces, &healthy) {
            None => {
                tracing::error!("No healthy interfaces, refusing to change load balancing");
                CycleOutcome::NoHealthy
            }
            Some(target) => {
                match &target {
                    Policy::All => tracing::info!("All interfaces up and healthy"),
                    Policy::Subset(_) => tracing::warn!(policy = %target, "Health degraded"),
                }
                self.install(target, &settings).await?
            }
        };

        metrics::record_cycle(started);
        tracing::debug!(outcome = %outcome, elapsed = ?started.elapsed(), "Cycle finished");
        Ok(outcome)
    }

    fn record_status(&mut self, status: InterfaceStatus) {
        let name = status.interface.clone();
        let healthy = status.healthy();
        let previous = self.statuses.get(&name).map(InterfaceStatus::healthy);

        if healthy {
            tracing::debug!(nif = %name, "Interface healthy");
        } else {
            tracing::warn!(nif = %name, reasons = ?status.failure_reasons(), "Interface unhealthy");
        }

        if self.damper.observe(&name, previous, healthy, Instant::now()) {
            tracing::warn!(
                nif = %name,
                quiet_period = ?self.damper.quiet_period(),
                "Interface went unhealthy, suspending checks"
            );
        }

        metrics::record_interface_health(&name, healthy);
        self.statuses.insert(name, status);
    }

    async fn install(&mut self, target: Policy, settings: &Settings) -> Result<CycleOutcome, ControlError> {
        let current = self
            .applier
            .last_applied()
            .map(ToString::to_string)
            .unwrap_or_else(|| "none".to_string());

        match self.applier.apply(&target, &settings.interfaces).await {
            Ok(ApplyOutcome::Unchanged) => Ok(CycleOutcome::Unchanged(target)),
            Ok(ApplyOutcome::Installed(_)) => {
                tracing::warn!(current = %current, desired = %target, "Adjusted load balancing");
                metrics::record_policy_change();
                Ok(CycleOutcome::Applied(target))
            }
            Err(ApplyError::Table(e)) => {
                tracing::error!(policy = %target, error = %e, "Failed to apply policy, retrying next cycle");
                metrics::record_apply_failure();
                Ok(CycleOutcome::ApplyFailed(target))
            }
            Err(ApplyError::Policy(e)) => {
                tracing::error!(policy = %target, error = %e, "Policy cannot be expressed");
                Err(ControlError::Policy(e))
            }
        }
    }

    /// Re-read the configuration file; keep the current settings on failure.
    pub async fn reload(&mut self) {
        let Some(path) = self.config_path.clone() else {
            tracing::warn!("No configuration file to reload");
            return;
        };
        match load_settings(&path) {
            Ok(settings) => self.replace_settings(settings).await,
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Failed to reload configuration, keeping current");
            }
        }
    }

    /// Swap in new settings: forget the applied policy and flap state, then
    /// prepare the table again.
    pub async fn replace_settings(&mut self, settings: Settings) {
        tracing::info!(interfaces = settings.interfaces.len(), "Configuration reloaded");
        self.applier.reset(settings.table.clone(), settings.chain.clone());
        self.damper = FlapDamper::new(settings.quiet_period);
        self.statuses.clear();
        self.settings = Arc::new(settings);

        self.check_inventory().await;
        if let Err(e) = self.applier.initialize(&self.settings.interfaces).await {
            tracing::error!(error = %e, "Failed to prepare classification table, retrying on next change");
        }
    }

    /// Log configured VPN devices missing from the inventory.
    async fn check_inventory(&self) {
        let wanted = self.settings.wireguard_devices();
        if wanted.is_empty() {
            return;
        }

        match list_devices_blocking(Arc::clone(&self.probes.inventory)).await {
            Ok(devices) => {
                for name in wanted {
                    if find_device(&devices, name).is_none() {
                        tracing::error!(device = %name, "WireGuard device not found");
                    }
                }
            }
            Err(e) => tracing::error!(error = %e, "Failed to list WireGuard devices"),
        }
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }
}

fn new_ticker(period: Duration) -> Interval {
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}
