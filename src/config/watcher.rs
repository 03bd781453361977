//! Configuration file watcher for hot reload.
//!
//! File changes are turned into the same `Reload` event SIGHUP produces, so
//! the control loop drains the current cycle before re-reading the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::lifecycle::signals::LifecycleEvent;

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    path: PathBuf,
    events: mpsc::UnboundedSender<LifecycleEvent>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher feeding `events`.
    pub fn new(path: &Path, events: mpsc::UnboundedSender<LifecycleEvent>) -> Self {
        Self {
            path: path.to_path_buf(),
            events,
        }
    }

    /// Start watching the file in a background thread.
    ///
    /// The returned watcher must be kept alive for events to flow.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.events.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!("Config file change detected, requesting reload");
                        let _ = tx.send(LifecycleEvent::Reload);
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}
