//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT, SIGHUP)
//! - Translate signals to lifecycle events for the control loop
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Events are queued; the loop only reads them between cycles
//! - SIGHUP triggers config reload, not shutdown

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Something the control loop must react to between cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Drain, re-read configuration, re-initialise the table.
    Reload,
    /// Drain and exit.
    Terminate,
}

/// Install handlers and forward signals into `events`.
///
/// The task ends once the receiving side is dropped.
pub fn spawn_signal_listener(events: mpsc::UnboundedSender<LifecycleEvent>) -> std::io::Result<JoinHandle<()>> {
    let mut hup = signal(SignalKind::hangup())?;
    let mut int = signal(SignalKind::interrupt())?;
    let mut term = signal(SignalKind::terminate())?;

    Ok(tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = hup.recv() => {
                    tracing::warn!("Received SIGHUP, reload requested");
                    LifecycleEvent::Reload
                }
                _ = int.recv() => {
                    tracing::warn!("Received SIGINT, shutdown requested");
                    LifecycleEvent::Terminate
                }
                _ = term.recv() => {
                    tracing::warn!("Received SIGTERM, shutdown requested");
                    LifecycleEvent::Terminate
                }
            };
            if events.send(event).is_err() {
                break;
            }
        }
    }))
}
