//! Flap damping.
//!
//! An interface that turns unhealthy is excluded from probing until the quiet
//! period has passed since that transition. The penalty is armed only on a
//! transition (including the first evaluation), so an interface that stays
//! unhealthy is probed again every cycle once the window closes.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct FlapDamper {
    quiet_period: Duration,
    last_unhealthy: HashMap<String, Instant>,
}

impl FlapDamper {
    pub fn new(quiet_period: Duration) -> Self {
        Self {
            quiet_period,
            last_unhealthy: HashMap::new(),
        }
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    /// Time left in the penalty window, `None` when the interface may be probed.
    pub fn remaining(&self, name: &str, now: Instant) -> Option<Duration> {
        let since = self.last_unhealthy.get(name)?;
        let elapsed = now.saturating_duration_since(*since);
        if elapsed < self.quiet_period {
            Some(self.quiet_period - elapsed)
        } else {
            None
        }
    }

    pub fn is_damped(&self, name: &str, now: Instant) -> bool {
        self.remaining(name, now).is_some()
    }

    /// Record a fresh verdict. `previous` is the last verdict, `None` if never
    /// evaluated. Returns true when a new penalty window was armed.
    pub fn observe(&mut self, name: &str, previous: Option<bool>, healthy: bool, now: Instant) -> bool {
        if healthy || previous == Some(false) {
            return false;
        }
        self.last_unhealthy.insert(name.to_string(), now);
        true
    }

    pub fn last_unhealthy(&self, name: &str) -> Option<Instant> {
        self.last_unhealthy.get(name).copied()
    }
}
