//! Bounded retry policy.
//!
//! # Responsibilities
//! - Run an attempt up to `retries + 1` times
//! - Sleep a fixed interval between failed attempts
//! - Let the attempt decide whether its failure is retryable
//!
//! # Design Decisions
//! - No sleep after the final attempt
//! - Non-retryable failures (e.g. HTTP status mismatch) stop immediately

use std::future::Future;
use std::time::Duration;

/// Max attempts and the pause between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first one.
    pub retries: u32,
    /// Wait between attempts.
    pub interval: Duration,
}

/// Failure of a single attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<E> {
    /// Worth trying again if the budget allows.
    Retry(E),
    /// Final, do not retry.
    Abort(E),
}

/// Result of a retried operation and how many attempts it took.
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    pub result: Result<T, E>,
    pub attempts: u32,
}

impl RetryPolicy {
    pub fn new(retries: u32, interval: Duration) -> Self {
        Self { retries, interval }
    }

    /// A single attempt, no retries.
    pub fn once() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Upper bound on the time spent when each attempt takes at most `per_attempt`.
    pub fn worst_case(&self, per_attempt: Duration) -> Duration {
        per_attempt * self.max_attempts() + self.interval * self.retries
    }

    /// Run `op` until it succeeds, aborts, or the attempt budget is spent.
    ///
    /// `op` receives the 1-based attempt number.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> RetryOutcome<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, Attempt<E>>>,
    {
        let max_attempts = self.max_attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;
            match op(attempt).await {
                Ok(value) => {
                    return RetryOutcome {
                        result: Ok(value),
                        attempts: attempt,
                    }
                }
                Err(Attempt::Abort(e)) => {
                    return RetryOutcome {
                        result: Err(e),
                        attempts: attempt,
                    }
                }
                Err(Attempt::Retry(e)) => {
                    if attempt >= max_attempts {
                        return RetryOutcome {
                            result: Err(e),
                            attempts: attempt,
                        };
                    }
                    tracing::trace!(attempt, delay = ?self.interval, "Attempt failed, retrying");
                    tokio::time::sleep(self.interval).await;
                }
            }
        }
    }
}
