//! TCP connect probe.
//!
//! Opens a connection, closes it immediately and exchanges no payload.

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time;

use crate::config::settings::TcpCheck;
use crate::health::probe::{join_host_port, ProbeVerdict};
use crate::resilience::retries::{Attempt, RetryPolicy};

pub async fn probe(name: &str, check: &TcpCheck, timeout: Duration, retry: &RetryPolicy) -> ProbeVerdict {
    let target = join_host_port(&check.host, check.port);
    let addr = target.as_str();

    let outcome = retry
        .run(move |attempt| async move {
            match time::timeout(timeout, TcpStream::connect(addr)).await {
                Ok(Ok(stream)) => {
                    drop(stream);
                    Ok(())
                }
                Ok(Err(e)) => {
                    tracing::warn!(check = %name, target = %addr, attempt, error = %e, "TCP connect failed");
                    Err(Attempt::Retry(e.to_string()))
                }
                Err(_) => {
                    tracing::warn!(check = %name, target = %addr, attempt, timeout = ?timeout, "TCP connect timed out");
                    Err(Attempt::Retry(format!("timed out after {:?}", timeout)))
                }
            }
        })
        .await;

    match outcome.result {
        Ok(()) => ProbeVerdict::pass(outcome.attempts, format!("connected to {}", target)),
        Err(e) => ProbeVerdict::fail(
            outcome.attempts,
            format!("{} unreachable after {} attempts: {}", target, outcome.attempts, e),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_connects_to_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let check = TcpCheck {
            host: "127.0.0.1".into(),
            port,
        };

        let verdict = probe("local", &check, Duration::from_secs(1), &RetryPolicy::once()).await;
        assert!(verdict.passed, "{}", verdict.detail);
        assert_eq!(verdict.attempts, 1);
    }
}
