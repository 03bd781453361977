//! HTTP(S) probe.
//!
//! # Responsibilities
//! - Issue a GET to `scheme://host/path`
//! - Require the configured status code
//! - Optionally require the body to match a regular expression
//!
//! # Design Decisions
//! - Transport errors are retried; a wrong status or body is not
//! - The body pattern is compiled per invocation
//! - Only GET is implemented; other methods fail the check

use std::time::Duration;

use regex::bytes::Regex;
use url::Url;

use crate::config::settings::HttpCheck;
use crate::health::probe::ProbeVerdict;
use crate::resilience::retries::{Attempt, RetryPolicy};

pub async fn probe(name: &str, check: &HttpCheck, timeout: Duration, retry: &RetryPolicy) -> ProbeVerdict {
    if check.method != "GET" {
        tracing::warn!(check = %name, method = %check.method, "Unimplemented HTTP method");
        return ProbeVerdict::fail(0, format!("method {} not implemented", check.method));
    }

    let pattern = match check.body_pattern.as_deref().map(Regex::new).transpose() {
        Ok(pattern) => pattern,
        Err(e) => {
            tracing::warn!(check = %name, error = %e, "Invalid body pattern");
            return ProbeVerdict::fail(0, format!("invalid body pattern: {}", e));
        }
    };

    let uri = match Url::parse(&check.uri()) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::warn!(check = %name, uri = %check.uri(), error = %e, "Invalid URI");
            return ProbeVerdict::fail(0, format!("invalid uri: {}", e));
        }
    };

    let client = match reqwest::Client::builder()
        .danger_accept_invalid_certs(check.insecure)
        .connect_timeout(timeout)
        .timeout(timeout)
        .no_proxy()
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(check = %name, error = %e, "Failed to build HTTP client");
            return ProbeVerdict::fail(0, e.to_string());
        }
    };

    let client = &client;
    let uri = &uri;
    let pattern = pattern.as_ref();

    let outcome = retry
        .run(move |attempt| async move {
            let response = client.get(uri.clone()).send().await.map_err(|e| {
                tracing::warn!(check = %name, uri = %uri, attempt, error = %e, "HTTP request failed");
                Attempt::Retry(e.to_string())
            })?;

            let status = response.status().as_u16();
            if status != check.expected_status {
                tracing::warn!(
                    check = %name,
                    uri = %uri,
                    status,
                    expected = check.expected_status,
                    "Unexpected HTTP status"
                );
                return Err(Attempt::Abort(format!(
                    "status {} (expected {})",
                    status, check.expected_status
                )));
            }

            if let Some(pattern) = pattern {
                let body = response
                    .bytes()
                    .await
                    .map_err(|e| Attempt::Abort(format!("failed to read body: {}", e)))?;
                if !pattern.is_match(&body) {
                    tracing::warn!(check = %name, uri = %uri, pattern = %pattern, "Body does not match");
                    return Err(Attempt::Abort(format!("body does not match {}", pattern)));
                }
            }

            Ok(status)
        })
        .await;

    match outcome.result {
        Ok(status) => ProbeVerdict::pass(outcome.attempts, format!("{} answered {}", uri, status)),
        Err(e) => ProbeVerdict::fail(outcome.attempts, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(method: &str, pattern: Option<&str>) -> HttpCheck {
        HttpCheck {
            host: "127.0.0.1:1".into(),
            path: "/".into(),
            tls: false,
            insecure: false,
            method: method.into(),
            expected_status: 200,
            body_pattern: pattern.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_unimplemented_method_fails_without_request() {
        let verdict = probe("post", &check("POST", None), Duration::from_millis(100), &RetryPolicy::once()).await;
        assert!(!verdict.passed);
        assert_eq!(verdict.attempts, 0);
    }

    #[tokio::test]
    async fn test_invalid_pattern_fails() {
        let verdict = probe("bad", &check("GET", Some("(")), Duration::from_millis(100), &RetryPolicy::once()).await;
        assert!(!verdict.passed);
        assert!(verdict.detail.contains("invalid body pattern"));
    }
}
