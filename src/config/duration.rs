//! Human readable durations with logged fallbacks.
//!
//! Every duration in the configuration is optional. An empty value selects the
//! default; a value that fails to parse is logged and also replaced by the
//! default, it never aborts loading.

use std::time::Duration;

/// Time between evaluation cycles.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);
/// Per attempt timeout of a health check.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);
/// Wait between retries of non-ICMP checks.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(250);
/// Spacing between ICMP echo requests.
pub const DEFAULT_ICMP_INTERVAL: Duration = Duration::from_secs(1);
/// Max time since the last WireGuard peer handshake.
pub const DEFAULT_MAX_HANDSHAKE: Duration = Duration::from_secs(150);
/// Minimum time an unhealthy interface is kept out (penalty box).
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_secs(30);

/// Parse `value`, falling back to `default` when it is empty or malformed.
///
/// `name` only identifies the field in the error log.
pub fn duration_or_default(name: &str, value: &str, default: Duration) -> Duration {
    let value = value.trim();
    if value.is_empty() {
        return default;
    }

    match humantime::parse_duration(value) {
        Ok(duration) => duration,
        Err(e) => {
            tracing::error!(
                field = %name,
                value = %value,
                default = %humantime::format_duration(default),
                error = %e,
                "Failed to parse duration, using default"
            );
            default
        }
    }
}

/// Parse an optional duration: empty means "not set".
pub fn optional_duration(name: &str, value: &str) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    match humantime::parse_duration(value) {
        Ok(duration) if !duration.is_zero() => Some(duration),
        Ok(_) => None,
        Err(e) => {
            tracing::error!(field = %name, value = %value, error = %e, "Failed to parse duration, ignoring");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_uses_default() {
        assert_eq!(duration_or_default("t", "", DEFAULT_TIMEOUT), DEFAULT_TIMEOUT);
        assert_eq!(duration_or_default("t", "  ", DEFAULT_QUIET_PERIOD), DEFAULT_QUIET_PERIOD);
    }

    #[test]
    fn test_compound_values() {
        assert_eq!(duration_or_default("t", "250ms", DEFAULT_TIMEOUT), Duration::from_millis(250));
        assert_eq!(duration_or_default("t", "2m30s", DEFAULT_TIMEOUT), Duration::from_secs(150));
        assert_eq!(duration_or_default("t", "1m", DEFAULT_TIMEOUT), DEFAULT_INTERVAL);
    }

    #[test]
    fn test_garbage_falls_back() {
        assert_eq!(duration_or_default("t", "soon", DEFAULT_RETRY_INTERVAL), DEFAULT_RETRY_INTERVAL);
    }

    #[test]
    fn test_optional_duration() {
        assert_eq!(optional_duration("t", ""), None);
        assert_eq!(optional_duration("t", "0s"), None);
        assert_eq!(optional_duration("t", "5s"), Some(Duration::from_secs(5)));
        assert_eq!(optional_duration("t", "bogus"), None);
    }
}
