//! Resolution of a parsed configuration into runtime `Settings`.
//!
//! Applies defaults (durations, ICMP count, HTTP method and status), turns the
//! legacy `wireguard` interface flag into a peer-liveness check and drops
//! checks of unknown type with a warning.

use std::sync::Arc;
use std::time::Duration;

use crate::config::duration::{
    duration_or_default, optional_duration, DEFAULT_ICMP_INTERVAL, DEFAULT_INTERVAL, DEFAULT_MAX_HANDSHAKE,
    DEFAULT_QUIET_PERIOD, DEFAULT_RETRY_INTERVAL, DEFAULT_TIMEOUT,
};
use crate::config::schema::{CheckConfig, InterfaceConfig, WatcherConfig};
use crate::config::settings::{
    CheckKind, HealthCheckSpec, HttpCheck, IcmpCheck, Interface, PeerCheck, Settings, TableFamily, TableSpec,
    TcpCheck,
};
use crate::config::validation::{validate_config, ValidationError};
use crate::resilience::retries::RetryPolicy;

/// Echo requests per ICMP check when `count` is unset.
pub const DEFAULT_ICMP_COUNT: u32 = 3;
/// Expected HTTP status when `responseCode` is unset.
pub const DEFAULT_HTTP_STATUS: u16 = 200;
/// Name of the check synthesised from the legacy `wireguard` flag.
pub const LEGACY_WIREGUARD_CHECK: &str = "wireguard";

/// Validate `config` and build the runtime snapshot.
pub fn resolve(config: &WatcherConfig) -> Result<Settings, Vec<ValidationError>> {
    validate_config(config)?;

    let family = config
        .lbtable
        .family
        .parse::<TableFamily>()
        .map_err(|f| vec![ValidationError::UnsupportedFamily(f)])?;

    let interfaces = config.interfaces.iter().map(|nif| Arc::new(resolve_interface(nif))).collect();

    let mut interval = duration_or_default("interval", &config.interval, DEFAULT_INTERVAL);
    if interval.is_zero() {
        tracing::error!("interval must be positive, using default");
        interval = DEFAULT_INTERVAL;
    }

    Ok(Settings {
        interval,
        quiet_period: duration_or_default("minimumTimeOut", &config.minimum_time_out, DEFAULT_QUIET_PERIOD),
        cycle_timeout: optional_duration("cycleTimeout", &config.cycle_timeout),
        table: TableSpec {
            family,
            name: config.lbtable.name.clone(),
        },
        chain: config.lbchain.clone(),
        interfaces,
        observability: config.observability.clone(),
    })
}

fn resolve_interface(nif: &InterfaceConfig) -> Interface {
    let mut checks: Vec<HealthCheckSpec> = nif.checks.iter().filter_map(|c| resolve_check(&nif.name, c)).collect();

    if nif.wireguard {
        let max_handshake_age = duration_or_default(
            &format!("wgLastHandshake {}", nif.name),
            &nif.wg_last_handshake,
            DEFAULT_MAX_HANDSHAKE,
        );
        checks.push(HealthCheckSpec {
            name: LEGACY_WIREGUARD_CHECK.to_string(),
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::once(),
            kind: CheckKind::PeerLiveness(PeerCheck {
                device: nif.name.clone(),
                peer: non_empty(&nif.wgpeer),
                max_handshake_age,
            }),
        });
    }

    Interface {
        name: nif.name.clone(),
        address: nif.address.trim().to_string(),
        ratio: nif.ratio,
        target: nif.target.clone(),
        mark: (nif.mark != 0).then_some(nif.mark),
        counter: nif.counter,
        checks,
    }
}

fn resolve_check(interface: &str, check: &CheckConfig) -> Option<HealthCheckSpec> {
    let label = format!("{} {}", interface, check.name);
    let timeout = duration_or_default(&format!("timeout {}", label), &check.timeout, DEFAULT_TIMEOUT);

    // ICMP uses `interval` as ping spacing, everything else as retry pause.
    let default_interval = if check.kind == "icmp" {
        DEFAULT_ICMP_INTERVAL
    } else {
        DEFAULT_RETRY_INTERVAL
    };
    let interval = duration_or_default(&format!("interval {}", label), &check.interval, default_interval);

    let kind = match check.kind.as_str() {
        "tcp" => CheckKind::Tcp(TcpCheck {
            host: check.host.clone(),
            port: check.port.parse().ok()?,
        }),
        "icmp" => CheckKind::Icmp(IcmpCheck {
            host: check.host.clone(),
            count: if check.count == 0 { DEFAULT_ICMP_COUNT } else { check.count },
            interval,
            max_rtt: (check.maxrtt != 0).then(|| Duration::from_millis(check.maxrtt)),
            max_loss_percent: (check.maxlosspcnt != 0.0).then_some(check.maxlosspcnt),
        }),
        "http" => CheckKind::Http(HttpCheck {
            host: check.host.clone(),
            path: check.path.clone(),
            tls: check.tls,
            insecure: check.insecure,
            method: non_empty(&check.method)
                .map(|m| m.to_uppercase())
                .unwrap_or_else(|| "GET".to_string()),
            expected_status: if check.response_code == 0 {
                DEFAULT_HTTP_STATUS
            } else {
                check.response_code
            },
            body_pattern: non_empty(&check.match_regex),
        }),
        "wireguard" | "peer" => CheckKind::PeerLiveness(PeerCheck {
            device: non_empty(&check.device).unwrap_or_else(|| interface.to_string()),
            peer: non_empty(&check.peer),
            max_handshake_age: duration_or_default(
                &format!("maxHandshake {}", label),
                &check.max_handshake,
                DEFAULT_MAX_HANDSHAKE,
            ),
        }),
        other => {
            tracing::warn!(nif = %interface, check = %check.name, kind = %other, "Skipping unknown health check type");
            return None;
        }
    };

    let retry = match &kind {
        CheckKind::Tcp(_) | CheckKind::Http(_) => RetryPolicy::new(check.retries, interval),
        CheckKind::Icmp(_) | CheckKind::PeerLiveness(_) => RetryPolicy::once(),
    };

    Some(HealthCheckSpec {
        name: check.name.clone(),
        timeout,
        retry,
        kind,
    })
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::TableConfig;

    fn config_with(checks: Vec<CheckConfig>) -> WatcherConfig {
        WatcherConfig {
            lbtable: TableConfig {
                family: "ip".into(),
                name: "vps".into(),
            },
            lbchain: "lb".into(),
            interfaces: vec![InterfaceConfig {
                name: "wg0".into(),
                address: "10.8.0.2/24".into(),
                ratio: 3,
                target: "wg0-out".into(),
                checks,
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let settings = resolve(&config_with(vec![])).unwrap();
        assert_eq!(settings.interval, DEFAULT_INTERVAL);
        assert_eq!(settings.quiet_period, DEFAULT_QUIET_PERIOD);
        assert_eq!(settings.cycle_timeout, None);
        assert_eq!(settings.table.family, TableFamily::Ip);
        assert_eq!(settings.interfaces[0].mark, None);
    }

    #[test]
    fn test_interval_defaults_per_kind() {
        let settings = resolve(&config_with(vec![
            CheckConfig {
                name: "ping".into(),
                kind: "icmp".into(),
                host: "10.8.0.1".into(),
                ..Default::default()
            },
            CheckConfig {
                name: "ssh".into(),
                kind: "tcp".into(),
                host: "10.8.0.1".into(),
                port: "22".into(),
                retries: 2,
                ..Default::default()
            },
        ]))
        .unwrap();
        let checks = &settings.interfaces[0].checks;
        match &checks[0].kind {
            CheckKind::Icmp(icmp) => {
                assert_eq!(icmp.interval, DEFAULT_ICMP_INTERVAL);
                assert_eq!(icmp.count, DEFAULT_ICMP_COUNT);
                assert_eq!(icmp.max_loss_percent, None);
            }
            other => panic!("unexpected kind {:?}", other),
        }
        assert_eq!(checks[1].retry, RetryPolicy::new(2, DEFAULT_RETRY_INTERVAL));
        assert_eq!(checks[1].timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_http_defaults_and_unknown_type() {
        let settings = resolve(&config_with(vec![
            CheckConfig {
                name: "web".into(),
                kind: "http".into(),
                host: "10.8.0.1".into(),
                ..Default::default()
            },
            CheckConfig {
                name: "dns".into(),
                kind: "udp".into(),
                host: "10.8.0.1".into(),
                ..Default::default()
            },
        ]))
        .unwrap();
        let checks = &settings.interfaces[0].checks;
        assert_eq!(checks.len(), 1);
        match &checks[0].kind {
            CheckKind::Http(http) => {
                assert_eq!(http.method, "GET");
                assert_eq!(http.expected_status, DEFAULT_HTTP_STATUS);
                assert_eq!(http.body_pattern, None);
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_legacy_wireguard_flag() {
        let mut config = config_with(vec![]);
        config.interfaces[0].wireguard = true;
        config.interfaces[0].wgpeer = "peerkey=".into();
        config.interfaces[0].mark = 0x10;
        let settings = resolve(&config).unwrap();
        let nif = &settings.interfaces[0];
        assert_eq!(nif.mark, Some(16));
        assert_eq!(nif.checks[0].name, LEGACY_WIREGUARD_CHECK);
        assert_eq!(
            nif.checks[0].kind,
            CheckKind::PeerLiveness(PeerCheck {
                device: "wg0".into(),
                peer: Some("peerkey=".into()),
                max_handshake_age: DEFAULT_MAX_HANDSHAKE,
            })
        );
        assert_eq!(settings.wireguard_devices(), vec!["wg0"]);
    }
}
