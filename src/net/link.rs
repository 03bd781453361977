//! Link inspection for the basic interface checks.
//!
//! # Responsibilities
//! - Find an interface by name
//! - Report its administrative state (IFF_UP)
//! - List its addresses as `addr/prefix` strings
//!
//! The system implementation reads `getifaddrs(3)`; tests substitute their own
//! `LinkInspector`.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use nix::ifaddrs::getifaddrs;
use nix::net::if_::InterfaceFlags;
use nix::sys::socket::SockaddrStorage;
use thiserror::Error;

/// Snapshot of one interface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkInfo {
    pub name: String,
    /// Administratively up.
    pub up: bool,
    /// Assigned addresses, e.g. `10.8.0.2/24`.
    pub addresses: Vec<String>,
}

impl LinkInfo {
    pub fn has_address(&self, expected: &str) -> bool {
        self.addresses.iter().any(|a| a == expected)
    }
}

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("failed to enumerate interfaces: {0}")]
    Enumerate(#[from] nix::Error),
}

/// Source of link facts.
pub trait LinkInspector: Send + Sync {
    /// `Ok(None)` when no interface carries `name`.
    fn lookup(&self, name: &str) -> Result<Option<LinkInfo>, LinkError>;
}

/// Reads links from the running kernel.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLinks;

impl LinkInspector for SystemLinks {
    fn lookup(&self, name: &str) -> Result<Option<LinkInfo>, LinkError> {
        let mut found: Option<LinkInfo> = None;

        for ifa in getifaddrs()?.filter(|ifa| ifa.interface_name == name) {
            let info = found.get_or_insert_with(|| LinkInfo {
                name: name.to_string(),
                ..Default::default()
            });
            info.up |= ifa.flags.contains(InterfaceFlags::IFF_UP);
            if let Some(addr) = format_address(ifa.address.as_ref(), ifa.netmask.as_ref()) {
                tracing::trace!(nif = %name, addr = %addr, "Found IP address");
                info.addresses.push(addr);
            }
        }

        Ok(found)
    }
}

fn format_address(address: Option<&SockaddrStorage>, netmask: Option<&SockaddrStorage>) -> Option<String> {
    let address = address?;

    if let Some(v4) = address.as_sockaddr_in() {
        let prefix = netmask
            .and_then(|m| m.as_sockaddr_in())
            .map(|m| prefix_len_v4(m.ip()))
            .unwrap_or(32);
        return Some(cidr(IpAddr::V4(v4.ip()), prefix));
    }

    if let Some(v6) = address.as_sockaddr_in6() {
        let prefix = netmask
            .and_then(|m| m.as_sockaddr_in6())
            .map(|m| prefix_len_v6(m.ip()))
            .unwrap_or(128);
        return Some(cidr(IpAddr::V6(v6.ip()), prefix));
    }

    None
}

fn prefix_len_v4(mask: Ipv4Addr) -> u32 {
    u32::from(mask).count_ones()
}

fn prefix_len_v6(mask: Ipv6Addr) -> u32 {
    u128::from(mask).count_ones()
}

fn cidr(addr: IpAddr, prefix: u32) -> String {
    format!("{}/{}", addr, prefix)
}
