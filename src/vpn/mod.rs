//! VPN control-plane facts used by peer-liveness checks.
//!
//! # Data Flow
//! ```text
//! Peer-liveness probe
//!     → list_devices_blocking() (fresh on every probe, on the blocking pool)
//!     → device by name → peer by public key → last handshake
//! ```

pub mod wireguard;

use std::sync::Arc;
use std::time::SystemTime;

use thiserror::Error;

pub use wireguard::WireguardInventory;

/// A VPN peer as reported by the control plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VpnPeer {
    /// Base64 public key.
    pub public_key: String,
    /// `None` until the first handshake completes.
    pub last_handshake: Option<SystemTime>,
}

/// A VPN device (tunnel interface) and its peers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VpnDevice {
    pub name: String,
    pub public_key: Option<String>,
    pub peers: Vec<VpnPeer>,
}

impl VpnDevice {
    pub fn peer(&self, public_key: &str) -> Option<&VpnPeer> {
        self.peers.iter().find(|p| p.public_key == public_key)
    }
}

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("failed to list vpn devices: {0}")]
    List(#[source] std::io::Error),
    #[error("inventory task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Source of device/peer liveness facts.
pub trait PeerInventory: Send + Sync {
    fn list_devices(&self) -> Result<Vec<VpnDevice>, InventoryError>;
}

/// List devices without blocking the runtime; control-plane queries are
/// synchronous netlink round trips.
pub async fn list_devices_blocking(inventory: Arc<dyn PeerInventory>) -> Result<Vec<VpnDevice>, InventoryError> {
    tokio::task::spawn_blocking(move || inventory.list_devices()).await?
}

/// Find a device by name in a listing.
pub fn find_device<'a>(devices: &'a [VpnDevice], name: &str) -> Option<&'a VpnDevice> {
    devices.iter().find(|d| d.name == name)
}
