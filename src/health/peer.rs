//! Peer-liveness probe.
//!
//! Refreshes the VPN inventory on every invocation, then requires the device,
//! the peer (when configured) and a recent enough handshake.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::config::settings::PeerCheck;
use crate::health::probe::ProbeVerdict;
use crate::vpn::{find_device, list_devices_blocking, InventoryError, PeerInventory, VpnDevice};

pub async fn probe(name: &str, check: &PeerCheck, inventory: Arc<dyn PeerInventory>) -> ProbeVerdict {
    let listing = list_devices_blocking(inventory).await;
    judge(name, check, listing, SystemTime::now())
}

/// Same as `probe` with an explicit clock, listing on the calling thread.
pub fn probe_at(name: &str, check: &PeerCheck, inventory: &dyn PeerInventory, now: SystemTime) -> ProbeVerdict {
    judge(name, check, inventory.list_devices(), now)
}

fn judge(
    name: &str,
    check: &PeerCheck,
    listing: Result<Vec<VpnDevice>, InventoryError>,
    now: SystemTime,
) -> ProbeVerdict {
    let devices = match listing {
        Ok(devices) => devices,
        Err(e) => {
            tracing::error!(check = %name, error = %e, "Failed to list VPN devices");
            return ProbeVerdict::fail(1, e.to_string());
        }
    };

    let Some(device) = find_device(&devices, &check.device) else {
        tracing::warn!(check = %name, device = %check.device, "VPN device not found");
        return ProbeVerdict::fail(1, format!("device {} not found", check.device));
    };

    let Some(peer_key) = check.peer.as_deref() else {
        return ProbeVerdict::pass(1, format!("device {} present", device.name));
    };

    let Some(peer) = device.peer(peer_key) else {
        tracing::warn!(check = %name, device = %device.name, peer = %peer_key, "Missing peer");
        return ProbeVerdict::fail(1, format!("peer {} not configured on {}", peer_key, device.name));
    };

    let Some(last_handshake) = peer.last_handshake else {
        tracing::warn!(check = %name, peer = %peer_key, "Peer never completed a handshake");
        return ProbeVerdict::fail(1, format!("peer {} has no handshake", peer_key));
    };

    let age = now.duration_since(last_handshake).unwrap_or(Duration::ZERO);
    if age > check.max_handshake_age {
        tracing::warn!(
            check = %name,
            peer = %peer_key,
            age = ?age,
            max = ?check.max_handshake_age,
            "Last handshake too old"
        );
        return ProbeVerdict::fail(1, format!("last handshake {:?} ago", age));
    }

    ProbeVerdict::pass(1, format!("handshake {:?} ago", age))
}
