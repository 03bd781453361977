//! WireGuard device inventory via the kernel (or userspace) control API.

use wireguard_control::{Backend, Device};

use crate::vpn::{InventoryError, PeerInventory, VpnDevice, VpnPeer};

/// Lists WireGuard devices and their peers.
#[derive(Debug, Default, Clone, Copy)]
pub struct WireguardInventory {
    backend: Backend,
}

impl WireguardInventory {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }
}

impl PeerInventory for WireguardInventory {
    fn list_devices(&self) -> Result<Vec<VpnDevice>, InventoryError> {
        let names = Device::list(self.backend).map_err(InventoryError::List)?;

        let mut devices = Vec::with_capacity(names.len());
        for name in names {
            match Device::get(&name, self.backend) {
                Ok(device) => devices.push(convert(device)),
                Err(e) => {
                    tracing::warn!(device = %name, error = %e, "Failed to read WireGuard device");
                }
            }
        }

        // Never log private keys; only names and peer public keys.
        for device in &devices {
            tracing::trace!(
                device = %device.name,
                peers = ?device.peers.iter().map(|p| p.public_key.as_str()).collect::<Vec<_>>(),
                "WireGuard device"
            );
        }

        Ok(devices)
    }
}

fn convert(device: Device) -> VpnDevice {
    VpnDevice {
        name: device.name.to_string(),
        public_key: device.public_key.map(|k| k.to_base64()),
        peers: device
            .peers
            .into_iter()
            .map(|p| VpnPeer {
                public_key: p.config.public_key.to_base64(),
                last_handshake: p.stats.last_handshake_time,
            })
            .collect(),
    }
}
