//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use path_watcher::config::loader::{parse_config, ConfigFormat};
use path_watcher::config::resolve::resolve;
use path_watcher::config::Settings;
use path_watcher::net::link::{LinkError, LinkInfo, LinkInspector};
use path_watcher::vpn::{InventoryError, PeerInventory, VpnDevice, VpnPeer};

/// Start a programmable HTTP backend on an ephemeral port.
///
/// `f` produces the status and body of every response.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        read_request_head(&mut socket).await;
                        let (status, body) = f().await;
                        let response = format!(
                            "HTTP/1.1 {} Mock\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Start a backend that always answers `status` with `body` and counts requests.
pub async fn start_counting_backend(status: u16, body: &'static str) -> (SocketAddr, Arc<AtomicU32>) {
    let hits = Arc::new(AtomicU32::new(0));
    let counter = hits.clone();
    let addr = start_programmable_backend(move || {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            (status, body.to_string())
        }
    })
    .await;
    (addr, hits)
}

async fn read_request_head(socket: &mut TcpStream) {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Link table under test control.
#[derive(Default)]
pub struct MockLinks {
    links: Mutex<HashMap<String, LinkInfo>>,
    lookups: Mutex<HashMap<String, u32>>,
}

impl MockLinks {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Add or replace an interface.
    pub fn set(&self, name: &str, up: bool, addresses: &[&str]) {
        self.links.lock().unwrap().insert(
            name.to_string(),
            LinkInfo {
                name: name.to_string(),
                up,
                addresses: addresses.iter().map(|a| a.to_string()).collect(),
            },
        );
    }

    pub fn remove(&self, name: &str) {
        self.links.lock().unwrap().remove(name);
    }

    /// How many times `name` was inspected.
    pub fn lookups(&self, name: &str) -> u32 {
        self.lookups.lock().unwrap().get(name).copied().unwrap_or(0)
    }
}

impl LinkInspector for MockLinks {
    fn lookup(&self, name: &str) -> Result<Option<LinkInfo>, LinkError> {
        *self.lookups.lock().unwrap().entry(name.to_string()).or_default() += 1;
        Ok(self.links.lock().unwrap().get(name).cloned())
    }
}

/// VPN inventory under test control.
#[derive(Default)]
pub struct MockInventory {
    devices: Mutex<Vec<VpnDevice>>,
}

impl MockInventory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register `device` with one peer that shook hands `ago`.
    pub fn set_peer(&self, device: &str, peer: &str, ago: Option<Duration>) {
        let mut devices = self.devices.lock().unwrap();
        devices.retain(|d| d.name != device);
        devices.push(VpnDevice {
            name: device.to_string(),
            public_key: None,
            peers: vec![VpnPeer {
                public_key: peer.to_string(),
                last_handshake: ago.map(|ago| SystemTime::now() - ago),
            }],
        });
    }
}

impl PeerInventory for MockInventory {
    fn list_devices(&self) -> Result<Vec<VpnDevice>, InventoryError> {
        Ok(self.devices.lock().unwrap().clone())
    }
}

/// Parse and resolve a YAML configuration.
pub fn settings_from_yaml(yaml: &str) -> Settings {
    let config = parse_config(yaml, ConfigFormat::Yaml).unwrap();
    resolve(&config).unwrap()
}

/// Two interfaces with ratios 3 and 7, no checks, no flap damping.
pub const TWO_PATHS: &str = r#"
interval: 1s
minimumTimeOut: 0s
lbtable:
  family: inet
  name: vps
lbchain: lb
interfaces:
  - name: wg0
    address: 10.8.0.2/24
    ratio: 3
    target: to_wg0
    mark: 16
  - name: wg1
    address: 10.9.0.2/24
    ratio: 7
    target: to_wg1
    mark: 32
    counter: true
"#;

/// Mark both `TWO_PATHS` interfaces healthy.
pub fn healthy_links(links: &MockLinks) {
    links.set("wg0", true, &["10.8.0.2/24"]);
    links.set("wg1", true, &["10.9.0.2/24"]);
}
