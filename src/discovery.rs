//! Finding bridges on the network.
//!
//! Two sources are combined: the vendor's cloud lookup service, which lists
//! bridges that have phoned home from the caller's public address, and an
//! SSDP search on the local network.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::errors::Error;
use crate::runtime::{self, AsyncUdpSocket, Instant, UdpSocket};
use crate::transport::{Request, Transport};

type Result<T> = std::result::Result<T, Error>;

/// Base URL of the cloud lookup service.
pub const CLOUD_DISCOVERY_URL: &str = "https://discovery.meethue.com";

const SSDP_ADDR: &str = "239.255.255.250:1900";
const SSDP_SEARCH: &str = "M-SEARCH * HTTP/1.1\r\n\
    HOST: 239.255.255.250:1900\r\n\
    MAN: \"ssdp:discover\"\r\n\
    MX: 3\r\n\
    ST: ssdp:all\r\n\r\n";

/// A bridge candidate.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredBridge {
    /// Address to reach the bridge's API at, with a port if not 80.
    pub host: String,
    /// The bridge id, when the source reports one.
    pub id: Option<String>,
    pub mac: Option<String>,
}

#[derive(Deserialize)]
struct CloudEntry {
    id: Option<String>,
    internalipaddress: String,
    macaddress: Option<String>,
}

/// Ends an in-progress [`Discovery`] early.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A bridge search.
///
/// # Examples
///
/// ```ignore
/// use std::time::Duration;
/// use hue_bridge_rs::{Discovery, HttpTransport, CLOUD_DISCOVERY_URL};
///
/// let discovery = Discovery::new(Duration::from_secs(5));
/// let cloud = HttpTransport::new(CLOUD_DISCOVERY_URL);
/// for bridge in discovery.run(&cloud).await? {
///     println!("{} {:?}", bridge.host, bridge.id);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Discovery {
    timeout: Duration,
    stop: StopHandle,
}

impl Discovery {
    const RECV_TIMEOUT: Duration = Duration::from_millis(500);

    /// Search for at most `timeout` on the local network.
    pub fn new(timeout: Duration) -> Self {
        Discovery {
            timeout,
            stop: StopHandle::default(),
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Ask the cloud lookup service. `transport` must point at
    /// [`CLOUD_DISCOVERY_URL`].
    pub async fn cloud(&self, transport: &dyn Transport) -> Result<Vec<DiscoveredBridge>> {
        let value = transport.send(Request::get("/")).await?;
        let entries = Vec::<CloudEntry>::deserialize(&value).map_err(Error::JsonLoad)?;
        Ok(entries
            .into_iter()
            .map(|entry| DiscoveredBridge {
                host: entry.internalipaddress,
                id: entry.id,
                mac: entry.macaddress,
            })
            .collect())
    }

    /// Multicast an SSDP search and collect bridge replies until the timeout
    /// or until stopped.
    pub async fn ssdp(&self) -> Result<Vec<DiscoveredBridge>> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|e| Error::socket("bind", e))?;
        self.search(&socket).await
    }

    async fn search<S: AsyncUdpSocket>(&self, socket: &S) -> Result<Vec<DiscoveredBridge>> {
        socket
            .set_multicast_ttl_v4(4)
            .map_err(|e| Error::socket("set_multicast_ttl_v4", e))?;
        socket
            .send_to(SSDP_SEARCH.as_bytes(), SSDP_ADDR)
            .await
            .map_err(|e| Error::socket("send_to", e))?;

        let mut found = Vec::new();
        let start = Instant::now();
        let mut buffer = [0u8; 2048];

        while start.elapsed() < self.timeout && !self.stop.is_stopped() {
            match runtime::timeout(Self::RECV_TIMEOUT, socket.recv_from(&mut buffer)).await {
                Ok(Ok((size, addr))) => {
                    let text = String::from_utf8_lossy(&buffer[..size]);
                    if let Some(bridge) = parse_ssdp_response(&text) {
                        debug!("ssdp reply from {addr}: bridge at {}", bridge.host);
                        found.push(bridge);
                    }
                }
                Ok(Err(e)) => {
                    warn!("ssdp receive failed, ending search: {e}");
                    break;
                }
                Err(_) => continue,
            }
        }

        Ok(found)
    }

    /// Cloud lookup followed by SSDP, deduplicated by host.
    ///
    /// A failed cloud lookup is logged and does not stop the local search.
    pub async fn run(&self, cloud: &dyn Transport) -> Result<Vec<DiscoveredBridge>> {
        let mut found = match self.cloud(cloud).await {
            Ok(found) => found,
            Err(e) => {
                warn!("cloud discovery failed: {e}");
                Vec::new()
            }
        };
        if !self.stop.is_stopped() {
            found.extend(self.ssdp().await?);
        }
        Ok(merge(found))
    }
}

/// Keep one entry per host, filling in ids and macs from later duplicates.
fn merge(found: Vec<DiscoveredBridge>) -> Vec<DiscoveredBridge> {
    let mut by_host: BTreeMap<String, DiscoveredBridge> = BTreeMap::new();
    for bridge in found {
        match by_host.get_mut(&bridge.host) {
            Some(existing) => {
                if existing.id.is_none() {
                    existing.id = bridge.id;
                }
                if existing.mac.is_none() {
                    existing.mac = bridge.mac;
                }
            }
            None => {
                by_host.insert(bridge.host.clone(), bridge);
            }
        }
    }
    by_host.into_values().collect()
}

fn header<'a>(text: &'a str, name: &str) -> Option<&'a str> {
    text.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim()
            .eq_ignore_ascii_case(name)
            .then(|| value.trim())
    })
}

fn parse_ssdp_response(text: &str) -> Option<DiscoveredBridge> {
    let bridge_id = header(text, "hue-bridgeid");
    let is_bridge =
        bridge_id.is_some() || header(text, "server").is_some_and(|s| s.contains("IpBridge"));
    if !is_bridge {
        return None;
    }

    let location = header(text, "location")?;
    let authority = location
        .split_once("://")
        .map_or(location, |(_, rest)| rest)
        .split('/')
        .next()?;
    let host = authority.strip_suffix(":80").unwrap_or(authority);
    if host.is_empty() {
        return None;
    }

    Some(DiscoveredBridge {
        host: host.to_string(),
        id: bridge_id.map(|id| id.to_lowercase()),
        mac: None,
    })
}
