//! Registry of peers seen on the network.

use std::collections::HashMap;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, RwLock};

use crate::protocol::{DeviceType, ProtocolType, RegisterDto};

/// How a peer became known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerSource {
    /// Multicast announcement
    Multicast,
    /// `POST /register` handshake
    Register,
}

/// A peer recorded by discovery or the register handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPeer {
    /// Peer fingerprint
    pub fingerprint: String,
    /// Display name
    pub alias: String,
    /// Protocol version, if advertised
    pub version: Option<String>,
    /// Device model, if advertised
    pub device_model: Option<String>,
    /// Device type, if advertised
    pub device_type: Option<DeviceType>,
    /// HTTP port, if advertised
    pub port: Option<u16>,
    /// HTTP scheme, if advertised
    pub protocol: Option<ProtocolType>,
    /// Source address of the last message
    pub address: IpAddr,
    /// How the peer was last seen
    pub source: PeerSource,
    /// When the peer was first seen
    pub first_seen: DateTime<Utc>,
    /// When the peer was last seen
    pub last_seen: DateTime<Utc>,
}

impl DiscoveredPeer {
    /// Base URL of the peer's HTTP surface, falling back to the default
    /// port and plain HTTP when not advertised.
    #[must_use]
    pub fn base_url(&self) -> String {
        let scheme = self.protocol.unwrap_or(ProtocolType::Http).scheme();
        let port = self.port.unwrap_or(crate::DEFAULT_PORT);
        format!("{scheme}://{}:{port}", self.address)
    }
}

/// Change notification published by the registry.
#[derive(Debug, Clone)]
pub enum PeerEvent {
    /// A fingerprint was seen for the first time
    Discovered(DiscoveredPeer),
    /// A known fingerprint was seen again
    Updated(DiscoveredPeer),
}

/// Peers keyed by fingerprint.
#[derive(Debug)]
pub struct PeerRegistry {
    peers: RwLock<HashMap<String, DiscoveredPeer>>,
    events: broadcast::Sender<PeerEvent>,
}

impl Default for PeerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PeerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            peers: RwLock::new(HashMap::new()),
            events,
        }
    }

    /// Record a peer under `fingerprint`, replacing any earlier entry with
    /// the same fingerprint.
    ///
    /// Returns `true` if the fingerprint was not known before.
    pub async fn record(
        &self,
        fingerprint: &str,
        info: &RegisterDto,
        address: IpAddr,
        source: PeerSource,
    ) -> bool {
        let now = Utc::now();
        let mut peers = self.peers.write().await;
        let first_seen = peers
            .get(fingerprint)
            .map_or(now, |existing| existing.first_seen);
        let is_new = !peers.contains_key(fingerprint);

        let peer = DiscoveredPeer {
            fingerprint: fingerprint.to_string(),
            alias: info.alias.clone(),
            version: info.version.clone(),
            device_model: info.device_model.clone(),
            device_type: info.device_type,
            port: info.port,
            protocol: info.protocol,
            address,
            source,
            first_seen,
            last_seen: now,
        };
        peers.insert(peer.fingerprint.clone(), peer.clone());
        drop(peers);

        let event = if is_new {
            PeerEvent::Discovered(peer)
        } else {
            PeerEvent::Updated(peer)
        };
        let _ = self.events.send(event);

        is_new
    }

    /// Look up a peer by fingerprint.
    pub async fn get(&self, fingerprint: &str) -> Option<DiscoveredPeer> {
        self.peers.read().await.get(fingerprint).cloned()
    }

    /// All known peers, sorted by alias.
    pub async fn peers(&self) -> Vec<DiscoveredPeer> {
        let mut peers: Vec<_> = self.peers.read().await.values().cloned().collect();
        peers.sort_by(|a, b| a.alias.cmp(&b.alias));
        peers
    }

    /// Number of known peers.
    pub async fn len(&self) -> usize {
        self.peers.read().await.len()
    }

    /// Whether no peer has been seen yet.
    pub async fn is_empty(&self) -> bool {
        self.peers.read().await.is_empty()
    }

    /// Subscribe to peer events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PeerEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn peer(fingerprint: &str, alias: &str) -> RegisterDto {
        RegisterDto {
            alias: alias.to_string(),
            version: Some("2.1".to_string()),
            device_model: None,
            device_type: Some(DeviceType::Mobile),
            fingerprint: Some(fingerprint.to_string()),
            port: Some(53317),
            protocol: Some(ProtocolType::Https),
            download: false,
        }
    }

    const ADDR: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20));

    #[tokio::test]
    async fn test_record_deduplicates_by_fingerprint() {
        let registry = PeerRegistry::new();

        assert!(registry.record("a", &peer("a", "Phone"), ADDR, PeerSource::Multicast).await);
        assert!(
            !registry
                .record("a", &peer("a", "Phone (renamed)"), ADDR, PeerSource::Register)
                .await
        );
        assert!(registry.record("b", &peer("b", "Tablet"), ADDR, PeerSource::Multicast).await);

        assert_eq!(registry.len().await, 2);
        let a = registry.get("a").await.expect("peer a");
        assert_eq!(a.alias, "Phone (renamed)");
        assert_eq!(a.source, PeerSource::Register);
        assert!(a.first_seen <= a.last_seen);
    }

    #[tokio::test]
    async fn test_events() {
        let registry = PeerRegistry::new();
        let mut rx = registry.subscribe();

        registry.record("a", &peer("a", "Phone"), ADDR, PeerSource::Multicast).await;
        registry.record("a", &peer("a", "Phone"), ADDR, PeerSource::Multicast).await;

        assert!(matches!(rx.recv().await, Ok(PeerEvent::Discovered(p)) if p.fingerprint == "a"));
        assert!(matches!(rx.recv().await, Ok(PeerEvent::Updated(p)) if p.fingerprint == "a"));
    }

    #[tokio::test]
    async fn test_peers_sorted_by_alias() {
        let registry = PeerRegistry::new();
        registry.record("2", &peer("2", "Zed"), ADDR, PeerSource::Multicast).await;
        registry.record("1", &peer("1", "Amy"), ADDR, PeerSource::Multicast).await;

        let aliases: Vec<_> = registry.peers().await.into_iter().map(|p| p.alias).collect();
        assert_eq!(aliases, vec!["Amy", "Zed"]);
    }

    #[tokio::test]
    async fn test_base_url() {
        let registry = PeerRegistry::new();
        registry.record("a", &peer("a", "Phone"), ADDR, PeerSource::Multicast).await;

        let p = registry.get("a").await.expect("peer");
        assert_eq!(p.base_url(), "https://192.168.1.20:53317");
    }
}
