//! Network discovery for Lansend.
//!
//! Devices find each other through UDP multicast announcements:
//!
//! - Every device joins the multicast group and listens for announcements
//! - A device announces itself once at startup and then periodically
//! - When an announcement asks for it, the receiving device answers with
//!   an announcement of its own so that both sides learn of each other
//!   right away
//!
//! ## Protocol
//!
//! - Group: 224.0.0.167
//! - Port: 53317 (UDP), shared with the HTTP port by default
//! - Announce interval: every 2 seconds
//!
//! Packets carrying our own fingerprint are ignored. Every other valid
//! packet updates the [`PeerRegistry`], which keeps one entry per
//! fingerprint.

mod registry;

pub use registry::{DiscoveredPeer, PeerEvent, PeerRegistry, PeerSource};

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::NetworkConfig;
use crate::error::{Error, Result};
use crate::identity::DeviceIdentity;
use crate::protocol::MulticastDto;

/// Consecutive receive errors after which the listener gives up.
const MAX_RECV_ERRORS: u32 = 16;

/// What the receive path did with one datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatagramOutcome {
    /// Not a valid announcement
    Malformed,
    /// Our own announcement, looped back
    SelfSuppressed,
    /// Peer recorded
    Recorded {
        /// Whether the fingerprint was new
        is_new: bool,
        /// Whether a reciprocal announcement was sent
        replied: bool,
    },
}

/// Multicast announcer and listener.
#[derive(Debug)]
pub struct MulticastService {
    identity: Arc<DeviceIdentity>,
    registry: Arc<PeerRegistry>,
    /// Socket used for outbound announcements
    socket: Arc<UdpSocket>,
    group: Ipv4Addr,
    port: u16,
    reply_cooldown: Duration,
    /// Last reciprocal announcement per peer fingerprint
    last_reply: Mutex<HashMap<String, Instant>>,
    /// Shutdown signal sender for the periodic announcer
    shutdown_tx: broadcast::Sender<()>,
    /// Whether periodic announcing is active
    is_active: Arc<Mutex<bool>>,
}

impl MulticastService {
    /// Create the service and its outbound socket.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be created.
    pub async fn new(
        identity: Arc<DeviceIdentity>,
        config: &NetworkConfig,
        registry: Arc<PeerRegistry>,
    ) -> Result<Self> {
        let socket = socket2::Socket::new(
            socket2::Domain::IPV4,
            socket2::Type::DGRAM,
            Some(socket2::Protocol::UDP),
        )?;

        socket.set_reuse_address(true)?;
        socket.set_multicast_loop_v4(true)?;

        let addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0);
        socket.bind(&addr.into())?;

        socket.set_nonblocking(true)?;

        let std_socket: std::net::UdpSocket = socket.into();
        let socket = UdpSocket::from_std(std_socket)?;

        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            identity,
            registry,
            socket: Arc::new(socket),
            group: config.multicast_group,
            port: config.multicast_port,
            reply_cooldown: config.reply_cooldown,
            last_reply: Mutex::new(HashMap::new()),
            shutdown_tx,
            is_active: Arc::new(Mutex::new(false)),
        })
    }

    /// Peer registry fed by this service.
    #[must_use]
    pub fn registry(&self) -> &Arc<PeerRegistry> {
        &self.registry
    }

    /// Send one announcement to the multicast group.
    ///
    /// # Errors
    ///
    /// Returns an error if the datagram cannot be sent.
    pub async fn send_announcement(&self) -> Result<()> {
        let payload = serde_json::to_vec(&self.identity.to_announcement(true))?;
        self.socket
            .send_to(&payload, SocketAddrV4::new(self.group, self.port))
            .await
            .map_err(|e| Error::Transport(format!("failed to send announcement: {e}")))?;
        tracing::debug!("Sent announcement to {}:{}", self.group, self.port);
        Ok(())
    }

    /// Announce now, then every `interval`, until [`stop`](Self::stop).
    ///
    /// Calling this while already announcing does nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the announcement cannot be serialized.
    pub async fn start_announcing(&self, interval: Duration) -> Result<()> {
        let mut is_active = self.is_active.lock().await;
        if *is_active {
            return Ok(());
        }
        *is_active = true;
        drop(is_active);

        let payload = serde_json::to_vec(&self.identity.to_announcement(true))?;
        let socket = Arc::clone(&self.socket);
        let target = SocketAddrV4::new(self.group, self.port);
        let is_active = Arc::clone(&self.is_active);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            loop {
                if let Err(e) = socket.send_to(&payload, target).await {
                    tracing::warn!("Failed to send announcement: {}", e);
                }

                tokio::select! {
                    () = tokio::time::sleep(interval) => {}
                    _ = shutdown_rx.recv() => {
                        tracing::debug!("Announcer received shutdown signal");
                        break;
                    }
                }
            }

            *is_active.lock().await = false;
        });

        Ok(())
    }

    /// Stop periodic announcing.
    pub async fn stop(&self) {
        let _ = self.shutdown_tx.send(());
        while *self.is_active.lock().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Check if periodic announcing is running.
    pub async fn is_announcing(&self) -> bool {
        *self.is_active.lock().await
    }

    /// Bind the multicast socket and process datagrams until a fatal error.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound or the group joined,
    /// or if receiving keeps failing.
    pub async fn listen(&self) -> Result<()> {
        let socket = bind_multicast(self.group, self.port)?;
        tracing::info!("Listening for announcements on {}:{}", self.group, self.port);

        let mut buf = vec![0u8; crate::UDP_BUFFER_SIZE];
        let mut errors = 0u32;

        loop {
            match socket.recv_from(&mut buf).await {
                Ok((len, src)) => {
                    errors = 0;
                    self.handle_datagram(&buf[..len], src).await;
                }
                Err(e) => {
                    errors += 1;
                    tracing::warn!("Error receiving UDP packet: {}", e);
                    if errors >= MAX_RECV_ERRORS {
                        return Err(Error::Transport(format!("multicast receive failed: {e}")));
                    }
                }
            }
        }
    }

    /// Run [`listen`](Self::listen) as a background task.
    ///
    /// A fatal error is logged and also returned through the handle.
    pub fn spawn_listener(self: &Arc<Self>) -> JoinHandle<Result<()>> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let result = service.listen().await;
            if let Err(ref e) = result {
                tracing::error!("Multicast listener stopped: {}", e);
            }
            result
        })
    }

    /// Process one received datagram.
    pub async fn handle_datagram(&self, bytes: &[u8], src: SocketAddr) -> DatagramOutcome {
        let dto: MulticastDto = match serde_json::from_slice(bytes) {
            Ok(dto) => dto,
            Err(e) => {
                tracing::warn!("Dropping malformed announcement from {}: {}", src, e);
                return DatagramOutcome::Malformed;
            }
        };

        if self.identity.is_self(&dto.fingerprint) {
            return DatagramOutcome::SelfSuppressed;
        }

        let is_new = self
            .registry
            .record(&dto.fingerprint, &dto.to_register(), src.ip(), PeerSource::Multicast)
            .await;
        if is_new {
            tracing::info!(
                "Discovered {} ({}) at {}:{}",
                dto.alias,
                dto.device_model.as_deref().unwrap_or("unknown"),
                src.ip(),
                dto.port.unwrap_or(crate::DEFAULT_PORT)
            );
        } else {
            tracing::debug!("Announcement from known peer {}", dto.alias);
        }

        let replied = dto.announce && self.reply_allowed(&dto.fingerprint).await;
        if replied {
            self.announce_in_background();
        }

        DatagramOutcome::Recorded { is_new, replied }
    }

    async fn reply_allowed(&self, fingerprint: &str) -> bool {
        let now = Instant::now();
        let cooldown = self.reply_cooldown;
        let mut last_reply = self.last_reply.lock().await;
        if last_reply
            .get(fingerprint)
            .is_some_and(|at| now.duration_since(*at) < cooldown)
        {
            return false;
        }

        // Entries past the cooldown no longer suppress anything.
        last_reply.retain(|_, at| now.duration_since(*at) < cooldown);
        if !cooldown.is_zero() {
            last_reply.insert(fingerprint.to_string(), now);
        }
        true
    }

    fn announce_in_background(&self) {
        let payload = match serde_json::to_vec(&self.identity.to_announcement(true)) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!("Failed to serialize announcement: {}", e);
                return;
            }
        };
        let socket = Arc::clone(&self.socket);
        let target = SocketAddrV4::new(self.group, self.port);

        tokio::spawn(async move {
            if let Err(e) = socket.send_to(&payload, target).await {
                tracing::warn!("Failed to send reciprocal announcement: {}", e);
            }
        });
    }
}

/// Bind a UDP socket on `port` and join `group` on the default interface.
fn bind_multicast(group: Ipv4Addr, port: u16) -> Result<UdpSocket> {
    let socket = socket2::Socket::new(
        socket2::Domain::IPV4,
        socket2::Type::DGRAM,
        Some(socket2::Protocol::UDP),
    )?;

    socket.set_reuse_address(true)?;

    #[cfg(unix)]
    socket.set_reuse_port(true)?;

    if let Err(e) = socket.set_recv_buffer_size(crate::UDP_SOCKET_BUFFER_SIZE) {
        tracing::debug!("Could not enlarge receive buffer: {}", e);
    }

    let addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
    socket
        .bind(&addr.into())
        .map_err(|e| Error::Transport(format!("failed to bind {addr}: {e}")))?;

    socket
        .join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)
        .map_err(|e| Error::Transport(format!("failed to join {group}: {e}")))?;

    socket.set_nonblocking(true)?;

    let std_socket: std::net::UdpSocket = socket.into();
    Ok(UdpSocket::from_std(std_socket)?)
}
