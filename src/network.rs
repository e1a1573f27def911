//! Peer network contract
//!
//! The persistence layer only consumes the peer network through
//! [`PeerNetwork`]; socket handling, retries and peer discovery live in the
//! implementation. [`InMemoryNetwork`] is a loopback implementation with no
//! sockets, used to drive the contract from tests and single-process runs.
//!
//! Poll and broadcast run on the caller's thread. When the same thread owns
//! the [`Snapshot`] being persisted, no extra synchronization is needed.

use crate::codec;
use crate::config::NetworkConfig;
use crate::error::{Result, StateError};
use crate::snapshot::Snapshot;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Maximum number of peers a node keeps.
pub const MAX_PEERS: usize = 125;

pub type NodeId = [u8; 32];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkStats {
    pub port: u16,
    pub peers: usize,
    pub banned: usize,
    pub messages_sent: u64,
    pub messages_received: u64,
}

pub trait PeerNetwork {
    /// Binds the node to `port` under `node_id`.
    fn init(&mut self, port: u16, node_id: NodeId) -> Result<()>;

    /// Registers a peer. Fails once the peer limit is reached.
    fn add_peer(&mut self, address: &str, port: u16) -> Result<()>;

    /// Processes pending inbound traffic, blocking no longer than `timeout`.
    fn poll(&mut self, timeout: Duration) -> Result<()>;

    /// Best-effort fan-out of `payload` to every connected, non-banned peer.
    fn broadcast(&mut self, payload: &[u8]) -> Result<()>;

    fn stats(&self) -> NetworkStats;

    fn print_stats(&self) {
        let stats = self.stats();
        info!(
            "Network on port {}: {} peers ({} banned), {} sent, {} received",
            stats.port, stats.peers, stats.banned, stats.messages_sent, stats.messages_received
        );
    }

    /// Releases every peer connection.
    fn shutdown(&mut self);
}

#[derive(Debug, Clone)]
pub struct PeerInfo {
    pub address: String,
    pub port: u16,
    pub banned: bool,
    pub messages_sent: u64,
    /// Payloads delivered to this peer, oldest first.
    pub outbox: Vec<Vec<u8>>,
}

impl PeerInfo {
    fn new(address: &str, port: u16) -> Self {
        Self {
            address: address.to_string(),
            port,
            banned: false,
            messages_sent: 0,
            outbox: Vec::new(),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

/// Loopback [`PeerNetwork`] that keeps all traffic in memory.
#[derive(Debug)]
pub struct InMemoryNetwork {
    port: u16,
    node_id: Option<NodeId>,
    max_peers: usize,
    peers: Vec<PeerInfo>,
    inbound: VecDeque<Vec<u8>>,
    received: Vec<Vec<u8>>,
    messages_sent: u64,
    messages_received: u64,
}

impl InMemoryNetwork {
    pub fn new(max_peers: usize) -> Self {
        Self {
            port: 0,
            node_id: None,
            max_peers,
            peers: Vec::new(),
            inbound: VecDeque::new(),
            received: Vec::new(),
            messages_sent: 0,
            messages_received: 0,
        }
    }

    pub fn from_config(config: &NetworkConfig) -> Self {
        Self::new(config.max_peers.min(MAX_PEERS))
    }

    pub fn node_id(&self) -> Option<&NodeId> {
        self.node_id.as_ref()
    }

    pub fn peers(&self) -> &[PeerInfo] {
        &self.peers
    }

    pub fn peer(&self, address: &str, port: u16) -> Option<&PeerInfo> {
        self.peers
            .iter()
            .find(|p| p.address == address && p.port == port)
    }

    /// Excludes a peer from future broadcasts.
    pub fn ban_peer(&mut self, address: &str, port: u16) -> Result<()> {
        let peer = self
            .peers
            .iter_mut()
            .find(|p| p.address == address && p.port == port)
            .ok_or_else(|| StateError::Network(format!("Unknown peer {}:{}", address, port)))?;
        peer.banned = true;
        warn!("Banned peer {}", peer.addr());
        Ok(())
    }

    /// Queues a payload as if a peer had sent it; picked up by the next poll.
    pub fn deliver(&mut self, payload: Vec<u8>) {
        self.inbound.push_back(payload);
    }

    /// Drains every payload received by previous polls.
    pub fn take_received(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.received)
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.node_id.is_none() {
            return Err(StateError::Network("Network not initialized".to_string()));
        }
        Ok(())
    }
}

impl Default for InMemoryNetwork {
    fn default() -> Self {
        Self::new(MAX_PEERS)
    }
}

impl PeerNetwork for InMemoryNetwork {
    fn init(&mut self, port: u16, node_id: NodeId) -> Result<()> {
        if self.node_id.is_some() {
            return Err(StateError::Network("Network already initialized".to_string()));
        }
        self.port = port;
        self.node_id = Some(node_id);
        info!("Loopback network initialized on port {}", port);
        Ok(())
    }

    fn add_peer(&mut self, address: &str, port: u16) -> Result<()> {
        self.ensure_initialized()?;

        if self.peer(address, port).is_some() {
            return Err(StateError::Network(format!(
                "Peer {}:{} already registered",
                address, port
            )));
        }
        if self.peers.len() >= self.max_peers {
            return Err(StateError::Network(format!(
                "Peer limit of {} reached",
                self.max_peers
            )));
        }

        self.peers.push(PeerInfo::new(address, port));
        debug!("Added peer {}:{}", address, port);
        Ok(())
    }

    fn poll(&mut self, timeout: Duration) -> Result<()> {
        self.ensure_initialized()?;

        let pending = self.inbound.len();
        while let Some(payload) = self.inbound.pop_front() {
            self.messages_received += 1;
            self.received.push(payload);
        }
        if pending > 0 {
            debug!("Poll ({:?} budget) received {} messages", timeout, pending);
        }
        Ok(())
    }

    fn broadcast(&mut self, payload: &[u8]) -> Result<()> {
        self.ensure_initialized()?;

        let mut delivered = 0;
        for peer in self.peers.iter_mut().filter(|p| !p.banned) {
            peer.outbox.push(payload.to_vec());
            peer.messages_sent += 1;
            delivered += 1;
        }
        self.messages_sent += delivered;
        debug!("Broadcast {} bytes to {} peers", payload.len(), delivered);
        Ok(())
    }

    fn stats(&self) -> NetworkStats {
        NetworkStats {
            port: self.port,
            peers: self.peers.len(),
            banned: self.peers.iter().filter(|p| p.banned).count(),
            messages_sent: self.messages_sent,
            messages_received: self.messages_received,
        }
    }

    fn shutdown(&mut self) {
        self.peers.clear();
        self.inbound.clear();
        self.node_id = None;
        debug!("Loopback network shut down");
    }
}

/// Serializes `snapshot` and broadcasts the image. Returns the payload size.
pub fn broadcast_snapshot<N: PeerNetwork + ?Sized>(
    net: &mut N,
    snapshot: &Snapshot,
) -> Result<usize> {
    let payload = codec::serialize(snapshot)?;
    net.broadcast(&payload)?;
    Ok(payload.len())
}

/// Decodes a snapshot image received from a peer and adopts it when its
/// version is newer than `dest`. Returns whether `dest` was replaced.
///
/// `dest` is never modified when the payload is malformed or stale.
pub fn apply_snapshot_payload(dest: &mut Snapshot, payload: &[u8], slack: usize) -> Result<bool> {
    let mut incoming = Snapshot::default();
    codec::deserialize_with_slack(&mut incoming, payload, slack)?;

    if incoming.version <= dest.version {
        debug!(
            "Ignoring peer snapshot v{} (local is v{})",
            incoming.version, dest.version
        );
        return Ok(false);
    }

    info!(
        "Adopting peer snapshot v{} with {} wallets",
        incoming.version,
        incoming.wallet_count()
    );
    *dest = incoming;
    Ok(true)
}
