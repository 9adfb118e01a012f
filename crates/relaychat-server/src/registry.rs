//! Registry of connected peers.
//!
//! Each accepted connection gets a [`ConnectionId`] and its write half is
//! stored here. The relay's connection tasks share one registry behind a
//! single lock, so registration, removal and a full broadcast pass never
//! interleave.
//!
//! Broadcasts are sequential: one slow peer delays delivery to every peer
//! after it in the pass, and holds up every other sender waiting on the lock.
//! A peer whose write fails is removed on the spot; the rest of the pass
//! continues.

use std::{collections::HashMap, fmt, net::SocketAddr};

use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Relay-assigned identifier for one connection.
///
/// Monotonically increasing per registry, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A registered peer.
#[derive(Debug)]
struct Peer<W> {
    writer: W,
    addr: SocketAddr,
}

/// Active peers keyed by connection ID.
#[derive(Debug)]
pub struct ConnectionRegistry<W> {
    peers: HashMap<ConnectionId, Peer<W>>,
    next_id: u64,
}

impl<W> Default for ConnectionRegistry<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W> ConnectionRegistry<W> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { peers: HashMap::new(), next_id: 0 }
    }

    /// Register a peer's write half and assign it an ID.
    pub fn register(&mut self, writer: W, addr: SocketAddr) -> ConnectionId {
        let id = ConnectionId(self.next_id);
        self.next_id += 1;
        self.peers.insert(id, Peer { writer, addr });
        id
    }

    /// Remove a peer. Returns its address if it was still registered.
    ///
    /// The write half is dropped, which closes that direction of the
    /// connection.
    pub fn unregister(&mut self, id: ConnectionId) -> Option<SocketAddr> {
        self.peers.remove(&id).map(|peer| peer.addr)
    }

    /// Check if a peer is registered.
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.peers.contains_key(&id)
    }

    /// Number of registered peers.
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// IDs of all registered peers, in ascending order.
    pub fn peer_ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<_> = self.peers.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Remote address of a registered peer.
    pub fn peer_addr(&self, id: ConnectionId) -> Option<SocketAddr> {
        self.peers.get(&id).map(|peer| peer.addr)
    }

    /// Write half of a registered peer.
    pub fn writer(&self, id: ConnectionId) -> Option<&W> {
        self.peers.get(&id).map(|peer| &peer.writer)
    }
}

impl<W: AsyncWrite + Unpin> ConnectionRegistry<W> {
    /// Deliver `bytes` to every peer except `from`.
    ///
    /// Returns the peers that were removed because their write failed.
    pub async fn broadcast(&mut self, from: ConnectionId, bytes: &[u8]) -> Vec<ConnectionId> {
        self.deliver(Some(from), bytes).await
    }

    /// Deliver `bytes` to every peer.
    ///
    /// Returns the peers that were removed because their write failed.
    pub async fn broadcast_all(&mut self, bytes: &[u8]) -> Vec<ConnectionId> {
        self.deliver(None, bytes).await
    }

    /// Deliver `bytes` to a single peer.
    ///
    /// Returns `false` if the peer is unknown or its write failed, in which
    /// case it has been removed.
    pub async fn send_to(&mut self, id: ConnectionId, bytes: &[u8]) -> bool {
        let Some(peer) = self.peers.get_mut(&id) else {
            return false;
        };

        if let Err(e) = write_all_flush(&mut peer.writer, bytes).await {
            tracing::warn!(%id, addr = %peer.addr, "send failed, dropping peer: {}", e);
            self.peers.remove(&id);
            return false;
        }

        true
    }

    async fn deliver(&mut self, exclude: Option<ConnectionId>, bytes: &[u8]) -> Vec<ConnectionId> {
        let mut failed = Vec::new();

        for (id, peer) in &mut self.peers {
            if Some(*id) == exclude {
                continue;
            }

            if let Err(e) = write_all_flush(&mut peer.writer, bytes).await {
                tracing::warn!(%id, addr = %peer.addr, "broadcast failed, dropping peer: {}", e);
                failed.push(*id);
            }
        }

        for id in &failed {
            self.peers.remove(id);
        }

        failed
    }
}

async fn write_all_flush<W: AsyncWrite + Unpin>(writer: &mut W, bytes: &[u8]) -> std::io::Result<()> {
    writer.write_all(bytes).await?;
    writer.flush().await
}
