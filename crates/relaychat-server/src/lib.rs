//! Relaychat relay server.
//!
//! Accepts TCP connections and forwards every message a peer sends, byte for
//! byte, to every other connected peer. The relay holds no keys and never
//! decrypts anything.
//!
//! # Architecture
//!
//! ```text
//! accept loop ──► register write half ──► spawn handle_connection
//!                        │                        │
//!                        ▼                        ▼
//!            Arc<Mutex<ConnectionRegistry>> ◄── read message, broadcast
//! ```
//!
//! One tokio task per connection. All registry access, including the whole
//! broadcast fan-out, happens under a single [`tokio::sync::Mutex`], so a
//! slow peer stalls every broadcast. There are no write timeouts.
//!
//! # Components
//!
//! - [`Server`]: binds, accepts, spawns connection tasks
//! - [`ConnectionRegistry`]: active peers and sequential fan-out
//! - [`TcpTransport`]: listener wrapper

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod registry;
mod transport;

use std::{net::SocketAddr, sync::Arc};

pub use error::ServerError;
pub use registry::{ConnectionId, ConnectionRegistry};
use relaychat_proto::{
    ControlSignal, DEFAULT_BUFFER_SIZE, DEFAULT_PORT, WireFormat, WireReader, encode_message,
};
use tokio::{
    io::AsyncWrite,
    net::tcp::{OwnedReadHalf, OwnedWriteHalf},
    sync::Mutex,
};
pub use transport::TcpTransport;

/// Registry handle shared by the accept loop and every connection task.
pub type SharedRegistry = Arc<Mutex<ConnectionRegistry<OwnedWriteHalf>>>;

/// Relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address to bind to (e.g., "0.0.0.0:65432")
    pub bind_address: String,
    /// Largest chunk a single raw-mode read returns
    pub buffer_size: usize,
    /// Message framing; must match every client
    pub wire_format: WireFormat,
    /// Send `[SYS]WAITING` / `[SYS]CONNECTED` as peers come and go
    pub announce_status: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_address: format!("0.0.0.0:{DEFAULT_PORT}"),
            buffer_size: DEFAULT_BUFFER_SIZE,
            wire_format: WireFormat::default(),
            announce_status: false,
        }
    }
}

impl RelayConfig {
    fn validate(&self) -> Result<(), ServerError> {
        if self.buffer_size == 0 {
            return Err(ServerError::Config("buffer size must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Relay server.
pub struct Server {
    transport: TcpTransport,
    config: RelayConfig,
    registry: SharedRegistry,
}

impl Server {
    /// Validate the configuration and bind the listener.
    ///
    /// # Errors
    ///
    /// - `Config` for a zero buffer size or an unparseable address
    /// - `Transport` if the address cannot be bound
    pub async fn bind(config: RelayConfig) -> Result<Self, ServerError> {
        config.validate()?;

        let transport = TcpTransport::bind(&config.bind_address).await?;
        let registry = Arc::new(Mutex::new(ConnectionRegistry::new()));

        Ok(Self { transport, config, registry })
    }

    /// Handle to the peer registry.
    ///
    /// Holding its lock pauses all relaying.
    pub fn registry(&self) -> SharedRegistry {
        Arc::clone(&self.registry)
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.transport.local_addr()
    }

    /// Accept connections forever.
    ///
    /// Accept errors are logged and do not stop the loop. Connection failures
    /// only ever affect their own connection.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!("Relay listening on {}", self.transport.local_addr()?);

        loop {
            match self.transport.accept().await {
                Ok((stream, addr)) => {
                    let (reader, writer) = stream.into_split();
                    let id = {
                        let mut registry = self.registry.lock().await;
                        let id = registry.register(writer, addr);
                        tracing::info!(%id, %addr, "client connected");

                        // Announce under the registering lock so concurrent
                        // joins see membership in arrival order.
                        if self.config.announce_status {
                            let format = self.config.wire_format;
                            if let Err(e) = announce_arrival(id, &mut registry, format).await {
                                tracing::warn!(%id, "failed to announce arrival: {}", e);
                            }
                        }
                        id
                    };

                    let registry = Arc::clone(&self.registry);
                    let config = self.config.clone();

                    tokio::spawn(async move {
                        if let Err(e) =
                            handle_connection(id, addr, reader, &registry, &config).await
                        {
                            tracing::debug!(%id, "connection error: {}", e);
                        }

                        depart(id, &registry, &config).await;
                    });
                },
                Err(e) => {
                    tracing::error!("Accept error: {}", e);
                },
            }
        }
    }
}

/// Relay one connection's messages until it closes or fails.
async fn handle_connection(
    id: ConnectionId,
    addr: SocketAddr,
    reader: OwnedReadHalf,
    registry: &SharedRegistry,
    config: &RelayConfig,
) -> Result<(), ServerError> {
    let mut reader = WireReader::new(reader, config.wire_format, config.buffer_size);

    while let Some(message) = reader.read_message().await? {
        // Length-prefixed peers may send empty messages; there is nothing to
        // relay.
        if message.is_empty() {
            continue;
        }

        let outbound = encode_message(config.wire_format, &message)?;

        let mut registry = registry.lock().await;
        if !registry.contains(id) {
            tracing::debug!(%id, %addr, "sender dropped from registry, closing");
            break;
        }

        let dropped = registry.broadcast(id, &outbound).await;
        tracing::trace!(
            %id,
            bytes = message.len(),
            receivers = registry.peer_count().saturating_sub(1),
            "relayed message"
        );

        for peer in dropped {
            tracing::info!(id = %peer, "client dropped after failed write");
        }
    }

    Ok(())
}

/// Tell a new peer whether anyone else is here.
///
/// Must run under the same lock acquisition that registered `id`.
async fn announce_arrival<W: AsyncWrite + Unpin>(
    id: ConnectionId,
    registry: &mut ConnectionRegistry<W>,
    format: WireFormat,
) -> Result<(), ServerError> {
    if registry.peer_count() >= 2 {
        let connected = encode_message(format, &ControlSignal::Connected.to_bytes())?;
        registry.broadcast_all(&connected).await;
    } else {
        let waiting = encode_message(format, &ControlSignal::Waiting.to_bytes())?;
        registry.send_to(id, &waiting).await;
    }

    Ok(())
}

/// Remove a finished connection and, when announcing, tell a newly lone peer
/// that it is waiting again.
async fn depart(id: ConnectionId, registry: &SharedRegistry, config: &RelayConfig) {
    let mut registry = registry.lock().await;

    match registry.unregister(id) {
        Some(addr) => tracing::info!(%id, %addr, "client disconnected"),
        None => tracing::info!(%id, "client disconnected"),
    }

    if !config.announce_status {
        return;
    }

    let remaining = registry.peer_ids();
    if let [last] = remaining[..] {
        match encode_message(config.wire_format, &ControlSignal::Waiting.to_bytes()) {
            Ok(waiting) => {
                registry.send_to(last, &waiting).await;
            },
            Err(e) => tracing::warn!("failed to encode status signal: {}", e),
        }
    }
}
