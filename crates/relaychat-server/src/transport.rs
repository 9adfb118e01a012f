//! TCP listener for the relay.
//!
//! Plain TCP, no TLS and no handshake. Confidentiality comes entirely from
//! the peers' own encryption; the relay only ever sees ciphertext.
//!
//! `TCP_NODELAY` is set on every accepted stream. In raw wire mode the
//! protocol assumes one write arrives as one read, and Nagle coalescing makes
//! that assumption fail far more often.

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};

use crate::error::ServerError;

/// TCP transport for the relay.
pub struct TcpTransport {
    listener: TcpListener,
}

impl TcpTransport {
    /// Parse `address` and bind a listener on it.
    pub async fn bind(address: &str) -> Result<Self, ServerError> {
        let addr: SocketAddr = address
            .parse()
            .map_err(|e| ServerError::Config(format!("invalid bind address '{address}': {e}")))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Transport(format!("failed to bind {addr}: {e}")))?;

        tracing::info!("TCP transport bound to {}", addr);

        Ok(Self { listener })
    }

    /// Accept the next connection.
    ///
    /// This method blocks until a connection is available.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), ServerError> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(|e| ServerError::Transport(format!("accept failed: {e}")))?;

        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(%addr, "failed to set TCP_NODELAY: {}", e);
        }

        Ok((stream, addr))
    }

    /// Local address the transport is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener
            .local_addr()
            .map_err(|e| ServerError::Transport(format!("failed to get local address: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn transport_binds_ephemeral_port() {
        let transport = TcpTransport::bind("127.0.0.1:0").await;
        assert!(transport.is_ok(), "Transport should bind");

        let transport = transport.unwrap();
        let addr = transport.local_addr().unwrap();
        assert_ne!(addr.port(), 0, "Should have assigned a port");
    }

    #[tokio::test]
    async fn transport_rejects_invalid_address() {
        let result = TcpTransport::bind("invalid:address:format").await;
        assert!(matches!(result, Err(ServerError::Config(_))), "Should reject invalid address");
    }

    #[tokio::test]
    async fn transport_fails_on_port_in_use() {
        let first = TcpTransport::bind("127.0.0.1:0").await.unwrap();
        let addr = first.local_addr().unwrap().to_string();

        let second = TcpTransport::bind(&addr).await;
        assert!(matches!(second, Err(ServerError::Transport(_))));
    }

    #[tokio::test]
    async fn transport_accepts_connection() {
        let transport = TcpTransport::bind("127.0.0.1:0").await.unwrap();
        let addr = transport.local_addr().unwrap();

        let client = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });

        let (stream, peer_addr) = transport.accept().await.unwrap();
        let client = client.await.unwrap();

        assert_eq!(peer_addr, client.local_addr().unwrap());
        assert!(stream.nodelay().unwrap());
    }
}
