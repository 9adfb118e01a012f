//! Client error types.

use std::io;

use relaychat_crypto::{CodecError, ConfigError};
use relaychat_proto::WireError;
use thiserror::Error;

/// Errors from a client session.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Frame could not be decrypted (wrong key, corruption, counter skew).
    ///
    /// Terminates the receive loop. Retrying cannot succeed without the
    /// matching key.
    #[error("decryption failed: {0}")]
    Codec(#[from] CodecError),

    /// Framing error on the relay connection.
    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    /// Connecting or writing failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The relay closed the connection.
    #[error("connection closed by relay")]
    ConnectionClosed,

    /// Invalid key schedule parameters.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Key schedule task failed or its lock was poisoned.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ClientError {
    /// Whether the session can keep sending after this error.
    ///
    /// Decryption and configuration problems leave the connection usable;
    /// transport failures and internal errors do not.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Codec(_) | Self::Config(_) => false,
            Self::Wire(_) | Self::Io(_) | Self::ConnectionClosed | Self::Internal(_) => true,
        }
    }
}
