//! Wire error types.

use std::io;

use thiserror::Error;

/// Errors reading or writing wire messages.
#[derive(Debug, Error)]
pub enum WireError {
    /// Underlying stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Length prefix exceeds [`crate::MAX_MESSAGE_SIZE`].
    ///
    /// The stream position is lost after this; the connection must be
    /// dropped.
    #[error("message too large: {size} bytes (max {max})")]
    TooLarge {
        /// Claimed or actual message size
        size: usize,
        /// Maximum allowed size
        max: usize,
    },

    /// Peer closed the stream in the middle of a message.
    #[error("stream closed mid-message: expected {expected} bytes, received {received}")]
    Truncated {
        /// Bytes the message needed
        expected: usize,
        /// Bytes actually received
        received: usize,
    },
}
