//! Error types for key schedule and frame codec operations

use thiserror::Error;

/// Errors from decrypting a frame
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Frame is too short, or its ciphertext is not a positive multiple of
    /// the block size
    #[error("invalid frame length {len}: need 16-byte IV plus a positive multiple of 16 bytes")]
    FrameLength {
        /// Total frame length in bytes
        len: usize,
    },

    /// PKCS#7 padding did not validate after decryption
    ///
    /// Caused by a wrong key, a corrupted frame, or counter desync between
    /// peers. The codec cannot tell these apart.
    #[error("invalid padding: wrong key, corrupted frame, or key desync")]
    Padding,
}

/// Invalid key schedule parameters
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Rotation interval of zero would divide by zero
    #[error("rotation interval must be at least 1 message")]
    ZeroRotation,

    /// PBKDF2 requires at least one iteration
    #[error("PBKDF2 iteration count must be at least 1")]
    ZeroIterations,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CodecError::FrameLength { len: 20 };
        assert_eq!(
            err.to_string(),
            "invalid frame length 20: need 16-byte IV plus a positive multiple of 16 bytes"
        );
        assert_eq!(
            ConfigError::ZeroRotation.to_string(),
            "rotation interval must be at least 1 message"
        );
    }
}
