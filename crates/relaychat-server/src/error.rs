//! Server error types.

use std::fmt;

use relaychat_proto::WireError;

/// Errors that can occur in the relay.
#[derive(Debug)]
pub enum ServerError {
    /// Configuration error (invalid bind address, zero buffer size, etc.).
    ///
    /// These are fatal errors that prevent server startup. Fix configuration
    /// and restart.
    Config(String),

    /// Transport/network error (bind failure, accept failure, I/O error).
    ///
    /// Failing to bind at startup is the only process-fatal case. Accept
    /// errors are logged and the accept loop continues.
    Transport(String),

    /// Wire error on a single connection (oversized or truncated message).
    ///
    /// Fatal for that connection only; the relay keeps serving everyone
    /// else.
    Wire(WireError),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::Wire(err) => write!(f, "wire error: {err}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Wire(err) => Some(err),
            _ => None,
        }
    }
}

impl From<WireError> for ServerError {
    fn from(err: WireError) -> Self {
        Self::Wire(err)
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
