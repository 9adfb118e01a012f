//! Relay status signals.
//!
//! A relay MAY send plain ASCII status messages prefixed with `[SYS]`. They
//! are not encrypted and do not advance any peer's key schedule. Not every
//! relay emits them, so clients must work without them.

use std::fmt;

/// Prefix marking a message as a control signal rather than ciphertext.
pub const SYS_PREFIX: &[u8] = b"[SYS]";

const CONNECTED: &[u8] = b"[SYS]CONNECTED";
const WAITING: &[u8] = b"[SYS]WAITING";

/// A relay status notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlSignal {
    /// At least two peers are connected; chat can begin.
    Connected,
    /// This peer is alone on the relay.
    Waiting,
    /// Unrecognized signal, kept verbatim (prefix included).
    Other(String),
}

impl ControlSignal {
    /// Parse a received message as a control signal.
    ///
    /// Returns `None` if the message does not start with [`SYS_PREFIX`],
    /// meaning it should be treated as ciphertext.
    pub fn parse(message: &[u8]) -> Option<Self> {
        if !message.starts_with(SYS_PREFIX) {
            return None;
        }

        Some(match message {
            CONNECTED => Self::Connected,
            WAITING => Self::Waiting,
            other => Self::Other(String::from_utf8_lossy(other).into_owned()),
        })
    }

    /// Wire bytes for this signal.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Connected => CONNECTED.to_vec(),
            Self::Waiting => WAITING.to_vec(),
            Self::Other(text) => text.as_bytes().to_vec(),
        }
    }
}

impl fmt::Display for ControlSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected => f.write_str("secure connection established"),
            Self::Waiting => f.write_str("waiting for another client to connect"),
            Self::Other(text) => write!(f, "relay signal {text}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_signals() {
        assert_eq!(ControlSignal::parse(b"[SYS]CONNECTED"), Some(ControlSignal::Connected));
        assert_eq!(ControlSignal::parse(b"[SYS]WAITING"), Some(ControlSignal::Waiting));
    }

    #[test]
    fn parse_unknown_signal_keeps_text() {
        assert_eq!(
            ControlSignal::parse(b"[SYS]SHUTDOWN"),
            Some(ControlSignal::Other("[SYS]SHUTDOWN".to_string()))
        );
    }

    #[test]
    fn ciphertext_is_not_a_signal() {
        assert_eq!(ControlSignal::parse(&[0x5b, 0x53, 0x00, 0x01]), None);
        assert_eq!(ControlSignal::parse(b""), None);
        assert_eq!(ControlSignal::parse(b"CONNECTED"), None);
    }

    #[test]
    fn to_bytes_parses_back() {
        for signal in [ControlSignal::Connected, ControlSignal::Waiting] {
            assert_eq!(ControlSignal::parse(&signal.to_bytes()), Some(signal));
        }
    }
}
