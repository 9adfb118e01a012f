//! Session events delivered to the display layer.

use relaychat_crypto::Frame;
use relaychat_proto::ControlSignal;

use crate::ClientError;

/// Events produced by a [`ClientSession`](crate::ClientSession).
///
/// The receive loop is the main producer. `send` also emits
/// [`KeyRotated`](Self::KeyRotated) when sending moves the schedule to a new
/// salt epoch.
#[derive(Debug)]
pub enum SessionEvent {
    /// A peer's message was decrypted.
    Message {
        /// Decrypted message bytes.
        plaintext: Vec<u8>,
        /// Frame as received, for ciphertext display.
        frame: Frame,
    },

    /// The relay sent a status signal. Does not advance the key schedule.
    Status(ControlSignal),

    /// The key schedule moved to a new salt epoch. Display only.
    KeyRotated {
        /// New salt epoch.
        salt_index: u64,
    },

    /// The receive loop stopped on an error.
    ///
    /// Always followed by [`Closed`](Self::Closed).
    Error(ClientError),

    /// The receive loop has ended; no further events follow.
    Closed,
}
