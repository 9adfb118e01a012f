//! Relaychat Protocol
//!
//! Stream framing and control signals shared by the relay and its clients.
//!
//! The relay never interprets message contents. It only needs to know where
//! one message ends and the next begins, which depends on the configured
//! [`WireFormat`]:
//!
//! ```text
//! Raw:            [iv || ciphertext]            one write == one read (assumed)
//! LengthPrefixed: [len: u32 BE][iv || ciphertext]
//! ```
//!
//! Raw mode interoperates with unframed peers but relies on TCP never
//! merging or splitting writes. Length-prefixed mode is reliable but every
//! peer and the relay must agree on it.
//!
//! Control signals ([`ControlSignal`]) share the stream with ciphertext and
//! are recognized by their `[SYS]` prefix.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod signal;
pub mod wire;

pub use error::WireError;
pub use signal::{ControlSignal, SYS_PREFIX};
pub use wire::{WireFormat, WireReader, encode_message, write_message};

/// Default TCP port for the relay
pub const DEFAULT_PORT: u16 = 65432;

/// Default receive buffer size; the largest chunk a raw-mode read returns
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Largest message accepted in length-prefixed mode (1 MiB)
pub const MAX_MESSAGE_SIZE: usize = 1 << 20;

/// Size of the length prefix in length-prefixed mode
pub const LENGTH_PREFIX_SIZE: usize = 4;
