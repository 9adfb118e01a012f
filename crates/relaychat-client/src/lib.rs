//! Relaychat client.
//!
//! Couples the passphrase [`KeySchedule`](relaychat_crypto::KeySchedule) and
//! the frame codec to one relay connection.
//!
//! # Architecture
//!
//! ```text
//!            send(plaintext)                       receive task
//!                  │                                    │
//!                  ▼                                    ▼
//!   writer lock ─► next_key ─► encrypt ─► write    read ─► [SYS]? ─► Status
//!                  │                                    │
//!                  └──────► Mutex<KeySchedule> ◄────────┘ next_key ─► decrypt
//!                                                                      │
//!                                                     SessionEvent ◄───┘
//! ```
//!
//! The caller drives sending and consumes [`SessionEvent`]s from the channel
//! returned by [`ClientSession::connect`]. Control signals never advance the
//! key schedule; every other message does, exactly once.
//!
//! # Components
//!
//! - [`ClientSession`]: connection, key schedule and receive task
//! - [`SessionEvent`]: decrypted messages, relay status, rotations, errors
//! - [`SessionConfig`]: key schedule parameters and wire format

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod event;
mod session;

pub use error::ClientError;
pub use event::SessionEvent;
pub use relaychat_crypto::{Frame, KdfParams};
pub use relaychat_proto::{ControlSignal, WireFormat};
pub use session::{ClientSession, DEFAULT_EVENT_CAPACITY, KeyState, SessionConfig};
