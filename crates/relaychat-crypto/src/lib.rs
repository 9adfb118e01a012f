//! Relaychat Cryptographic Primitives
//!
//! Passphrase-driven key schedule and the AES-256-CBC frame codec used by
//! relaychat peers. The relay never touches this crate: it forwards frames
//! without decrypting them.
//!
//! # Key Lifecycle
//!
//! Every peer holding the shared passphrase runs an identical
//! [`KeySchedule`]. Each processed message (sent or received) advances a
//! counter; every [`DEFAULT_ROTATE_EVERY`] messages the schedule moves to the
//! next salt epoch and re-derives the key.
//!
//! ```text
//! Passphrase
//!     │
//!     ▼
//! PBKDF2-HMAC-SHA256("salt{message_count / rotate_every}")
//!     │
//!     ▼
//! Session Key (32 bytes)
//!     │
//!     ▼
//! AES-256-CBC + PKCS#7 → IV || Ciphertext
//! ```
//!
//! # Security
//!
//! Key agreement:
//! - Peers never exchange keys or counters; matching keys depend entirely on
//!   both peers processing the same number of messages
//! - A skewed counter shows up only as a decryption failure
//!
//! Confidentiality:
//! - Fresh random IV per frame
//! - Periodic rekeying limits how much traffic one key protects
//!
//! No authenticity:
//! - CBC without a MAC; a modified frame usually fails padding removal but may
//!   also decrypt to unrelated bytes

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
pub mod error;
pub mod key_schedule;

pub use codec::{BLOCK_SIZE, Frame, IV_SIZE, decrypt, decrypt_frame, encrypt, encrypt_with_iv};
pub use error::{CodecError, ConfigError};
pub use key_schedule::{
    DEFAULT_ITERATIONS, DEFAULT_ROTATE_EVERY, KEY_LEN, KdfParams, KeySchedule, KeyStep,
    SessionKey, derive_key, derive_key_with_iterations, salt_for_index,
};
