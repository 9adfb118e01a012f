//! Rotating key schedule derived from a shared passphrase
//!
//! # Security Properties
//!
//! - Determinism: same passphrase and message count always produce the same
//!   key, which is what lets two peers agree without exchanging anything
//! - Rekeying: a new salt epoch begins every `rotate_every` messages
//! - Fragility: the counter is never transmitted, so peers must process the
//!   same number of messages to stay in step

use std::fmt;

use hmac::Hmac;
use pbkdf2::pbkdf2;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::error::ConfigError;

type HmacSha256 = Hmac<Sha256>;

/// PBKDF2 iteration count used by every relaychat peer
pub const DEFAULT_ITERATIONS: u32 = 100_000;

/// Number of processed messages per salt epoch
pub const DEFAULT_ROTATE_EVERY: u64 = 5;

/// AES-256 key length in bytes
pub const KEY_LEN: usize = 32;

/// Derive `length` key bytes from a passphrase and salt.
///
/// PBKDF2-HMAC-SHA256 with [`DEFAULT_ITERATIONS`] rounds. Deterministic: the
/// same `(passphrase, salt, length)` always yields the same key.
pub fn derive_key(passphrase: &[u8], salt: &[u8], length: usize) -> Vec<u8> {
    derive_key_with_iterations(passphrase, salt, DEFAULT_ITERATIONS, length)
}

/// Derive `length` key bytes with an explicit PBKDF2 iteration count.
pub fn derive_key_with_iterations(
    passphrase: &[u8],
    salt: &[u8],
    iterations: u32,
    length: usize,
) -> Vec<u8> {
    let mut key = vec![0u8; length];
    fill_key(passphrase, salt, iterations, &mut key);
    key
}

fn fill_key(passphrase: &[u8], salt: &[u8], iterations: u32, out: &mut [u8]) {
    let Ok(()) = pbkdf2::<HmacSha256>(passphrase, salt, iterations, out) else {
        unreachable!("HMAC accepts passphrases of any length");
    };
}

/// Salt string for a rotation epoch: `"salt{index}"`.
pub fn salt_for_index(index: u64) -> Vec<u8> {
    format!("salt{index}").into_bytes()
}

/// Key schedule parameters shared by all peers of a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// PBKDF2 iteration count
    pub iterations: u32,
    /// Messages per salt epoch
    pub rotate_every: u64,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self { iterations: DEFAULT_ITERATIONS, rotate_every: DEFAULT_ROTATE_EVERY }
    }
}

impl KdfParams {
    fn validate(self) -> Result<Self, ConfigError> {
        if self.rotate_every == 0 {
            return Err(ConfigError::ZeroRotation);
        }
        if self.iterations == 0 {
            return Err(ConfigError::ZeroIterations);
        }
        Ok(self)
    }
}

/// A 32-byte AES-256 key for one salt epoch.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionKey {
    key: [u8; KEY_LEN],
}

impl SessionKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(key: [u8; KEY_LEN]) -> Self {
        Self { key }
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.key
    }

    fn derive(passphrase: &[u8], salt_index: u64, iterations: u32) -> Self {
        let mut key = [0u8; KEY_LEN];
        fill_key(passphrase, &salt_for_index(salt_index), iterations, &mut key);
        Self { key }
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKey(..)")
    }
}

// Implement Drop to zeroize key material
impl Drop for SessionKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

/// Result of one [`KeySchedule::next_key`] step.
#[derive(Debug, Clone)]
pub struct KeyStep {
    /// Key to use for this message
    pub key: SessionKey,
    /// Counter value after this step
    pub message_count: u64,
    /// Salt epoch the key belongs to
    pub salt_index: u64,
    /// Whether this step moved to a new salt epoch
    pub rotated: bool,
}

/// Passphrase-driven key schedule.
///
/// Holds the passphrase, the processed-message counter and the key for the
/// current salt epoch. [`next_key()`](Self::next_key) must be called exactly
/// once per processed message, sent or received, and is the only mutation.
///
/// # Invariants
///
/// - `salt_index == message_count / rotate_every`
/// - `current_key == PBKDF2(passphrase, "salt{salt_index}")`, recomputed
///   exactly when `salt_index` changes
pub struct KeySchedule {
    /// Shared secret, never transmitted
    passphrase: Vec<u8>,
    params: KdfParams,
    /// Messages processed so far (sent + received)
    message_count: u64,
    salt_index: u64,
    current_key: SessionKey,
}

impl KeySchedule {
    /// Create a schedule with default parameters at `salt0`.
    ///
    /// Runs one full PBKDF2 derivation.
    pub fn new(passphrase: impl Into<Vec<u8>>) -> Self {
        let passphrase = passphrase.into();
        let params = KdfParams::default();
        let current_key = SessionKey::derive(&passphrase, 0, params.iterations);
        Self { passphrase, params, message_count: 0, salt_index: 0, current_key }
    }

    /// Create a schedule with explicit parameters at `salt0`.
    pub fn with_params(
        passphrase: impl Into<Vec<u8>>,
        params: KdfParams,
    ) -> Result<Self, ConfigError> {
        let params = params.validate()?;
        let passphrase = passphrase.into();
        let current_key = SessionKey::derive(&passphrase, 0, params.iterations);
        Ok(Self { passphrase, params, message_count: 0, salt_index: 0, current_key })
    }

    /// Advance the counter and return the key for this message.
    ///
    /// This operation:
    /// 1. Increments `message_count`
    /// 2. Recomputes the salt index (`message_count / rotate_every`)
    /// 3. Re-derives the key if the index changed
    pub fn next_key(&mut self) -> KeyStep {
        self.message_count += 1;

        let new_index = self.message_count / self.params.rotate_every;
        let rotated = new_index != self.salt_index;
        if rotated {
            self.salt_index = new_index;
            self.current_key =
                SessionKey::derive(&self.passphrase, self.salt_index, self.params.iterations);
        }

        KeyStep {
            key: self.current_key.clone(),
            message_count: self.message_count,
            salt_index: self.salt_index,
            rotated,
        }
    }

    /// Messages processed so far.
    pub fn message_count(&self) -> u64 {
        self.message_count
    }

    /// Current salt epoch.
    pub fn salt_index(&self) -> u64 {
        self.salt_index
    }

    /// Key for the current salt epoch.
    pub fn current_key(&self) -> &SessionKey {
        &self.current_key
    }
}

impl fmt::Debug for KeySchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeySchedule")
            .field("params", &self.params)
            .field("message_count", &self.message_count)
            .field("salt_index", &self.salt_index)
            .finish_non_exhaustive()
    }
}

impl Drop for KeySchedule {
    fn drop(&mut self) {
        self.passphrase.zeroize();
    }
}
