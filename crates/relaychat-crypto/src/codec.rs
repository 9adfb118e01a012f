//! Frame encryption using AES-256-CBC with PKCS#7 padding
//!
//! [`encrypt_with_iv`] and [`decrypt_frame`] are pure. [`encrypt`] draws the IV
//! from the OS RNG.

use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};

use crate::{error::CodecError, key_schedule::SessionKey};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Size of the CBC initialization vector (16 bytes)
pub const IV_SIZE: usize = 16;

/// AES block size (16 bytes)
pub const BLOCK_SIZE: usize = 16;

/// An encrypted message as carried on the wire.
///
/// Layout: `iv (16 bytes) || ciphertext (n * 16 bytes, n >= 1)`. There is no
/// sequence number and no authentication tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Random IV, fresh per encryption
    pub iv: [u8; IV_SIZE],
    /// PKCS#7-padded AES-256-CBC output
    pub ciphertext: Vec<u8>,
}

impl Frame {
    /// Split wire bytes into IV and ciphertext.
    ///
    /// # Errors
    ///
    /// - `FrameLength`: fewer than 16 ciphertext bytes, or ciphertext not a
    ///   multiple of the block size
    pub fn parse(bytes: &[u8]) -> Result<Self, CodecError> {
        let Some((iv, ciphertext)) = bytes.split_first_chunk::<IV_SIZE>() else {
            return Err(CodecError::FrameLength { len: bytes.len() });
        };

        if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
            return Err(CodecError::FrameLength { len: bytes.len() });
        }

        Ok(Self { iv: *iv, ciphertext: ciphertext.to_vec() })
    }

    /// Wire representation `iv || ciphertext`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.wire_len());
        out.extend_from_slice(&self.iv);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Length of the wire representation.
    pub fn wire_len(&self) -> usize {
        IV_SIZE + self.ciphertext.len()
    }
}

/// Encrypt a message under `key` with a fresh random IV.
pub fn encrypt(key: &SessionKey, plaintext: &[u8]) -> Frame {
    encrypt_with_iv(key, random_iv(), plaintext)
}

/// Encrypt a message with a caller-provided IV.
///
/// # Security
///
/// Reusing an IV under the same key leaks plaintext equality of leading
/// blocks. Production callers use [`encrypt`].
pub fn encrypt_with_iv(key: &SessionKey, iv: [u8; IV_SIZE], plaintext: &[u8]) -> Frame {
    let cipher = Aes256CbcEnc::new(key.as_bytes().into(), (&iv).into());
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    Frame { iv, ciphertext }
}

/// Decrypt wire bytes produced by [`encrypt`].
///
/// # Errors
///
/// - `FrameLength`: malformed frame length
/// - `Padding`: wrong key, corruption, or counter desync
pub fn decrypt(key: &SessionKey, bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
    let frame = Frame::parse(bytes)?;
    decrypt_frame(key, &frame)
}

/// Decrypt an already parsed frame.
///
/// A tampered frame is NOT reliably detected: it either fails padding removal
/// or decrypts to unrelated bytes.
pub fn decrypt_frame(key: &SessionKey, frame: &Frame) -> Result<Vec<u8>, CodecError> {
    if frame.ciphertext.is_empty() || frame.ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(CodecError::FrameLength { len: frame.wire_len() });
    }

    let cipher = Aes256CbcDec::new(key.as_bytes().into(), (&frame.iv).into());
    cipher.decrypt_padded_vec_mut::<Pkcs7>(&frame.ciphertext).map_err(|_| CodecError::Padding)
}

#[allow(clippy::expect_used)]
fn random_iv() -> [u8; IV_SIZE] {
    let mut iv = [0u8; IV_SIZE];
    getrandom::fill(&mut iv)
        .expect("invariant: OS RNG failure is unrecoverable - cannot encrypt securely");
    iv
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_schedule::{KEY_LEN, derive_key};

    const TEST_IV: [u8; IV_SIZE] =
        [0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f];

    fn test_key(byte: u8) -> SessionKey {
        SessionKey::from_bytes([byte; KEY_LEN])
    }

    fn k0() -> SessionKey {
        let bytes = derive_key(b"secret", b"salt0", KEY_LEN);
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&bytes);
        SessionKey::from_bytes(key)
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let key = test_key(0x42);
        let plaintext = b"Hello, World!";

        let frame = encrypt(&key, plaintext);
        let decrypted = decrypt(&key, &frame.to_bytes()).unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn hello_under_k0_is_one_block() {
        let key = k0();

        let frame = encrypt(&key, b"hello");
        let bytes = frame.to_bytes();

        assert_eq!(bytes.len(), 32);
        assert_eq!(decrypt(&key, &bytes).unwrap(), b"hello");
    }

    #[test]
    fn hello_under_k0_matches_known_ciphertext() {
        let frame = encrypt_with_iv(&k0(), TEST_IV, b"hello");

        assert_eq!(hex::encode(&frame.ciphertext), "305312086c8e714f87dc6348c87f9f4e");
        assert_eq!(&frame.to_bytes()[..IV_SIZE], &TEST_IV);
    }

    #[test]
    fn empty_plaintext_is_one_padding_block() {
        let key = k0();

        let frame = encrypt_with_iv(&key, TEST_IV, b"");

        assert_eq!(frame.ciphertext.len(), BLOCK_SIZE);
        assert_eq!(hex::encode(&frame.ciphertext), "dbfb1bdd5a3b7f1a15b500247a41dc2e");
        assert_eq!(decrypt_frame(&key, &frame).unwrap(), b"");
    }

    #[test]
    fn block_aligned_plaintext_gains_full_padding_block() {
        let key = test_key(0x01);

        let frame = encrypt(&key, &[0xAA; 32]);

        assert_eq!(frame.ciphertext.len(), 48);
    }

    #[test]
    fn fresh_iv_per_encryption() {
        let key = test_key(0x07);

        let frame1 = encrypt(&key, b"same message");
        let frame2 = encrypt(&key, b"same message");

        assert_ne!(frame1.iv, frame2.iv);
        assert_ne!(frame1.ciphertext, frame2.ciphertext);
    }

    #[test]
    fn wrong_key_does_not_recover_plaintext() {
        let frame = encrypt_with_iv(&test_key(0x01), TEST_IV, b"secret message");

        let result = decrypt_frame(&test_key(0x02), &frame);

        // Without a MAC a wrong key may occasionally pass padding removal
        assert_ne!(result, Ok(b"secret message".to_vec()));
    }

    #[test]
    fn short_frame_rejected() {
        let key = test_key(0x01);

        for len in [0, 1, 15, 16] {
            let result = decrypt(&key, &vec![0u8; len]);
            assert_eq!(result, Err(CodecError::FrameLength { len }), "len {len}");
        }
    }

    #[test]
    fn unaligned_ciphertext_rejected() {
        let key = test_key(0x01);
        let mut bytes = encrypt(&key, b"hello").to_bytes();
        bytes.push(0x00);

        assert_eq!(decrypt(&key, &bytes), Err(CodecError::FrameLength { len: 33 }));
    }

    #[test]
    fn parse_splits_iv_and_ciphertext() {
        let frame = encrypt_with_iv(&test_key(0x03), TEST_IV, b"abc");
        let parsed = Frame::parse(&frame.to_bytes()).unwrap();

        assert_eq!(parsed, frame);
        assert_eq!(parsed.wire_len(), 32);
    }
}
