//! Fuzz target for tampered ciphertext
//!
//! Encrypts an arbitrary message, applies an arbitrary modification to the
//! frame, then decrypts with the right key.
//!
//! # Invariants
//!
//! - An untouched frame MUST decrypt to the original plaintext
//! - A tampered frame MUST return `Ok` or a structured `CodecError`
//! - Changing the length to a non-block multiple MUST return `FrameLength`

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use relaychat_crypto::{BLOCK_SIZE, CodecError, IV_SIZE, SessionKey, decrypt, encrypt_with_iv};

#[derive(Debug, Clone, Arbitrary)]
struct TamperCase {
    key: [u8; 32],
    iv: [u8; IV_SIZE],
    plaintext: Vec<u8>,
    tamper: Tamper,
}

#[derive(Debug, Clone, Arbitrary)]
enum Tamper {
    None,
    FlipBit { byte: usize, bit: u8 },
    Truncate(usize),
    Append(Vec<u8>),
    SwapBlocks { a: usize, b: usize },
}

fuzz_target!(|case: TamperCase| {
    let key = SessionKey::from_bytes(case.key);
    let mut frame = encrypt_with_iv(&key, case.iv, &case.plaintext).to_bytes();

    match case.tamper {
        Tamper::None => {
            assert_eq!(decrypt(&key, &frame), Ok(case.plaintext));
            return;
        },
        Tamper::FlipBit { byte, bit } => {
            let index = byte % frame.len();
            frame[index] ^= 1 << (bit % 8);
        },
        Tamper::Truncate(len) => frame.truncate(len % (frame.len() + 1)),
        Tamper::Append(extra) => frame.extend_from_slice(&extra),
        Tamper::SwapBlocks { a, b } => {
            let blocks = frame.len() / BLOCK_SIZE;
            let (a, b) = (a % blocks, b % blocks);
            for i in 0..BLOCK_SIZE {
                frame.swap(a * BLOCK_SIZE + i, b * BLOCK_SIZE + i);
            }
        },
    }

    let result = decrypt(&key, &frame);
    let body = frame.len().saturating_sub(IV_SIZE);
    if frame.len() < IV_SIZE || body == 0 || body % BLOCK_SIZE != 0 {
        assert_eq!(result, Err(CodecError::FrameLength { len: frame.len() }));
    }
});
