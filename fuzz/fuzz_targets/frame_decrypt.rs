//! Fuzz target for frame parsing and decryption
//!
//! Arbitrary bytes arrive from the relay and go straight into the codec.
//! Every input must produce `Ok` or a structured `CodecError`, never a panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use relaychat_crypto::{CodecError, Frame, SessionKey, decrypt};

fuzz_target!(|data: &[u8]| {
    let key = SessionKey::from_bytes([0x42; 32]);

    match Frame::parse(data) {
        Ok(frame) => {
            assert_eq!(frame.wire_len(), data.len());
            assert_eq!(frame.to_bytes(), data);
        },
        Err(CodecError::FrameLength { len }) => assert_eq!(len, data.len()),
        Err(other) => panic!("parse returned unexpected error: {other:?}"),
    }

    let _ = decrypt(&key, data);
});
