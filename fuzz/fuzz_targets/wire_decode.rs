//! Fuzz target for length-prefixed stream decoding
//!
//! Feeds arbitrary bytes, delivered in arbitrary chunk sizes, to a
//! `WireReader`. Decoding must end in `Ok(None)` or a structured `WireError`
//! and never return a message larger than `MAX_MESSAGE_SIZE`.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use relaychat_proto::{MAX_MESSAGE_SIZE, WireFormat, WireReader};
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone, Arbitrary)]
struct Input {
    format: Format,
    chunk_size: u8,
    stream: Vec<u8>,
}

#[derive(Debug, Clone, Copy, Arbitrary)]
enum Format {
    Raw,
    LengthPrefixed,
}

fuzz_target!(|input: Input| {
    let format = match input.format {
        Format::Raw => WireFormat::Raw,
        Format::LengthPrefixed => WireFormat::LengthPrefixed,
    };
    let chunk_size = usize::from(input.chunk_size).max(1);

    let Ok(runtime) = tokio::runtime::Builder::new_current_thread().build() else {
        return;
    };

    runtime.block_on(async move {
        let (mut tx, rx) = tokio::io::duplex(256);
        let stream = input.stream;
        let total = stream.len();

        let writer = tokio::spawn(async move {
            for chunk in stream.chunks(chunk_size) {
                if tx.write_all(chunk).await.is_err() {
                    break;
                }
            }
        });

        let mut reader = WireReader::new(rx, format, 4096);
        let mut consumed = 0;
        loop {
            match reader.read_message().await {
                Ok(Some(message)) => {
                    assert!(message.len() <= MAX_MESSAGE_SIZE);
                    consumed += message.len();
                    assert!(consumed <= total);
                },
                Ok(None) | Err(_) => break,
            }
        }

        drop(reader);
        let _ = writer.await;
    });
});
