//! Message framing on a byte stream.
//!
//! [`WireReader`] pulls whole messages off an [`AsyncRead`]; [`write_message`]
//! and [`encode_message`] produce the matching bytes. Both sides of a
//! connection must use the same [`WireFormat`].

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{LENGTH_PREFIX_SIZE, MAX_MESSAGE_SIZE, error::WireError};

/// How messages are delimited on the TCP stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum WireFormat {
    /// No delimiting: each read is taken to be exactly one message.
    ///
    /// Matches unframed peers byte for byte, but TCP may merge or split
    /// writes, which surfaces as decryption failures.
    #[default]
    Raw,
    /// Each message is preceded by its length as a big-endian `u32`.
    LengthPrefixed,
}

/// Encode one message for the wire.
///
/// # Errors
///
/// - `TooLarge` if a length-prefixed message exceeds [`MAX_MESSAGE_SIZE`]
pub fn encode_message(format: WireFormat, payload: &[u8]) -> Result<Bytes, WireError> {
    match format {
        WireFormat::Raw => Ok(Bytes::copy_from_slice(payload)),
        WireFormat::LengthPrefixed => {
            if payload.len() > MAX_MESSAGE_SIZE {
                return Err(WireError::TooLarge { size: payload.len(), max: MAX_MESSAGE_SIZE });
            }

            let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
            buf.put_u32(payload.len() as u32);
            buf.put_slice(payload);
            Ok(buf.freeze())
        },
    }
}

/// Encode and write one message.
pub async fn write_message<W>(
    writer: &mut W,
    format: WireFormat,
    payload: &[u8],
) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
{
    let encoded = encode_message(format, payload)?;
    writer.write_all(&encoded).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads whole messages from a byte stream.
#[derive(Debug)]
pub struct WireReader<R> {
    inner: R,
    format: WireFormat,
    /// Maximum bytes returned by one raw-mode read
    buffer_size: usize,
    buf: BytesMut,
}

impl<R: AsyncRead + Unpin> WireReader<R> {
    /// Wrap a stream.
    ///
    /// `buffer_size` bounds each raw-mode read; it is ignored in
    /// length-prefixed mode, which is bounded by [`MAX_MESSAGE_SIZE`].
    pub fn new(inner: R, format: WireFormat, buffer_size: usize) -> Self {
        Self { inner, format, buffer_size: buffer_size.max(1), buf: BytesMut::new() }
    }

    /// Read the next message.
    ///
    /// Returns `Ok(None)` when the peer closed the stream cleanly between
    /// messages. Blocks until a message arrives; there is no timeout.
    ///
    /// # Errors
    ///
    /// - `Io` on transport failure
    /// - `TooLarge` if a length prefix exceeds [`MAX_MESSAGE_SIZE`]
    /// - `Truncated` if the stream ends inside a length-prefixed message
    pub async fn read_message(&mut self) -> Result<Option<Bytes>, WireError> {
        match self.format {
            WireFormat::Raw => self.read_chunk().await,
            WireFormat::LengthPrefixed => self.read_prefixed().await,
        }
    }

    async fn read_chunk(&mut self) -> Result<Option<Bytes>, WireError> {
        self.buf.clear();
        self.buf.resize(self.buffer_size, 0);

        let n = self.inner.read(&mut self.buf[..]).await?;
        if n == 0 {
            return Ok(None);
        }

        self.buf.truncate(n);
        Ok(Some(self.buf.split().freeze()))
    }

    async fn read_prefixed(&mut self) -> Result<Option<Bytes>, WireError> {
        let mut header = [0u8; LENGTH_PREFIX_SIZE];
        let mut filled = 0;

        while filled < LENGTH_PREFIX_SIZE {
            let n = self.inner.read(&mut header[filled..]).await?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(WireError::Truncated { expected: LENGTH_PREFIX_SIZE, received: filled });
            }
            filled += n;
        }

        let size = u32::from_be_bytes(header) as usize;
        if size > MAX_MESSAGE_SIZE {
            return Err(WireError::TooLarge { size, max: MAX_MESSAGE_SIZE });
        }

        self.buf.clear();
        self.buf.resize(size, 0);

        let mut received = 0;
        while received < size {
            let n = self.inner.read(&mut self.buf[received..]).await?;
            if n == 0 {
                return Err(WireError::Truncated { expected: size, received });
            }
            received += n;
        }

        Ok(Some(self.buf.split().freeze()))
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::duplex;

    use super::*;

    #[tokio::test]
    async fn raw_read_returns_chunk() {
        let (mut tx, rx) = duplex(64);
        let mut reader = WireReader::new(rx, WireFormat::Raw, 4096);

        tx.write_all(b"opaque bytes").await.unwrap();

        let message = reader.read_message().await.unwrap().unwrap();
        assert_eq!(&message[..], b"opaque bytes");
    }

    #[tokio::test]
    async fn raw_read_bounded_by_buffer_size() {
        let (mut tx, rx) = duplex(64);
        let mut reader = WireReader::new(rx, WireFormat::Raw, 4);

        tx.write_all(b"abcdefgh").await.unwrap();

        let first = reader.read_message().await.unwrap().unwrap();
        let second = reader.read_message().await.unwrap().unwrap();
        assert_eq!(&first[..], b"abcd");
        assert_eq!(&second[..], b"efgh");
    }

    #[tokio::test]
    async fn raw_eof_is_none() {
        let (tx, rx) = duplex(64);
        let mut reader = WireReader::new(rx, WireFormat::Raw, 4096);

        drop(tx);

        assert!(reader.read_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn prefixed_roundtrip_through_stream() {
        let (mut tx, rx) = duplex(1024);
        let mut reader = WireReader::new(rx, WireFormat::LengthPrefixed, 4096);

        write_message(&mut tx, WireFormat::LengthPrefixed, b"first").await.unwrap();
        write_message(&mut tx, WireFormat::LengthPrefixed, b"").await.unwrap();
        write_message(&mut tx, WireFormat::LengthPrefixed, b"third").await.unwrap();
        drop(tx);

        assert_eq!(&reader.read_message().await.unwrap().unwrap()[..], b"first");
        assert_eq!(&reader.read_message().await.unwrap().unwrap()[..], b"");
        assert_eq!(&reader.read_message().await.unwrap().unwrap()[..], b"third");
        assert!(reader.read_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn prefixed_reassembles_split_writes() {
        let (mut tx, rx) = duplex(1024);
        let mut reader = WireReader::new(rx, WireFormat::LengthPrefixed, 4096);

        let encoded = encode_message(WireFormat::LengthPrefixed, b"split across writes").unwrap();
        let writer = tokio::spawn(async move {
            for byte in encoded.iter() {
                tx.write_all(&[*byte]).await.unwrap();
                tokio::task::yield_now().await;
            }
        });

        let message = reader.read_message().await.unwrap().unwrap();
        assert_eq!(&message[..], b"split across writes");
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn prefixed_separates_merged_writes() {
        let (mut tx, rx) = duplex(1024);
        let mut reader = WireReader::new(rx, WireFormat::LengthPrefixed, 4096);

        let mut merged = encode_message(WireFormat::LengthPrefixed, b"one").unwrap().to_vec();
        merged.extend_from_slice(&encode_message(WireFormat::LengthPrefixed, b"two").unwrap());
        tx.write_all(&merged).await.unwrap();

        assert_eq!(&reader.read_message().await.unwrap().unwrap()[..], b"one");
        assert_eq!(&reader.read_message().await.unwrap().unwrap()[..], b"two");
    }

    #[tokio::test]
    async fn prefixed_truncated_header() {
        let (mut tx, rx) = duplex(64);
        let mut reader = WireReader::new(rx, WireFormat::LengthPrefixed, 4096);

        tx.write_all(&[0x00, 0x00]).await.unwrap();
        drop(tx);

        let result = reader.read_message().await;
        assert!(matches!(result, Err(WireError::Truncated { expected: 4, received: 2 })));
    }

    #[tokio::test]
    async fn prefixed_truncated_payload() {
        let (mut tx, rx) = duplex(64);
        let mut reader = WireReader::new(rx, WireFormat::LengthPrefixed, 4096);

        tx.write_all(&[0x00, 0x00, 0x00, 0x08, b'a', b'b']).await.unwrap();
        drop(tx);

        let result = reader.read_message().await;
        assert!(matches!(result, Err(WireError::Truncated { expected: 8, received: 2 })));
    }

    #[tokio::test]
    async fn prefixed_rejects_oversized_length() {
        let (mut tx, rx) = duplex(64);
        let mut reader = WireReader::new(rx, WireFormat::LengthPrefixed, 4096);

        tx.write_all(&u32::MAX.to_be_bytes()).await.unwrap();

        let result = reader.read_message().await;
        assert!(matches!(result, Err(WireError::TooLarge { .. })));
    }

    #[test]
    fn encode_raw_is_identity() {
        let encoded = encode_message(WireFormat::Raw, b"\x00\x01\x02").unwrap();
        assert_eq!(&encoded[..], b"\x00\x01\x02");
    }

    #[test]
    fn encode_prefixed_layout() {
        let encoded = encode_message(WireFormat::LengthPrefixed, b"hey").unwrap();
        assert_eq!(&encoded[..], &[0x00, 0x00, 0x00, 0x03, b'h', b'e', b'y']);
    }

    #[test]
    fn encode_prefixed_rejects_oversized() {
        let payload = vec![0u8; MAX_MESSAGE_SIZE + 1];
        let result = encode_message(WireFormat::LengthPrefixed, &payload);
        assert!(matches!(result, Err(WireError::TooLarge { .. })));
    }
}
