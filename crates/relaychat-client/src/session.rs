//! Client session over a relay connection.
//!
//! A [`ClientSession`] owns one TCP connection, one [`KeySchedule`] and a
//! background receive task. Sending and receiving both advance the same
//! schedule, so it lives behind a `std::sync::Mutex` shared by the two paths.
//! Key derivation is CPU-bound (PBKDF2), so every schedule step runs on the
//! blocking pool and the lock is never held across an `.await`.
//!
//! The schedule counts every processed message. Both peers only agree on the
//! key while their counts stay in lockstep; concurrent sends from both sides
//! across a rotation boundary, or a third active peer, desynchronize them and
//! surface as a decryption failure.

use std::sync::{Arc, Mutex};

use relaychat_crypto::{Frame, KdfParams, KeySchedule, KeyStep, decrypt_frame, encrypt};
use relaychat_proto::{
    ControlSignal, DEFAULT_BUFFER_SIZE, WireFormat, WireReader, write_message,
};
use tokio::{
    io::AsyncWriteExt,
    net::{
        TcpStream, ToSocketAddrs,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::{Mutex as AsyncMutex, mpsc},
    task::AbortHandle,
};

use crate::{ClientError, SessionEvent};

/// Default capacity of the session event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Session configuration. Must match the relay and the other peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Key schedule parameters
    pub kdf: KdfParams,
    /// Message framing on the relay connection
    pub wire_format: WireFormat,
    /// Largest chunk a single raw-mode read returns
    pub buffer_size: usize,
    /// Events buffered before the receive loop waits for the consumer
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            kdf: KdfParams::default(),
            wire_format: WireFormat::default(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

/// Snapshot of a session's key schedule position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyState {
    /// Messages processed so far (sent + received)
    pub message_count: u64,
    /// Current salt epoch
    pub salt_index: u64,
}

type SharedSchedule = Arc<Mutex<KeySchedule>>;

type SharedWriter = Arc<AsyncMutex<OwnedWriteHalf>>;

/// An encrypted chat session through a relay.
pub struct ClientSession {
    /// Serializes the whole send path: key step, encryption and write
    writer: SharedWriter,
    schedule: SharedSchedule,
    events: mpsc::Sender<SessionEvent>,
    wire_format: WireFormat,
    receive_task: AbortHandle,
}

impl ClientSession {
    /// Connect to a relay and start the receive loop.
    ///
    /// Returns the session and the receiving end of its event stream.
    pub async fn connect(
        addr: impl ToSocketAddrs,
        passphrase: impl Into<Vec<u8>>,
        config: SessionConfig,
    ) -> Result<(Self, mpsc::Receiver<SessionEvent>), ClientError> {
        let stream = TcpStream::connect(addr).await?;
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!("failed to set TCP_NODELAY: {}", e);
        }

        Self::from_stream(stream, passphrase, config).await
    }

    /// Start a session on an already connected stream.
    ///
    /// Derives the `salt0` key before returning.
    pub async fn from_stream(
        stream: TcpStream,
        passphrase: impl Into<Vec<u8>>,
        config: SessionConfig,
    ) -> Result<(Self, mpsc::Receiver<SessionEvent>), ClientError> {
        let passphrase = passphrase.into();
        let kdf = config.kdf;
        let schedule = tokio::task::spawn_blocking(move || KeySchedule::with_params(passphrase, kdf))
            .await
            .map_err(|e| ClientError::Internal(format!("key derivation task failed: {e}")))??;
        let schedule = Arc::new(Mutex::new(schedule));

        let (events_tx, events_rx) = mpsc::channel(config.event_capacity.max(1));
        let (reader, writer) = stream.into_split();
        let reader = WireReader::new(reader, config.wire_format, config.buffer_size);

        let task =
            tokio::spawn(receive_loop(reader, Arc::clone(&schedule), events_tx.clone()));

        tracing::debug!(wire = ?config.wire_format, "session started");

        let session = Self {
            writer: Arc::new(AsyncMutex::new(writer)),
            schedule,
            events: events_tx,
            wire_format: config.wire_format,
            receive_task: task.abort_handle(),
        };

        Ok((session, events_rx))
    }

    /// Encrypt and send one message.
    ///
    /// Advances the key schedule, encrypts under the resulting key and writes
    /// the frame. Concurrent callers are serialized so key steps happen in
    /// wire order. Returns the frame that was sent.
    ///
    /// # Cancel safety
    ///
    /// The key step, encryption and write run on a spawned task. Dropping
    /// the returned future does not abandon a half-done send: once the call
    /// has been polled, the frame is still written and the schedule stays
    /// in step with what went on the wire.
    ///
    /// # Errors
    ///
    /// - `Io` / `Wire` if the write fails; the key schedule has already
    ///   advanced
    /// - `Internal` if the key schedule is unavailable
    pub async fn send(&self, plaintext: &[u8]) -> Result<Frame, ClientError> {
        let task = tokio::spawn(send_frame(
            Arc::clone(&self.writer),
            Arc::clone(&self.schedule),
            self.events.clone(),
            self.wire_format,
            plaintext.to_vec(),
        ));

        task.await.map_err(|e| ClientError::Internal(format!("send task failed: {e}")))?
    }

    /// Current position of the key schedule.
    ///
    /// Waits for any key derivation in progress, which takes a full PBKDF2
    /// run at a rotation. The wait happens on the blocking pool.
    pub async fn key_state(&self) -> Result<KeyState, ClientError> {
        let schedule = Arc::clone(&self.schedule);
        tokio::task::spawn_blocking(move || -> Result<KeyState, ClientError> {
            let schedule = schedule.lock().map_err(|_| poisoned())?;
            Ok(KeyState {
                message_count: schedule.message_count(),
                salt_index: schedule.salt_index(),
            })
        })
        .await
        .map_err(|e| ClientError::Internal(format!("key state task failed: {e}")))?
    }

    /// Stop the receive loop and close the write half of the connection.
    ///
    /// No further events are delivered, not even [`SessionEvent::Closed`].
    pub async fn shutdown(&self) -> Result<(), ClientError> {
        self.receive_task.abort();
        self.writer.lock().await.shutdown().await?;
        Ok(())
    }
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        self.receive_task.abort();
    }
}

fn poisoned() -> ClientError {
    ClientError::Internal("key schedule lock poisoned".to_string())
}

async fn send_frame(
    writer: SharedWriter,
    schedule: SharedSchedule,
    events: mpsc::Sender<SessionEvent>,
    wire_format: WireFormat,
    plaintext: Vec<u8>,
) -> Result<Frame, ClientError> {
    let mut writer = writer.lock().await;

    let step = advance(&schedule).await?;
    if step.rotated {
        tracing::info!(salt_index = step.salt_index, "key rotated");
        let rotated = SessionEvent::KeyRotated { salt_index: step.salt_index };
        if let Err(e) = events.try_send(rotated) {
            tracing::debug!("rotation notice not delivered: {}", e);
        }
    }

    let frame = encrypt(&step.key, &plaintext);
    write_message(&mut *writer, wire_format, &frame.to_bytes()).await?;

    tracing::debug!(
        message_count = step.message_count,
        salt_index = step.salt_index,
        bytes = frame.wire_len(),
        "message sent"
    );

    Ok(frame)
}

/// Advance the schedule on the blocking pool.
async fn advance(schedule: &SharedSchedule) -> Result<KeyStep, ClientError> {
    let schedule = Arc::clone(schedule);
    tokio::task::spawn_blocking(move || -> Result<KeyStep, ClientError> {
        let mut schedule = schedule.lock().map_err(|_| poisoned())?;
        Ok(schedule.next_key())
    })
    .await
    .map_err(|e| ClientError::Internal(format!("key schedule task failed: {e}")))?
}

async fn receive_loop(
    mut reader: WireReader<OwnedReadHalf>,
    schedule: SharedSchedule,
    events: mpsc::Sender<SessionEvent>,
) {
    if let Err(e) = receive_messages(&mut reader, &schedule, &events).await {
        tracing::warn!("receive loop stopped: {}", e);
        let _ = events.send(SessionEvent::Error(e)).await;
    }

    let _ = events.send(SessionEvent::Closed).await;
}

/// Read, decrypt and deliver messages until the connection ends.
///
/// Returns `Ok(())` only when the event consumer has gone away.
async fn receive_messages(
    reader: &mut WireReader<OwnedReadHalf>,
    schedule: &SharedSchedule,
    events: &mpsc::Sender<SessionEvent>,
) -> Result<(), ClientError> {
    loop {
        let Some(message) = reader.read_message().await? else {
            return Err(ClientError::ConnectionClosed);
        };

        if let Some(signal) = ControlSignal::parse(&message) {
            tracing::debug!(%signal, "relay status");
            if events.send(SessionEvent::Status(signal)).await.is_err() {
                return Ok(());
            }
            continue;
        }

        let step = advance(schedule).await?;
        if step.rotated {
            tracing::info!(salt_index = step.salt_index, "key rotated");
            let rotated = SessionEvent::KeyRotated { salt_index: step.salt_index };
            if events.send(rotated).await.is_err() {
                return Ok(());
            }
        }

        let frame = Frame::parse(&message)?;
        let plaintext = decrypt_frame(&step.key, &frame)?;

        tracing::debug!(
            message_count = step.message_count,
            salt_index = step.salt_index,
            bytes = plaintext.len(),
            "message received"
        );

        if events.send(SessionEvent::Message { plaintext, frame }).await.is_err() {
            return Ok(());
        }
    }
}
