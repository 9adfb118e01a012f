//! Relaychat line client.
//!
//! Reads one message per stdin line, sends it through the relay and prints
//! every session event, including the hex ciphertext of each frame.
//!
//! # Usage
//!
//! ```bash
//! RELAYCHAT_PASSPHRASE=secret relaychat --server 192.168.1.10
//!
//! # Against a relay started with --wire length-prefixed
//! relaychat --server 127.0.0.1 --passphrase secret --wire length-prefixed
//! ```

use clap::Parser;
use relaychat_client::{ClientSession, KdfParams, SessionConfig, SessionEvent, WireFormat};
use relaychat_proto::DEFAULT_PORT;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout},
    sync::mpsc,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Relaychat client
#[derive(Parser, Debug)]
#[command(name = "relaychat")]
#[command(about = "Encrypted chat through a relaychat relay")]
#[command(version)]
struct Args {
    /// Relay host name or IP address
    #[arg(short, long)]
    server: String,

    /// Relay port
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Shared passphrase, agreed out of band
    #[arg(long, env = "RELAYCHAT_PASSPHRASE", hide_env_values = true)]
    passphrase: String,

    /// Message framing; must match the relay
    #[arg(long, value_enum, default_value_t = WireFormat::Raw)]
    wire: WireFormat,

    /// Messages per key epoch; must match the other peer
    #[arg(long, default_value_t = relaychat_crypto::DEFAULT_ROTATE_EVERY)]
    rotate_every: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = SessionConfig {
        kdf: KdfParams { rotate_every: args.rotate_every, ..KdfParams::default() },
        wire_format: args.wire,
        ..SessionConfig::default()
    };

    let addr = format!("{}:{}", args.server, args.port);
    tracing::info!("Connecting to {}", addr);

    let (session, events) = ClientSession::connect(addr.as_str(), args.passphrase, config).await?;
    let printer = tokio::spawn(print_events(events));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.is_empty() {
            continue;
        }
        if printer.is_finished() {
            break;
        }

        match session.send(line.as_bytes()).await {
            Ok(frame) => {
                let text = format!(
                    "\nSent Cipher:\n{}\nPlaintext: {}\n",
                    hex::encode(frame.to_bytes()),
                    line
                );
                write_out(&mut stdout, &text).await?;
            },
            Err(e) => {
                write_out(&mut stdout, &format!("Error: {e}\n")).await?;
                if e.is_fatal() {
                    break;
                }
            },
        }
    }

    session.shutdown().await?;
    printer.abort();

    Ok(())
}

async fn print_events(mut events: mpsc::Receiver<SessionEvent>) -> std::io::Result<()> {
    let mut stdout = tokio::io::stdout();

    while let Some(event) = events.recv().await {
        let text = match event {
            SessionEvent::Message { plaintext, frame } => format!(
                "\nReceived Cipher:\n{}\nDecrypted: {}\n",
                hex::encode(frame.to_bytes()),
                String::from_utf8_lossy(&plaintext)
            ),
            SessionEvent::Status(signal) => format!("[relay] {signal}\n"),
            SessionEvent::KeyRotated { salt_index } => format!("Key rotated (salt{salt_index})\n"),
            SessionEvent::Error(e) => format!("Error: {e}\n"),
            SessionEvent::Closed => {
                write_out(&mut stdout, "Connection closed\n").await?;
                break;
            },
        };

        write_out(&mut stdout, &text).await?;
    }

    Ok(())
}

async fn write_out(stdout: &mut Stdout, text: &str) -> std::io::Result<()> {
    stdout.write_all(text.as_bytes()).await?;
    stdout.flush().await
}
