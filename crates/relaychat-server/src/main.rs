//! Relaychat relay binary.
//!
//! # Usage
//!
//! ```bash
//! # Raw framing on the default port
//! relaychat-server
//!
//! # Length-prefixed framing with status announcements
//! relaychat-server --bind 0.0.0.0:65432 --wire length-prefixed --announce
//! ```

use clap::Parser;
use relaychat_proto::{DEFAULT_BUFFER_SIZE, DEFAULT_PORT, WireFormat};
use relaychat_server::{RelayConfig, Server};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Relaychat relay server
#[derive(Parser, Debug)]
#[command(name = "relaychat-server")]
#[command(about = "Forwards encrypted chat frames between connected clients")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value_t = format!("0.0.0.0:{DEFAULT_PORT}"))]
    bind: String,

    /// Largest chunk read from a client at once (raw framing)
    #[arg(long, default_value_t = DEFAULT_BUFFER_SIZE)]
    buffer_size: usize,

    /// Message framing; clients must use the same
    #[arg(long, value_enum, default_value_t = WireFormat::Raw)]
    wire: WireFormat,

    /// Send [SYS]WAITING / [SYS]CONNECTED status messages
    #[arg(long)]
    announce: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Relaychat relay starting");
    tracing::info!("Binding to {}", args.bind);

    if args.wire == WireFormat::Raw {
        tracing::warn!("Raw framing assumes one write per read; messages may split or merge");
    }

    let config = RelayConfig {
        bind_address: args.bind,
        buffer_size: args.buffer_size,
        wire_format: args.wire,
        announce_status: args.announce,
    };

    let server = Server::bind(config).await?;

    tracing::info!("Server listening on {}", server.local_addr()?);

    server.run().await?;

    Ok(())
}
