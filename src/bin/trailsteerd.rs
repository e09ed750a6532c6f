//! trailsteerd - vision-guided heading daemon.
//!
//! 1. Connects to the relay as a WebSocket peer
//! 2. Demultiplexes control messages from frame payloads
//! 3. Runs each frame through the segmentation oracle
//! 4. Streams the derived heading back over the same socket
//! 5. Appends CSV telemetry and throttled snapshots while record mode is on
//!
//! The process lives for exactly one connection: when the relay closes or
//! the socket breaks, the daemon logs the reason and exits cleanly so a
//! supervisor can restart it.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tungstenite::{Error as WsError, Message};

use trailsteer::{InboundMessage, PilotConfig, Session};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Segment relayed video frames and steer back a heading"
)]
struct Args {
    /// Path to a JSON config file (overrides TRAILSTEER_CONFIG).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Relay WebSocket URL, e.g. ws://192.168.0.74:9000.
    #[arg(long, env = "TRAILSTEER_RELAY_URL")]
    relay: Option<String>,

    /// Segmentation model path (stub:// or an .onnx file).
    #[arg(long, env = "TRAILSTEER_MODEL")]
    model: Option<String>,

    /// Directory that selectedModel switches resolve against.
    #[arg(long, env = "TRAILSTEER_MODEL_DIR")]
    model_dir: Option<String>,

    /// Start with record mode enabled.
    #[arg(long)]
    record: bool,
}

fn apply_overrides(config: &mut PilotConfig, args: &Args) {
    if let Some(relay) = &args.relay {
        config.relay_url = relay.clone();
    }
    if let Some(model) = &args.model {
        config.model_path = model.clone();
    }
    if let Some(model_dir) = &args.model_dir {
        config.model_dir = model_dir.clone();
    }
    if args.record {
        config.record_mode = true;
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = PilotConfig::load(args.config.as_deref())?;
    apply_overrides(&mut config, &args);

    log::info!("trailsteerd v{} starting", env!("CARGO_PKG_VERSION"));
    log::info!(
        "model: {} (confidence {:.2}, record mode {})",
        config.model_path,
        config.confidence,
        if config.record_mode { "on" } else { "off" }
    );

    let mut session = Session::from_config(&config)?;

    let (mut socket, _response) = tungstenite::connect(config.relay_url.as_str())
        .with_context(|| format!("failed to connect to relay {}", config.relay_url))?;
    log::info!("connected to relay {}", config.relay_url);

    loop {
        let message = match socket.read() {
            Ok(message) => message,
            Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => {
                log::info!("relay closed the connection");
                break;
            }
            Err(e) => {
                log::error!("receive failed: {}", e);
                break;
            }
        };

        let inbound = match message {
            Message::Text(text) => InboundMessage::Text(text),
            Message::Binary(bytes) => InboundMessage::Binary(bytes),
            Message::Close(_) => {
                log::info!("relay closed the connection");
                break;
            }
            // Ping/Pong are handled by the library inside read().
            _ => continue,
        };

        if let Some(reply) = session.handle_message(&inbound) {
            if let Err(e) = socket.send(Message::Text(reply.to_json())) {
                log::warn!("failed to send heading: {}", e);
            }
        }
    }

    let _ = socket.close(None);
    log::info!("trailsteerd shutting down");
    Ok(())
}
