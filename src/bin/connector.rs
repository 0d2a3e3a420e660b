//! MPL Connector Binary
//!
//! Echo client: connects, sends numbered messages, and waits for each reply.

use std::time::Instant;

use clap::Parser;
use mpl::{Config, Connector, Message, MessageType};
use tracing_subscriber::{fmt, EnvFilter};

/// MPL echo connector
#[derive(Parser, Debug)]
#[command(name = "mpl-connector")]
#[command(about = "Echo client for the MPL message-passing library")]
#[command(version)]
struct Args {
    /// Server address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Number of sequential client sessions to run
    #[arg(short, long, default_value = "1")]
    clients: usize,

    /// Messages sent per session
    #[arg(short, long, default_value = "100")]
    messages: usize,

    /// Connection attempts per session
    #[arg(short, long, default_value = "10")]
    retries: u32,

    /// Seconds to wait between connection attempts
    #[arg(short, long, default_value = "1")]
    wait: u64,

    /// Log every connection attempt
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,mpl=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();
    let config = Config::builder()
        .connect_retries(args.retries)
        .retry_wait_secs(args.wait)
        .build();

    let started = Instant::now();
    let mut connector = Connector::with_config(&config);
    let verbosity = u32::from(args.verbose);

    for client in 1..=args.clients {
        let name = format!("test client {}", client);
        let attempts = connector.connect_with_retry(
            args.server.as_str(),
            config.connect_retries,
            config.retry_wait_secs,
            verbosity,
        );

        if !connector.is_connected() {
            tracing::error!("{}: could not connect after {} attempt(s)", name, attempts);
            std::process::exit(1);
        }

        for i in 1..=args.messages {
            let message = Message::text(format!("[ Message #: {} ]", i), MessageType::Default);
            tracing::info!("{}: sending {}", name, message);

            if let Err(e) = connector.post_message(message) {
                tracing::error!("{}: post failed: {}", name, e);
                break;
            }
            match connector.get_message() {
                Ok(reply) if reply.is_disconnect() => {
                    tracing::warn!("{}: server disconnected", name);
                    break;
                }
                Ok(reply) => tracing::info!("Echo reply from {}: {}", args.server, reply),
                Err(e) => {
                    tracing::error!("{}: receive failed: {}", name, e);
                    break;
                }
            }
        }

        connector.close();
    }

    tracing::info!("Elapsed: {:?}", started.elapsed());
}
