//! MPL Responder Binary
//!
//! Runs an echo server built on the MPL responder.

use clap::Parser;
use mpl::{Config, Responder};
use tracing_subscriber::{fmt, EnvFilter};

/// MPL echo responder
#[derive(Parser, Debug)]
#[command(name = "mpl-responder")]
#[command(about = "Echo server for the MPL message-passing library")]
#[command(version)]
struct Args {
    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    listen: String,

    /// Clients to serve before exiting (-1 serves forever)
    #[arg(short = 'n', long, default_value = "-1", allow_hyphen_values = true)]
    max_clients: i64,

    /// Listen backlog
    #[arg(short, long, default_value = "20")]
    backlog: i32,

    /// Serve clients with synchronous send/receive instead of worker queues
    #[arg(long)]
    no_queues: bool,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,mpl=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("MPL Responder v{}", mpl::VERSION);

    let max_clients = match mpl::config::max_clients_from_count(args.max_clients) {
        Ok(limit) => limit,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(2);
        }
    };

    let config = Config::builder()
        .listen_addr(&args.listen)
        .backlog(args.backlog)
        .max_clients(max_clients)
        .use_queues(!args.no_queues)
        .build();

    let mut responder = match Responder::with_config(&config) {
        Ok(r) => r,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", config.listen_addr, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = responder.start(config.backlog) {
        tracing::error!("Failed to start responder: {}", e);
        std::process::exit(1);
    }

    // Returns once the client limit is reached and every client is done
    responder.wait();

    tracing::info!("Served {} client(s), exiting", responder.clients_served());
}
