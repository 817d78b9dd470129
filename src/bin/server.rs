//! RUStore Server Binary
//!
//! Starts the TCP server for RUStore.

use clap::Parser;
use rustore::{Config, Server};
use tracing_subscriber::{fmt, EnvFilter};

/// RUStore Server
#[derive(Parser, Debug)]
#[command(name = "rustore-server")]
#[command(about = "Networked in-memory object store")]
#[command(version)]
struct Args {
    /// TCP port to listen on
    port: u16,
}

fn main() {
    // Invalid arguments print usage and exit before anything is bound
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,rustore=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    tracing::info!("RUStore Server v{}", rustore::VERSION);

    let config = Config::for_port(args.port);

    let server = match Server::bind(config) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to bind port {}: {}", args.port, e);
            std::process::exit(1);
        }
    };

    tracing::info!("RUStore server started on port {}", server.local_addr().port());

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
