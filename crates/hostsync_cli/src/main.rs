//! hostsync server daemon
//!
//! Serves the hostsync line-delimited JSON protocol over TCP.
//!
//! # Options
//!
//! - `--bind` - Address to listen on
//! - `--database` - SQLite file to persist to (in-memory when omitted)
//! - `--threshold` - Default inline delivery limit in bytes
//! - `--verbose` - Debug logging

use clap::Parser;
use hostsync_server::{net, GroupServer, RequestHandler, ServerConfig};
use hostsync_store::{MemoryStore, SqliteStore, Store};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Group synchronization server for small multiplayer applications.
#[derive(Parser)]
#[command(name = "hostsyncd")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Address to listen on
    #[arg(short, long, default_value = "127.0.0.1:8420")]
    bind: SocketAddr,

    /// SQLite database file; state is kept in memory when omitted
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Default inline delivery limit in bytes
    #[arg(short, long)]
    threshold: Option<usize>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn config(&self) -> ServerConfig {
        let config = ServerConfig::new(self.bind);
        match self.threshold {
            Some(bytes) => config.with_default_threshold(bytes),
            None => config,
        }
    }
}

async fn run<S: Store + 'static>(store: S, config: ServerConfig) -> std::io::Result<()> {
    let listener = TcpListener::bind(config.bind_addr).await?;
    let server = GroupServer::new(Arc::new(store), config);
    net::serve(listener, RequestHandler::new(Arc::new(server))).await
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = cli.config();
    match &cli.database {
        Some(path) => {
            info!(path = %path.display(), "opening SQLite store");
            run(SqliteStore::open(path)?, config).await?;
        }
        None => {
            info!("using in-memory store");
            run(MemoryStore::new(), config).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = Cli::parse_from(["hostsyncd"]);
        assert_eq!(cli.bind.port(), 8420);
        assert!(cli.database.is_none());
        assert_eq!(cli.config().default_threshold, 64 * 1024);
    }

    #[test]
    fn threshold_flag() {
        let cli = Cli::parse_from(["hostsyncd", "--threshold", "512", "--database", "x.db"]);
        assert_eq!(cli.config().default_threshold, 512);
        assert_eq!(cli.database, Some(PathBuf::from("x.db")));
    }
}
