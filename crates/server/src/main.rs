//! meshdoc server binary.
//!
//! Launches a document store node with its HTTP surface and replication
//! mesh.
//!
//! # Usage
//!
//! ```bash
//! # Standalone node
//! MESHDOC__AUTH_TOKENS=secret meshdoc --listen 0.0.0.0:7070 --data /var/lib/meshdoc
//!
//! # Two-node mesh
//! MESHDOC__AUTH_TOKENS=secret \
//! MESHDOC__OUTBOUND_TOKEN=secret \
//! MESHDOC__PEERS=http://node-b:7070 \
//! meshdoc --listen 0.0.0.0:7070
//!
//! # CLI arguments override environment variables and the config file
//! meshdoc --config /etc/meshdoc/config.toml --listen 127.0.0.1:7071
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use meshdoc_server::config::{Config, ConfigError};
use meshdoc_server::{bootstrap, shutdown};

/// Replicated JSON document store node.
#[derive(Debug, Parser)]
#[command(name = "meshdoc", version)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long)]
    config: Option<String>,
    /// Address to listen on (overrides config).
    #[arg(long)]
    listen: Option<SocketAddr>,
    /// Data directory (overrides config).
    #[arg(long)]
    data: Option<PathBuf>,
}

/// Top-level error type for the server binary, wrapping configuration,
/// bootstrap, and runtime failures.
#[derive(Debug)]
enum ServerError {
    Config(ConfigError),
    Bootstrap(bootstrap::BootstrapError),
    Server(std::io::Error),
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerError::Config(e) => write!(f, "config error: {}", e),
            ServerError::Bootstrap(e) => write!(f, "bootstrap error: {}", e),
            ServerError::Server(e) => write!(f, "server error: {}", e),
        }
    }
}

impl std::error::Error for ServerError {}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).map_err(ServerError::Config)?;
    if let Some(listen) = cli.listen {
        config.listen_addr = listen;
    }
    if let Some(data) = cli.data {
        config.data_dir = data;
    }

    init_logging(&config);

    tracing::info!(
        listen_addr = %config.listen_addr,
        data_dir = %config.data_dir.display(),
        peers = config.peers.len(),
        "Starting meshdoc"
    );

    if config.peers.is_empty() {
        tracing::warn!(
            "No peers configured; running standalone. Set MESHDOC__PEERS to join a mesh."
        );
    }

    let node = bootstrap::bootstrap_node(&config).await.map_err(ServerError::Bootstrap)?;

    let listener =
        tokio::net::TcpListener::bind(config.listen_addr).await.map_err(ServerError::Server)?;

    tracing::info!("Server ready, accepting connections");
    axum::serve(listener, node.router)
        .with_graceful_shutdown(shutdown::shutdown_signal())
        .await
        .map_err(ServerError::Server)?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Installs the global tracing subscriber.
///
/// The filter comes from `RUST_LOG` when set, defaulting to `info`.
/// Whether output is JSON or human-readable text is decided by
/// `LogFormat::is_json`, so piping a node into a log collector gets
/// structured lines without any flag.
fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if config.log_format.is_json() {
        registry.with(fmt::layer().json().flatten_event(true).with_current_span(false)).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}
