//! Node bootstrap and initialization.
//!
//! Opens the document store under the data directory, wires the engine
//! and the replication client together, and assembles the router. The
//! binary and the integration test harness both start nodes through
//! [`bootstrap_node`].

use std::collections::HashSet;
use std::sync::Arc;

use axum::Router;

use meshdoc_engine::{DocEngine, KvStore};

use crate::config::Config;
use crate::http::{self, AppState};
use crate::replication::Replicator;

/// Error type for bootstrap operations.
#[derive(Debug)]
pub enum BootstrapError {
    /// Configuration rejected by validation.
    Config(String),
    /// Failed to create the data directory.
    DataDir(String),
    /// Failed to open the document store.
    Database(String),
    /// Failed to build the replication client.
    Replication(String),
}

impl std::fmt::Display for BootstrapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BootstrapError::Config(msg) => write!(f, "config error: {}", msg),
            BootstrapError::DataDir(msg) => write!(f, "data dir error: {}", msg),
            BootstrapError::Database(msg) => write!(f, "database error: {}", msg),
            BootstrapError::Replication(msg) => write!(f, "replication error: {}", msg),
        }
    }
}

impl std::error::Error for BootstrapError {}

/// Bootstrapped node components.
#[derive(Debug)]
pub struct BootstrappedNode {
    /// The document engine, shared with the router.
    pub engine: Arc<DocEngine>,
    /// The assembled HTTP router, ready to serve.
    pub router: Router,
}

/// Builds a node from configuration.
pub async fn bootstrap_node(config: &Config) -> Result<BootstrappedNode, BootstrapError> {
    config.validate().map_err(|e| BootstrapError::Config(e.to_string()))?;

    std::fs::create_dir_all(&config.data_dir)
        .map_err(|e| BootstrapError::DataDir(format!("failed to create data dir: {}", e)))?;

    let store_path = config.data_dir.join("docs.redb");
    let kv = KvStore::open(&store_path)
        .map_err(|e| BootstrapError::Database(format!("failed to open document store: {}", e)))?;
    let engine = Arc::new(DocEngine::new(kv));

    let replicator = Replicator::new(
        config.peers.clone(),
        config.outbound_token.clone(),
        config.replication_timeout(),
    )
    .map_err(|e| BootstrapError::Replication(format!("failed to build http client: {}", e)))?;

    tracing::info!(
        store = %store_path.display(),
        peers = replicator.peer_count(),
        "node bootstrapped"
    );

    let state = AppState {
        engine: Arc::clone(&engine),
        replicator: Arc::new(replicator),
        tokens: Arc::new(config.auth_tokens.iter().cloned().collect::<HashSet<_>>()),
    };

    Ok(BootstrappedNode { engine, router: http::router(state) })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bootstrap_creates_data_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let data_dir = dir.path().join("node-a");
        let config = Config::for_test(data_dir.clone(), vec![], "t");

        let node = bootstrap_node(&config).await.expect("bootstrap");
        assert!(data_dir.join("docs.redb").exists());
        assert!(node.engine.list_ids(10).expect("list").is_empty());
    }

    #[tokio::test]
    async fn test_bootstrap_rejects_invalid_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = Config::for_test(dir.path().to_path_buf(), vec![], "t");
        config.auth_tokens.clear();

        let err = bootstrap_node(&config).await.unwrap_err();
        assert!(matches!(err, BootstrapError::Config(_)));
    }
}
