//! Test harness for node integration tests.
//!
//! Spawns real nodes on ephemeral localhost ports, each with its own
//! temporary data directory. Mesh topologies are built by binding the
//! listeners up front so every node can be configured with its peers'
//! final addresses.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::net::SocketAddr;

use tempfile::TempDir;
use tokio::net::TcpListener;

use meshdoc_server::bootstrap;
use meshdoc_server::config::Config;

/// Shared bearer token for all test nodes (inbound and outbound).
pub const TEST_TOKEN: &str = "integration-test-token";

/// A running node under test.
pub struct TestNode {
    /// The HTTP address.
    pub addr: SocketAddr,
    /// Temporary directory for node data.
    _temp_dir: TempDir,
    /// Server task handle for cleanup.
    _server_handle: tokio::task::JoinHandle<()>,
    /// Shutdown sender, kept alive so the server doesn't immediately
    /// exit; dropping it resolves the graceful-shutdown future.
    _shutdown_tx: tokio::sync::watch::Sender<bool>,
}

impl TestNode {
    /// Spawns a node on a fresh ephemeral port.
    pub async fn spawn(peers: Vec<String>) -> Self {
        Self::spawn_on(bind_listener().await, peers).await
    }

    /// Spawns a node on a pre-bound listener.
    pub async fn spawn_on(listener: TcpListener, peers: Vec<String>) -> Self {
        let temp_dir = TempDir::new().expect("tempdir");
        let config = Config::for_test(temp_dir.path().to_path_buf(), peers, TEST_TOKEN);
        let node = bootstrap::bootstrap_node(&config).await.expect("bootstrap node");

        let addr = listener.local_addr().expect("local addr");
        let (shutdown_tx, mut shutdown_rx) = tokio::sync::watch::channel(false);
        let router = node.router;
        let server_handle = tokio::spawn(async move {
            let shutdown = async move {
                let _ = shutdown_rx.changed().await;
            };
            if let Err(e) = axum::serve(listener, router).with_graceful_shutdown(shutdown).await {
                tracing::error!("server error: {}", e);
            }
        });

        Self { addr, _temp_dir: temp_dir, _server_handle: server_handle, _shutdown_tx: shutdown_tx }
    }

    /// Base URL peers use to reach this node.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Full URL for a path on this node.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Binds an ephemeral localhost listener. Binding up front lets mesh
/// topologies hand each node the others' final addresses.
pub async fn bind_listener() -> TcpListener {
    TcpListener::bind("127.0.0.1:0").await.expect("bind ephemeral port")
}

/// Spawns two nodes peered with each other.
pub async fn spawn_pair() -> (TestNode, TestNode) {
    let listener_a = bind_listener().await;
    let listener_b = bind_listener().await;
    let url_a = format!("http://{}", listener_a.local_addr().expect("addr"));
    let url_b = format!("http://{}", listener_b.local_addr().expect("addr"));

    let node_a = TestNode::spawn_on(listener_a, vec![url_b]).await;
    let node_b = TestNode::spawn_on(listener_b, vec![url_a]).await;
    (node_a, node_b)
}

/// A client with the test bearer token preconfigured on every request.
pub fn client() -> reqwest::Client {
    reqwest::Client::new()
}

/// POST a document to a node's create/update endpoint.
pub async fn post_doc(node: &TestNode, body: &serde_json::Value) -> reqwest::Response {
    client()
        .post(node.url("/api/docs"))
        .bearer_auth(TEST_TOKEN)
        .json(body)
        .send()
        .await
        .expect("post /api/docs")
}

/// GET a document by id.
pub async fn get_doc(node: &TestNode, id: &str) -> reqwest::Response {
    client()
        .get(node.url(&format!("/api/docs/{id}")))
        .bearer_auth(TEST_TOKEN)
        .send()
        .await
        .expect("get /api/docs/:id")
}

/// DELETE a document by id.
pub async fn delete_doc(node: &TestNode, id: &str) -> reqwest::Response {
    client()
        .delete(node.url(&format!("/api/docs/{id}")))
        .bearer_auth(TEST_TOKEN)
        .send()
        .await
        .expect("delete /api/docs/:id")
}

/// POST a raw change record to a node's replication endpoint.
pub async fn post_replicate(node: &TestNode, body: &serde_json::Value) -> reqwest::Response {
    client()
        .post(node.url("/replicate"))
        .bearer_auth(TEST_TOKEN)
        .json(body)
        .send()
        .await
        .expect("post /replicate")
}
