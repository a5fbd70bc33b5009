//! meshdoc server: configuration, bootstrap, the HTTP surface, the
//! replication client, and write orchestration.
//!
//! The binary in `main.rs` wires these together; integration tests
//! reuse [`bootstrap::bootstrap_node`] to spawn real nodes.

pub mod bootstrap;
pub mod config;
pub mod http;
pub mod replication;
pub mod shutdown;
pub mod writes;
