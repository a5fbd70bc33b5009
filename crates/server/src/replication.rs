//! Synchronous push replication to peers.
//!
//! A change record fans out concurrently to every configured peer. Each
//! arm is bounded by its own timeout and classified independently; the
//! push settles only when every arm has settled. There is no early
//! return on first conflict: the write orchestration needs the complete
//! picture to decide between commit and rollback.

use std::time::Duration;

use futures::future::join_all;
use reqwest::StatusCode;

use meshdoc_types::ChangeRecord;

/// Result of one fan-out, partitioned by peer base URL.
#[derive(Debug, Default)]
pub struct PushOutcome {
    /// Peers that applied the change (HTTP 200).
    pub acks: Vec<String>,
    /// Peers whose state rejected the change (HTTP 409).
    pub conflicts: Vec<String>,
    /// Peers that were unreachable, timed out, or answered anything
    /// else. Tolerated: their divergence is accepted, never retried.
    pub failures: Vec<String>,
}

impl PushOutcome {
    /// True when at least one peer rejected the change.
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

enum PeerResult {
    Ack,
    Conflict,
    Failure,
}

/// Fan-out client for the replication mesh.
pub struct Replicator {
    client: reqwest::Client,
    peers: Vec<String>,
    token: Option<String>,
}

impl Replicator {
    /// Builds a client with the given per-request timeout. `token` is
    /// the outbound bearer identity; it may be absent only when `peers`
    /// is empty (config validation enforces this).
    pub fn new(
        peers: Vec<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, peers, token })
    }

    /// Number of configured peers.
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Pushes `change` to every peer concurrently and waits for all
    /// arms to settle.
    pub async fn push_to_peers(&self, change: &ChangeRecord) -> PushOutcome {
        let arms = self.peers.iter().map(|peer| async move {
            let result = self.send(peer, change).await;
            (peer.clone(), result)
        });

        let mut outcome = PushOutcome::default();
        for (peer, result) in join_all(arms).await {
            match result {
                PeerResult::Ack => outcome.acks.push(peer),
                PeerResult::Conflict => outcome.conflicts.push(peer),
                PeerResult::Failure => outcome.failures.push(peer),
            }
        }
        outcome
    }

    async fn send(&self, peer: &str, change: &ChangeRecord) -> PeerResult {
        let url = format!("{}/replicate", peer.trim_end_matches('/'));
        let mut request = self.client.post(&url).json(change);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        match request.send().await {
            Ok(response) if response.status() == StatusCode::OK => {
                tracing::debug!(peer, id = %change.id, "peer acked change");
                PeerResult::Ack
            },
            Ok(response) if response.status() == StatusCode::CONFLICT => {
                tracing::warn!(peer, id = %change.id, "peer rejected change");
                PeerResult::Conflict
            },
            Ok(response) => {
                tracing::warn!(peer, id = %change.id, status = %response.status(), "unexpected peer response");
                PeerResult::Failure
            },
            Err(err) => {
                tracing::warn!(peer, id = %change.id, error = %err, "peer unreachable");
                PeerResult::Failure
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_no_peers_settles_empty() {
        let replicator =
            Replicator::new(vec![], None, Duration::from_millis(100)).expect("build client");
        let change = ChangeRecord::for_del("x".to_string(), None);

        let outcome = replicator.push_to_peers(&change).await;
        assert!(outcome.acks.is_empty());
        assert!(!outcome.has_conflicts());
        assert!(outcome.failures.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_peer_classified_as_failure() {
        // Nothing listens on this port in the test environment.
        let peer = "http://127.0.0.1:9".to_string();
        let replicator =
            Replicator::new(vec![peer.clone()], Some("t".to_string()), Duration::from_millis(200))
                .expect("build client");
        let change = ChangeRecord::for_del("x".to_string(), None);

        let outcome = replicator.push_to_peers(&change).await;
        assert_eq!(outcome.failures, vec![peer]);
        assert!(outcome.acks.is_empty());
        assert!(!outcome.has_conflicts());
    }
}
