//! Per-document lock table.
//!
//! Maps each `_id` to a fair FIFO mutex, created lazily on first use and
//! retained for process lifetime (bounded by the hot working set).
//! tokio's mutex queues waiters in arrival order, which supplies the
//! fairness contract. Acquisitions on distinct ids are independent.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Fair per-key mutex table.
#[derive(Default)]
#[derive(Debug)]
pub struct LockTable {
    entries: DashMap<String, Arc<Mutex<()>>>,
}

impl LockTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self { entries: DashMap::new() }
    }

    /// Acquires the mutex for `id`, waiting behind earlier acquirers.
    ///
    /// The returned guard releases on drop, so release fires on every
    /// exit path of the protected scope. The map entry's Arc is cloned
    /// out before awaiting; the map shard lock is never held across the
    /// await.
    pub async fn acquire(&self, id: &str) -> OwnedMutexGuard<()> {
        let mutex = {
            let entry = self.entries.entry(id.to_string()).or_default();
            Arc::clone(entry.value())
        };
        mutex.lock_owned().await
    }

    /// Number of keys that have ever been locked.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no key has been locked yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::time::Duration;

    use tokio::time::Instant;

    use super::*;

    #[tokio::test]
    async fn test_same_key_serializes() {
        let table = Arc::new(LockTable::new());

        let guard = table.acquire("x").await;
        let contender = {
            let table = Arc::clone(&table);
            tokio::spawn(async move {
                let start = Instant::now();
                let _guard = table.acquire("x").await;
                start.elapsed()
            })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        drop(guard);

        let waited = contender.await.expect("join");
        assert!(waited >= Duration::from_millis(90), "second acquirer waited {waited:?}");
    }

    #[tokio::test]
    async fn test_distinct_keys_independent() {
        let table = Arc::new(LockTable::new());
        let _guard_x = table.acquire("x").await;

        // A different key must not wait behind x's holder.
        let start = Instant::now();
        let _guard_y = table.acquire("y").await;
        assert!(start.elapsed() < Duration::from_millis(50));
        assert_eq!(table.len(), 2);
    }

    #[tokio::test]
    async fn test_waiters_served_in_arrival_order() {
        let table = Arc::new(LockTable::new());
        let order = Arc::new(Mutex::new(Vec::new()));

        let first = table.acquire("x").await;
        let mut waiters = Vec::new();
        for i in 0..3 {
            let table = Arc::clone(&table);
            let order = Arc::clone(&order);
            waiters.push(tokio::spawn(async move {
                let _guard = table.acquire("x").await;
                order.lock().await.push(i);
            }));
            // Give each waiter time to enqueue before spawning the next.
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        drop(first);
        for waiter in waiters {
            waiter.await.expect("join");
        }
        assert_eq!(*order.lock().await, vec![0, 1, 2]);
    }
}
