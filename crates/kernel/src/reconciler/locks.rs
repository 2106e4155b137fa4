//! Per (organization, plugin) pass serialization.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per (organization, plugin) key.
///
/// Passes for the same key queue behind each other; distinct keys never
/// contend.
#[derive(Debug, Default)]
pub struct PassLocks {
    locks: DashMap<(i64, String), Arc<Mutex<()>>>,
}

impl PassLocks {
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to the key.
    pub async fn acquire(&self, org_id: i64, plugin_id: &str) -> OwnedMutexGuard<()> {
        // Clone the Arc out so the shard lock is released before awaiting.
        let lock = self
            .locks
            .entry((org_id, plugin_id.to_string()))
            .or_default()
            .clone();

        lock.lock_owned().await
    }

    /// Number of keys seen so far.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// True if no key was ever locked.
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_key_is_exclusive() {
        let locks = Arc::new(PassLocks::new());
        let guard = locks.acquire(1, "nginx-app").await;

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move { locks.acquire(1, "nginx-app").await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        let acquired = tokio::time::timeout(Duration::from_secs(1), contender).await;
        assert!(acquired.is_ok());
    }

    #[tokio::test]
    async fn distinct_keys_do_not_contend() {
        let locks = PassLocks::new();
        let _a = locks.acquire(1, "nginx-app").await;
        let _b = locks.acquire(2, "nginx-app").await;
        let _c = locks.acquire(1, "redis-app").await;
        assert_eq!(locks.len(), 3);
    }
}
