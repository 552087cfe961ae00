//! Key-scoped lock table
//!
//! Every record key gets its own async mutex, created on demand in a sharded
//! map and pruned once nobody holds or waits on it. Multi-key acquisition
//! sorts the keys first so two transactions can never wait on each other in
//! opposite order. Waits are bounded: a caller that cannot get all of its
//! keys before the deadline gets `ConcurrencyConflict` and holds nothing.

use std::sync::Arc;
use std::time::Duration;

use contest_common::ContestError;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;
use tracing::warn;

use crate::model::RecordKey;

/// Default bound on how long a caller waits for its keys
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

type LockMap = DashMap<String, Arc<Mutex<()>>>;

pub struct KeyLockTable {
    locks: Arc<LockMap>,
    timeout: Duration,
}

impl KeyLockTable {
    pub fn new(timeout: Duration) -> Self {
        Self {
            locks: Arc::new(DashMap::new()),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Lock a single key
    pub async fn lock(&self, key: &RecordKey) -> Result<KeyGuard, ContestError> {
        self.lock_all(std::slice::from_ref(key)).await
    }

    /// Lock every key in `keys`, in sorted order, within the table timeout
    pub async fn lock_all(&self, keys: &[RecordKey]) -> Result<KeyGuard, ContestError> {
        let mut names: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        names.sort();
        names.dedup();

        let deadline = Instant::now() + self.timeout;
        let mut guard = KeyGuard {
            held: Vec::with_capacity(names.len()),
            locks: self.locks.clone(),
        };

        for name in names {
            let mutex = self.locks.entry(name.clone()).or_default().clone();
            match tokio::time::timeout_at(deadline, mutex.clone().lock_owned()).await {
                Ok(held) => guard.held.push((name, held)),
                Err(_) => {
                    warn!(
                        key = %name,
                        timeout_ms = self.timeout.as_millis() as u64,
                        "Timed out waiting for record lock"
                    );
                    drop(mutex);
                    prune(&self.locks, &name);
                    return Err(ContestError::ConcurrencyConflict(name));
                }
            }
        }

        Ok(guard)
    }

    /// Number of keys that currently have a lock entry
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl Default for KeyLockTable {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_TIMEOUT)
    }
}

/// Holds a set of key locks; releases them in reverse order on drop
pub struct KeyGuard {
    held: Vec<(String, OwnedMutexGuard<()>)>,
    locks: Arc<LockMap>,
}

impl KeyGuard {
    #[cfg(test)]
    fn keys(&self) -> impl Iterator<Item = &str> {
        self.held.iter().map(|(name, _)| name.as_str())
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        while let Some((name, held)) = self.held.pop() {
            drop(held);
            prune(&self.locks, &name);
        }
    }
}

// The map itself holds one reference; anything above that is a holder or a
// waiter, and both clone under the same shard lock `remove_if` takes.
fn prune(locks: &LockMap, name: &str) {
    locks.remove_if(name, |_, mutex| Arc::strong_count(mutex) == 1);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(id: &str) -> RecordKey {
        RecordKey::new("items", id)
    }

    #[tokio::test]
    async fn test_lock_entries_pruned_after_release() {
        let table = KeyLockTable::default();
        {
            let guard = table.lock_all(&[key("b"), key("a")]).await.unwrap();
            assert_eq!(guard.keys().collect::<Vec<_>>(), vec!["items/a", "items/b"]);
            assert_eq!(table.len(), 2);
        }
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_keys_locked_once() {
        let table = KeyLockTable::default();
        let guard = table.lock_all(&[key("a"), key("a")]).await.unwrap();
        assert_eq!(guard.keys().count(), 1);
    }

    #[tokio::test]
    async fn test_timeout_is_concurrency_conflict() {
        let table = KeyLockTable::new(Duration::from_millis(20));
        let _held = table.lock(&key("busy")).await.unwrap();

        let result = table.lock_all(&[key("free"), key("busy")]).await;
        assert_eq!(
            result.err(),
            Some(ContestError::ConcurrencyConflict("items/busy".to_string()))
        );

        // Nothing stays locked by the failed attempt
        let again = table.lock(&key("free")).await;
        assert!(again.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_lock_serializes_same_key() {
        let table = Arc::new(KeyLockTable::default());
        let counter = Arc::new(parking_lot::Mutex::new((0u32, 0u32)));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let table = table.clone();
            let counter = counter.clone();
            handles.push(tokio::spawn(async move {
                let _guard = table.lock(&key("hot")).await.unwrap();
                {
                    let mut c = counter.lock();
                    c.0 += 1;
                    c.1 = c.1.max(c.0);
                }
                tokio::task::yield_now().await;
                counter.lock().0 -= 1;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // Never more than one holder at a time
        assert_eq!(counter.lock().1, 1);
        assert!(table.is_empty());
    }
}
