//! In-memory record store
//!
//! `RecordTable` is the locked map shared by the memory and journal-file
//! backends; `MemoryRecordStore` is the table with nothing behind it.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use contest_common::ContestError;
use dashmap::DashMap;
use serde_json::Value;
use tracing::debug;

use crate::lock::{DEFAULT_LOCK_TIMEOUT, KeyLockTable};
use crate::model::{RecordKey, StorageMode, StoredRecord};
use crate::traits::RecordStore;
use crate::transaction::{StagedWrite, Transaction, stage};

pub(crate) struct RecordTable {
    records: DashMap<RecordKey, StoredRecord>,
    locks: KeyLockTable,
    last_seq: AtomicU64,
}

impl RecordTable {
    pub(crate) fn new(lock_timeout: Duration) -> Self {
        Self {
            records: DashMap::new(),
            locks: KeyLockTable::new(lock_timeout),
            last_seq: AtomicU64::new(0),
        }
    }

    fn next_seq(&self) -> u64 {
        self.last_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Load a record without locking; only used while replaying on open
    pub(crate) fn restore(&self, write: StagedWrite) {
        self.last_seq.fetch_max(write.record.seq, Ordering::SeqCst);
        self.records.insert(write.key, write.record);
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) async fn get(&self, key: &RecordKey) -> Result<Value, ContestError> {
        // Taking the key lock keeps a reader from seeing one half of a commit
        // that is still being applied.
        let _guard = self.locks.lock(key).await?;
        self.records
            .get(key)
            .map(|r| r.value().value.clone())
            .ok_or_else(|| ContestError::NotFound(key.to_string()))
    }

    /// Lock, stage, persist, then apply.
    ///
    /// `persist` is the only step that may suspend once the key locks are
    /// held. A backend whose persist step really does suspend runs the whole
    /// commit on a spawned task, so a dropped caller can never leave the table
    /// behind what was made durable. If `persist` fails the table is left
    /// untouched.
    pub(crate) async fn commit<P, F>(
        &self,
        txn: Transaction,
        persist: P,
    ) -> Result<Vec<Value>, ContestError>
    where
        P: FnOnce(&[StagedWrite]) -> F,
        F: Future<Output = Result<(), ContestError>>,
    {
        txn.validate()?;
        let keys = txn.keys();
        let _guard = self.locks.lock_all(&keys).await?;

        let staged = stage(
            txn.into_ops(),
            |key| Ok(self.records.get(key).map(|r| r.value().clone())),
            || self.next_seq(),
        )?;
        persist(&staged).await?;

        let values = staged.iter().map(|w| w.record.value.clone()).collect();
        for write in staged {
            debug!(key = %write.key, seq = write.record.seq, "Applied record write");
            self.records.insert(write.key, write.record);
        }
        Ok(values)
    }

    /// Every record in creation order; used to rewrite a compacted journal
    pub(crate) fn snapshot(&self) -> Vec<StagedWrite> {
        let mut writes: Vec<StagedWrite> = self
            .records
            .iter()
            .map(|entry| StagedWrite {
                key: entry.key().clone(),
                record: entry.value().clone(),
            })
            .collect();
        writes.sort_by_key(|w| w.record.seq);
        writes
    }

    pub(crate) fn scan(&self, collection: &str, prefix: Option<&str>) -> Vec<(String, Value)> {
        let mut rows: Vec<(u64, String, Value)> = self
            .records
            .iter()
            .filter(|entry| {
                let key = entry.key();
                key.collection == collection && prefix.is_none_or(|p| key.id.starts_with(p))
            })
            .map(|entry| {
                (
                    entry.value().seq,
                    entry.key().id.clone(),
                    entry.value().value.clone(),
                )
            })
            .collect();
        rows.sort_by_key(|(seq, _, _)| *seq);
        rows.into_iter().map(|(_, id, value)| (id, value)).collect()
    }

    pub(crate) fn count(&self, collection: &str, prefix: Option<&str>) -> usize {
        self.records
            .iter()
            .filter(|entry| {
                let key = entry.key();
                key.collection == collection && prefix.is_none_or(|p| key.id.starts_with(p))
            })
            .count()
    }
}

/// Process-local record store
pub struct MemoryRecordStore {
    table: RecordTable,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            table: RecordTable::new(lock_timeout),
        }
    }

    /// Total number of records across all collections
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.len() == 0
    }
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    fn storage_mode(&self) -> StorageMode {
        StorageMode::Memory
    }

    async fn get(&self, key: &RecordKey) -> Result<Value, ContestError> {
        self.table.get(key).await
    }

    async fn commit(&self, txn: Transaction) -> Result<Vec<Value>, ContestError> {
        self.table.commit(txn, |_| std::future::ready(Ok(()))).await
    }

    async fn scan(
        &self,
        collection: &str,
        prefix: Option<&str>,
    ) -> Result<Vec<(String, Value)>, ContestError> {
        Ok(self.table.scan(collection, prefix))
    }

    async fn count(&self, collection: &str, prefix: Option<&str>) -> Result<usize, ContestError> {
        Ok(self.table.count(collection, prefix))
    }

    async fn health_check(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::Transaction;
    use serde_json::json;
    use std::sync::Arc;

    fn key(id: &str) -> RecordKey {
        RecordKey::new("items", id)
    }

    #[tokio::test]
    async fn test_create_get_update() {
        let store = MemoryRecordStore::new();
        store.create(&key("a"), json!({"n": 1})).await.unwrap();
        assert_eq!(store.get(&key("a")).await.unwrap(), json!({"n": 1}));

        let updated = store
            .update(
                &key("a"),
                Box::new(|mut v| {
                    v["n"] = json!(2);
                    Ok(v)
                }),
            )
            .await
            .unwrap();
        assert_eq!(updated, json!({"n": 2}));
        assert_eq!(store.get(&key("a")).await.unwrap(), json!({"n": 2}));
    }

    #[tokio::test]
    async fn test_create_twice_keeps_original() {
        let store = MemoryRecordStore::new();
        store.create(&key("a"), json!({"n": 1})).await.unwrap();
        let result = store.create(&key("a"), json!({"n": 2})).await;
        assert_eq!(
            result,
            Err(ContestError::AlreadyExists("items/a".to_string()))
        );
        assert_eq!(store.get(&key("a")).await.unwrap(), json!({"n": 1}));
    }

    #[tokio::test]
    async fn test_missing_record() {
        let store = MemoryRecordStore::new();
        assert_eq!(
            store.get(&key("nope")).await,
            Err(ContestError::NotFound("items/nope".to_string()))
        );
        assert!(!store.exists(&key("nope")).await.unwrap());
        let result = store.update(&key("nope"), Box::new(|v| Ok(v))).await;
        assert!(matches!(result, Err(ContestError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_failed_mutator_writes_nothing() {
        let store = MemoryRecordStore::new();
        store.create(&key("a"), json!({"n": 1})).await.unwrap();
        let result = store
            .update(
                &key("a"),
                Box::new(|_| Err(ContestError::InvalidArgument("nope".to_string()))),
            )
            .await;
        assert!(matches!(result, Err(ContestError::InvalidArgument(_))));
        assert_eq!(store.get(&key("a")).await.unwrap(), json!({"n": 1}));
    }

    #[tokio::test]
    async fn test_transaction_all_or_nothing() {
        let store = MemoryRecordStore::new();
        store.create(&key("taken"), json!(0)).await.unwrap();
        store.create(&key("counter"), json!(0)).await.unwrap();

        let txn = Transaction::new()
            .update(key("counter"), |v| Ok(json!(v.as_u64().unwrap_or(0) + 1)))
            .create(key("taken"), json!(1));
        assert!(matches!(
            store.commit(txn).await,
            Err(ContestError::AlreadyExists(_))
        ));
        assert_eq!(store.get(&key("counter")).await.unwrap(), json!(0));

        let txn = Transaction::new()
            .create(key("fresh"), json!(1))
            .update(key("counter"), |v| Ok(json!(v.as_u64().unwrap_or(0) + 1)));
        let values = store.commit(txn).await.unwrap();
        assert_eq!(values, vec![json!(1), json!(1)]);
        assert_eq!(store.get(&key("counter")).await.unwrap(), json!(1));
    }

    #[tokio::test]
    async fn test_scan_in_creation_order() {
        let store = MemoryRecordStore::new();
        for id in ["zeta", "alpha", "mid"] {
            store.create(&key(id), json!(id)).await.unwrap();
        }
        store
            .create(&RecordKey::new("other", "x"), json!("x"))
            .await
            .unwrap();
        // Updates keep the original position
        store.update(&key("zeta"), Box::new(|v| Ok(v))).await.unwrap();

        let ids: Vec<String> = store
            .scan("items", None)
            .await
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, vec!["zeta", "alpha", "mid"]);
        assert_eq!(store.count("items", Some("m")).await.unwrap(), 1);
        assert_eq!(store.len(), 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_creates_single_winner() {
        let store = Arc::new(MemoryRecordStore::new());
        let mut handles = Vec::new();
        for i in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.create(&key("contended"), json!(i)).await
            }));
        }
        let mut winners = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => winners += 1,
                Err(e) => assert!(matches!(e, ContestError::AlreadyExists(_))),
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_updates_lose_nothing() {
        let store = Arc::new(MemoryRecordStore::new());
        store.create(&key("n"), json!(0)).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..100 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .update(
                        &key("n"),
                        Box::new(|v| Ok(json!(v.as_u64().unwrap_or(0) + 1))),
                    )
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(store.get(&key("n")).await.unwrap(), json!(100));
    }
}
