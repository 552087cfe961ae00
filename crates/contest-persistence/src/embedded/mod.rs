// Embedded record store using RocksDB
// One column family per collection, plus a meta family holding the creation sequence

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use contest_common::ContestError;
use rocksdb::{
    ColumnFamilyDescriptor, DB, Direction, IteratorMode, MergeOperands, Options, WriteBatch,
    WriteOptions,
};
use serde_json::Value;
use tracing::{debug, info};

use crate::lock::{DEFAULT_LOCK_TIMEOUT, KeyGuard, KeyLockTable};
use crate::model::{RecordKey, StorageMode, StoredRecord};
use crate::traits::RecordStore;
use crate::transaction::{Transaction, WriteOp, stage};

pub const CF_META: &str = "meta";
const KEY_LAST_SEQ: &[u8] = b"last_seq";

fn storage_error(e: rocksdb::Error) -> ContestError {
    ContestError::Storage(format!("RocksDB error: {}", e))
}

fn decode_seq(bytes: &[u8]) -> Option<u64> {
    bytes.try_into().ok().map(u64::from_be_bytes)
}

// Concurrent batches each merge their highest sequence; the stored value is the max
fn max_seq_merge(
    _key: &[u8],
    existing: Option<&[u8]>,
    operands: &MergeOperands,
) -> Option<Vec<u8>> {
    let max = existing
        .into_iter()
        .chain(operands.iter())
        .filter_map(decode_seq)
        .max()
        .unwrap_or(0);
    Some(max.to_be_bytes().to_vec())
}

struct EmbeddedInner {
    db: DB,
    last_seq: AtomicU64,
}

/// Durable record store on RocksDB
pub struct EmbeddedRecordStore {
    inner: Arc<EmbeddedInner>,
    locks: KeyLockTable,
}

impl EmbeddedRecordStore {
    /// Open (or create) a database at `path` with a column family per collection
    pub fn open(path: impl AsRef<Path>, collections: &[&str]) -> Result<Self, ContestError> {
        Self::open_with_lock_timeout(path, collections, DEFAULT_LOCK_TIMEOUT)
    }

    pub fn open_with_lock_timeout(
        path: impl AsRef<Path>,
        collections: &[&str],
        lock_timeout: Duration,
    ) -> Result<Self, ContestError> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cf_opts = Options::default();
        let mut meta_opts = Options::default();
        meta_opts.set_merge_operator_associative("max_seq", max_seq_merge);

        let mut cfs: Vec<ColumnFamilyDescriptor> = collections
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, cf_opts.clone()))
            .collect();
        cfs.push(ColumnFamilyDescriptor::new(CF_META, meta_opts));

        let db = DB::open_cf_descriptors(&db_opts, path.as_ref(), cfs).map_err(storage_error)?;

        let last_seq: u64 = match db
            .get_cf(cf_handle(&db, CF_META)?, KEY_LAST_SEQ)
            .map_err(storage_error)?
        {
            Some(bytes) => decode_seq(&bytes).ok_or_else(|| {
                ContestError::Storage("malformed last_seq in meta column family".to_string())
            })?,
            None => 0,
        };

        info!(
            path = %path.as_ref().display(),
            last_seq,
            "RocksDB record store initialized"
        );

        Ok(Self {
            inner: Arc::new(EmbeddedInner {
                db,
                last_seq: AtomicU64::new(last_seq),
            }),
            locks: KeyLockTable::new(lock_timeout),
        })
    }
}

impl EmbeddedInner {
    fn read(&self, key: &RecordKey) -> Result<Option<StoredRecord>, ContestError> {
        let cf = cf_handle(&self.db, &key.collection)?;
        match self
            .db
            .get_cf(cf, key.id.as_bytes())
            .map_err(storage_error)?
        {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Stage and write one transaction while its key locks are held
    fn write_locked(
        &self,
        _guard: KeyGuard,
        ops: Vec<WriteOp>,
    ) -> Result<Vec<Value>, ContestError> {
        let staged = stage(
            ops,
            |key| self.read(key),
            || self.last_seq.fetch_add(1, Ordering::SeqCst) + 1,
        )?;

        let mut batch = WriteBatch::default();
        let mut max_seq = None;
        for write in &staged {
            let cf = cf_handle(&self.db, &write.key.collection)?;
            batch.put_cf(cf, write.key.id.as_bytes(), serde_json::to_vec(&write.record)?);
            max_seq = max_seq.max(Some(write.record.seq));
        }
        if let Some(seq) = max_seq {
            batch.merge_cf(cf_handle(&self.db, CF_META)?, KEY_LAST_SEQ, seq.to_be_bytes());
        }

        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(true);
        self.db.write_opt(batch, &write_opts).map_err(storage_error)?;

        debug!(writes = staged.len(), "Committed RocksDB write batch");
        Ok(staged.into_iter().map(|w| w.record.value).collect())
    }

    fn scan_sorted(
        &self,
        collection: &str,
        prefix: Option<&str>,
    ) -> Result<Vec<(String, Value)>, ContestError> {
        let cf = cf_handle(&self.db, collection)?;
        let prefix = prefix.unwrap_or("");
        let iter = self.db.iterator_cf(
            cf,
            IteratorMode::From(prefix.as_bytes(), Direction::Forward),
        );

        let mut rows: Vec<(u64, String, Value)> = Vec::new();
        for item in iter {
            let (key, value) = item.map_err(storage_error)?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            let record: StoredRecord = serde_json::from_slice(&value)?;
            rows.push((
                record.seq,
                String::from_utf8_lossy(&key).into_owned(),
                record.value,
            ));
        }
        rows.sort_by_key(|(seq, _, _)| *seq);
        Ok(rows.into_iter().map(|(_, id, value)| (id, value)).collect())
    }
}

/// Get a column family handle
fn cf_handle<'a>(db: &'a DB, name: &str) -> Result<&'a rocksdb::ColumnFamily, ContestError> {
    db.cf_handle(name)
        .ok_or_else(|| ContestError::InvalidArgument(format!("unknown collection '{}'", name)))
}

#[async_trait]
impl RecordStore for EmbeddedRecordStore {
    fn storage_mode(&self) -> StorageMode {
        StorageMode::Embedded
    }

    async fn get(&self, key: &RecordKey) -> Result<Value, ContestError> {
        let _guard = self.locks.lock(key).await?;
        self.inner
            .read(key)?
            .map(|record| record.value)
            .ok_or_else(|| ContestError::NotFound(key.to_string()))
    }

    async fn commit(&self, txn: Transaction) -> Result<Vec<Value>, ContestError> {
        txn.validate()?;
        let keys = txn.keys();
        let guard = self.locks.lock_all(&keys).await?;

        // The synced write runs off the async workers and completes even if the caller is dropped
        let inner = self.inner.clone();
        let ops = txn.into_ops();
        tokio::task::spawn_blocking(move || inner.write_locked(guard, ops))
            .await
            .map_err(|e| ContestError::Storage(format!("RocksDB commit task failed: {}", e)))?
    }

    async fn scan(
        &self,
        collection: &str,
        prefix: Option<&str>,
    ) -> Result<Vec<(String, Value)>, ContestError> {
        self.inner.scan_sorted(collection, prefix)
    }

    async fn health_check(&self) -> anyhow::Result<()> {
        self.inner
            .db
            .get_cf(cf_handle(&self.inner.db, CF_META)?, KEY_LAST_SEQ)
            .map_err(|e| anyhow::anyhow!("RocksDB health check failed: {}", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const COLLECTIONS: &[&str] = &["items", "marks"];

    fn key(id: &str) -> RecordKey {
        RecordKey::new("items", id)
    }

    #[tokio::test]
    async fn test_commit_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = EmbeddedRecordStore::open(dir.path(), COLLECTIONS).unwrap();
            store.create(&key("b"), json!(0)).await.unwrap();
            store.create(&key("a"), json!(0)).await.unwrap();
            let txn = Transaction::new()
                .create(RecordKey::new("marks", "a@@x"), json!({"by": "x"}))
                .update(key("a"), |v| Ok(json!(v.as_u64().unwrap_or(0) + 1)));
            store.commit(txn).await.unwrap();
        }

        let store = EmbeddedRecordStore::open(dir.path(), COLLECTIONS).unwrap();
        assert_eq!(store.get(&key("a")).await.unwrap(), json!(1));
        assert_eq!(store.count("marks", Some("a@@")).await.unwrap(), 1);

        // Creation order, not key order
        let ids: Vec<String> = store
            .scan("items", None)
            .await
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, vec!["b", "a"]);

        store.create(&key("0"), json!(0)).await.unwrap();
        let ids: Vec<String> = store
            .scan("items", None)
            .await
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, vec!["b", "a", "0"]);
    }

    #[tokio::test]
    async fn test_failed_transaction_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = EmbeddedRecordStore::open(dir.path(), COLLECTIONS).unwrap();
        store.create(&key("a"), json!(0)).await.unwrap();

        let txn = Transaction::new()
            .create(RecordKey::new("marks", "m"), json!(1))
            .create(key("a"), json!(5));
        assert!(matches!(
            store.commit(txn).await,
            Err(ContestError::AlreadyExists(_))
        ));
        assert!(!store.exists(&RecordKey::new("marks", "m")).await.unwrap());
        assert_eq!(store.get(&key("a")).await.unwrap(), json!(0));
    }

    #[test]
    fn test_max_seq_merge_keeps_highest() {
        let dir = tempfile::tempdir().unwrap();
        let store = EmbeddedRecordStore::open(dir.path(), COLLECTIONS).unwrap();
        let db = &store.inner.db;
        let meta = cf_handle(db, CF_META).unwrap();
        for seq in [3u64, 9, 4] {
            db.merge_cf(meta, KEY_LAST_SEQ, seq.to_be_bytes()).unwrap();
        }
        let stored = db.get_cf(meta, KEY_LAST_SEQ).unwrap().unwrap();
        assert_eq!(decode_seq(&stored), Some(9));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creates_keep_sequence_after_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = Arc::new(EmbeddedRecordStore::open(dir.path(), COLLECTIONS).unwrap());
            let mut handles = Vec::new();
            for i in 0..16 {
                let store = store.clone();
                handles.push(tokio::spawn(async move {
                    store.create(&key(&format!("k{}", i)), json!(i)).await
                }));
            }
            for handle in handles {
                handle.await.unwrap().unwrap();
            }
        }

        let store = EmbeddedRecordStore::open(dir.path(), COLLECTIONS).unwrap();
        assert_eq!(store.inner.last_seq.load(Ordering::SeqCst), 16);
        store.create(&key("after"), json!(0)).await.unwrap();
        let rows = store.scan("items", None).await.unwrap();
        assert_eq!(rows.len(), 17);
        assert_eq!(rows.last().map(|(id, _)| id.as_str()), Some("after"));
    }

    #[tokio::test]
    async fn test_unknown_collection() {
        let dir = tempfile::tempdir().unwrap();
        let store = EmbeddedRecordStore::open(dir.path(), COLLECTIONS).unwrap();
        let result = store.create(&RecordKey::new("nope", "a"), json!(0)).await;
        assert!(matches!(result, Err(ContestError::InvalidArgument(_))));
        assert!(store.health_check().await.is_ok());
    }
}
