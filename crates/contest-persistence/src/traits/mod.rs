//! Record store traits
//!
//! `RecordStore` is the object-safe primitive every backend implements:
//! atomic multi-key commit, single-key read, and ordered scans. The single
//! key `create` / `update` operations are one-operation commits.
//! `RecordStoreExt` layers typed access on top for any [`Record`].

use async_trait::async_trait;
use contest_common::ContestError;
use serde_json::Value;

use crate::model::{Record, RecordKey, StorageMode};
use crate::transaction::{Mutator, Transaction, typed_mutator};

/// Keyed persistence with atomic insert-if-absent, read, and update
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Get the backend type
    fn storage_mode(&self) -> StorageMode;

    /// Read a record, `NotFound` if absent
    async fn get(&self, key: &RecordKey) -> Result<Value, ContestError>;

    /// Apply every operation of `txn`, or none of them.
    ///
    /// Returns the new body of each record in operation order.
    async fn commit(&self, txn: Transaction) -> Result<Vec<Value>, ContestError>;

    /// Records of a collection whose id starts with `prefix`, in creation order
    async fn scan(
        &self,
        collection: &str,
        prefix: Option<&str>,
    ) -> Result<Vec<(String, Value)>, ContestError>;

    /// Health check for the storage backend
    async fn health_check(&self) -> anyhow::Result<()>;

    async fn count(&self, collection: &str, prefix: Option<&str>) -> Result<usize, ContestError> {
        Ok(self.scan(collection, prefix).await?.len())
    }

    /// Insert if absent; exactly one of several concurrent creators wins
    async fn create(&self, key: &RecordKey, record: Value) -> Result<(), ContestError> {
        self.commit(Transaction::new().create(key.clone(), record))
            .await
            .map(|_| ())
    }

    /// Read, transform and write back one record inside its critical section
    async fn update(&self, key: &RecordKey, mutator: Mutator) -> Result<Value, ContestError> {
        let mut values = self
            .commit(Transaction::new().update_boxed(key.clone(), mutator))
            .await?;
        values
            .pop()
            .ok_or_else(|| ContestError::Storage(format!("commit of '{}' returned nothing", key)))
    }

    async fn exists(&self, key: &RecordKey) -> Result<bool, ContestError> {
        match self.get(key).await {
            Ok(_) => Ok(true),
            Err(ContestError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Typed access to [`Record`] types
#[async_trait]
pub trait RecordStoreExt: RecordStore {
    async fn create_record<R: Record>(&self, id: &str, record: &R) -> Result<(), ContestError> {
        let value = serde_json::to_value(record)?;
        self.create(&R::key(id), value).await
    }

    async fn get_record<R: Record>(&self, id: &str) -> Result<R, ContestError> {
        let value = self.get(&R::key(id)).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn update_record<R, F>(&self, id: &str, f: F) -> Result<R, ContestError>
    where
        R: Record,
        F: FnOnce(&mut R) -> Result<(), ContestError> + Send + 'static,
    {
        let value = self.update(&R::key(id), typed_mutator::<R, F>(f)).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn scan_records<R: Record>(&self, prefix: Option<&str>) -> Result<Vec<R>, ContestError> {
        self.scan(R::COLLECTION, prefix)
            .await?
            .into_iter()
            .map(|(_, value)| serde_json::from_value(value).map_err(ContestError::from))
            .collect()
    }
}

impl<S: RecordStore + ?Sized> RecordStoreExt for S {}
