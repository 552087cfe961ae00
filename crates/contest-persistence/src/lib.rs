//! Contest Persistence - Atomic keyed record store
//!
//! This crate provides:
//! - The `RecordStore` trait: insert-if-absent, read, read-modify-write and
//!   multi-key transactions over JSON records
//! - A key-scoped lock table so unrelated keys never contend
//! - Memory, journal-file and RocksDB (feature `rocksdb`) backends

#[cfg(feature = "rocksdb")]
pub mod embedded;
pub mod file;
pub mod lock;
pub mod memory;
pub mod model;
pub mod traits;
pub mod transaction;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use contest_common::ContestError;
use tracing::info;

// Re-export backends
#[cfg(feature = "rocksdb")]
pub use embedded::EmbeddedRecordStore;
pub use file::{DEFAULT_COMPACT_THRESHOLD, FileRecordStore};
pub use memory::MemoryRecordStore;

pub use lock::{DEFAULT_LOCK_TIMEOUT, KeyGuard, KeyLockTable};
pub use model::{Record, RecordKey, StorageMode, StoredRecord};
pub use traits::{RecordStore, RecordStoreExt};
pub use transaction::{Mutator, StagedWrite, Transaction, WriteOp, typed_mutator};

/// Default data directory for the durable backends
pub const DEFAULT_DATA_DIR: &str = "data";

/// Backend selection and tuning
#[derive(Clone, Debug)]
pub struct StoreOptions {
    pub mode: StorageMode,
    pub path: PathBuf,
    pub lock_timeout: Duration,
    /// Superseded journal writes tolerated before the file backend compacts on open
    pub compact_threshold: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            mode: StorageMode::default(),
            path: PathBuf::from(DEFAULT_DATA_DIR),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            compact_threshold: DEFAULT_COMPACT_THRESHOLD,
        }
    }
}

/// Open the backend selected by `options`.
///
/// `collections` lists every collection the caller will use; the RocksDB
/// backend creates a column family for each.
pub fn open_store(
    options: &StoreOptions,
    collections: &[&str],
) -> Result<Arc<dyn RecordStore>, ContestError> {
    let store: Arc<dyn RecordStore> = match options.mode {
        StorageMode::Memory => Arc::new(MemoryRecordStore::with_lock_timeout(options.lock_timeout)),
        StorageMode::File => Arc::new(FileRecordStore::open_with_options(
            &options.path,
            options.lock_timeout,
            options.compact_threshold,
        )?),
        StorageMode::Embedded => open_embedded(options, collections)?,
    };
    info!(
        mode = %options.mode,
        path = %options.path.display(),
        "Record store opened"
    );
    Ok(store)
}

#[cfg(feature = "rocksdb")]
fn open_embedded(
    options: &StoreOptions,
    collections: &[&str],
) -> Result<Arc<dyn RecordStore>, ContestError> {
    Ok(Arc::new(EmbeddedRecordStore::open_with_lock_timeout(
        &options.path,
        collections,
        options.lock_timeout,
    )?))
}

#[cfg(not(feature = "rocksdb"))]
fn open_embedded(
    _options: &StoreOptions,
    _collections: &[&str],
) -> Result<Arc<dyn RecordStore>, ContestError> {
    Err(ContestError::InvalidArgument(
        "embedded storage requires the `rocksdb` feature".to_string(),
    ))
}
