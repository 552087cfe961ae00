//! Journal-file record store
//!
//! Every committed transaction is appended to `records.journal` as a single
//! JSON line holding all of its staged writes, and synced before the writes
//! become visible. Appends go through one writer thread that groups whatever
//! is queued into a single write and sync. On open the journal is replayed
//! into memory. A trailing line without its newline (or that no longer
//! parses) is a write torn by a crash; it is cut off, so each transaction is
//! either fully replayed or not at all. When the replay shows too many
//! superseded writes, the journal is rewritten to one line per live record.

mod writer;

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use contest_common::ContestError;
use serde_json::Value;
use tracing::{info, warn};

use crate::lock::DEFAULT_LOCK_TIMEOUT;
use crate::memory::RecordTable;
use crate::model::{RecordKey, StorageMode};
use crate::traits::RecordStore;
use crate::transaction::{StagedWrite, Transaction};
use writer::JournalWriter;

/// Journal file name inside the data directory
pub const JOURNAL_FILE: &str = "records.journal";

const COMPACT_FILE: &str = "records.journal.tmp";

/// Superseded journal writes tolerated before the journal is compacted on open
pub const DEFAULT_COMPACT_THRESHOLD: usize = 10_000;

struct FileInner {
    table: RecordTable,
    journal: JournalWriter,
}

/// Durable record store backed by an append-only journal
pub struct FileRecordStore {
    inner: Arc<FileInner>,
    path: PathBuf,
}

impl FileRecordStore {
    /// Open (or create) the store in `data_dir`
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self, ContestError> {
        Self::open_with_options(data_dir, DEFAULT_LOCK_TIMEOUT, DEFAULT_COMPACT_THRESHOLD)
    }

    pub fn open_with_options(
        data_dir: impl AsRef<Path>,
        lock_timeout: Duration,
        compact_threshold: usize,
    ) -> Result<Self, ContestError> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir).map_err(|e| {
            ContestError::Storage(format!(
                "failed to create data directory {}: {}",
                data_dir.display(),
                e
            ))
        })?;

        let path = data_dir.join(JOURNAL_FILE);
        let mut file = open_journal(&path)?;

        let table = RecordTable::new(lock_timeout);
        let replayed = replay(&mut file, &table)?;
        let stale = replayed.writes.saturating_sub(table.len());
        info!(
            path = %path.display(),
            entries = replayed.entries,
            records = table.len(),
            stale,
            "Record journal replayed"
        );

        if stale >= compact_threshold {
            drop(file);
            file = compact(data_dir, &path, &table)?;
            info!(path = %path.display(), records = table.len(), "Record journal compacted");
        }

        let journal = JournalWriter::spawn(file, &path)?;
        Ok(Self {
            inner: Arc::new(FileInner { table, journal }),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn open_journal(path: &Path) -> Result<File, ContestError> {
    OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)
        .map_err(|e| ContestError::Storage(format!("failed to open {}: {}", path.display(), e)))
}

fn encode_line(writes: &[StagedWrite]) -> Result<Vec<u8>, ContestError> {
    let mut line = serde_json::to_vec(writes)?;
    line.push(b'\n');
    Ok(line)
}

struct Replayed {
    entries: usize,
    writes: usize,
}

/// Replay the journal into `table`
fn replay(file: &mut File, table: &RecordTable) -> Result<Replayed, ContestError> {
    let mut contents = Vec::new();
    file.seek(SeekFrom::Start(0))?;
    file.read_to_end(&mut contents)?;

    let mut offset = 0usize;
    let mut replayed = Replayed {
        entries: 0,
        writes: 0,
    };
    while offset < contents.len() {
        let rest = &contents[offset..];
        let Some(end) = rest.iter().position(|b| *b == b'\n') else {
            break;
        };
        let line = &rest[..end];
        if !line.is_empty() {
            match serde_json::from_slice::<Vec<StagedWrite>>(line) {
                Ok(batch) => {
                    replayed.writes += batch.len();
                    for write in batch {
                        table.restore(write);
                    }
                    replayed.entries += 1;
                }
                Err(e) if offset + end + 1 < contents.len() => {
                    return Err(ContestError::Storage(format!(
                        "corrupt journal entry at byte {}: {}",
                        offset, e
                    )));
                }
                Err(_) => break,
            }
        }
        offset += end + 1;
    }

    if offset < contents.len() {
        warn!(
            discarded_bytes = contents.len() - offset,
            "Discarding torn journal tail"
        );
        file.set_len(offset as u64)?;
    }
    Ok(replayed)
}

/// Rewrite the journal as one line per live record, then swap it in
fn compact(data_dir: &Path, path: &Path, table: &RecordTable) -> Result<File, ContestError> {
    let tmp_path = data_dir.join(COMPACT_FILE);
    {
        let tmp = File::create(&tmp_path)?;
        let mut out = BufWriter::new(tmp);
        for write in table.snapshot() {
            out.write_all(&encode_line(std::slice::from_ref(&write))?)?;
        }
        let tmp = out
            .into_inner()
            .map_err(|e| ContestError::Storage(format!("compaction flush failed: {}", e)))?;
        tmp.sync_all()?;
    }
    std::fs::rename(&tmp_path, path)?;
    sync_dir(data_dir)?;
    open_journal(path)
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<(), ContestError> {
    File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<(), ContestError> {
    Ok(())
}

#[async_trait]
impl RecordStore for FileRecordStore {
    fn storage_mode(&self) -> StorageMode {
        StorageMode::File
    }

    async fn get(&self, key: &RecordKey) -> Result<Value, ContestError> {
        self.inner.table.get(key).await
    }

    async fn commit(&self, txn: Transaction) -> Result<Vec<Value>, ContestError> {
        let inner = self.inner.clone();
        // Detached, so a dropped caller cannot leave the table behind the journal
        tokio::spawn(async move {
            let journal = &inner.journal;
            inner
                .table
                .commit(txn, |writes: &[StagedWrite]| {
                    let line = encode_line(writes);
                    async move {
                        match line {
                            Ok(line) => journal.append(line).await,
                            Err(e) => Err(e),
                        }
                    }
                })
                .await
        })
        .await
        .map_err(|e| ContestError::Storage(format!("journal commit task failed: {}", e)))?
    }

    async fn scan(
        &self,
        collection: &str,
        prefix: Option<&str>,
    ) -> Result<Vec<(String, Value)>, ContestError> {
        Ok(self.inner.table.scan(collection, prefix))
    }

    async fn count(&self, collection: &str, prefix: Option<&str>) -> Result<usize, ContestError> {
        Ok(self.inner.table.count(collection, prefix))
    }

    async fn health_check(&self) -> anyhow::Result<()> {
        let file = self.inner.journal.file().lock();
        file.metadata()?;
        Ok(())
    }
}
