//! Domain-neutral model types for the record store

use std::fmt::{Display, Formatter};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A typed record that lives in one collection of the store
pub trait Record: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Collection (column family) holding records of this type
    const COLLECTION: &'static str;

    fn key(id: &str) -> RecordKey {
        RecordKey::new(Self::COLLECTION, id)
    }
}

/// Address of a record: collection plus id within it
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    pub collection: String,
    pub id: String,
}

impl RecordKey {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

impl Display for RecordKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// Record body as persisted, tagged with its creation sequence number.
///
/// `seq` is assigned once on create and carried unchanged through updates,
/// which gives every backend the same creation order for scans.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub seq: u64,
    pub value: serde_json::Value,
}

/// Storage backend type
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    /// Process-local maps, nothing survives a restart
    Memory,
    /// Append-only journal file replayed on open
    #[default]
    File,
    /// RocksDB column families
    Embedded,
}

impl Display for StorageMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageMode::Memory => write!(f, "memory"),
            StorageMode::File => write!(f, "file"),
            StorageMode::Embedded => write!(f, "embedded"),
        }
    }
}

impl std::str::FromStr for StorageMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(StorageMode::Memory),
            "file" => Ok(StorageMode::File),
            "embedded" => Ok(StorageMode::Embedded),
            _ => Err(format!("Invalid storage mode: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_mode_display() {
        assert_eq!(StorageMode::Memory.to_string(), "memory");
        assert_eq!(StorageMode::File.to_string(), "file");
        assert_eq!(StorageMode::Embedded.to_string(), "embedded");
    }

    #[test]
    fn test_storage_mode_from_str() {
        assert_eq!("memory".parse::<StorageMode>().unwrap(), StorageMode::Memory);
        assert_eq!("embedded".parse::<StorageMode>().unwrap(), StorageMode::Embedded);
        assert!("sqlite".parse::<StorageMode>().is_err());
    }

    #[test]
    fn test_record_key_display() {
        let key = RecordKey::new("submissions", "abc");
        assert_eq!(key.to_string(), "submissions/abc");
    }
}
