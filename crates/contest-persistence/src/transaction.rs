//! Multi-key write transactions
//!
//! A transaction is an ordered list of creates and updates over distinct
//! keys. Backends lock every key, stage every operation against the current
//! state, and apply the staged writes only when all of them succeeded.

use std::collections::HashSet;
use std::fmt::{Debug, Formatter};

use contest_common::ContestError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{Record, RecordKey, StoredRecord};

/// Transformation applied to the current body of a record under its lock
pub type Mutator = Box<dyn FnOnce(Value) -> Result<Value, ContestError> + Send>;

/// Wrap a typed closure as a [`Mutator`]
pub fn typed_mutator<R, F>(f: F) -> Mutator
where
    R: Record,
    F: FnOnce(&mut R) -> Result<(), ContestError> + Send + 'static,
{
    Box::new(move |value| {
        let mut record: R = serde_json::from_value(value)?;
        f(&mut record)?;
        Ok(serde_json::to_value(record)?)
    })
}

pub enum WriteOp {
    /// Insert if absent, `AlreadyExists` otherwise
    Create { key: RecordKey, value: Value },
    /// Read-modify-write, `NotFound` if absent
    Update { key: RecordKey, mutator: Mutator },
}

impl WriteOp {
    pub fn key(&self) -> &RecordKey {
        match self {
            WriteOp::Create { key, .. } => key,
            WriteOp::Update { key, .. } => key,
        }
    }
}

impl Debug for WriteOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteOp::Create { key, .. } => write!(f, "Create({})", key),
            WriteOp::Update { key, .. } => write!(f, "Update({})", key),
        }
    }
}

#[derive(Debug, Default)]
pub struct Transaction {
    ops: Vec<WriteOp>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(mut self, key: RecordKey, value: Value) -> Self {
        self.ops.push(WriteOp::Create { key, value });
        self
    }

    pub fn update<F>(self, key: RecordKey, mutator: F) -> Self
    where
        F: FnOnce(Value) -> Result<Value, ContestError> + Send + 'static,
    {
        self.update_boxed(key, Box::new(mutator))
    }

    pub fn update_boxed(mut self, key: RecordKey, mutator: Mutator) -> Self {
        self.ops.push(WriteOp::Update { key, mutator });
        self
    }

    pub fn create_record<R: Record>(self, id: &str, record: &R) -> Result<Self, ContestError> {
        let value = serde_json::to_value(record)?;
        Ok(self.create(R::key(id), value))
    }

    pub fn update_record<R, F>(self, id: &str, f: F) -> Self
    where
        R: Record,
        F: FnOnce(&mut R) -> Result<(), ContestError> + Send + 'static,
    {
        self.update_boxed(R::key(id), typed_mutator::<R, F>(f))
    }

    pub fn keys(&self) -> Vec<RecordKey> {
        self.ops.iter().map(|op| op.key().clone()).collect()
    }

    /// Reject empty transactions and transactions touching a key twice
    pub fn validate(&self) -> Result<(), ContestError> {
        if self.ops.is_empty() {
            return Err(ContestError::InvalidArgument(
                "transaction has no operations".to_string(),
            ));
        }
        let mut seen = HashSet::with_capacity(self.ops.len());
        for op in &self.ops {
            if !seen.insert(op.key()) {
                return Err(ContestError::InvalidArgument(format!(
                    "transaction touches '{}' more than once",
                    op.key()
                )));
            }
        }
        Ok(())
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

/// A write that passed staging, ready to be applied
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StagedWrite {
    pub key: RecordKey,
    pub record: StoredRecord,
}

/// Stage every operation against the state visible through `read`.
///
/// The first failing operation aborts the whole transaction; nothing is
/// returned for partial application. `next_seq` is only called for creates.
pub fn stage<R, S>(
    ops: Vec<WriteOp>,
    mut read: R,
    mut next_seq: S,
) -> Result<Vec<StagedWrite>, ContestError>
where
    R: FnMut(&RecordKey) -> Result<Option<StoredRecord>, ContestError>,
    S: FnMut() -> u64,
{
    let mut staged = Vec::with_capacity(ops.len());
    for op in ops {
        match op {
            WriteOp::Create { key, value } => {
                if read(&key)?.is_some() {
                    return Err(ContestError::AlreadyExists(key.to_string()));
                }
                staged.push(StagedWrite {
                    key,
                    record: StoredRecord {
                        seq: next_seq(),
                        value,
                    },
                });
            }
            WriteOp::Update { key, mutator } => {
                let current = read(&key)?.ok_or_else(|| ContestError::NotFound(key.to_string()))?;
                let value = mutator(current.value)?;
                staged.push(StagedWrite {
                    key,
                    record: StoredRecord {
                        seq: current.seq,
                        value,
                    },
                });
            }
        }
    }
    Ok(staged)
}
