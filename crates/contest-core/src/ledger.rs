//! Vote ledger
//!
//! A vote is one transaction over two records: the receipt for the
//! (voter, submission) pair is created and the submission tally is bumped by
//! one. The receipt's insert-if-absent is what stops a second vote, and the
//! shared commit is what keeps the tally equal to the number of receipts.

use std::sync::Arc;

use contest_common::{
    ContestError, ContestResult, Identity, current_millis, validate_submission_id,
};
use contest_persistence::{Record, RecordStore, RecordStoreExt, Transaction};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::model::{Submission, TallyAudit, VoteReceipt};

const RECEIPT_KEY_SEPARATOR: &str = "@@";

/// Key of the receipt for `voter` on `submission_id`.
///
/// The voter is hashed so arbitrary identity tokens give fixed-width,
/// separator-free keys; submission ids cannot contain `@`, so every receipt
/// of a submission shares the prefix from [`receipt_prefix`].
pub fn receipt_key(submission_id: &str, voter: &Identity) -> String {
    let digest = Sha256::digest(voter.as_str().as_bytes());
    format!("{}{}", receipt_prefix(submission_id), const_hex::encode(digest))
}

pub fn receipt_prefix(submission_id: &str) -> String {
    format!("{}{}", submission_id, RECEIPT_KEY_SEPARATOR)
}

pub struct VoteLedger {
    store: Arc<dyn RecordStore>,
}

impl VoteLedger {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Cast the one vote `voter` has on `submission_id`
    pub async fn vote(&self, submission_id: &str, voter: &Identity) -> ContestResult<Submission> {
        if validate_submission_id(submission_id).is_err() {
            return Err(ContestError::NotFound(
                Submission::key(submission_id).to_string(),
            ));
        }

        let receipt = VoteReceipt {
            voter: voter.clone(),
            submission_id: submission_id.to_string(),
            cast_at: current_millis(),
        };
        let txn = Transaction::new()
            .create_record(&receipt_key(submission_id, voter), &receipt)?
            .update_record(submission_id, |submission: &mut Submission| {
                submission.vote_count = submission.vote_count.checked_add(1).ok_or_else(|| {
                    ContestError::InvalidArgument("vote count overflow".to_string())
                })?;
                Ok(())
            });

        let mut values = match self.store.commit(txn).await {
            Ok(values) => values,
            // The submission update cannot collide, so this is the receipt
            Err(ContestError::AlreadyExists(_)) => {
                return Err(ContestError::AlreadyVoted {
                    voter: voter.to_string(),
                    submission_id: submission_id.to_string(),
                });
            }
            Err(e) => return Err(e),
        };

        let submission: Submission = match values.pop() {
            Some(value) => serde_json::from_value(value)?,
            None => {
                return Err(ContestError::Storage(format!(
                    "vote commit for '{}' returned no submission",
                    submission_id
                )));
            }
        };

        info!(
            submission_id = %submission_id,
            voter = %voter,
            total_votes = submission.vote_count,
            "Vote successful"
        );
        Ok(submission)
    }

    pub async fn has_voted(&self, submission_id: &str, voter: &Identity) -> ContestResult<bool> {
        self.store
            .exists(&VoteReceipt::key(&receipt_key(submission_id, voter)))
            .await
    }

    /// Number of receipts persisted for `submission_id`
    pub async fn receipt_count(&self, submission_id: &str) -> ContestResult<u64> {
        let count = self
            .store
            .count(VoteReceipt::COLLECTION, Some(&receipt_prefix(submission_id)))
            .await?;
        Ok(count as u64)
    }

    pub async fn receipts(&self, submission_id: &str) -> ContestResult<Vec<VoteReceipt>> {
        self.store
            .scan_records(Some(&receipt_prefix(submission_id)))
            .await
    }

    /// Total receipts across every submission
    pub async fn total_votes(&self) -> ContestResult<u64> {
        let count = self.store.count(VoteReceipt::COLLECTION, None).await?;
        Ok(count as u64)
    }

    /// Compare the stored tally with the receipts on record
    pub async fn audit(&self, submission_id: &str) -> ContestResult<TallyAudit> {
        let submission: Submission = self.store.get_record(submission_id).await?;
        let receipt_count = self.receipt_count(submission_id).await?;
        Ok(TallyAudit {
            submission_id: submission.id,
            vote_count: submission.vote_count,
            receipt_count,
            consistent: submission.vote_count == receipt_count,
        })
    }
}
