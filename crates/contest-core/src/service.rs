//! Contest service
//!
//! The operation surface a transport dispatches to. It owns the registry and
//! the ledger over one shared record store.

use std::sync::Arc;

use contest_common::{ContestResult, Identity, ValidationPolicy};
use contest_persistence::{RecordStore, StorageMode};
use uuid::Uuid;

use crate::ledger::VoteLedger;
use crate::model::{ContestStats, Submission, TallyAudit, VoteReceipt};
use crate::registry::SubmissionRegistry;

pub struct ContestService {
    store: Arc<dyn RecordStore>,
    registry: SubmissionRegistry,
    ledger: VoteLedger,
}

impl ContestService {
    pub fn new(store: Arc<dyn RecordStore>, policy: ValidationPolicy) -> Self {
        Self {
            registry: SubmissionRegistry::new(store.clone(), policy),
            ledger: VoteLedger::new(store.clone()),
            store,
        }
    }

    pub fn storage_mode(&self) -> StorageMode {
        self.store.storage_mode()
    }

    pub fn policy(&self) -> ValidationPolicy {
        self.registry.policy()
    }

    /// Register a submission under a freshly generated id and return the id
    pub async fn create_submission(
        &self,
        title: &str,
        media_ref: &str,
        contestant: &Identity,
    ) -> ContestResult<String> {
        let id = Uuid::new_v4().simple().to_string();
        self.registry
            .create_submission(&id, contestant, title, media_ref)
            .await?;
        Ok(id)
    }

    /// Register a submission under a caller-chosen id
    pub async fn create_submission_with_id(
        &self,
        id: &str,
        title: &str,
        media_ref: &str,
        contestant: &Identity,
    ) -> ContestResult<Submission> {
        self.registry
            .create_submission(id, contestant, title, media_ref)
            .await
    }

    pub async fn update_submission(
        &self,
        id: &str,
        caller: &Identity,
        new_title: &str,
        new_media_ref: &str,
    ) -> ContestResult<Submission> {
        self.registry
            .update_submission(id, caller, new_title, new_media_ref)
            .await
    }

    pub async fn vote(&self, submission_id: &str, voter: &Identity) -> ContestResult<Submission> {
        self.ledger.vote(submission_id, voter).await
    }

    pub async fn get_submission(&self, id: &str) -> ContestResult<Submission> {
        self.registry.get_submission(id).await
    }

    /// Every submission in creation order
    pub async fn list_submissions(&self) -> ContestResult<Vec<Submission>> {
        self.registry.list_submissions().await
    }

    pub async fn has_voted(&self, submission_id: &str, voter: &Identity) -> ContestResult<bool> {
        self.ledger.has_voted(submission_id, voter).await
    }

    pub async fn receipts(&self, submission_id: &str) -> ContestResult<Vec<VoteReceipt>> {
        // Surface NotFound for unknown submissions rather than an empty list
        self.registry.get_submission(submission_id).await?;
        self.ledger.receipts(submission_id).await
    }

    pub async fn audit_submission(&self, submission_id: &str) -> ContestResult<TallyAudit> {
        self.ledger.audit(submission_id).await
    }

    pub async fn stats(&self) -> ContestResult<ContestStats> {
        Ok(ContestStats {
            storage_mode: self.storage_mode().to_string(),
            submissions: self.registry.count().await? as u64,
            votes: self.ledger.total_votes().await?,
        })
    }

    pub async fn health_check(&self) -> anyhow::Result<()> {
        self.store.health_check().await
    }
}
