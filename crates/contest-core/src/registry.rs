//! Submission registry
//!
//! Creates submissions and applies owner-gated title / media edits. The
//! vote tally is never touched here.

use std::sync::Arc;

use contest_common::{
    ContestResult, Identity, ValidationPolicy, current_millis, validate_submission_id,
};
use contest_persistence::{Record, RecordStore, RecordStoreExt};
use tracing::info;

use crate::auth::ensure_owner;
use crate::model::Submission;

pub struct SubmissionRegistry {
    store: Arc<dyn RecordStore>,
    policy: ValidationPolicy,
}

impl SubmissionRegistry {
    pub fn new(store: Arc<dyn RecordStore>, policy: ValidationPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> ValidationPolicy {
        self.policy
    }

    /// Register a submission under `id` with a zero tally
    pub async fn create_submission(
        &self,
        id: &str,
        contestant: &Identity,
        title: &str,
        media_ref: &str,
    ) -> ContestResult<Submission> {
        validate_submission_id(id)?;
        self.policy.check_fields(title, media_ref)?;

        let now = current_millis();
        let submission = Submission {
            id: id.to_string(),
            contestant: contestant.clone(),
            title: title.to_string(),
            media_ref: media_ref.to_string(),
            vote_count: 0,
            created_at: now,
            updated_at: now,
        };
        self.store.create_record(id, &submission).await?;

        info!(
            submission_id = %id,
            contestant = %contestant,
            title = %submission.title,
            media_ref = %submission.media_ref,
            "New submission created"
        );
        Ok(submission)
    }

    /// Replace title and media reference; only the contestant may do this.
    ///
    /// Ownership and bounds are checked inside the record's critical section,
    /// against the state being replaced.
    pub async fn update_submission(
        &self,
        id: &str,
        caller: &Identity,
        new_title: &str,
        new_media_ref: &str,
    ) -> ContestResult<Submission> {
        let caller = caller.clone();
        let title = new_title.to_string();
        let media_ref = new_media_ref.to_string();
        let policy = self.policy;

        let updated: Submission = self
            .store
            .update_record(id, move |submission: &mut Submission| {
                ensure_owner(submission, &caller)?;
                policy.check_fields(&title, &media_ref)?;
                submission.title = title;
                submission.media_ref = media_ref;
                submission.updated_at = current_millis();
                Ok(())
            })
            .await?;

        info!(
            submission_id = %id,
            title = %updated.title,
            media_ref = %updated.media_ref,
            "Submission updated"
        );
        Ok(updated)
    }

    pub async fn get_submission(&self, id: &str) -> ContestResult<Submission> {
        self.store.get_record(id).await
    }

    /// All submissions in creation order
    pub async fn list_submissions(&self) -> ContestResult<Vec<Submission>> {
        self.store.scan_records(None).await
    }

    pub async fn count(&self) -> ContestResult<usize> {
        self.store.count(Submission::COLLECTION, None).await
    }
}
