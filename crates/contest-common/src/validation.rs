//! Field bounds for submission records
//!
//! Titles default to at most 50 characters and media references (video ids)
//! to at most 20; both bounds are overridable through configuration.

use serde::{Deserialize, Serialize};

use crate::error::ContestError;
use crate::utils::is_valid;

pub const DEFAULT_TITLE_MAX_LEN: usize = 50;
pub const DEFAULT_MEDIA_REF_MAX_LEN: usize = 20;
pub const SUBMISSION_ID_MAX_LEN: usize = 64;

/// Length policy applied on create and update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationPolicy {
    pub title_max_len: usize,
    pub media_ref_max_len: usize,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            title_max_len: DEFAULT_TITLE_MAX_LEN,
            media_ref_max_len: DEFAULT_MEDIA_REF_MAX_LEN,
        }
    }
}

impl ValidationPolicy {
    pub fn check_title(&self, title: &str) -> Result<(), ContestError> {
        check_bounded("title", title, self.title_max_len)
    }

    pub fn check_media_ref(&self, media_ref: &str) -> Result<(), ContestError> {
        check_bounded("media_ref", media_ref, self.media_ref_max_len)
    }

    /// Check both editable fields of a submission
    pub fn check_fields(&self, title: &str, media_ref: &str) -> Result<(), ContestError> {
        self.check_title(title)?;
        self.check_media_ref(media_ref)
    }
}

fn check_bounded(field: &str, value: &str, max_len: usize) -> Result<(), ContestError> {
    if value.trim().is_empty() {
        return Err(ContestError::InvalidArgument(format!(
            "{} must not be empty",
            field
        )));
    }
    let len = value.chars().count();
    if len > max_len {
        return Err(ContestError::InvalidArgument(format!(
            "{} is {} characters, the limit is {}",
            field, len, max_len
        )));
    }
    Ok(())
}

/// Validate a submission identifier.
///
/// Identifiers are restricted to the [`is_valid`] character set so that keys
/// composed from them cannot collide.
pub fn validate_submission_id(id: &str) -> Result<(), ContestError> {
    if id.is_empty() || id.len() > SUBMISSION_ID_MAX_LEN {
        return Err(ContestError::InvalidArgument(format!(
            "submission id must be 1 to {} characters",
            SUBMISSION_ID_MAX_LEN
        )));
    }
    if !is_valid(id) {
        return Err(ContestError::InvalidArgument(format!(
            "submission id '{}' contains illegal characters",
            id
        )));
    }
    Ok(())
}
