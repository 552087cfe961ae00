//! Contest records

use contest_common::Identity;
use contest_persistence::Record;
use serde::{Deserialize, Serialize};

/// A contest entry owned by one contestant
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: String,
    pub contestant: Identity,
    pub title: String,
    pub media_ref: String,
    pub vote_count: u64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Record for Submission {
    const COLLECTION: &'static str = "submissions";
}

/// Proof that a voter has voted on a submission; written once, never changed
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteReceipt {
    pub voter: Identity,
    pub submission_id: String,
    pub cast_at: i64,
}

impl Record for VoteReceipt {
    const COLLECTION: &'static str = "vote_receipts";
}

/// Every collection the contest core keeps records in
pub const COLLECTIONS: &[&str] = &[Submission::COLLECTION, VoteReceipt::COLLECTION];

/// Stored tally compared with the receipts actually persisted
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TallyAudit {
    pub submission_id: String,
    pub vote_count: u64,
    pub receipt_count: u64,
    pub consistent: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContestStats {
    pub storage_mode: String,
    pub submissions: u64,
    pub votes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_submission_json_layout() {
        let submission = Submission {
            id: "s1".to_string(),
            contestant: Identity::new("alice").unwrap(),
            title: "Bach Chaconne".to_string(),
            media_ref: "abc123".to_string(),
            vote_count: 0,
            created_at: 1,
            updated_at: 1,
        };
        let value = serde_json::to_value(&submission).unwrap();
        assert_eq!(value["contestant"], json!("alice"));
        assert_eq!(value["mediaRef"], json!("abc123"));
        assert_eq!(value["voteCount"], json!(0));
    }

    #[test]
    fn test_collection_names() {
        assert_eq!(COLLECTIONS, &["submissions", "vote_receipts"]);
        assert_eq!(Submission::key("x").to_string(), "submissions/x");
    }
}
