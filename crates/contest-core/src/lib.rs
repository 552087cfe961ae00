//! Contest Core - Submission registry and vote ledger
//!
//! This crate provides:
//! - Submission and vote receipt records
//! - Owner-gated submission updates
//! - One-vote-per-voter tallying, with the receipt and the tally committed together
//! - `ContestService`, the operation surface over a shared record store

pub mod auth;
pub mod ledger;
pub mod model;
pub mod registry;
pub mod service;

pub use auth::{ensure_owner, is_owner};
pub use ledger::{VoteLedger, receipt_key, receipt_prefix};
pub use model::{COLLECTIONS, ContestStats, Submission, TallyAudit, VoteReceipt};
pub use registry::SubmissionRegistry;
pub use service::ContestService;
