//! Contest Common - Shared types, errors, and validation
//!
//! This crate provides the foundational types used across all contest components:
//! - Error types and error codes
//! - Caller identities
//! - Field validation policy
//! - Utility functions

pub mod error;
pub mod identity;
pub mod utils;
pub mod validation;

// Re-exports for convenience
pub use error::{ContestError, ErrorCode, ErrorKind, UnauthorizedKind};
pub use identity::Identity;
pub use utils::{current_millis, is_valid};
pub use validation::{ValidationPolicy, validate_submission_id};

/// Result alias used throughout the contest crates
pub type ContestResult<T> = Result<T, ContestError>;
