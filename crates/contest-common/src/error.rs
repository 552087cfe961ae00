//! Error types and error codes for the contest core
//!
//! This module defines:
//! - `ContestError`: the typed failure returned by every operation
//! - `ErrorKind`: the flat classification a transport maps to its own status
//! - `ErrorCode`: structured error codes for API responses

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Why a caller was refused a mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnauthorizedKind {
    /// The caller is not the contestant that registered the submission
    NotContestant,
}

impl UnauthorizedKind {
    pub fn as_str(self) -> &'static str {
        match self {
            UnauthorizedKind::NotContestant => "not_contestant",
        }
    }
}

impl Display for UnauthorizedKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            UnauthorizedKind::NotContestant => {
                write!(f, "only the original contestant can update this submission")
            }
        }
    }
}

/// Application-specific error types
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ContestError {
    #[error("'{0}' not found")]
    NotFound(String),

    #[error("'{0}' already exists")]
    AlreadyExists(String),

    #[error("unauthorized: {0}")]
    Unauthorized(UnauthorizedKind),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("'{voter}' already voted for submission '{submission_id}'")]
    AlreadyVoted {
        voter: String,
        submission_id: String,
    },

    #[error("concurrency conflict on '{0}', retry the operation")]
    ConcurrencyConflict(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl ContestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ContestError::NotFound(_) => ErrorKind::NotFound,
            ContestError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            ContestError::Unauthorized(_) => ErrorKind::Unauthorized,
            ContestError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            ContestError::AlreadyVoted { .. } => ErrorKind::AlreadyVoted,
            ContestError::ConcurrencyConflict(_) => ErrorKind::ConcurrencyConflict,
            ContestError::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Error code a transport layer reports for this failure
    pub fn error_code(&self) -> ErrorCode<'static> {
        self.kind().error_code()
    }

    /// Only lock contention is worth retrying; every other failure is final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ContestError::ConcurrencyConflict(_))
    }
}

impl From<serde_json::Error> for ContestError {
    fn from(value: serde_json::Error) -> Self {
        ContestError::Storage(format!("codec error: {}", value))
    }
}

impl From<std::io::Error> for ContestError {
    fn from(value: std::io::Error) -> Self {
        ContestError::Storage(format!("io error: {}", value))
    }
}

/// Flat failure classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    Unauthorized,
    InvalidArgument,
    AlreadyVoted,
    ConcurrencyConflict,
    Storage,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::AlreadyExists => "already_exists",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::AlreadyVoted => "already_voted",
            ErrorKind::ConcurrencyConflict => "concurrency_conflict",
            ErrorKind::Storage => "storage",
        }
    }

    pub fn error_code(self) -> ErrorCode<'static> {
        match self {
            ErrorKind::NotFound => RESOURCE_NOT_FOUND,
            ErrorKind::AlreadyExists => RESOURCE_CONFLICT,
            ErrorKind::Unauthorized => NOT_CONTESTANT,
            ErrorKind::InvalidArgument => PARAMETER_VALIDATE_ERROR,
            ErrorKind::AlreadyVoted => ALREADY_VOTED,
            ErrorKind::ConcurrencyConflict => CONCURRENCY_CONFLICT,
            ErrorKind::Storage => DATA_ACCESS_ERROR,
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error code structure for API responses
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCode<'a> {
    pub code: i32,
    pub message: &'a str,
}

pub const SUCCESS: ErrorCode<'static> = ErrorCode {
    code: 0,
    message: "success",
};

pub const DATA_ACCESS_ERROR: ErrorCode<'static> = ErrorCode {
    code: 10002,
    message: "data access error",
};

pub const PARAMETER_VALIDATE_ERROR: ErrorCode<'static> = ErrorCode {
    code: 20002,
    message: "parameter validate error",
};

pub const RESOURCE_NOT_FOUND: ErrorCode<'static> = ErrorCode {
    code: 20004,
    message: "resource not found",
};

pub const RESOURCE_CONFLICT: ErrorCode<'static> = ErrorCode {
    code: 20005,
    message: "resource conflict",
};

// Kept at 6000, the code existing clients already match on
pub const NOT_CONTESTANT: ErrorCode<'static> = ErrorCode {
    code: 6000,
    message: "Only the original contestant can update this submission.",
};

pub const ALREADY_VOTED: ErrorCode<'static> = ErrorCode {
    code: 24001,
    message: "already voted for this submission",
};

pub const CONCURRENCY_CONFLICT: ErrorCode<'static> = ErrorCode {
    code: 24002,
    message: "concurrent modification, retry",
};
