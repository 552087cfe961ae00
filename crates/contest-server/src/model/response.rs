//! JSON response envelope printed by every command

use contest_common::ContestError;
use serde::{Deserialize, Serialize};

/// Generic result wrapper for command output
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Result<T> {
    pub code: i32,
    pub message: String,
    pub data: T,
}

impl<T> Result<T> {
    pub fn new(code: i32, message: String, data: T) -> Self {
        Result::<T> {
            code,
            message,
            data,
        }
    }

    pub fn success(data: T) -> Result<T> {
        Result::<T> {
            code: 0,
            message: "success".to_string(),
            data,
        }
    }
}

impl Result<Option<serde_json::Value>> {
    /// Failure envelope carrying the error's code and its detailed message
    pub fn fail(error: &ContestError) -> Self {
        Result::new(error.error_code().code, error.to_string(), None)
    }
}
