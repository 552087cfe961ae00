//! Utility functions shared by the contest crates

use std::sync::LazyLock;

/// Regex pattern for validating record identifiers
static VALID_PATTERN: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new("^[a-zA-Z0-9_.:-]*$").expect("Invalid regex pattern"));

/// Validate a string contains only allowed characters
///
/// Allowed characters: alphanumeric, underscore, dot, colon, hyphen
///
/// # Examples
///
/// ```
/// use contest_common::is_valid;
///
/// assert!(is_valid("3f2a9c1e"));
/// assert!(is_valid("bach_chaconne:v1"));
/// assert!(!is_valid("a@@b"));
/// assert!(!is_valid("with spaces"));
/// ```
pub fn is_valid(str: &str) -> bool {
    VALID_PATTERN.is_match(str)
}

/// Current wall-clock time in unix milliseconds
pub fn current_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
