//! Caller identity
//!
//! Identities are opaque tokens handed in by an external authentication
//! collaborator. The core compares them for equality and never inspects
//! their cryptographic meaning.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ContestError;

/// Longest accepted identity token, in characters
pub const IDENTITY_MAX_LEN: usize = 128;

/// An already-verified contestant or voter identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(token: impl Into<String>) -> Result<Self, ContestError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(ContestError::InvalidArgument(
                "identity must not be blank".to_string(),
            ));
        }
        if token.chars().count() > IDENTITY_MAX_LEN {
            return Err(ContestError::InvalidArgument(format!(
                "identity exceeds {} characters",
                IDENTITY_MAX_LEN
            )));
        }
        Ok(Self(token))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for Identity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Identity {
    type Err = ContestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Identity::new(s)
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
