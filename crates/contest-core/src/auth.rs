//! Ownership check for submission mutations

use contest_common::{ContestError, ContestResult, Identity, UnauthorizedKind};

use crate::model::Submission;

/// True when `caller` registered `submission`
pub fn is_owner(submission: &Submission, caller: &Identity) -> bool {
    submission.contestant == *caller
}

pub fn ensure_owner(submission: &Submission, caller: &Identity) -> ContestResult<()> {
    if is_owner(submission, caller) {
        Ok(())
    } else {
        Err(ContestError::Unauthorized(UnauthorizedKind::NotContestant))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(owner: &str) -> Submission {
        Submission {
            id: "s".to_string(),
            contestant: Identity::new(owner).unwrap(),
            title: "t".to_string(),
            media_ref: "m".to_string(),
            vote_count: 3,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_is_owner() {
        let s = submission("alice");
        assert!(is_owner(&s, &Identity::new("alice").unwrap()));
        assert!(!is_owner(&s, &Identity::new("Alice").unwrap()));
        assert!(!is_owner(&s, &Identity::new("bob").unwrap()));
    }

    #[test]
    fn test_ensure_owner() {
        let s = submission("alice");
        assert!(ensure_owner(&s, &Identity::new("alice").unwrap()).is_ok());
        assert_eq!(
            ensure_owner(&s, &Identity::new("bob").unwrap()),
            Err(ContestError::Unauthorized(UnauthorizedKind::NotContestant))
        );
    }
}
