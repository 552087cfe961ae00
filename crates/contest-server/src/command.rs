//! Dispatch of parsed commands onto the contest service

use contest_common::{ContestResult, Identity};
use contest_core::ContestService;
use serde::Serialize;
use serde_json::{Value, json};

use crate::cli::Command;

fn to_json(value: impl Serialize) -> ContestResult<Value> {
    Ok(serde_json::to_value(value)?)
}

/// Run `command` and return its result as JSON
pub async fn execute(service: &ContestService, command: &Command) -> ContestResult<Value> {
    match command {
        Command::Create {
            contestant,
            title,
            media_ref,
            id,
        } => {
            let contestant = Identity::new(contestant.as_str())?;
            match id {
                Some(id) => to_json(
                    service
                        .create_submission_with_id(id, title, media_ref, &contestant)
                        .await?,
                ),
                None => {
                    let id = service
                        .create_submission(title, media_ref, &contestant)
                        .await?;
                    to_json(service.get_submission(&id).await?)
                }
            }
        }
        Command::Update {
            id,
            caller,
            title,
            media_ref,
        } => {
            let caller = Identity::new(caller.as_str())?;
            to_json(
                service
                    .update_submission(id, &caller, title, media_ref)
                    .await?,
            )
        }
        Command::Vote { id, voter } => {
            let voter = Identity::new(voter.as_str())?;
            to_json(service.vote(id, &voter).await?)
        }
        Command::Get { id } => to_json(service.get_submission(id).await?),
        Command::List => to_json(service.list_submissions().await?),
        Command::Voted { id, voter } => {
            let voter = Identity::new(voter.as_str())?;
            let voted = service.has_voted(id, &voter).await?;
            Ok(json!({ "submissionId": id, "voter": voter, "voted": voted }))
        }
        Command::Receipts { id } => to_json(service.receipts(id).await?),
        Command::Audit { id } => to_json(service.audit_submission(id).await?),
        Command::Stats => to_json(service.stats().await?),
    }
}
