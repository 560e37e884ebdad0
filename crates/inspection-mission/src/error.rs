use inspection_core::PlanError;
use inspection_link::{LinkError, LinkOp};
use thiserror::Error;

use crate::state::MissionPhase;

/// Errors surfaced by the mission supervisor.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MissionError {
    #[error(transparent)]
    EmptyInput(#[from] PlanError),
    #[error("link command failed: {source}")]
    LinkCommand {
        op: LinkOp,
        #[source]
        source: LinkError,
    },
    #[error("cannot {action} while {phase}")]
    InvalidTransition {
        phase: MissionPhase,
        action: &'static str,
    },
    #[error("cannot {action}: waiting for the aircraft to answer a previous command")]
    Busy { action: &'static str },
    #[error("event no longer applies to the current mission state")]
    StaleEvent,
    #[error("mission control loop is not running")]
    Stopped,
}

impl From<LinkError> for MissionError {
    fn from(source: LinkError) -> Self {
        MissionError::LinkCommand {
            op: source.op(),
            source,
        }
    }
}

/// Failures inside one photo retrieval cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("no photo newer than the review pause was found")]
    NoCandidatePhoto,
    #[error("thumbnail and preview are both unavailable for {file_name}")]
    ThumbnailUnavailable { file_name: String },
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error("attempt {attempt} exceeded its deadline")]
    AttemptTimedOut { attempt: u32 },
    #[error("photo could not be retrieved after {attempts} attempt(s): {last}")]
    Exhausted { attempts: u32, last: Box<FetchError> },
}
