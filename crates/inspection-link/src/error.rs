use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Request kinds sent over the flight and media links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkOp {
    LoadMission,
    UploadMission,
    StartMission,
    PauseMission,
    ResumeMission,
    StopMission,
    SetReturnHomeAltitude,
    StartGoHome,
    RefreshFileList,
    FetchThumbnail,
    FetchPreview,
}

impl std::fmt::Display for LinkOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LinkOp::LoadMission => "load mission",
            LinkOp::UploadMission => "upload mission",
            LinkOp::StartMission => "start mission",
            LinkOp::PauseMission => "pause mission",
            LinkOp::ResumeMission => "resume mission",
            LinkOp::StopMission => "stop mission",
            LinkOp::SetReturnHomeAltitude => "set return-home altitude",
            LinkOp::StartGoHome => "start go-home",
            LinkOp::RefreshFileList => "refresh file list",
            LinkOp::FetchThumbnail => "fetch thumbnail",
            LinkOp::FetchPreview => "fetch preview",
        };
        f.write_str(name)
    }
}

/// Failure reported by the aircraft link for a single request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("{op} rejected: {reason}")]
    Rejected { op: LinkOp, reason: String },
    #[error("{op} failed: link unavailable")]
    Unavailable { op: LinkOp },
    #[error("{op} timed out")]
    Timeout { op: LinkOp },
}

impl LinkError {
    pub fn rejected(op: LinkOp, reason: impl Into<String>) -> Self {
        Self::Rejected {
            op,
            reason: reason.into(),
        }
    }

    pub fn op(&self) -> LinkOp {
        match self {
            LinkError::Rejected { op, .. } | LinkError::Unavailable { op } | LinkError::Timeout { op } => *op,
        }
    }
}
