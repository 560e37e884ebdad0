//! Presentation-layer contract.

use inspection_link::Photo;
use serde::{Deserialize, Serialize};

use crate::state::MissionPhase;

/// Operator answer to a photo shown for review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Accept,
    Retake,
}

/// Operator answer after photo retrieval gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchFailureDecision {
    RetryFetch,
    SkipAndResume,
}

/// Callbacks invoked from the control loop.
///
/// Implementations must return quickly; operator decisions are sent back
/// through [`crate::MissionHandle`].
pub trait Presenter: Send + Sync {
    fn on_status(&self, text: &str);

    /// `structure_index` and `photo_index` are 0-based.
    fn on_photo_for_review(&self, photo: &Photo, structure_index: usize, photo_index: usize);

    fn on_photo_fetch_failed(&self, reason: &str);

    fn on_phase_changed(&self, phase: MissionPhase);
}

/// Presenter that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPresenter;

impl Presenter for LogPresenter {
    fn on_status(&self, text: &str) {
        tracing::info!(status = text, "Mission status");
    }

    fn on_photo_for_review(&self, photo: &Photo, structure_index: usize, photo_index: usize) {
        tracing::info!(
            file = %photo.file_name,
            structure = structure_index + 1,
            photo = photo_index + 1,
            "Photo ready for review"
        );
    }

    fn on_photo_fetch_failed(&self, reason: &str) {
        tracing::warn!(reason, "Photo retrieval failed");
    }

    fn on_phase_changed(&self, phase: MissionPhase) {
        tracing::info!(%phase, "Mission phase changed");
    }
}
