//! Mission phase and run state owned by the orchestrator.

use inspection_core::MissionProgress;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionPhase {
    #[default]
    Idle,
    PlanReady,
    Uploading,
    Executing,
    PausedManual,
    PausedForReview,
    Finishing,
    Aborting,
    ReturningHome,
    Failed,
}

impl MissionPhase {
    /// Phases in which the aircraft is flying (or about to fly) the plan.
    pub fn is_running(self) -> bool {
        matches!(
            self,
            MissionPhase::Uploading
                | MissionPhase::Executing
                | MissionPhase::PausedManual
                | MissionPhase::PausedForReview
        )
    }

    /// Phases that accept execution-progress events for the inspection plan.
    pub fn accepts_progress(self) -> bool {
        matches!(
            self,
            MissionPhase::Executing | MissionPhase::PausedManual | MissionPhase::PausedForReview
        )
    }
}

impl std::fmt::Display for MissionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MissionPhase::Idle => "idle",
            MissionPhase::PlanReady => "plan ready",
            MissionPhase::Uploading => "uploading",
            MissionPhase::Executing => "executing",
            MissionPhase::PausedManual => "paused",
            MissionPhase::PausedForReview => "paused for photo review",
            MissionPhase::Finishing => "finishing",
            MissionPhase::Aborting => "aborting",
            MissionPhase::ReturningHome => "returning home",
            MissionPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Per-mission supervisory state. Reset wholesale between missions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MissionRunState {
    pub phase: MissionPhase,
    /// Latest target waypoint index reported by the flight link
    pub plan_index_cursor: Option<usize>,
    /// Current fetch attempt number, 0 when no fetch is running
    pub photo_fetch_attempt: u32,
    /// Set from the moment a review is triggered until the mission resumes
    pub is_photo_gate_open: bool,
}

impl MissionRunState {
    /// Clear everything but the phase.
    pub fn reset(&mut self) {
        *self = Self {
            phase: self.phase,
            ..Self::default()
        };
    }
}

/// Read-only view published to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionSnapshot {
    pub mission_id: Option<Uuid>,
    pub phase: MissionPhase,
    pub plan_waypoints: usize,
    pub plan_index_cursor: Option<usize>,
    pub last_handled_photo_waypoint: Option<usize>,
    pub photo_fetch_attempt: u32,
    pub is_photo_gate_open: bool,
    pub progress: Option<MissionProgress>,
    pub last_error: Option<String>,
}

impl Default for MissionSnapshot {
    fn default() -> Self {
        Self {
            mission_id: None,
            phase: MissionPhase::Idle,
            plan_waypoints: 0,
            plan_index_cursor: None,
            last_handled_photo_waypoint: None,
            photo_fetch_attempt: 0,
            is_photo_gate_open: false,
            progress: None,
            last_error: None,
        }
    }
}
