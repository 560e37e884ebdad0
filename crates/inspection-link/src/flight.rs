//! Waypoint mission control on the aircraft.

use async_trait::async_trait;
use inspection_core::{AircraftPosition, GeoPoint, WaypointPlan};
use serde::{Deserialize, Serialize};

use crate::error::LinkError;

/// Mission state as reported by the aircraft's mission operator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkMissionState {
    #[default]
    Unknown,
    Disconnected,
    ReadyToUpload,
    Uploading,
    ReadyToExecute,
    Executing,
    ExecutionPaused,
}

/// Progress update emitted while a mission is executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionProgress {
    pub target_waypoint_index: usize,
    /// Set when the aircraft reports arrival at the target waypoint
    pub reached: bool,
    pub state: LinkMissionState,
    pub total_waypoints: usize,
}

/// Events pushed by the flight link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FlightEvent {
    Execution(ExecutionProgress),
    /// Terminal event for the running mission; `error` is set on failure
    Finished { error: Option<String> },
    HomeLocation(GeoPoint),
    Position(AircraftPosition),
}

/// Mission-execution service on the aircraft.
///
/// Every call resolves once the aircraft acknowledges or rejects the request.
/// Implementations deliver [`FlightEvent`]s separately.
#[async_trait]
pub trait FlightLink: Send + Sync {
    async fn load_mission(&self, plan: &WaypointPlan) -> Result<(), LinkError>;

    async fn upload_mission(&self) -> Result<(), LinkError>;

    async fn start_mission(&self) -> Result<(), LinkError>;

    async fn pause_mission(&self) -> Result<(), LinkError>;

    async fn resume_mission(&self) -> Result<(), LinkError>;

    async fn stop_mission(&self) -> Result<(), LinkError>;

    async fn set_return_home_altitude(&self, altitude_m: f64) -> Result<(), LinkError>;

    async fn start_go_home(&self) -> Result<(), LinkError>;
}
