//! Mission-level flight parameters shared by every waypoint of a plan.

use serde::{Deserialize, Serialize};

/// Configuration applied to a whole inspection mission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionParameters {
    /// Cruise speed between waypoints in m/s
    pub auto_flight_speed_mps: f64,
    /// Upper speed bound the aircraft may use in m/s
    pub max_flight_speed_mps: f64,
    /// Altitude used for transit and safety legs in meters
    pub safety_altitude_m: f64,
    /// Extra height above a structure top for inspection waypoints in meters
    pub safety_clearance_m: f64,
    pub finished_action: FinishedAction,
    pub heading_mode: HeadingMode,
    pub gimbal_pitch_rotation_enabled: bool,
}

impl Default for MissionParameters {
    fn default() -> Self {
        Self {
            auto_flight_speed_mps: 5.0,
            max_flight_speed_mps: 10.0,
            safety_altitude_m: 25.0,
            safety_clearance_m: 2.5,
            finished_action: FinishedAction::GoHome,
            heading_mode: HeadingMode::UsingWaypointHeading,
            gimbal_pitch_rotation_enabled: true,
        }
    }
}

/// What the aircraft does after the last waypoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishedAction {
    NoAction,
    #[default]
    GoHome,
    AutoLand,
    GoFirstWaypoint,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadingMode {
    Auto,
    #[default]
    UsingWaypointHeading,
    ControlByRemote,
}
