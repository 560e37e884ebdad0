//! Core data models for inspection missions.

use serde::{Deserialize, Serialize};

use crate::parameters::MissionParameters;

/// A structure to inspect, as loaded from the operator's structure list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StructurePoint {
    pub latitude: f64,
    pub longitude: f64,
    /// Ground elevation relative to the take-off level (meters)
    #[serde(alias = "ground_altitude")]
    pub ground_elevation_m: f64,
    /// Height of the structure above its ground (meters)
    pub structure_height_m: f64,
}

impl StructurePoint {
    pub fn new(latitude: f64, longitude: f64, ground_elevation_m: f64, structure_height_m: f64) -> Self {
        Self {
            latitude,
            longitude,
            ground_elevation_m,
            structure_height_m,
        }
    }

    /// Altitude of the structure top above the take-off level.
    pub fn top_altitude_m(&self) -> f64 {
        self.ground_elevation_m + self.structure_height_m
    }
}

/// A camera position relative to a structure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhotoOffset {
    /// Meters east of the structure center
    pub offset_east_m: f64,
    /// Meters north of the structure center
    pub offset_north_m: f64,
    /// Meters above the structure top
    pub offset_up_m: f64,
    pub gimbal_pitch_deg: f64,
}

impl PhotoOffset {
    pub fn new(offset_east_m: f64, offset_north_m: f64, offset_up_m: f64, gimbal_pitch_deg: f64) -> Self {
        Self {
            offset_east_m,
            offset_north_m,
            offset_up_m,
            gimbal_pitch_deg,
        }
    }
}

/// A horizontal position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Aircraft position as reported by the flight link.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AircraftPosition {
    pub lat: f64,
    pub lon: f64,
    pub altitude_m: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaypointKind {
    /// Repositioning leg at safety altitude (home → first structure, return home)
    Transit,
    /// Directly above a structure at inspection clearance
    Inspection,
    /// Camera position that captures a photo
    Photo,
    /// Climb-out / approach pair between two structures
    Safety,
}

/// Action executed by the aircraft on arrival at a waypoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "param", rename_all = "snake_case")]
pub enum WaypointAction {
    GimbalPitch(i32),
    StartTakePhoto,
}

/// One entry of a compiled waypoint plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedWaypoint {
    pub lat: f64,
    pub lon: f64,
    pub altitude_m: f64,
    pub heading_deg: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gimbal_pitch_deg: Option<f64>,
    pub is_photo_capture: bool,
    pub kind: WaypointKind,
    /// 0-based index of the structure this waypoint belongs to
    pub structure_index: usize,
    /// 0-based photo offset index, only set on photo waypoints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_index: Option<usize>,
    #[serde(default)]
    pub actions: Vec<WaypointAction>,
}

impl PlannedWaypoint {
    pub(crate) fn transit(kind: WaypointKind, lat: f64, lon: f64, altitude_m: f64, structure_index: usize) -> Self {
        Self {
            lat,
            lon,
            altitude_m,
            heading_deg: 0.0,
            gimbal_pitch_deg: None,
            is_photo_capture: false,
            kind,
            structure_index,
            photo_index: None,
            actions: Vec::new(),
        }
    }
}

/// Ordered waypoint plan for a complete inspection run.
///
/// Built once by [`crate::planner::build_plan`] and never mutated afterwards;
/// a new build replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaypointPlan {
    pub waypoints: Vec<PlannedWaypoint>,
    /// Plan positions of the photo waypoints, in capture order
    pub photo_waypoint_indices: Vec<usize>,
    pub structure_count: usize,
    pub offsets_per_structure: usize,
    pub parameters: MissionParameters,
}

impl WaypointPlan {
    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PlannedWaypoint> {
        self.waypoints.get(index)
    }

    pub fn photo_count(&self) -> usize {
        self.photo_waypoint_indices.len()
    }

    pub fn is_photo_waypoint(&self, index: usize) -> bool {
        self.photo_waypoint_indices.binary_search(&index).is_ok()
    }

    /// `(structure_index, photo_index)` of a photo waypoint.
    pub fn photo_position(&self, index: usize) -> Option<(usize, usize)> {
        let waypoint = self.waypoints.get(index)?;
        if !waypoint.is_photo_capture {
            return None;
        }
        waypoint.photo_index.map(|photo| (waypoint.structure_index, photo))
    }

    /// Latest photo waypoint at or before `index`.
    pub fn last_photo_at_or_before(&self, index: usize) -> Option<usize> {
        match self.photo_waypoint_indices.binary_search(&index) {
            Ok(pos) => Some(self.photo_waypoint_indices[pos]),
            Err(0) => None,
            Err(pos) => Some(self.photo_waypoint_indices[pos - 1]),
        }
    }

    pub fn safety_waypoint_count(&self) -> usize {
        self.waypoints
            .iter()
            .filter(|wp| wp.kind == WaypointKind::Safety)
            .count()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}
