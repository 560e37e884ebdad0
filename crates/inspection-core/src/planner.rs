//! Compiles structures and photo offsets into a single waypoint plan.
//!
//! Layout of a plan for `n` structures and `m` offsets:
//!
//! ```text
//! [home @ safety] [structure 0 @ safety]
//!   [inspection 0] [photo 0.0 .. photo 0.m-1] [climb-out @ safety] [approach 1 @ safety]
//!   [inspection 1] [photo 1.0 .. photo 1.m-1] ...
//!   [inspection n-1] [photo n-1.0 .. photo n-1.m-1]
//! ```

use crate::error::PlanError;
use crate::heading::heading_to_structure_center;
use crate::models::{
    GeoPoint, PhotoOffset, PlannedWaypoint, StructurePoint, WaypointAction, WaypointKind,
    WaypointPlan,
};
use crate::parameters::MissionParameters;
use crate::spatial::offset_flat;

/// Build the inspection plan.
///
/// `home` is the launch position the first transit waypoint climbs above.
/// Output is a pure function of the inputs.
pub fn build_plan(
    structures: &[StructurePoint],
    offsets: &[PhotoOffset],
    home: GeoPoint,
    parameters: &MissionParameters,
) -> Result<WaypointPlan, PlanError> {
    if structures.is_empty() || offsets.is_empty() {
        return Err(PlanError::EmptyInput {
            structures: structures.len(),
            offsets: offsets.len(),
        });
    }

    let safety_alt = parameters.safety_altitude_m;
    let capacity = 2 + structures.len() * (1 + offsets.len()) + 2 * (structures.len() - 1);
    let mut waypoints = Vec::with_capacity(capacity);
    let mut photo_waypoint_indices = Vec::with_capacity(structures.len() * offsets.len());

    let first = &structures[0];
    waypoints.push(PlannedWaypoint::transit(WaypointKind::Transit, home.lat, home.lon, safety_alt, 0));
    waypoints.push(PlannedWaypoint::transit(
        WaypointKind::Transit,
        first.latitude,
        first.longitude,
        safety_alt,
        0,
    ));

    for (structure_index, structure) in structures.iter().enumerate() {
        waypoints.push(PlannedWaypoint::transit(
            WaypointKind::Inspection,
            structure.latitude,
            structure.longitude,
            structure.top_altitude_m() + parameters.safety_clearance_m,
            structure_index,
        ));

        let mut last_photo = (structure.latitude, structure.longitude);

        for (photo_index, offset) in offsets.iter().enumerate() {
            let (lat, lon) = offset_flat(
                structure.latitude,
                structure.longitude,
                offset.offset_east_m,
                offset.offset_north_m,
            );

            photo_waypoint_indices.push(waypoints.len());
            waypoints.push(PlannedWaypoint {
                lat,
                lon,
                altitude_m: structure.top_altitude_m() + offset.offset_up_m,
                heading_deg: heading_to_structure_center(offset.offset_east_m, offset.offset_north_m),
                gimbal_pitch_deg: Some(offset.gimbal_pitch_deg),
                is_photo_capture: true,
                kind: WaypointKind::Photo,
                structure_index,
                photo_index: Some(photo_index),
                actions: vec![
                    WaypointAction::GimbalPitch(offset.gimbal_pitch_deg.round() as i32),
                    WaypointAction::StartTakePhoto,
                ],
            });
            last_photo = (lat, lon);
        }

        if let Some(next) = structures.get(structure_index + 1) {
            waypoints.push(PlannedWaypoint::transit(
                WaypointKind::Safety,
                last_photo.0,
                last_photo.1,
                safety_alt,
                structure_index,
            ));
            waypoints.push(PlannedWaypoint::transit(
                WaypointKind::Safety,
                next.latitude,
                next.longitude,
                safety_alt,
                structure_index + 1,
            ));
        }
    }

    Ok(WaypointPlan {
        waypoints,
        photo_waypoint_indices,
        structure_count: structures.len(),
        offsets_per_structure: offsets.len(),
        parameters: parameters.clone(),
    })
}

/// Two-waypoint return leg: climb to safety altitude over `from`, then fly
/// to safety altitude over `home`.
pub fn build_return_plan(from: GeoPoint, home: GeoPoint, parameters: &MissionParameters) -> WaypointPlan {
    let safety_alt = parameters.safety_altitude_m;
    WaypointPlan {
        waypoints: vec![
            PlannedWaypoint::transit(WaypointKind::Transit, from.lat, from.lon, safety_alt, 0),
            PlannedWaypoint::transit(WaypointKind::Transit, home.lat, home.lon, safety_alt, 0),
        ],
        photo_waypoint_indices: Vec::new(),
        structure_count: 0,
        offsets_per_structure: 0,
        parameters: MissionParameters {
            finished_action: crate::parameters::FinishedAction::AutoLand,
            ..parameters.clone()
        },
    }
}
