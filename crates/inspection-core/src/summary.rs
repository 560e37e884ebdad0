//! Plan statistics and progress reporting for the operator display.

use serde::{Deserialize, Serialize};

use crate::models::{WaypointKind, WaypointPlan};
use crate::spatial::distance_3d;

/// Aggregate figures for a compiled plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub total_waypoints: usize,
    pub photo_waypoints: usize,
    pub safety_waypoints: usize,
    pub structures: usize,
    pub offsets_per_structure: usize,
    pub min_inspection_altitude_m: f64,
    pub max_inspection_altitude_m: f64,
    pub min_transit_altitude_m: f64,
    pub max_transit_altitude_m: f64,
    /// Sum of straight legs between consecutive waypoints
    pub path_length_m: f64,
    /// Path length at cruise speed, ignoring hover and photo time
    pub estimated_flight_time_s: f64,
}

impl PlanSummary {
    pub fn from_plan(plan: &WaypointPlan) -> Self {
        let mut inspection = AltitudeRange::default();
        let mut transit = AltitudeRange::default();

        for wp in &plan.waypoints {
            match wp.kind {
                WaypointKind::Inspection => inspection.include(wp.altitude_m),
                WaypointKind::Transit | WaypointKind::Safety => transit.include(wp.altitude_m),
                WaypointKind::Photo => {}
            }
        }

        let path_length_m: f64 = plan
            .waypoints
            .windows(2)
            .map(|pair| {
                distance_3d(
                    pair[0].lat,
                    pair[0].lon,
                    pair[0].altitude_m,
                    pair[1].lat,
                    pair[1].lon,
                    pair[1].altitude_m,
                )
            })
            .sum();

        let speed = plan.parameters.auto_flight_speed_mps;
        let estimated_flight_time_s = if speed > 0.0 { path_length_m / speed } else { 0.0 };

        Self {
            total_waypoints: plan.len(),
            photo_waypoints: plan.photo_count(),
            safety_waypoints: plan.safety_waypoint_count(),
            structures: plan.structure_count,
            offsets_per_structure: plan.offsets_per_structure,
            min_inspection_altitude_m: inspection.min_or_zero(),
            max_inspection_altitude_m: inspection.max_or_zero(),
            min_transit_altitude_m: transit.min_or_zero(),
            max_transit_altitude_m: transit.max_or_zero(),
            path_length_m,
            estimated_flight_time_s,
        }
    }
}

#[derive(Debug, Default)]
struct AltitudeRange {
    bounds: Option<(f64, f64)>,
}

impl AltitudeRange {
    fn include(&mut self, altitude_m: f64) {
        self.bounds = Some(match self.bounds {
            Some((lo, hi)) => (lo.min(altitude_m), hi.max(altitude_m)),
            None => (altitude_m, altitude_m),
        });
    }

    fn min_or_zero(&self) -> f64 {
        self.bounds.map(|(lo, _)| lo).unwrap_or(0.0)
    }

    fn max_or_zero(&self) -> f64 {
        self.bounds.map(|(_, hi)| hi).unwrap_or(0.0)
    }
}

/// Where the mission stands relative to the photo list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionProgress {
    pub waypoint_index: usize,
    pub total_waypoints: usize,
    /// 0-based structure of the latest photo waypoint reached
    pub structure_index: Option<usize>,
    /// 0-based photo offset of the latest photo waypoint reached
    pub photo_index: Option<usize>,
    pub completed_photos: usize,
    pub total_photos: usize,
    pub percent: u8,
}

impl MissionProgress {
    /// Progress when the aircraft is heading for plan position `waypoint_index`.
    ///
    /// Photos before the current photo waypoint count as completed.
    pub fn at(plan: &WaypointPlan, waypoint_index: usize) -> Self {
        let total_photos = plan.photo_count();
        let latest = plan
            .last_photo_at_or_before(waypoint_index)
            .and_then(|index| plan.photo_position(index));

        let completed_photos = match latest {
            Some((structure, photo)) => structure * plan.offsets_per_structure + photo,
            None => 0,
        };
        let percent = if total_photos > 0 {
            (completed_photos * 100 / total_photos) as u8
        } else {
            0
        };

        Self {
            waypoint_index,
            total_waypoints: plan.len(),
            structure_index: latest.map(|(structure, _)| structure),
            photo_index: latest.map(|(_, photo)| photo),
            completed_photos,
            total_photos,
            percent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GeoPoint, PhotoOffset, StructurePoint};
    use crate::parameters::MissionParameters;
    use crate::planner::build_plan;

    fn plan() -> WaypointPlan {
        let structures = vec![
            StructurePoint::new(-23.5505, -46.6333, 0.0, 10.0),
            StructurePoint::new(-23.5515, -46.6333, 4.0, 20.0),
        ];
        let offsets = vec![
            PhotoOffset::new(5.0, 0.0, 0.0, -30.0),
            PhotoOffset::new(0.0, 5.0, 0.0, -30.0),
            PhotoOffset::new(-5.0, 0.0, 2.0, -45.0),
        ];
        let params = MissionParameters {
            safety_clearance_m: 5.0,
            ..MissionParameters::default()
        };
        build_plan(&structures, &offsets, GeoPoint::new(-23.5500, -46.6333), &params).unwrap()
    }

    #[test]
    fn summary_counts_and_altitudes() {
        let summary = PlanSummary::from_plan(&plan());

        assert_eq!(summary.total_waypoints, 12);
        assert_eq!(summary.photo_waypoints, 6);
        assert_eq!(summary.safety_waypoints, 2);
        assert_eq!(summary.min_inspection_altitude_m, 15.0);
        assert_eq!(summary.max_inspection_altitude_m, 29.0);
        assert_eq!(summary.min_transit_altitude_m, 25.0);
        assert_eq!(summary.max_transit_altitude_m, 25.0);
        assert!(summary.path_length_m > 0.0);
        assert!((summary.estimated_flight_time_s - summary.path_length_m / 5.0).abs() < 1e-9);
    }

    #[test]
    fn progress_before_first_photo_is_zero() {
        let progress = MissionProgress::at(&plan(), 1);
        assert_eq!(progress.structure_index, None);
        assert_eq!(progress.completed_photos, 0);
        assert_eq!(progress.percent, 0);
    }

    #[test]
    fn progress_tracks_structure_and_photo() {
        let plan = plan();

        let progress = MissionProgress::at(&plan, 10);
        assert_eq!(progress.structure_index, Some(1));
        assert_eq!(progress.photo_index, Some(1));
        assert_eq!(progress.completed_photos, 4);
        assert_eq!(progress.percent, 66);

        // Safety legs keep the last photo of the previous structure.
        let progress = MissionProgress::at(&plan, 7);
        assert_eq!(progress.structure_index, Some(0));
        assert_eq!(progress.photo_index, Some(2));
    }
}
