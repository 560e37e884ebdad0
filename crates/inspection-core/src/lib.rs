pub mod error;
pub mod heading;
pub mod models;
pub mod parameters;
pub mod planner;
pub mod spatial;
pub mod summary;

pub use error::PlanError;
pub use heading::heading_to_structure_center;
pub use models::{
    AircraftPosition, GeoPoint, PhotoOffset, PlannedWaypoint, StructurePoint, WaypointAction,
    WaypointKind, WaypointPlan,
};
pub use parameters::{FinishedAction, HeadingMode, MissionParameters};
pub use planner::{build_plan, build_return_plan};
pub use spatial::haversine_distance;
pub use summary::{MissionProgress, PlanSummary};
