//! Aircraft simulation for exercising the mission supervisor offline.

pub mod aircraft;
pub mod scenarios;

pub use aircraft::{SimConfig, SimulatedAircraft};
pub use scenarios::{demo_offsets, demo_structures};
