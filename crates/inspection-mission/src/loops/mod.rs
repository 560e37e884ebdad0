//! Background tasks driving the mission supervisor.

pub mod control_loop;

pub use control_loop::{spawn_control_loop, MissionLinks, MissionRuntime};
