//! Inspection mission supervisor
//!
//! Drives a waypoint inspection flight through the flight and media links:
//! uploads the plan, pauses at photo waypoints so the operator can check the
//! captured photo, retrieves that photo from the camera and resumes or aborts
//! on the operator's decision.

pub mod config;
pub mod error;
pub mod fetch;
pub mod gate;
pub mod handle;
pub mod loops;
pub mod orchestrator;
pub mod presenter;
pub mod state;

pub use config::MissionConfig;
pub use error::{FetchError, MissionError};
pub use fetch::{FetchOutcome, FetchPolicy, FetchProgress, PhotoFetchAttempt, PhotoFetchCoordinator};
pub use gate::{GateDecision, GateInput, PhotoReviewGate, ReviewTimer};
pub use handle::{FlightEventSink, MissionHandle};
pub use loops::{spawn_control_loop, MissionLinks, MissionRuntime};
pub use orchestrator::{Effect, LinkRequest, MissionOrchestrator, Notification};
pub use presenter::{FetchFailureDecision, LogPresenter, Presenter, ReviewDecision};
pub use state::{MissionPhase, MissionRunState, MissionSnapshot};
