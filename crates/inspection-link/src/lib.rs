//! Inspection link contracts
//!
//! Traits and value types for the aircraft's asynchronous mission and media
//! services. Concrete links (hardware SDK bridges, simulators, test doubles)
//! implement these and are driven by the mission supervisor.

pub mod error;
pub mod flight;
pub mod media;

pub use error::{LinkError, LinkOp};
pub use flight::{ExecutionProgress, FlightEvent, FlightLink, LinkMissionState};
pub use media::{MediaFileRef, MediaLink, MediaType, Photo, PhotoContent, StorageLocation};
