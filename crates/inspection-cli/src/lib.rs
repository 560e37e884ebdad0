//! Inspection CLI - operator tools for inspection missions.
//!
//! - plan_summary: compile a plan from JSON inputs and print its summary
//! - fly_inspection: fly a full inspection against the simulated aircraft

pub mod console;
pub mod input;
pub mod operator;
pub mod sim;

pub use console::{ConsolePresenter, OperatorPrompt};
pub use operator::{AutoOperator, OperatorAction};
