use thiserror::Error;

/// Errors raised while compiling a waypoint plan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("cannot build a plan from {structures} structure(s) and {offsets} photo offset(s)")]
    EmptyInput { structures: usize, offsets: usize },
}
