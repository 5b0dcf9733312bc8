//! Run lifecycle domain
//!
//! Run and step entities with their forward-only state machines.

pub mod entities;
pub mod steps;

pub use entities::{Priority, Run, RunId, RunKind, RunStatus};
pub use steps::{StepName, StepProgress, StepStatus};
