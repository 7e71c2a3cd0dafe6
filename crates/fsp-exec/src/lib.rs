#![deny(missing_docs)]
#![doc = "External command execution, file readiness polling and fixed-column occupancy patching."]

/// Test double for [`CommandRunner`].
#[cfg(any(test, feature = "mock-runner"))]
pub mod mock;
/// Fixed-column occupancy substitution.
pub mod patch;
/// External command execution.
pub mod runner;
/// Bounded readiness polling.
pub mod wait;

#[cfg(any(test, feature = "mock-runner"))]
pub use mock::{RecordedCall, RecordingRunner};
pub use patch::{patch_occupancy, ColumnRange, OccupancyPatchRule, PatchOutcome};
pub use runner::{execution_error, CommandRunner, CommandSpec, CommandSuccess, SystemRunner};
pub use wait::{await_condition, await_file, Readiness, WaitPolicy};
