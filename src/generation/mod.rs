//! Trajectory generation from an observed prefix.
//!
//! - [`orchestrator::Generator`] -- validates the prefix, calls the
//!   [`Sampler`](crate::model::Sampler), denormalizes and writes the result.
//! - [`orchestrator::SceneScale`] -- the per-run scene extent used for
//!   denormalization.
//! - [`report::GenerationReport`] -- JSON record of what produced an output.

pub mod orchestrator;
pub mod report;

pub use orchestrator::{
    observation_loader, report_path, write_trajectory, GenerationRun, Generator, SceneScale,
};
pub use report::GenerationReport;
