//! Shoalcast: multi-agent trajectory preparation and generation.
//!
//! Turns raw animal-tracking exports into normalized per-agent records,
//! windows them into fixed-length sequences for a sequence model, and drives
//! that model to extend an observed trajectory into a predicted continuation.

pub mod config;
pub mod dataset;
pub mod error;
pub mod generation;
pub mod loader;
pub mod model;

pub use error::{PipelineError, Result};
