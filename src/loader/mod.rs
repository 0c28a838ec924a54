//! Sequence windowing over canonical datasets.
//!
//! - [`window::SequenceWindow`] / [`window::Batch`] -- the units handed to a
//!   sequence model for training and to the generation step as the observed
//!   prefix.
//! - [`batch_loader::DataLoader`] -- per-dataset cursors plus a round-robin
//!   dataset pointer; [`batch_loader::SharedLoader`] for multi-caller use.

pub mod batch_loader;
pub mod window;

pub use batch_loader::{DataLoader, SharedLoader};
pub use window::{Batch, SequenceWindow};
