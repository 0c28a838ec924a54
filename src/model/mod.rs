//! Sequence model abstractions used by the generation step.
//!
//! This module provides:
//! - [`sampler::Sampler`] -- the contract every model implements: extend an
//!   observed trajectory by `n` steps in normalized coordinates.
//! - [`http::HttpSampler`] -- a client for a trained model served over HTTP.
//! - [`baseline::BaselineSampler`] -- a constant-velocity stand-in that needs
//!   no trained weights.
//! - [`sampler::AnySampler`] -- enum dispatch for runtime model selection.

pub mod baseline;
pub mod http;
pub mod sampler;

pub use baseline::BaselineSampler;
pub use http::HttpSampler;
pub use sampler::{AnySampler, Sampler};
