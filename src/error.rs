//! Error types for the trajectory pipeline.
//!
//! Every variant carries enough context (file path, dataset index, lengths)
//! to diagnose the failure without re-running. Nothing in the pipeline
//! retries; callers decide whether an error aborts a single file or the run.

use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias used throughout the core modules.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Which coordinate axis a normalization error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::X => write!(f, "x"),
            Self::Y => write!(f, "y"),
        }
    }
}

/// Errors raised by normalization, batch loading and generation.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A source or canonical file is missing expected columns or holds
    /// unparsable values.
    #[error("malformed source {}: {reason}", path.display())]
    MalformedSource { path: PathBuf, reason: String },

    /// An axis has a non-positive maximum, so it cannot be scaled to 1.0.
    #[error("cannot normalize {axis} in {}: axis maximum is {max}", path.display())]
    DivisionByZero { path: PathBuf, axis: Axis, max: f64 },

    /// A dataset has fewer frames than one sequence window needs.
    #[error(
        "dataset {dataset} ({}) has {frames} frames, fewer than seq_length {seq_length}",
        path.display()
    )]
    InsufficientData {
        dataset: usize,
        path: PathBuf,
        frames: usize,
        seq_length: usize,
    },

    /// The observed prefix or the model output has the wrong length.
    #[error("model shape mismatch in {what}: expected {expected} steps, got {actual}")]
    ModelShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// No agent is present for the whole window chosen for generation.
    #[error("no agent persists through window starting at frame offset {start} of dataset {dataset}")]
    EmptyWindow { dataset: usize, start: usize },

    /// The requested agent is not present throughout the window.
    #[error("agent {agent_id} is not present throughout the window of dataset {dataset}")]
    UnknownAgent { dataset: usize, agent_id: u32 },

    /// The external sequence model failed.
    #[error("sequence model failed: {reason}")]
    Model { reason: String },

    /// The run configuration is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub(crate) fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MalformedSource {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_context() {
        let err = PipelineError::DivisionByZero {
            path: PathBuf::from("data/fish/a/original.csv"),
            axis: Axis::Y,
            max: 0.0,
        };
        let msg = err.to_string();
        assert!(msg.contains("data/fish/a/original.csv"));
        assert!(msg.contains("normalize y"));

        let err = PipelineError::InsufficientData {
            dataset: 2,
            path: PathBuf::from("pixel_pos.csv"),
            frames: 3,
            seq_length: 5,
        };
        let msg = err.to_string();
        assert!(msg.contains("dataset 2"));
        assert!(msg.contains("3 frames"));
    }

    #[test]
    fn test_io_error_exposes_source() {
        use std::error::Error as _;
        let err = PipelineError::io(
            "missing.csv",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.source().is_some());
    }
}
