//! JSON run report written next to a generated trajectory.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::orchestrator::SceneScale;
use crate::error::{PipelineError, Result};

/// What produced a generated trajectory file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationReport {
    /// Unique run identifier (UUID v4).
    pub id: Uuid,
    /// UTC time the run finished.
    pub created_at: DateTime<Utc>,
    /// Sampler label (`"baseline"`, `"http"`, ...).
    pub sampler: String,
    /// Dataset index the observed prefix came from.
    pub dataset: usize,
    /// Canonical file of that dataset.
    pub source: PathBuf,
    pub agent_id: u32,
    pub obs_length: usize,
    pub pred_length: usize,
    /// Scale the output was denormalized with.
    pub scale: SceneScale,
    pub output: PathBuf,
}

impl GenerationReport {
    /// Total steps in the generated file.
    pub fn total_steps(&self) -> usize {
        self.obs_length + self.pred_length
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).map_err(|e| {
            PipelineError::io(path, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        std::fs::write(path, json).map_err(|e| PipelineError::io(path, e))?;
        tracing::info!(path = %path.display(), run = %self.id, "Saved generation report");
        Ok(())
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        serde_json::from_str(&data)
            .map_err(|e| PipelineError::malformed(path, format!("invalid report JSON: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let report = GenerationReport {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            sampler: "http".into(),
            dataset: 3,
            source: PathBuf::from("data/fish/x/pixel_pos.csv"),
            agent_id: 2,
            obs_length: 5,
            pred_length: 1000,
            scale: SceneScale {
                max_x: 775.0,
                max_y: 515.3,
            },
            output: PathBuf::from("save/generated.csv"),
        };
        let path = dir.path().join("report.json");
        report.save_to_file(&path).unwrap();

        let loaded = GenerationReport::load_from_file(&path).unwrap();
        assert_eq!(loaded.id, report.id);
        assert_eq!(loaded.created_at, report.created_at);
        assert_eq!(loaded.total_steps(), 1005);
        assert_eq!(loaded.scale, report.scale);
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            GenerationReport::load_from_file(&path),
            Err(PipelineError::MalformedSource { .. })
        ));
    }
}
