//! Generation orchestration.
//!
//! ```text
//! generate
//! ─────────────────────────────────────
//! 1. Reset the loader and draw one window of obs_length + 1 frames
//! 2. Observed prefix = input half of that window for one agent
//! 3. sampler.sample(prefix, window, pred_length) -> prefix ++ predictions
//! 4. Denormalize by the scene scale
//! 5. Write `x,y` rows (+ JSON run report)
//! ```

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::report::GenerationReport;
use crate::config::{GenerationConfig, LoaderConfig, PipelineConfig, WindowOrder};
use crate::dataset::Point;
use crate::error::{PipelineError, Result};
use crate::loader::{DataLoader, SequenceWindow};
use crate::model::Sampler;

// ---------------------------------------------------------------------------
// Scene scale
// ---------------------------------------------------------------------------

/// Physical (pixel) extent of the recorded scene.
///
/// These are run constants, not recomputed from the normalized data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SceneScale {
    pub max_x: f64,
    pub max_y: f64,
}

impl SceneScale {
    pub fn validate(&self) -> Result<()> {
        let ok = |v: f64| v > 0.0 && v.is_finite();
        if ok(self.max_x) && ok(self.max_y) {
            Ok(())
        } else {
            Err(PipelineError::Config(format!(
                "scene scale must be positive, got ({}, {})",
                self.max_x, self.max_y
            )))
        }
    }

    /// Map normalized positions back to scene units.
    pub fn denormalize(&self, points: &[Point]) -> Vec<Point> {
        points
            .iter()
            .map(|p| Point::new(p.x * self.max_x, p.y * self.max_y))
            .collect()
    }

    /// Map scene positions into normalized units.
    pub fn normalize(&self, points: &[Point]) -> Vec<Point> {
        points
            .iter()
            .map(|p| Point::new(p.x / self.max_x, p.y / self.max_y))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// Result of a full generation run.
#[derive(Debug, Clone)]
pub struct GenerationRun {
    /// Observed prefix followed by predictions, in scene units.
    pub trajectory: Vec<Point>,
    pub report: GenerationReport,
}

/// Drives a [`Sampler`] to extend observed trajectories.
pub struct Generator<S> {
    sampler: S,
    obs_length: usize,
}

impl<S: Sampler> Generator<S> {
    /// `obs_length` is the prefix length the model was configured for.
    pub fn new(sampler: S, obs_length: usize) -> Self {
        Self {
            sampler,
            obs_length,
        }
    }

    pub fn sampler(&self) -> &S {
        &self.sampler
    }

    /// Extend `observed` by `prediction_length` steps.
    ///
    /// Returns the complete normalized trajectory (observed followed by
    /// predicted). Fails with [`PipelineError::ModelShapeMismatch`] when the
    /// prefix is not `obs_length` long or the model returns the wrong number
    /// of steps.
    pub async fn generate(
        &self,
        observed: &[Point],
        reference: &[Point],
        prediction_length: usize,
    ) -> Result<Vec<Point>> {
        if observed.len() != self.obs_length {
            return Err(PipelineError::ModelShapeMismatch {
                what: "observed prefix",
                expected: self.obs_length,
                actual: observed.len(),
            });
        }

        info!(
            sampler = self.sampler.name(),
            observed = observed.len(),
            prediction_length,
            "Generating trajectory"
        );

        let trajectory = self
            .sampler
            .sample(observed, reference, prediction_length)
            .await
            .map_err(|e| PipelineError::Model {
                reason: format!("{e:#}"),
            })?;

        let expected = self.obs_length + prediction_length;
        if trajectory.len() != expected {
            return Err(PipelineError::ModelShapeMismatch {
                what: "model output",
                expected,
                actual: trajectory.len(),
            });
        }
        Ok(trajectory)
    }

    /// Full run: take the observed prefix from the start of the loader's
    /// first dataset, extend it, denormalize, and write the output file (and
    /// report, if enabled).
    pub async fn run(
        &self,
        loader: &mut DataLoader,
        config: &GenerationConfig,
    ) -> Result<GenerationRun> {
        loader.reset_pointer();
        let batch = loader.next_batch();
        let window = batch.inputs.first().ok_or_else(|| {
            PipelineError::Config("loader produced an empty batch".into())
        })?;

        let agent_id = pick_agent(window, config.agent_id)?;
        let reference = window
            .track(agent_id)
            .ok_or(PipelineError::UnknownAgent {
                dataset: window.dataset,
                agent_id,
            })?;
        if reference.len() < self.obs_length {
            return Err(PipelineError::ModelShapeMismatch {
                what: "observed window",
                expected: self.obs_length,
                actual: reference.len(),
            });
        }
        let observed = &reference[..self.obs_length];

        let normalized = self
            .generate(observed, &reference, config.pred_length)
            .await?;
        let trajectory = config.scale.denormalize(&normalized);

        write_trajectory(&config.output, &trajectory)?;

        let source = loader
            .dataset(window.dataset)
            .map(|d| d.path().to_path_buf())
            .unwrap_or_default();
        let report = GenerationReport {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            sampler: self.sampler.name().to_string(),
            dataset: window.dataset,
            source,
            agent_id,
            obs_length: self.obs_length,
            pred_length: config.pred_length,
            scale: config.scale,
            output: config.output.clone(),
        };
        if config.write_report {
            report.save_to_file(report_path(&config.output))?;
        }

        info!(
            path = %config.output.display(),
            steps = trajectory.len(),
            "Data generation complete"
        );
        Ok(GenerationRun { trajectory, report })
    }
}

/// The configured agent, or the lowest id present throughout the window.
fn pick_agent(window: &SequenceWindow, requested: Option<u32>) -> Result<u32> {
    match requested {
        Some(id) if window.agents.binary_search(&id).is_ok() => Ok(id),
        Some(id) => Err(PipelineError::UnknownAgent {
            dataset: window.dataset,
            agent_id: id,
        }),
        None => window.agents.first().copied().ok_or(PipelineError::EmptyWindow {
            dataset: window.dataset,
            start: window.start,
        }),
    }
}

/// A loader over the generation dataset only, yielding single windows of
/// `obs_length + 1` frames so the input half is exactly the observed prefix.
pub fn observation_loader(config: &PipelineConfig) -> Result<DataLoader> {
    let dataset = config
        .datasets
        .get(config.generation.dataset)
        .ok_or_else(|| {
            PipelineError::Config(format!(
                "generation dataset {} out of range",
                config.generation.dataset
            ))
        })?;
    let loader_config = LoaderConfig {
        batch_size: 1,
        seq_length: config.generation.obs_length + 1,
        force_reprocess: config.loader.force_reprocess,
        order: WindowOrder::Sequential,
    };
    DataLoader::load(std::slice::from_ref(dataset), &loader_config)
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Write one `x,y` row per step, no header.
pub fn write_trajectory(path: impl AsRef<Path>, trajectory: &[Point]) -> Result<()> {
    let path = path.as_ref();
    let mut text = String::with_capacity(trajectory.len() * 24);
    for p in trajectory {
        // Writing into a String cannot fail.
        let _ = writeln!(text, "{},{}", p.x, p.y);
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
    }
    std::fs::write(path, text).map_err(|e| PipelineError::io(path, e))
}

/// `save/simulated_trajectory.csv` -> `save/simulated_trajectory.report.json`.
///
/// Never equal to `output`, so a `.json` trajectory is not overwritten.
pub fn report_path(output: &Path) -> PathBuf {
    output.with_extension("report.json")
}
