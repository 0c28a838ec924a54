use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::dataset::{CanonicalLayout, SourceFormat};
use crate::error::PipelineError;
use crate::generation::SceneScale;

/// Environment variable that supplies the model endpoint when the config
/// leaves `model.base_url` empty.
pub const MODEL_URL_ENV: &str = "SHOALCAST_MODEL_URL";

/// Complete configuration for one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub datasets: Vec<DatasetConfig>,
    pub loader: LoaderConfig,
    pub generation: GenerationConfig,
    pub model: ModelConfig,
}

/// One raw source file and where its canonical form lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Raw tracking export (e.g. `data/fish/<session>/original.csv`).
    pub raw_path: PathBuf,
    /// Canonical four-field file (e.g. `data/fish/<session>/pixel_pos.csv`).
    pub canonical_path: PathBuf,
    /// How to read the raw file.
    pub format: SourceFormat,
    /// On-disk layout of the canonical file.
    #[serde(default)]
    pub layout: CanonicalLayout,
}

impl DatasetConfig {
    /// A dataset stored as `<dir>/original.csv` with its canonical file
    /// alongside as `<dir>/pixel_pos.csv`.
    pub fn in_dir(dir: impl AsRef<Path>, format: SourceFormat) -> Self {
        let dir = dir.as_ref();
        Self {
            raw_path: dir.join("original.csv"),
            canonical_path: dir.join("pixel_pos.csv"),
            format,
            layout: CanonicalLayout::default(),
        }
    }
}

/// Order in which the loader draws sequence windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WindowOrder {
    /// Non-overlapping windows from a per-dataset cursor, round-robin across
    /// datasets.
    #[default]
    Sequential,
    /// Uniformly random window starts; the dataset pointer moves on with
    /// probability `1 / windows_in_dataset` after each window.
    Random { seed: u64 },
}

/// Batch loader configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Sequence windows per batch (default: 1).
    pub batch_size: usize,
    /// Frames per sequence window, including the one-step target shift
    /// (default: 21).
    pub seq_length: usize,
    /// Rebuild canonical files from raw sources even when they exist.
    pub force_reprocess: bool,
    #[serde(default)]
    pub order: WindowOrder,
}

/// Generation run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Observed length of the trajectory (default: 50).
    pub obs_length: usize,
    /// Predicted length of the trajectory (default: 10000).
    pub pred_length: usize,
    /// Index into `datasets` to draw the observed prefix from (default: 0).
    pub dataset: usize,
    /// Agent whose track is extended; `None` picks the lowest id present
    /// throughout the observed window.
    #[serde(default)]
    pub agent_id: Option<u32>,
    /// Physical extent of the scene used to denormalize the output.
    pub scale: SceneScale,
    /// Destination of the generated `x,y` file.
    pub output: PathBuf,
    /// Also write a JSON run report next to the output.
    #[serde(default = "default_true")]
    pub write_report: bool,
}

/// Which sequence model backs generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SamplerKind {
    /// Constant-velocity extrapolation, runs offline.
    Baseline,
    /// Trained model served over HTTP.
    Http,
}

/// External sequence model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub sampler: SamplerKind,
    /// Base URL of the model server (e.g. `http://localhost:8500`).
    pub base_url: String,
    /// Request timeout in seconds; long predictions take a while.
    pub timeout_secs: u64,
    pub baseline: BaselineConfig,
}

/// Parameters of the constant-velocity baseline sampler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineConfig {
    /// Velocity is multiplied by this factor every step (default: 0.98).
    pub damping: f64,
    /// Maximum uniform perturbation added per step, in normalized units
    /// (default: 0.0).
    pub jitter: f64,
    pub seed: u64,
}

fn default_true() -> bool {
    true
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let sessions = [
            "170202_pi11_SOLI_S17_F175_TR",
            "170202_pi11_SOLI_S25_F053_TR",
            "170202_pi11_SOLI_S18_F078_TR",
            "170202_pi11_SOLI_S26_F200_TR",
            "170202_pi11_SOLI_S20_F144_TR",
            "170202_pi11_SOLI_S27_F020_TR",
            "170202_pi11_SOLI_S24_F189_TR",
            "170202_pi11_SOLI_S28_F028_TR",
        ];
        let datasets = sessions
            .iter()
            .map(|s| {
                DatasetConfig::in_dir(
                    Path::new("data/fish").join(s),
                    SourceFormat::SingleAgent {
                        frame_column: Some("frame".into()),
                        x_column: "x".into(),
                        y_column: "y".into(),
                    },
                )
            })
            .collect();

        Self {
            datasets,
            loader: LoaderConfig {
                batch_size: 1,
                seq_length: 21,
                force_reprocess: false,
                order: WindowOrder::Sequential,
            },
            generation: GenerationConfig {
                obs_length: 50,
                pred_length: 10000,
                dataset: 0,
                agent_id: None,
                scale: SceneScale {
                    max_x: 775.0,
                    max_y: 515.3,
                },
                output: PathBuf::from("save/simulated_trajectory.csv"),
                write_report: true,
            },
            model: ModelConfig {
                sampler: SamplerKind::Baseline,
                base_url: String::new(),
                timeout_secs: 600,
                baseline: BaselineConfig {
                    damping: 0.98,
                    jitter: 0.0,
                    seed: 0,
                },
            },
        }
    }
}

impl PipelineConfig {
    /// Read a JSON config file, or fall back to defaults when `path` is `None`.
    ///
    /// An empty `model.base_url` is filled from [`MODEL_URL_ENV`]. The result
    /// is not validated; call [`PipelineConfig::validate`] once any overrides
    /// have been applied.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config from {}", path.display()))?;
                serde_json::from_str::<Self>(&text)
                    .with_context(|| format!("Failed to parse config from {}", path.display()))?
            }
            None => Self::default(),
        };

        if config.model.base_url.is_empty() {
            if let Ok(url) = std::env::var(MODEL_URL_ENV) {
                config.model.base_url = url;
            }
        }

        Ok(config)
    }

    /// Reject configurations no run could succeed with.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.datasets.is_empty() {
            return Err(PipelineError::Config("no datasets configured".into()));
        }
        if self.loader.batch_size == 0 {
            return Err(PipelineError::Config("batch_size must be at least 1".into()));
        }
        if self.loader.seq_length < 2 {
            return Err(PipelineError::Config(format!(
                "seq_length must be at least 2, got {}",
                self.loader.seq_length
            )));
        }
        if self.generation.obs_length == 0 {
            return Err(PipelineError::Config("obs_length must be at least 1".into()));
        }
        if self.generation.dataset >= self.datasets.len() {
            return Err(PipelineError::Config(format!(
                "generation dataset {} out of range ({} configured)",
                self.generation.dataset,
                self.datasets.len()
            )));
        }
        self.generation.scale.validate()?;
        if self.model.sampler == SamplerKind::Http && self.model.base_url.is_empty() {
            return Err(PipelineError::Config(format!(
                "http sampler needs model.base_url or {MODEL_URL_ENV}"
            )));
        }
        Ok(())
    }
}
