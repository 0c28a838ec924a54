//! Shoalcast: trajectory dataset pipeline and generation
//!
//! Provides subcommands for each stage:
//!
//! - `preprocess` -- Normalize every raw source into its canonical file
//! - `inspect`    -- Load the datasets and print the windows the loader draws
//! - `generate`   -- Extend an observed trajectory with a sequence model

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use shoalcast::config::{PipelineConfig, SamplerKind};
use shoalcast::dataset::preprocess_all;
use shoalcast::generation::{observation_loader, Generator};
use shoalcast::loader::DataLoader;
use shoalcast::model::AnySampler;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// Shoalcast: trajectory dataset pipeline and generation
#[derive(Parser)]
#[command(name = "shoalcast", version, about)]
struct Cli {
    /// Path to a JSON configuration file (uses defaults if not provided).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize every configured raw source into its canonical file.
    Preprocess,

    /// Load the datasets and print the windows of the next batches.
    Inspect {
        /// Number of batches to draw.
        #[arg(long, default_value_t = 3)]
        batches: usize,
    },

    /// Generate a trajectory from an observed prefix.
    Generate {
        /// Observed length of the trajectory.
        #[arg(long)]
        obs_length: Option<usize>,

        /// Predicted length of the trajectory.
        #[arg(long)]
        pred_length: Option<usize>,

        /// Dataset to take the observed prefix from.
        #[arg(long)]
        dataset: Option<usize>,

        /// Agent whose track is extended.
        #[arg(long)]
        agent: Option<u32>,

        /// Where to write the generated `x,y` file.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Which sequence model to use.
        #[arg(long)]
        sampler: Option<SamplerKind>,
    },
}

// ---------------------------------------------------------------------------
// Entrypoint
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing (reads RUST_LOG env var, defaults to info).
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = PipelineConfig::load(cli.config.as_deref())?;

    if let Commands::Generate {
        obs_length,
        pred_length,
        dataset,
        agent,
        output,
        sampler,
    } = &cli.command
    {
        let generation = &mut config.generation;
        if let Some(v) = obs_length {
            generation.obs_length = *v;
        }
        if let Some(v) = pred_length {
            generation.pred_length = *v;
        }
        if let Some(v) = dataset {
            generation.dataset = *v;
        }
        if agent.is_some() {
            generation.agent_id = *agent;
        }
        if let Some(v) = output {
            generation.output = v.clone();
        }
        if let Some(v) = sampler {
            config.model.sampler = *v;
        }
    }
    config.validate().context("Invalid configuration")?;

    match cli.command {
        Commands::Preprocess => cmd_preprocess(&config),
        Commands::Inspect { batches } => cmd_inspect(&config, batches),
        Commands::Generate { .. } => cmd_generate(&config).await,
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_preprocess(config: &PipelineConfig) -> Result<()> {
    tracing::info!(datasets = config.datasets.len(), "Preprocessing raw sources");

    let report = preprocess_all(&config.datasets);
    for (path, err) in &report.failed {
        tracing::error!(path = %path.display(), error = %err, "Source file failed");
    }
    if !report.is_clean() {
        anyhow::bail!(
            "{} of {} source files failed to normalize",
            report.failed.len(),
            config.datasets.len()
        );
    }
    Ok(())
}

fn cmd_inspect(config: &PipelineConfig, batches: usize) -> Result<()> {
    let mut loader =
        DataLoader::load(&config.datasets, &config.loader).context("Failed to load datasets")?;

    println!("Datasets: {}", loader.num_datasets());
    for i in 0..loader.num_datasets() {
        if let Some(ds) = loader.dataset(i) {
            println!(
                "  [{i}] {path}: {frames} frames, {agents} agents, {windows} windows, \
                 {dups} duplicate records",
                path = ds.path().display(),
                frames = ds.num_frames(),
                agents = ds.agent_ids().len(),
                windows = loader.num_windows(i),
                dups = ds.duplicates(),
            );
        }
    }
    println!();

    for b in 0..batches {
        let batch = loader.next_batch();
        println!("Batch {b}:");
        for w in &batch.inputs {
            println!(
                "  dataset {} start {} frames {}..={} agents {:?}",
                w.dataset,
                w.start,
                w.frames.first().copied().unwrap_or_default(),
                w.frames.last().copied().unwrap_or_default(),
                w.agents,
            );
        }
    }

    Ok(())
}

async fn cmd_generate(config: &PipelineConfig) -> Result<()> {
    tracing::info!(
        obs_length = config.generation.obs_length,
        pred_length = config.generation.pred_length,
        dataset = config.generation.dataset,
        "Starting generation"
    );

    let mut loader = observation_loader(config).context("Failed to prepare observed prefix")?;
    let sampler = AnySampler::from_config(&config.model)?;
    let generator = Generator::new(sampler, config.generation.obs_length);

    let run = generator
        .run(&mut loader, &config.generation)
        .await
        .context("Generation failed")?;

    tracing::info!(
        run = %run.report.id,
        steps = run.trajectory.len(),
        path = %config.generation.output.display(),
        "Generated trajectory saved"
    );
    Ok(())
}
