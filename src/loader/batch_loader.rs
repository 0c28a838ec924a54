//! Multi-source batch loader.
//!
//! The loader owns every dataset of a session together with its iteration
//! state: one frame cursor per dataset and a rotating pointer to the dataset
//! currently being read. [`DataLoader::next_batch`] and
//! [`DataLoader::reset_pointer`] are the only operations that move that
//! state.
//!
//! ```text
//! next_batch (sequential order)
//! ─────────────────────────────────────
//! repeat batch_size times:
//!   d = datasets[pointer]
//!   window = d[cursor[pointer] .. cursor[pointer] + seq_length]
//!   cursor[pointer] += seq_length
//!   if cursor[pointer] > d.frames - seq_length:
//!       cursor[pointer] = 0
//!       pointer = (pointer + 1) % datasets
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use super::window::{Batch, SequenceWindow};
use crate::config::{DatasetConfig, LoaderConfig, WindowOrder};
use crate::dataset::{load_dataset, Dataset};
use crate::error::{PipelineError, Result};

/// Resumable, round-robin windowed iteration over one or more datasets.
#[derive(Debug)]
pub struct DataLoader {
    datasets: Vec<Dataset>,
    batch_size: usize,
    seq_length: usize,
    order: WindowOrder,
    /// Next window start (frame offset) per dataset.
    cursors: Vec<usize>,
    /// Dataset the next window is drawn from.
    pointer: usize,
    rng: StdRng,
}

impl DataLoader {
    /// Load (building canonical files where needed) every dataset in
    /// `datasets` and prepare a loader over them.
    pub fn load(datasets: &[DatasetConfig], config: &LoaderConfig) -> Result<Self> {
        let loaded = datasets
            .iter()
            .map(|d| load_dataset(d, config.force_reprocess))
            .collect::<Result<Vec<_>>>()?;
        Self::from_datasets(loaded, config)
    }

    /// Build a loader over already-loaded datasets.
    ///
    /// Fails with [`PipelineError::InsufficientData`] if any dataset is
    /// shorter than one window.
    pub fn from_datasets(datasets: Vec<Dataset>, config: &LoaderConfig) -> Result<Self> {
        if datasets.is_empty() {
            return Err(PipelineError::Config("loader needs at least one dataset".into()));
        }
        if config.batch_size == 0 {
            return Err(PipelineError::Config("batch_size must be at least 1".into()));
        }
        if config.seq_length < 2 {
            return Err(PipelineError::Config(format!(
                "seq_length must be at least 2, got {}",
                config.seq_length
            )));
        }
        for (i, d) in datasets.iter().enumerate() {
            if d.num_frames() < config.seq_length {
                return Err(PipelineError::InsufficientData {
                    dataset: i,
                    path: d.path().to_path_buf(),
                    frames: d.num_frames(),
                    seq_length: config.seq_length,
                });
            }
        }

        info!(
            datasets = datasets.len(),
            batch_size = config.batch_size,
            seq_length = config.seq_length,
            "Data loader ready"
        );

        Ok(Self {
            cursors: vec![0; datasets.len()],
            datasets,
            batch_size: config.batch_size,
            seq_length: config.seq_length,
            order: config.order,
            pointer: 0,
            rng: StdRng::seed_from_u64(seed_of(config.order)),
        })
    }

    // ------------------------------------------------------------------
    // Iteration
    // ------------------------------------------------------------------

    /// Draw the next `batch_size` windows and split each into its
    /// `(input, target)` pair.
    pub fn next_batch(&mut self) -> Batch {
        let mut batch = Batch::default();
        for _ in 0..self.batch_size {
            let window = self.next_window();
            batch.push(&window);
        }
        batch
    }

    /// Zero every cursor and point back at the first dataset.
    pub fn reset_pointer(&mut self) {
        self.cursors.iter_mut().for_each(|c| *c = 0);
        self.pointer = 0;
        self.rng = StdRng::seed_from_u64(seed_of(self.order));
    }

    fn next_window(&mut self) -> SequenceWindow {
        let d = self.pointer;
        let max_start = self.max_start(d);

        let start = match self.order {
            WindowOrder::Sequential => self.cursors[d],
            WindowOrder::Random { .. } => self.rng.gen_range(0..=max_start),
        };
        let window = SequenceWindow::extract(&self.datasets[d], d, start, self.seq_length);
        debug!(
            dataset = d,
            start,
            agents = window.num_agents(),
            "drew sequence window"
        );

        match self.order {
            WindowOrder::Sequential => {
                let next = start + self.seq_length;
                if next > max_start {
                    self.cursors[d] = 0;
                    self.advance_dataset();
                } else {
                    self.cursors[d] = next;
                }
            }
            WindowOrder::Random { .. } => {
                let p = 1.0 / self.num_windows(d) as f64;
                if self.rng.gen::<f64>() < p {
                    self.advance_dataset();
                }
            }
        }

        window
    }

    fn advance_dataset(&mut self) {
        self.pointer = (self.pointer + 1) % self.datasets.len();
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    pub fn num_datasets(&self) -> usize {
        self.datasets.len()
    }

    pub fn dataset(&self, index: usize) -> Option<&Dataset> {
        self.datasets.get(index)
    }

    /// Next window start of dataset `index` (sequential order).
    pub fn cursor(&self, index: usize) -> Option<usize> {
        self.cursors.get(index).copied()
    }

    /// Dataset the next window will be drawn from.
    pub fn current_dataset(&self) -> usize {
        self.pointer
    }

    /// Non-overlapping windows that fit in dataset `index`.
    pub fn num_windows(&self, index: usize) -> usize {
        self.datasets
            .get(index)
            .map_or(0, |d| d.num_frames() / self.seq_length)
    }

    pub fn seq_length(&self) -> usize {
        self.seq_length
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Last valid window start of dataset `index`.
    fn max_start(&self, index: usize) -> usize {
        self.datasets[index].num_frames() - self.seq_length
    }
}

fn seed_of(order: WindowOrder) -> u64 {
    match order {
        WindowOrder::Sequential => 0,
        WindowOrder::Random { seed } => seed,
    }
}

// ---------------------------------------------------------------------------
// Shared access
// ---------------------------------------------------------------------------

/// A [`DataLoader`] that several callers can draw from.
///
/// Cursor advancement is not idempotent, so every operation holds the
/// loader's lock for its whole duration.
#[derive(Debug, Clone)]
pub struct SharedLoader {
    inner: Arc<Mutex<DataLoader>>,
}

impl SharedLoader {
    pub fn new(loader: DataLoader) -> Self {
        Self {
            inner: Arc::new(Mutex::new(loader)),
        }
    }

    pub fn next_batch(&self) -> Batch {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .next_batch()
    }

    pub fn reset_pointer(&self) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reset_pointer();
    }
}
