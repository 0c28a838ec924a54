//! Trajectory dataset ingestion.
//!
//! This module provides:
//! - [`table::Table`] -- a small reader for comma-delimited text with a header.
//! - [`normalizer::SourceFormat`] -- the raw layouts the pipeline accepts and
//!   their conversion into [`record::CanonicalRecord`]s.
//! - [`canonical`] -- reading/writing canonical files, the reprocessing cache
//!   and bulk preprocessing of every configured source.
//! - [`record::Dataset`] -- canonical records indexed by frame.

pub mod canonical;
pub mod normalizer;
pub mod record;
pub mod table;

pub use canonical::{
    load_dataset, preprocess_all, read_canonical, write_canonical, CanonicalLayout,
    PreprocessReport,
};
pub use normalizer::{normalize, ColumnNames, RelabelPolicy, SourceFormat};
pub use record::{AgentPosition, CanonicalRecord, Dataset, Point};
