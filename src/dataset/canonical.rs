//! Canonical file reading, writing and the preprocessing cache.
//!
//! The default on-disk layout matches `pixel_pos.csv`: four lines holding
//! the frame, agent-id, x and y fields of every record, in record order.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::record::{CanonicalRecord, Dataset};
use super::table::split_fields;
use crate::config::DatasetConfig;
use crate::error::{PipelineError, Result};

/// On-disk arrangement of a canonical file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalLayout {
    /// Four lines, one per field, each holding that field for every record.
    #[default]
    FieldRows,
    /// One `frame,agent_id,x,y` line per record.
    RecordRows,
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Write `records` to `path`, creating parent directories as needed.
pub fn write_canonical(
    path: impl AsRef<Path>,
    records: &[CanonicalRecord],
    layout: CanonicalLayout,
) -> Result<()> {
    let path = path.as_ref();
    let text = render(records, layout);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
    }
    std::fs::write(path, text).map_err(|e| PipelineError::io(path, e))?;
    info!(path = %path.display(), records = records.len(), "Saved canonical file");
    Ok(())
}

fn render(records: &[CanonicalRecord], layout: CanonicalLayout) -> String {
    match layout {
        CanonicalLayout::FieldRows => [
            join_field(records, |r| r.frame.to_string()),
            join_field(records, |r| r.agent_id.to_string()),
            join_field(records, |r| r.x.to_string()),
            join_field(records, |r| r.y.to_string()),
        ]
        .iter()
        .map(|line| format!("{line}\n"))
        .collect(),
        CanonicalLayout::RecordRows => {
            let mut text = String::new();
            for r in records {
                // Writing into a String cannot fail.
                let _ = writeln!(text, "{},{},{},{}", r.frame, r.agent_id, r.x, r.y);
            }
            text
        }
    }
}

fn join_field(records: &[CanonicalRecord], field: impl Fn(&CanonicalRecord) -> String) -> String {
    records.iter().map(field).collect::<Vec<_>>().join(",")
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Read a canonical file written in `layout`.
pub fn read_canonical(
    path: impl AsRef<Path>,
    layout: CanonicalLayout,
) -> Result<Vec<CanonicalRecord>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
    parse_canonical(path, &text, layout)
}

fn parse_canonical(
    path: &Path,
    text: &str,
    layout: CanonicalLayout,
) -> Result<Vec<CanonicalRecord>> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    match layout {
        CanonicalLayout::FieldRows => {
            if lines.is_empty() {
                return Ok(Vec::new());
            }
            if lines.len() != 4 {
                return Err(PipelineError::malformed(
                    path,
                    format!("expected 4 field rows, found {}", lines.len()),
                ));
            }
            let fields: Vec<Vec<String>> = lines.iter().map(|l| split_fields(l)).collect();
            let n = fields[0].len();
            if fields.iter().any(|f| f.len() != n) {
                return Err(PipelineError::malformed(path, "field rows differ in length"));
            }
            (0..n)
                .map(|i| {
                    Ok(CanonicalRecord {
                        frame: parse_u32(path, &fields[0][i], "frame")?,
                        agent_id: parse_u32(path, &fields[1][i], "agent id")?,
                        x: parse_f64(path, &fields[2][i])?,
                        y: parse_f64(path, &fields[3][i])?,
                    })
                })
                .collect()
        }
        CanonicalLayout::RecordRows => lines
            .iter()
            .map(|l| {
                let f = split_fields(l);
                if f.len() != 4 {
                    return Err(PipelineError::malformed(
                        path,
                        format!("expected 4 fields per record, found {} in '{l}'", f.len()),
                    ));
                }
                Ok(CanonicalRecord {
                    frame: parse_u32(path, &f[0], "frame")?,
                    agent_id: parse_u32(path, &f[1], "agent id")?,
                    x: parse_f64(path, &f[2])?,
                    y: parse_f64(path, &f[3])?,
                })
            })
            .collect(),
    }
}

/// Accepts `12` as well as the `12.0` a float-typed writer produces.
fn parse_u32(path: &Path, text: &str, what: &str) -> Result<u32> {
    if let Ok(v) = text.parse::<u32>() {
        return Ok(v);
    }
    match text.parse::<f64>() {
        Ok(v) if v.fract() == 0.0 && (0.0..=u32::MAX as f64).contains(&v) => Ok(v as u32),
        _ => Err(PipelineError::malformed(path, format!("invalid {what} '{text}'"))),
    }
}

fn parse_f64(path: &Path, text: &str) -> Result<f64> {
    match text.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(PipelineError::malformed(path, format!("invalid coordinate '{text}'"))),
    }
}

// ---------------------------------------------------------------------------
// Cache and bulk preprocessing
// ---------------------------------------------------------------------------

/// Load the canonical form of `config`, rebuilding it from the raw source
/// when it is missing or `force_reprocess` is set.
pub fn load_dataset(config: &DatasetConfig, force_reprocess: bool) -> Result<Dataset> {
    let records = if force_reprocess || !config.canonical_path.exists() {
        info!(
            raw = %config.raw_path.display(),
            forced = force_reprocess,
            "Building canonical file from raw source"
        );
        let records = config.format.normalize(&config.raw_path)?;
        write_canonical(&config.canonical_path, &records, config.layout)?;
        records
    } else {
        read_canonical(&config.canonical_path, config.layout)?
    };
    Ok(Dataset::from_records(&config.canonical_path, records))
}

/// Outcome of [`preprocess_all`].
#[derive(Debug, Default)]
pub struct PreprocessReport {
    /// Canonical files written, with their record counts.
    pub written: Vec<(PathBuf, usize)>,
    /// Raw files that failed, with the reason.
    pub failed: Vec<(PathBuf, PipelineError)>,
}

impl PreprocessReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Normalize every dataset and write its canonical file.
///
/// A failure aborts only that file; the remaining datasets are still
/// processed and the failure is recorded in the report.
pub fn preprocess_all(datasets: &[DatasetConfig]) -> PreprocessReport {
    let mut report = PreprocessReport::default();
    for config in datasets {
        let result = config
            .format
            .normalize(&config.raw_path)
            .and_then(|records| {
                write_canonical(&config.canonical_path, &records, config.layout)?;
                Ok(records.len())
            });
        match result {
            Ok(count) => report.written.push((config.canonical_path.clone(), count)),
            Err(e) => {
                warn!(raw = %config.raw_path.display(), error = %e, "Skipping source file");
                report.failed.push((config.raw_path.clone(), e));
            }
        }
    }
    info!(
        written = report.written.len(),
        failed = report.failed.len(),
        "Preprocessing finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{ColumnNames, RelabelPolicy, SourceFormat};

    fn sample() -> Vec<CanonicalRecord> {
        vec![
            CanonicalRecord {
                frame: 0,
                agent_id: 1,
                x: 0.5,
                y: 1.0,
            },
            CanonicalRecord {
                frame: 1,
                agent_id: 1,
                x: 1.0,
                y: 0.125,
            },
            CanonicalRecord {
                frame: 0,
                agent_id: 2,
                x: 0.3,
                y: 0.7,
            },
        ]
    }

    fn multi_format() -> SourceFormat {
        SourceFormat::MultiAgent {
            columns: ColumnNames::default(),
            relabel: RelabelPolicy::SortedValue,
        }
    }

    #[test]
    fn test_field_rows_layout() {
        let text = render(&sample(), CanonicalLayout::FieldRows);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["0,1,0", "1,1,2", "0.5,1,0.3", "1,0.125,0.7"]);
    }

    #[test]
    fn test_both_layouts_read_back() {
        let dir = tempfile::tempdir().unwrap();
        for layout in [CanonicalLayout::FieldRows, CanonicalLayout::RecordRows] {
            let path = dir.path().join(format!("{layout:?}.csv"));
            write_canonical(&path, &sample(), layout).unwrap();
            assert_eq!(read_canonical(&path, layout).unwrap(), sample());
        }
    }

    #[test]
    fn test_float_typed_integers_accepted() {
        let text = "0.0,1.0\n1.0,1.0\n0.5,1\n1,0.5\n";
        let records =
            parse_canonical(Path::new("p.csv"), text, CanonicalLayout::FieldRows).unwrap();
        assert_eq!(records[1].frame, 1);
        assert_eq!(records[1].agent_id, 1);
    }

    #[test]
    fn test_leading_byte_order_mark_ignored() {
        let text = "\u{feff}0,1\n1,1\n0.5,1\n1,0.5\n";
        let records =
            parse_canonical(Path::new("p.csv"), text, CanonicalLayout::FieldRows).unwrap();
        assert_eq!(records[0].frame, 0);
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_ragged_field_rows_rejected() {
        let text = "0,1\n1\n0.5,1\n1,0.5\n";
        assert!(matches!(
            parse_canonical(Path::new("p.csv"), text, CanonicalLayout::FieldRows),
            Err(PipelineError::MalformedSource { .. })
        ));
    }

    #[test]
    fn test_load_dataset_builds_then_reuses_cache() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("original.csv");
        std::fs::write(&raw, "frame,id,x,y\n0,9,2,4\n1,9,4,2\n").unwrap();
        let config = DatasetConfig::in_dir(dir.path(), multi_format());

        let ds = load_dataset(&config, false).unwrap();
        assert!(config.canonical_path.exists());
        assert_eq!(ds.num_frames(), 2);

        // A stale cache is used unless reprocessing is forced.
        std::fs::write(&raw, "frame,id,x,y\n0,9,2,4\n1,9,4,2\n2,9,1,1\n").unwrap();
        assert_eq!(load_dataset(&config, false).unwrap().num_frames(), 2);
        assert_eq!(load_dataset(&config, true).unwrap().num_frames(), 3);
    }

    #[test]
    fn test_preprocess_continues_past_failures() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good");
        let flat = dir.path().join("flat");
        let missing = dir.path().join("missing");
        std::fs::create_dir_all(&good).unwrap();
        std::fs::create_dir_all(&flat).unwrap();
        std::fs::write(good.join("original.csv"), "frame,id,x,y\n0,1,2,4\n").unwrap();
        std::fs::write(flat.join("original.csv"), "frame,id,x,y\n0,1,0,4\n").unwrap();

        let report = preprocess_all(&[
            DatasetConfig::in_dir(&flat, multi_format()),
            DatasetConfig::in_dir(&missing, multi_format()),
            DatasetConfig::in_dir(&good, multi_format()),
        ]);

        assert!(!report.is_clean());
        assert_eq!(report.written.len(), 1);
        assert_eq!(report.failed.len(), 2);
        assert!(matches!(report.failed[0].1, PipelineError::DivisionByZero { .. }));
        assert!(matches!(report.failed[1].1, PipelineError::Io { .. }));
        assert!(good.join("pixel_pos.csv").exists());
    }
}
