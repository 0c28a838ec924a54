//! Raw source normalization.
//!
//! Converts one raw tracking export into canonical records:
//!
//! 1. select the frame, agent id, x and y fields (everything else is dropped);
//! 2. coerce frame and agent id to integers;
//! 3. relabel raw agent ids to `1..=n` according to a [`RelabelPolicy`];
//! 4. divide every x (and y) by that axis's maximum over the whole file.
//!
//! Scaling is per file: two files with different extents produce coordinates
//! that are not directly comparable.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::record::CanonicalRecord;
use super::table::{Row, Table};
use crate::error::{Axis, PipelineError, Result};

// ---------------------------------------------------------------------------
// Source formats
// ---------------------------------------------------------------------------

/// How raw agent identifiers map onto the dense range `1..=n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelabelPolicy {
    /// Ascending numeric order of the raw ids.
    #[default]
    SortedValue,
    /// Order in which each raw id first appears in the file.
    FirstAppearance,
}

/// Header names of the fields kept from a multi-agent export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnNames {
    pub frame: String,
    pub agent: String,
    pub x: String,
    pub y: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            frame: "frame".into(),
            agent: "id".into(),
            x: "x".into(),
            y: "y".into(),
        }
    }
}

/// The closed set of raw layouts the normalizer understands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceFormat {
    /// Long format: one row per (frame, agent) with an id column and
    /// arbitrary extra columns.
    MultiAgent {
        #[serde(default)]
        columns: ColumnNames,
        #[serde(default)]
        relabel: RelabelPolicy,
    },
    /// A single implicit agent (id 1). Without a frame column the frame is
    /// the zero-based data row index.
    SingleAgent {
        frame_column: Option<String>,
        x_column: String,
        y_column: String,
    },
}

impl SourceFormat {
    /// Read `path` and normalize it.
    pub fn normalize(&self, path: impl AsRef<Path>) -> Result<Vec<CanonicalRecord>> {
        let table = Table::read(path)?;
        self.normalize_table(&table)
    }

    /// Normalize an already-parsed table.
    pub fn normalize_table(&self, table: &Table) -> Result<Vec<CanonicalRecord>> {
        if table.rows().is_empty() {
            return Err(PipelineError::malformed(table.path(), "no data rows"));
        }

        let raw = match self {
            Self::MultiAgent { columns, relabel } => read_multi_agent(table, columns, *relabel)?,
            Self::SingleAgent {
                frame_column,
                x_column,
                y_column,
            } => read_single_agent(table, frame_column.as_deref(), x_column, y_column)?,
        };

        let mut records = scale_axes(table.path(), raw)?;
        records.sort_by_key(|r| (r.agent_id, r.frame));

        debug!(
            path = %table.path().display(),
            records = records.len(),
            "normalized source"
        );
        Ok(records)
    }
}

/// Convenience wrapper around [`SourceFormat::normalize`].
pub fn normalize(path: impl AsRef<Path>, format: &SourceFormat) -> Result<Vec<CanonicalRecord>> {
    format.normalize(path)
}

// ---------------------------------------------------------------------------
// Per-format field selection
// ---------------------------------------------------------------------------

fn read_multi_agent(
    table: &Table,
    columns: &ColumnNames,
    relabel: RelabelPolicy,
) -> Result<Vec<CanonicalRecord>> {
    let frame_col = table.column(&columns.frame)?;
    let agent_col = table.column(&columns.agent)?;
    let x_col = table.column(&columns.x)?;
    let y_col = table.column(&columns.y)?;

    let mut raw_ids = Vec::with_capacity(table.rows().len());
    let mut records = Vec::with_capacity(table.rows().len());
    for row in table.rows() {
        let frame = parse_frame(table, row, frame_col)?;
        let raw_id = parse_int(table, row, agent_col, "agent id")?;
        raw_ids.push(raw_id);
        records.push(CanonicalRecord {
            frame,
            agent_id: 0,
            x: parse_coord(table, row, x_col)?,
            y: parse_coord(table, row, y_col)?,
        });
    }

    let mapping = relabel_ids(&raw_ids, relabel);
    for (record, raw) in records.iter_mut().zip(&raw_ids) {
        record.agent_id = mapping[raw];
    }
    Ok(records)
}

fn read_single_agent(
    table: &Table,
    frame_column: Option<&str>,
    x_column: &str,
    y_column: &str,
) -> Result<Vec<CanonicalRecord>> {
    let frame_col = frame_column.map(|c| table.column(c)).transpose()?;
    let x_col = table.column(x_column)?;
    let y_col = table.column(y_column)?;

    table
        .rows()
        .iter()
        .enumerate()
        .map(|(idx, row)| {
            let frame = match frame_col {
                Some(col) => parse_frame(table, row, col)?,
                None => u32::try_from(idx).map_err(|_| {
                    PipelineError::malformed(table.path(), "too many rows for a frame index")
                })?,
            };
            Ok(CanonicalRecord {
                frame,
                agent_id: 1,
                x: parse_coord(table, row, x_col)?,
                y: parse_coord(table, row, y_col)?,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Relabeling and scaling
// ---------------------------------------------------------------------------

/// Map each distinct raw id to `1..=n` following `policy`.
pub fn relabel_ids(raw_ids: &[i64], policy: RelabelPolicy) -> HashMap<i64, u32> {
    let ordered: Vec<i64> = match policy {
        RelabelPolicy::SortedValue => raw_ids
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect(),
        RelabelPolicy::FirstAppearance => {
            let mut seen = BTreeSet::new();
            raw_ids.iter().copied().filter(|id| seen.insert(*id)).collect()
        }
    };
    ordered
        .into_iter()
        .zip(1u32..)
        .collect()
}

/// Divide each axis by its maximum so the maximum becomes exactly 1.0.
fn scale_axes(path: &Path, mut records: Vec<CanonicalRecord>) -> Result<Vec<CanonicalRecord>> {
    let max_x = axis_max(path, Axis::X, records.iter().map(|r| r.x))?;
    let max_y = axis_max(path, Axis::Y, records.iter().map(|r| r.y))?;
    for r in &mut records {
        r.x /= max_x;
        r.y /= max_y;
    }
    Ok(records)
}

fn axis_max(path: &Path, axis: Axis, values: impl Iterator<Item = f64>) -> Result<f64> {
    let max = values.fold(f64::NEG_INFINITY, f64::max);
    if max > 0.0 && max.is_finite() {
        Ok(max)
    } else {
        Err(PipelineError::DivisionByZero {
            path: path.to_path_buf(),
            axis,
            max,
        })
    }
}

// ---------------------------------------------------------------------------
// Field parsing
// ---------------------------------------------------------------------------

fn parse_number(table: &Table, row: &Row, col: usize, what: &str) -> Result<f64> {
    let text = table.field(row, col)?;
    match text.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(PipelineError::malformed(
            table.path(),
            format!("line {}: invalid {what} '{text}'", row.line),
        )),
    }
}

/// Integer coercion truncates toward zero.
fn parse_int(table: &Table, row: &Row, col: usize, what: &str) -> Result<i64> {
    let v = parse_number(table, row, col, what)?.trunc();
    if v.abs() > i64::MAX as f64 {
        return Err(PipelineError::malformed(
            table.path(),
            format!("line {}: {what} {v} out of range", row.line),
        ));
    }
    Ok(v as i64)
}

fn parse_frame(table: &Table, row: &Row, col: usize) -> Result<u32> {
    let v = parse_int(table, row, col, "frame")?;
    u32::try_from(v).map_err(|_| {
        PipelineError::malformed(
            table.path(),
            format!("line {}: frame {v} is negative or too large", row.line),
        )
    })
}

fn parse_coord(table: &Table, row: &Row, col: usize) -> Result<f64> {
    parse_number(table, row, col, "coordinate")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn multi(relabel: RelabelPolicy) -> SourceFormat {
        SourceFormat::MultiAgent {
            columns: ColumnNames::default(),
            relabel,
        }
    }

    /// Raw ids 5, 2, 7 first seen in that order, three frames each, with
    /// the `Color`/`col` columns the five-fish exports carry.
    const THREE_FISH: &str = "\
frame,id,x,y,Color,col
0,5,10.0,40.0,red,1
0,2,20.0,30.0,blue,2
0,7,30.0,20.0,green,3
1,5,40.0,10.0,red,1
1,2,50.0,50.0,blue,2
1,7,60.0,25.0,green,3
2.0,5,70.0,35.0,red,1
2.0,2,80.0,45.0,blue,2
2.0,7,25.0,15.0,green,3
";

    #[test]
    fn test_sorted_value_relabel() {
        let table = Table::parse("three.csv", THREE_FISH).unwrap();
        let records = multi(RelabelPolicy::SortedValue)
            .normalize_table(&table)
            .unwrap();
        assert_eq!(records.len(), 9);

        // Raw 2 -> 1, raw 5 -> 2, raw 7 -> 3.
        let first_of = |id| records.iter().find(|r| r.agent_id == id).unwrap();
        assert_eq!(first_of(1).x, 20.0 / 80.0);
        assert_eq!(first_of(2).x, 10.0 / 80.0);
        assert_eq!(first_of(3).x, 30.0 / 80.0);
    }

    #[test]
    fn test_first_appearance_relabel() {
        let table = Table::parse("three.csv", THREE_FISH).unwrap();
        let records = multi(RelabelPolicy::FirstAppearance)
            .normalize_table(&table)
            .unwrap();

        // Raw 5 -> 1, raw 2 -> 2, raw 7 -> 3.
        let first_of = |id| records.iter().find(|r| r.agent_id == id).unwrap();
        assert_eq!(first_of(1).x, 10.0 / 80.0);
        assert_eq!(first_of(2).x, 20.0 / 80.0);
        assert_eq!(first_of(3).x, 30.0 / 80.0);
    }

    #[test]
    fn test_axes_scaled_to_unit_max() {
        let table = Table::parse("three.csv", THREE_FISH).unwrap();
        let records = multi(RelabelPolicy::SortedValue)
            .normalize_table(&table)
            .unwrap();
        let max_x = records.iter().map(|r| r.x).fold(f64::MIN, f64::max);
        let max_y = records.iter().map(|r| r.y).fold(f64::MIN, f64::max);
        assert_eq!(max_x, 1.0);
        assert_eq!(max_y, 1.0);
        // Frames cast to integers, including the "2.0" rows.
        let frames: BTreeSet<u32> = records.iter().map(|r| r.frame).collect();
        assert_eq!(frames.into_iter().collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_output_sorted_by_agent_then_frame() {
        let table = Table::parse("three.csv", THREE_FISH).unwrap();
        let records = multi(RelabelPolicy::FirstAppearance)
            .normalize_table(&table)
            .unwrap();
        let keys: Vec<(u32, u32)> = records.iter().map(|r| (r.agent_id, r.frame)).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_single_agent_with_frame_column() {
        let text = "a,b,x,y,frame\n0,0,100.0,50.0,10\n0,0,200.0,25.0,11\n";
        let table = Table::parse("one.csv", text).unwrap();
        let format = SourceFormat::SingleAgent {
            frame_column: Some("frame".into()),
            x_column: "x".into(),
            y_column: "y".into(),
        };
        let records = format.normalize_table(&table).unwrap();
        assert_eq!(
            records,
            vec![
                CanonicalRecord {
                    frame: 10,
                    agent_id: 1,
                    x: 0.5,
                    y: 1.0
                },
                CanonicalRecord {
                    frame: 11,
                    agent_id: 1,
                    x: 1.0,
                    y: 0.5
                },
            ]
        );
    }

    #[test]
    fn test_single_agent_row_index_frames() {
        let table = Table::parse("one.csv", "x,y\n1,1\n2,2\n4,4\n").unwrap();
        let format = SourceFormat::SingleAgent {
            frame_column: None,
            x_column: "x".into(),
            y_column: "y".into(),
        };
        let frames: Vec<u32> = format
            .normalize_table(&table)
            .unwrap()
            .iter()
            .map(|r| r.frame)
            .collect();
        assert_eq!(frames, vec![0, 1, 2]);
    }

    #[test]
    fn test_zero_axis_is_division_by_zero() {
        let table = Table::parse("flat.csv", "frame,id,x,y\n0,1,0.0,3.0\n1,1,0.0,4.0\n").unwrap();
        let err = multi(RelabelPolicy::SortedValue)
            .normalize_table(&table)
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::DivisionByZero { axis: Axis::X, .. }
        ));
    }

    #[test]
    fn test_missing_column_is_malformed() {
        let table = Table::parse("bad.csv", "frame,x,y\n0,1,1\n").unwrap();
        let err = multi(RelabelPolicy::SortedValue)
            .normalize_table(&table)
            .unwrap_err();
        assert!(err.to_string().contains("missing column 'id'"));
    }

    #[test]
    fn test_unparsable_value_is_malformed() {
        let table = Table::parse("bad.csv", "frame,id,x,y\n0,1,abc,1\n").unwrap();
        let err = multi(RelabelPolicy::SortedValue)
            .normalize_table(&table)
            .unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_negative_frame_is_malformed() {
        let table = Table::parse("bad.csv", "frame,id,x,y\n-3,1,1,1\n").unwrap();
        assert!(matches!(
            multi(RelabelPolicy::SortedValue).normalize_table(&table),
            Err(PipelineError::MalformedSource { .. })
        ));
    }

    #[test]
    fn test_header_only_is_malformed() {
        let table = Table::parse("empty.csv", "frame,id,x,y\n").unwrap();
        assert!(matches!(
            multi(RelabelPolicy::SortedValue).normalize_table(&table),
            Err(PipelineError::MalformedSource { .. })
        ));
    }

    fn render(rows: &[(u32, i64, f64, f64)]) -> String {
        let mut text = String::from("frame,id,x,y\n");
        for (f, id, x, y) in rows {
            text.push_str(&format!("{f},{id},{x},{y}\n"));
        }
        text
    }

    proptest! {
        #[test]
        fn prop_relabel_is_bijection(
            rows in prop::collection::vec(
                (0u32..50, -20i64..20, 0.1f64..500.0, 0.1f64..500.0),
                1..60,
            ),
            first_seen in any::<bool>(),
        ) {
            let policy = if first_seen {
                RelabelPolicy::FirstAppearance
            } else {
                RelabelPolicy::SortedValue
            };
            let table = Table::parse("p.csv", &render(&rows)).unwrap();
            let records = multi(policy).normalize_table(&table).unwrap();

            let raw: BTreeSet<i64> = rows.iter().map(|r| r.1).collect();
            let canon: BTreeSet<u32> = records.iter().map(|r| r.agent_id).collect();
            prop_assert_eq!(raw.len(), canon.len());
            prop_assert_eq!(canon, (1..=raw.len() as u32).collect::<BTreeSet<_>>());
        }

        #[test]
        fn prop_normalized_max_is_one_and_idempotent(
            rows in prop::collection::vec(
                (0u32..50, 0i64..4, 0.1f64..1000.0, 0.1f64..1000.0),
                1..60,
            ),
        ) {
            let table = Table::parse("p.csv", &render(&rows)).unwrap();
            let records = multi(RelabelPolicy::SortedValue).normalize_table(&table).unwrap();
            let max_x = records.iter().map(|r| r.x).fold(f64::MIN, f64::max);
            let max_y = records.iter().map(|r| r.y).fold(f64::MIN, f64::max);
            prop_assert_eq!(max_x, 1.0);
            prop_assert_eq!(max_y, 1.0);

            let again = scale_axes(Path::new("p.csv"), records.clone()).unwrap();
            prop_assert_eq!(again, records);
        }
    }
}
