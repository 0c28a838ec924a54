//! Minimal reader for comma-delimited text with a header row.
//!
//! Raw tracking exports are plain numeric CSV: no quoting, no embedded
//! commas. Each data row keeps its 1-based line number so that parse errors
//! can point at the offending line.

use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};

/// One data row of a delimited file.
#[derive(Debug, Clone)]
pub struct Row {
    /// 1-based line number in the source file.
    pub line: usize,
    pub fields: Vec<String>,
}

/// A header plus the data rows beneath it.
#[derive(Debug, Clone)]
pub struct Table {
    path: PathBuf,
    header: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    /// Read and split a delimited file. Blank lines are skipped.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        Self::parse(path, &text)
    }

    /// Split `text` into a header and rows; `path` is only used for errors.
    pub fn parse(path: impl Into<PathBuf>, text: &str) -> Result<Self> {
        let path = path.into();
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut lines = text
            .lines()
            .enumerate()
            .filter(|(_, l)| !l.trim().is_empty());

        let header = match lines.next() {
            Some((_, l)) => split_fields(l),
            None => return Err(PipelineError::malformed(path, "file is empty")),
        };

        let rows = lines
            .map(|(idx, l)| Row {
                line: idx + 1,
                fields: split_fields(l),
            })
            .collect();

        Ok(Self { path, header, rows })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Index of the column whose header matches `name`, ignoring case and
    /// surrounding whitespace.
    pub fn column(&self, name: &str) -> Result<usize> {
        self.header
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| {
                PipelineError::malformed(
                    &self.path,
                    format!(
                        "missing column '{name}' (header: {})",
                        self.header.join(",")
                    ),
                )
            })
    }

    /// The field at `column` in `row`, or a malformed-source error naming the
    /// line when the row is too short.
    pub fn field<'a>(&self, row: &'a Row, column: usize) -> Result<&'a str> {
        row.fields.get(column).map(String::as_str).ok_or_else(|| {
            PipelineError::malformed(
                &self.path,
                format!(
                    "line {}: expected at least {} fields, found {}",
                    row.line,
                    column + 1,
                    row.fields.len()
                ),
            )
        })
    }
}

pub(crate) fn split_fields(line: &str) -> Vec<String> {
    line.split(',').map(|f| f.trim().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header_and_rows() {
        let table = Table::parse("t.csv", "frame,id,x,y\n0,5,1.0,2.0\n\n1,5,1.5,2.5\n").unwrap();
        assert_eq!(table.header(), &["frame", "id", "x", "y"]);
        assert_eq!(table.rows().len(), 2);
        assert_eq!(table.rows()[0].line, 2);
        // The blank line still counts towards line numbering.
        assert_eq!(table.rows()[1].line, 4);
    }

    #[test]
    fn test_byte_order_mark_stripped_from_header() {
        let table = Table::parse("bom.csv", "\u{feff}frame,id,x,y\n0,5,1.0,2.0\n").unwrap();
        assert_eq!(table.column("frame").unwrap(), 0);
        assert_eq!(table.rows()[0].line, 2);
    }

    #[test]
    fn test_column_lookup_ignores_case() {
        let table = Table::parse("t.csv", "Frame, ID ,X,Y,Color\n").unwrap();
        assert_eq!(table.column("frame").unwrap(), 0);
        assert_eq!(table.column("id").unwrap(), 1);
        assert_eq!(table.column("color").unwrap(), 4);
        assert!(matches!(
            table.column("fishid"),
            Err(PipelineError::MalformedSource { .. })
        ));
    }

    #[test]
    fn test_short_row_reports_line() {
        let table = Table::parse("t.csv", "a,b,c\n1,2\n").unwrap();
        let row = &table.rows()[0];
        let err = table.field(row, 2).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_empty_file_is_malformed() {
        assert!(matches!(
            Table::parse("t.csv", "\n\n"),
            Err(PipelineError::MalformedSource { .. })
        ));
    }
}
