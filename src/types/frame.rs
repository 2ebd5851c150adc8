//! Row-oriented tabular data for the training pipeline.
//!
//! A [`DataFrame`] carries one dataset record per row: named feature columns
//! plus, when present, one binary label column. Cells are `Option<f64>`,
//! where `None` is the missing-value marker that the sentinel token `"na"`
//! and empty CSV cells normalize to.

use crate::error::{PipelineError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// One raw record as returned by the remote document store.
pub type DatasetRecord = serde_json::Map<String, Value>;

/// An in-memory table of named columns over `Option<f64>` cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataFrame {
    columns: Vec<String>,
    rows: Vec<Vec<Option<f64>>>,
}

impl DataFrame {
    /// Create an empty frame with the given column names.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Option<f64>>] {
        &self.rows
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Append a row; its arity must match the column set.
    pub fn push_row(&mut self, row: Vec<Option<f64>>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(PipelineError::Schema(format!(
                "row has {} cells, expected {}",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Values of one column, or `None` if the column is absent.
    pub fn column(&self, name: &str) -> Option<Vec<Option<f64>>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| row[idx]).collect())
    }

    /// A copy of the frame without the named column; a no-op if absent.
    pub fn drop_column(&self, name: &str) -> DataFrame {
        match self.column_index(name) {
            None => self.clone(),
            Some(idx) => {
                let columns = self
                    .columns
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != idx)
                    .map(|(_, c)| c.clone())
                    .collect();
                let rows = self
                    .rows
                    .iter()
                    .map(|row| {
                        row.iter()
                            .enumerate()
                            .filter(|(i, _)| *i != idx)
                            .map(|(_, v)| *v)
                            .collect()
                    })
                    .collect();
                DataFrame { columns, rows }
            }
        }
    }

    /// Project onto the named columns, in exactly the given order.
    pub fn select(&self, names: &[String]) -> Result<DataFrame> {
        let mut indices = Vec::with_capacity(names.len());
        for name in names {
            let idx = self
                .column_index(name)
                .ok_or_else(|| PipelineError::Schema(format!("unknown column {name:?}")))?;
            indices.push(idx);
        }
        let rows = self
            .rows
            .iter()
            .map(|row| indices.iter().map(|&i| row[i]).collect())
            .collect();
        Ok(DataFrame {
            columns: names.to_vec(),
            rows,
        })
    }

    /// Build a frame from row-oriented JSON records.
    ///
    /// The column set is the union of keys across records, in first-seen
    /// order; keys absent from a record become missing cells. The string
    /// sentinel `"na"` and JSON null normalize to missing.
    pub fn from_records(records: &[DatasetRecord]) -> Result<DataFrame> {
        let mut columns: Vec<String> = Vec::new();
        for record in records {
            for key in record.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }

        let mut frame = DataFrame::new(columns.clone());
        for record in records {
            let mut row = Vec::with_capacity(columns.len());
            for column in &columns {
                row.push(match record.get(column) {
                    None | Some(Value::Null) => None,
                    Some(value) => parse_cell_value(column, value)?,
                });
            }
            frame.push_row(row)?;
        }
        Ok(frame)
    }

    /// Read a frame from a headered CSV file.
    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)
            .map_err(|e| PipelineError::Csv {
                context: format!("failed to open {}", path.display()),
                source: e,
            })?;

        let columns: Vec<String> = reader
            .headers()
            .map_err(|e| PipelineError::Csv {
                context: format!("failed to read header of {}", path.display()),
                source: e,
            })?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut frame = DataFrame::new(columns);
        for (line, record) in reader.records().enumerate() {
            let record = record.map_err(|e| PipelineError::Csv {
                context: format!("failed to read row {} of {}", line + 1, path.display()),
                source: e,
            })?;
            let mut row = Vec::with_capacity(frame.n_cols());
            for (idx, cell) in record.iter().enumerate() {
                row.push(parse_cell_text(&frame.columns[idx], line + 1, cell)?);
            }
            frame.push_row(row)?;
        }
        Ok(frame)
    }

    /// Write the frame as a headered CSV file, creating parent directories.
    /// Missing cells serialize as empty fields.
    pub fn to_csv_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| PipelineError::io(format!("failed to create {}", parent.display()), e))?;
        }

        let mut writer = csv::Writer::from_path(path).map_err(|e| PipelineError::Csv {
            context: format!("failed to create {}", path.display()),
            source: e,
        })?;
        writer
            .write_record(&self.columns)
            .map_err(|e| PipelineError::Csv {
                context: format!("failed to write header of {}", path.display()),
                source: e,
            })?;
        for row in &self.rows {
            let cells: Vec<String> = row
                .iter()
                .map(|cell| cell.map(|v| v.to_string()).unwrap_or_default())
                .collect();
            writer.write_record(&cells).map_err(|e| PipelineError::Csv {
                context: format!("failed to write row to {}", path.display()),
                source: e,
            })?;
        }
        writer.flush().map_err(|e| {
            PipelineError::io(format!("failed to flush {}", path.display()), e)
        })?;
        Ok(())
    }

    /// Fixed-seed random sample of exactly `n` rows (original row order is
    /// preserved). Frames at or below `n` rows are returned unmodified.
    pub fn sample_n(&self, n: usize, seed: u64) -> DataFrame {
        if self.rows.len() <= n {
            return self.clone();
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let mut picked = rand::seq::index::sample(&mut rng, self.rows.len(), n).into_vec();
        picked.sort_unstable();
        DataFrame {
            columns: self.columns.clone(),
            rows: picked.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }

    /// Fixed-seed shuffle split into (train, test) partitions.
    ///
    /// `test_ratio` is the fraction held out for test and must lie in (0,1);
    /// the test partition takes `ceil(ratio * rows)` rows. A ratio that would
    /// empty either partition is a configuration error.
    pub fn train_test_split(&self, test_ratio: f64, seed: u64) -> Result<(DataFrame, DataFrame)> {
        if !test_ratio.is_finite() || test_ratio <= 0.0 || test_ratio >= 1.0 {
            return Err(PipelineError::Configuration(format!(
                "train/test split ratio must lie in (0, 1), got {test_ratio}"
            )));
        }

        let n = self.rows.len();
        let test_len = ((test_ratio * n as f64).ceil() as usize).min(n);
        if test_len == 0 || test_len == n {
            return Err(PipelineError::Configuration(format!(
                "split ratio {test_ratio} leaves an empty partition for {n} rows"
            )));
        }

        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(&mut StdRng::seed_from_u64(seed));

        let take = |slice: &[usize]| DataFrame {
            columns: self.columns.clone(),
            rows: slice.iter().map(|&i| self.rows[i].clone()).collect(),
        };
        Ok((take(&indices[test_len..]), take(&indices[..test_len])))
    }
}

fn parse_cell_value(column: &str, value: &Value) -> Result<Option<f64>> {
    match value {
        Value::Number(n) => Ok(n.as_f64()),
        Value::Bool(b) => Ok(Some(if *b { 1.0 } else { 0.0 })),
        Value::String(s) => parse_cell_text(column, 0, s),
        other => Err(PipelineError::Schema(format!(
            "column {column:?} holds a non-scalar value: {other}"
        ))),
    }
}

fn parse_cell_text(column: &str, line: usize, cell: &str) -> Result<Option<f64>> {
    let cell = cell.trim();
    if cell.is_empty() || cell == "na" {
        return Ok(None);
    }
    cell.parse::<f64>().map(Some).map_err(|_| {
        PipelineError::Schema(format!(
            "column {column:?} row {line}: cannot parse {cell:?} as a number"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with_rows(n: usize) -> DataFrame {
        let mut frame = DataFrame::new(vec!["a".to_string(), "b".to_string()]);
        for i in 0..n {
            frame
                .push_row(vec![Some(i as f64), Some((i * 2) as f64)])
                .unwrap();
        }
        frame
    }

    #[test]
    fn test_csv_round_trip_preserves_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.csv");

        let mut frame = DataFrame::new(vec!["x".to_string(), "y".to_string()]);
        frame.push_row(vec![Some(1.5), None]).unwrap();
        frame.push_row(vec![None, Some(-2.0)]).unwrap();
        frame.to_csv_path(&path).unwrap();

        let loaded = DataFrame::from_csv_path(&path).unwrap();
        assert_eq!(frame, loaded);
    }

    #[test]
    fn test_na_sentinel_normalizes_to_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("na.csv");
        std::fs::write(&path, "x,y\n1.0,na\nna,2.0\n").unwrap();

        let frame = DataFrame::from_csv_path(&path).unwrap();
        assert_eq!(frame.rows()[0], vec![Some(1.0), None]);
        assert_eq!(frame.rows()[1], vec![None, Some(2.0)]);
    }

    #[test]
    fn test_from_records_union_of_keys() {
        let a: DatasetRecord = serde_json::from_str(r#"{"x": 1, "y": "na"}"#).unwrap();
        let b: DatasetRecord = serde_json::from_str(r#"{"x": 2, "z": 3}"#).unwrap();

        let frame = DataFrame::from_records(&[a, b]).unwrap();
        assert_eq!(frame.columns(), &["x", "y", "z"]);
        assert_eq!(frame.rows()[0], vec![Some(1.0), None, None]);
        assert_eq!(frame.rows()[1], vec![Some(2.0), None, Some(3.0)]);
    }

    #[test]
    fn test_sample_is_deterministic_and_exact() {
        let frame = frame_with_rows(500);
        let a = frame.sample_n(100, 42);
        let b = frame.sample_n(100, 42);

        assert_eq!(a.n_rows(), 100);
        assert_eq!(a, b);
        assert_ne!(a, frame.sample_n(100, 7));
    }

    #[test]
    fn test_sample_below_cap_is_unmodified() {
        let frame = frame_with_rows(50);
        assert_eq!(frame.sample_n(100, 42), frame);
    }

    #[test]
    fn test_split_disjoint_and_sized() {
        let frame = frame_with_rows(100);
        for ratio in [0.1, 0.2, 0.33, 0.5, 0.9] {
            let (train, test) = frame.train_test_split(ratio, 42).unwrap();
            assert_eq!(train.n_rows() + test.n_rows(), 100);
            assert_eq!(test.n_rows(), (ratio * 100.0).ceil() as usize);

            let train_ids: Vec<f64> = train.rows().iter().map(|r| r[0].unwrap()).collect();
            for row in test.rows() {
                assert!(!train_ids.contains(&row[0].unwrap()));
            }
        }
    }

    #[test]
    fn test_split_rejects_out_of_range_ratio() {
        let frame = frame_with_rows(10);
        for ratio in [0.0, 1.0, -0.5, 1.5, f64::NAN] {
            assert!(matches!(
                frame.train_test_split(ratio, 42),
                Err(PipelineError::Configuration(_))
            ));
        }
    }

    #[test]
    fn test_select_reorders_columns() {
        let mut frame = DataFrame::new(vec!["a".to_string(), "b".to_string(), "c".to_string()]);
        frame
            .push_row(vec![Some(1.0), Some(2.0), Some(3.0)])
            .unwrap();

        let selected = frame
            .select(&["c".to_string(), "a".to_string()])
            .unwrap();
        assert_eq!(selected.columns(), &["c", "a"]);
        assert_eq!(selected.rows()[0], vec![Some(3.0), Some(1.0)]);
    }
}
