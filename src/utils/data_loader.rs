//! Data loading utilities

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// CSV data loader
#[derive(Debug, Clone)]
pub struct DataLoader {
    /// Rows used for schema inference
    infer_schema_length: usize,
    /// Field separator
    separator: u8,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    /// Create a new data loader
    pub fn new() -> Self {
        Self {
            infer_schema_length: 1000,
            separator: b',',
        }
    }

    /// Set number of rows used for schema inference
    pub fn with_infer_schema_length(mut self, n: usize) -> Self {
        self.infer_schema_length = n.max(1);
        self
    }

    /// Set field separator
    pub fn with_separator(mut self, separator: u8) -> Self {
        self.separator = separator;
        self
    }

    /// Load a CSV file with a header row
    pub fn load_csv(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(PipelineError::DataError(format!(
                "data file not found: {}",
                path.display()
            )));
        }

        let start = Instant::now();
        let parse_opts = CsvParseOptions::default().with_separator(self.separator);

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .with_parse_options(parse_opts)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))
            .map_err(|e| PipelineError::DataError(format!("{}: {}", path.display(), e)))?
            .finish()
            .map_err(|e| PipelineError::DataError(format!("{}: {}", path.display(), e)))?;

        if df.width() == 0 {
            return Err(PipelineError::DataError(format!(
                "{} contains no columns",
                path.display()
            )));
        }

        info!(
            path = %path.display(),
            rows = df.height(),
            cols = df.width(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Loaded dataset"
        );

        Ok(df)
    }
}

/// Overview of a loaded dataset, printed before preprocessing
#[derive(Debug, Clone)]
pub struct DatasetSummary {
    pub n_rows: usize,
    pub n_cols: usize,
    /// First rows of the table
    pub head: DataFrame,
    /// Null count per column, in column order
    pub null_counts: Vec<(String, usize)>,
    /// Row count per label value
    pub class_distribution: BTreeMap<i64, usize>,
}

impl DatasetSummary {
    /// Summarize `df`, counting classes of the `target` column
    pub fn from_frame(df: &DataFrame, target: &str, head_rows: usize) -> Result<Self> {
        let null_counts = df
            .get_columns()
            .iter()
            .map(|c| (c.name().to_string(), c.null_count()))
            .collect();

        let class_distribution = label_counts(df, target)?;
        debug!(?class_distribution, "Computed class distribution");

        Ok(Self {
            n_rows: df.height(),
            n_cols: df.width(),
            head: df.head(Some(head_rows)),
            null_counts,
            class_distribution,
        })
    }

    /// Total number of nulls across all columns
    pub fn total_nulls(&self) -> usize {
        self.null_counts.iter().map(|(_, n)| n).sum()
    }
}

/// Count rows per (rounded) value of a label column; nulls are skipped
pub fn label_counts(df: &DataFrame, target: &str) -> Result<BTreeMap<i64, usize>> {
    let column = df
        .column(target)
        .map_err(|_| PipelineError::FeatureNotFound(target.to_string()))?;
    let values = column
        .as_materialized_series()
        .cast(&DataType::Float64)
        .map_err(|e| PipelineError::DataError(e.to_string()))?;

    let mut counts = BTreeMap::new();
    for v in values.f64()?.into_iter().flatten() {
        *counts.entry(v.round() as i64).or_insert(0) += 1;
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_csv() -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".csv")
            .tempfile()
            .unwrap();
        writeln!(file, "PatientID,Age,MMSE,Diagnosis").unwrap();
        writeln!(file, "4751,73,21.4,0").unwrap();
        writeln!(file, "4752,89,20.1,0").unwrap();
        writeln!(file, "4753,73,7.2,1").unwrap();
        file
    }

    #[test]
    fn test_load_csv() {
        let file = create_test_csv();
        let df = DataLoader::new().load_csv(file.path()).unwrap();

        assert_eq!(df.height(), 3);
        assert_eq!(df.width(), 4);
    }

    #[test]
    fn test_load_missing_file() {
        let result = DataLoader::new().load_csv("/nonexistent/dir/data.csv");
        assert!(matches!(result, Err(PipelineError::DataError(_))));
    }

    #[test]
    fn test_summary() {
        let file = create_test_csv();
        let df = DataLoader::new().load_csv(file.path()).unwrap();
        let summary = DatasetSummary::from_frame(&df, "Diagnosis", 2).unwrap();

        assert_eq!(summary.n_rows, 3);
        assert_eq!(summary.n_cols, 4);
        assert_eq!(summary.head.height(), 2);
        assert_eq!(summary.total_nulls(), 0);
        assert_eq!(summary.class_distribution.get(&0), Some(&2));
        assert_eq!(summary.class_distribution.get(&1), Some(&1));
    }

    #[test]
    fn test_summary_missing_target() {
        let df = df!("a" => &[1.0, 2.0]).unwrap();
        let result = DatasetSummary::from_frame(&df, "Diagnosis", 5);
        assert!(matches!(result, Err(PipelineError::FeatureNotFound(_))));
    }
}
