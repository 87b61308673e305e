//! Comparison table, console rendering and charts

pub mod console;
pub mod plots;

use crate::error::Result;
use crate::evaluation::ModelEvaluation;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Metric columns of the comparison table, in display order
pub const METRIC_COLUMNS: [&str; 7] = [
    "Accuracy",
    "Precision",
    "Recall",
    "F1",
    "ROC-AUC",
    "CV Mean",
    "CV Std",
];

/// One model's row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub model: String,
    /// Aligned with [`METRIC_COLUMNS`]; ROC-AUC may be missing
    pub values: [Option<f64>; 7],
}

/// Per-model metrics side by side, in evaluation order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonTable {
    pub rows: Vec<ComparisonRow>,
}

impl ComparisonTable {
    pub fn from_evaluations(evaluations: &[ModelEvaluation]) -> Self {
        let rows = evaluations
            .iter()
            .map(|e| ComparisonRow {
                model: e.kind.name().to_string(),
                values: [
                    Some(e.metrics.accuracy),
                    Some(e.metrics.precision),
                    Some(e.metrics.recall),
                    Some(e.metrics.f1_score),
                    e.metrics.roc_auc,
                    Some(e.cv.mean_score),
                    Some(e.cv.std_score),
                ],
            })
            .collect();
        Self { rows }
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn columns(&self) -> &'static [&'static str] {
        &METRIC_COLUMNS
    }

    /// Values of one metric column across models
    pub fn column(&self, name: &str) -> Option<Vec<Option<f64>>> {
        let idx = METRIC_COLUMNS.iter().position(|c| *c == name)?;
        Some(self.rows.iter().map(|r| r.values[idx]).collect())
    }

    /// `Model` column followed by the metric columns; missing values are null
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut columns: Vec<Column> = Vec::with_capacity(METRIC_COLUMNS.len() + 1);
        let models: Vec<&str> = self.rows.iter().map(|r| r.model.as_str()).collect();
        columns.push(Column::new("Model".into(), models));
        for (idx, name) in METRIC_COLUMNS.iter().enumerate() {
            let values: Vec<Option<f64>> = self.rows.iter().map(|r| r.values[idx]).collect();
            columns.push(Column::new((*name).into(), values));
        }
        Ok(DataFrame::new(columns)?)
    }
}
