//! Pipeline configuration
//!
//! Defaults: 70/30 stratified split, seed 42,
//! 5-fold cross-validation and SMOTE with five neighbours. A JSON file can
//! override any subset of fields; CLI flags are applied on top of that.

use crate::error::{PipelineError, Result};
use crate::training::{GradientBoostingConfig, RandomForestConfig, SVMConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Hyperparameters for the three compared classifiers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub gradient_boosting: GradientBoostingConfig,
    pub random_forest: RandomForestConfig,
    pub svm: SVMConfig,
}

/// Configuration for a full pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Input CSV file
    pub data_path: PathBuf,

    /// Binary label column
    pub target_column: String,

    /// Identifier columns dropped before training (absence tolerated)
    pub id_columns: Vec<String>,

    /// Fraction of rows held out for testing
    pub test_size: f64,

    /// Seed shared by the split, SMOTE and every model
    pub random_seed: u64,

    /// Number of cross-validation folds
    pub cv_folds: usize,

    /// Neighbours considered by SMOTE
    pub smote_k_neighbors: usize,

    /// Directory that receives rendered charts
    pub output_dir: PathBuf,

    /// Render charts
    pub plots: bool,

    /// Rows shown in the dataset preview
    pub head_rows: usize,

    /// Limit for printed feature-importance rankings (all when unset)
    pub top_features: Option<usize>,

    /// Per-model hyperparameters
    pub models: ModelsConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("alzheimers_disease_data.csv"),
            target_column: "Diagnosis".to_string(),
            id_columns: vec!["PatientID".to_string(), "DoctorInCharge".to_string()],
            test_size: 0.3,
            random_seed: 42,
            cv_folds: 5,
            smote_k_neighbors: 5,
            output_dir: PathBuf::from("reports"),
            plots: true,
            head_rows: 5,
            top_features: None,
            models: ModelsConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a JSON file; missing fields keep their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize as pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Builder method to set the data path
    pub fn with_data_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_path = path.into();
        self
    }

    /// Builder method to set the label column
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target_column = target.into();
        self
    }

    /// Builder method to set the seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    /// Builder method to set the test fraction
    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    /// Builder method to set the number of CV folds
    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    /// Builder method to set the chart directory
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Builder method to toggle chart rendering
    pub fn with_plots(mut self, plots: bool) -> Self {
        self.plots = plots;
        self
    }

    /// Builder method to replace model hyperparameters
    pub fn with_models(mut self, models: ModelsConfig) -> Self {
        self.models = models;
        self
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(PipelineError::InvalidParameter {
                name: "test_size".to_string(),
                value: self.test_size.to_string(),
                reason: "must lie in (0, 1)".to_string(),
            });
        }
        if self.cv_folds < 2 {
            return Err(PipelineError::InvalidParameter {
                name: "cv_folds".to_string(),
                value: self.cv_folds.to_string(),
                reason: "need at least 2 folds".to_string(),
            });
        }
        if self.smote_k_neighbors == 0 {
            return Err(PipelineError::InvalidParameter {
                name: "smote_k_neighbors".to_string(),
                value: "0".to_string(),
                reason: "need at least 1 neighbour".to_string(),
            });
        }
        self.models.gradient_boosting.validate()?;
        self.models.random_forest.validate()?;
        self.models.svm.validate()?;
        if self.target_column.is_empty() {
            return Err(PipelineError::ConfigError("target column is empty".to_string()));
        }
        if self.id_columns.iter().any(|c| c == &self.target_column) {
            return Err(PipelineError::ConfigError(format!(
                "target column {} is also listed as an identifier",
                self.target_column
            )));
        }
        Ok(())
    }
}
