//! Alzheimer's diagnosis classifier comparison
//!
//! Loads the clinical dataset, derives ratio features, holds out a stratified
//! test set, scales, balances the training set with SMOTE, then fits and
//! compares Gradient Boosting, Random Forest and SVM classifiers.
//!
//! # Modules
//!
//! - [`utils`] - CSV loading and dataset summary
//! - [`preprocessing`] - Feature preparation, stratified split, scaling
//! - [`synthetic`] - SMOTE oversampling
//! - [`training`] - Classifiers and cross-validation
//! - [`calibration`] - Platt scaling for SVM probabilities
//! - [`evaluation`] - Metrics, classification report, ROC and PR curves
//! - [`report`] - Comparison table, console output, charts
//! - [`pipeline`] - End-to-end run
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;
pub mod config;

// Data and models
pub mod utils;
pub mod preprocessing;
pub mod synthetic;
pub mod training;
pub mod calibration;
pub mod evaluation;

// Output
pub mod report;
pub mod pipeline;
pub mod cli;

pub use config::{ModelsConfig, PipelineConfig};
pub use error::{PipelineError, Result};
pub use pipeline::{Pipeline, PipelineOutcome};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{ModelsConfig, PipelineConfig};
    pub use crate::error::{PipelineError, Result};
    pub use crate::evaluation::{ClassificationReport, ConfusionMatrix, ModelEvaluation, ModelMetrics};
    pub use crate::pipeline::{Pipeline, PipelineOutcome};
    pub use crate::preprocessing::{stratified_split, FeatureMatrix, StandardScaler};
    pub use crate::report::{ComparisonTable, METRIC_COLUMNS};
    pub use crate::synthetic::{Sampler, SMOTE};
    pub use crate::training::{
        Classifier, CrossValidator, GradientBoostingClassifier, ModelKind, ModelSpec,
        RandomForestClassifier, SVMClassifier,
    };
}
