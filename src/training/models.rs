//! Classifier trait and the catalogue of compared models

use crate::config::ModelsConfig;
use crate::error::Result;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
use super::random_forest::{RandomForestClassifier, RandomForestConfig};
use super::svm::{SVMClassifier, SVMConfig};

/// Trait for binary classifiers (labels 0.0 / 1.0)
pub trait Classifier: Send + Sync {
    /// Display name
    fn name(&self) -> &'static str;

    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Predict class labels
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Probability of class 1 per row, when the model provides one
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Option<Array1<f64>>>;

    /// Get feature importances (if available)
    fn feature_importances(&self) -> Option<Array1<f64>> {
        None
    }
}

/// Compared model families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModelKind {
    GradientBoosting,
    RandomForest,
    SVM,
}

impl ModelKind {
    /// Comparison order
    pub const ALL: [ModelKind; 3] = [
        ModelKind::GradientBoosting,
        ModelKind::RandomForest,
        ModelKind::SVM,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::GradientBoosting => "Gradient Boosting",
            ModelKind::RandomForest => "Random Forest",
            ModelKind::SVM => "SVM",
        }
    }

    /// Short identifier used in file names
    pub fn slug(&self) -> &'static str {
        match self {
            ModelKind::GradientBoosting => "gradient_boosting",
            ModelKind::RandomForest => "random_forest",
            ModelKind::SVM => "svm",
        }
    }

    /// Whether the model reports impurity-based feature importances
    pub fn has_feature_importances(&self) -> bool {
        matches!(self, ModelKind::GradientBoosting | ModelKind::RandomForest)
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A model kind with its hyperparameters, able to build fresh instances
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ModelSpec {
    GradientBoosting(GradientBoostingConfig),
    RandomForest(RandomForestConfig),
    SVM(SVMConfig),
}

impl ModelSpec {
    pub fn kind(&self) -> ModelKind {
        match self {
            ModelSpec::GradientBoosting(_) => ModelKind::GradientBoosting,
            ModelSpec::RandomForest(_) => ModelKind::RandomForest,
            ModelSpec::SVM(_) => ModelKind::SVM,
        }
    }

    /// Fill in the seed where the configuration leaves it unset
    pub fn with_default_seed(self, seed: u64) -> Self {
        match self {
            ModelSpec::GradientBoosting(mut c) => {
                c.random_state = c.random_state.or(Some(seed));
                ModelSpec::GradientBoosting(c)
            }
            ModelSpec::RandomForest(mut c) => {
                c.random_state = c.random_state.or(Some(seed));
                ModelSpec::RandomForest(c)
            }
            ModelSpec::SVM(mut c) => {
                c.random_state = c.random_state.or(Some(seed));
                ModelSpec::SVM(c)
            }
        }
    }

    /// Variant for cross-validation folds: SVM probability calibration is
    /// skipped because folds are scored on accuracy only
    pub fn for_cross_validation(&self) -> Self {
        match self {
            ModelSpec::SVM(c) => ModelSpec::SVM(SVMConfig {
                probability: false,
                ..c.clone()
            }),
            other => other.clone(),
        }
    }

    /// Build an unfitted model
    pub fn build(&self) -> Box<dyn Classifier> {
        match self {
            ModelSpec::GradientBoosting(c) => Box::new(GradientBoostingClassifier::new(c.clone())),
            ModelSpec::RandomForest(c) => Box::new(RandomForestClassifier::new(c.clone())),
            ModelSpec::SVM(c) => Box::new(SVMClassifier::new(c.clone())),
        }
    }

    /// The three compared models in comparison order, seeded with `seed`
    pub fn catalogue(models: &ModelsConfig, seed: u64) -> Vec<ModelSpec> {
        vec![
            ModelSpec::GradientBoosting(models.gradient_boosting.clone()).with_default_seed(seed),
            ModelSpec::RandomForest(models.random_forest.clone()).with_default_seed(seed),
            ModelSpec::SVM(models.svm.clone()).with_default_seed(seed),
        ]
    }
}
