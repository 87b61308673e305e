//! Model training module
//!
//! Provides the three compared classifiers and the machinery around them:
//! - Decision trees (shared building block)
//! - Gradient boosting with log-loss
//! - Random Forests
//! - Support Vector Machines with Platt-calibrated probabilities
//! - K-fold cross-validation

mod models;
pub mod cross_validation;
pub mod decision_tree;
pub mod gradient_boosting;
pub mod random_forest;
pub mod svm;

pub use cross_validation::{accuracy_score, cross_val_score, CVResults, CVSplit, CVStrategy, CrossValidator};
pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
pub use models::{Classifier, ModelKind, ModelSpec};
pub use random_forest::{MaxFeatures, RandomForestClassifier, RandomForestConfig};
pub use svm::{Gamma, KernelType, SVMClassifier, SVMConfig};
