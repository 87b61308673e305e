//! Model evaluation
//!
//! Fits each compared model on the balanced training set, scores it on the
//! held-out test set and cross-validates it on the training set.

mod curves;
mod metrics;

pub use curves::{roc_auc_score, PrecisionRecallCurve, RocCurve};
pub use metrics::{ClassScores, ClassificationReport, ConfusionMatrix, ModelMetrics};

use crate::error::{PipelineError, Result};
use crate::training::{cross_val_score, CVResults, CrossValidator, ModelKind, ModelSpec};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

/// One entry of a feature-importance ranking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Pair importances with feature names, highest first
pub fn rank_importances(names: &[String], importances: &Array1<f64>) -> Result<Vec<FeatureImportance>> {
    if names.len() != importances.len() {
        return Err(PipelineError::ShapeError {
            expected: format!("{} importances", names.len()),
            actual: format!("{} importances", importances.len()),
        });
    }
    let mut ranked: Vec<FeatureImportance> = names
        .iter()
        .zip(importances.iter())
        .map(|(name, &importance)| FeatureImportance {
            feature: name.clone(),
            importance,
        })
        .collect();
    ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    Ok(ranked)
}

/// Everything measured for one model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEvaluation {
    pub kind: ModelKind,
    pub metrics: ModelMetrics,
    pub cv: CVResults,
    pub confusion: ConfusionMatrix,
    pub report: ClassificationReport,
    pub roc: Option<RocCurve>,
    pub pr: Option<PrecisionRecallCurve>,
    /// Tree models only
    pub importances: Option<Vec<FeatureImportance>>,
    pub fit_time_secs: f64,
}

/// Train/test data handed to the evaluator
pub struct EvaluationData<'a> {
    pub x_train: &'a Array2<f64>,
    pub y_train: &'a Array1<f64>,
    pub x_test: &'a Array2<f64>,
    pub y_test: &'a Array1<f64>,
    pub feature_names: &'a [String],
}

/// Fits, scores and cross-validates models
#[derive(Debug, Clone)]
pub struct Evaluator {
    cv: CrossValidator,
}

impl Evaluator {
    pub fn new(cv: CrossValidator) -> Self {
        Self { cv }
    }

    pub fn evaluate(&self, spec: &ModelSpec, data: &EvaluationData<'_>) -> Result<ModelEvaluation> {
        let kind = spec.kind();
        info!(model = %kind, n_train = data.y_train.len(), "Fitting model");

        let start = Instant::now();
        let mut model = spec.build();
        model.fit(data.x_train, data.y_train)?;
        let fit_time_secs = start.elapsed().as_secs_f64();

        let y_pred = model.predict(data.x_test)?;
        let y_prob = model.predict_proba(data.x_test)?;

        let metrics = ModelMetrics::compute(data.y_test, &y_pred, y_prob.as_ref())?;
        let confusion = ConfusionMatrix::from_predictions(data.y_test, &y_pred)?;
        let report = ClassificationReport::from_confusion(&confusion);

        let (roc, pr) = match &y_prob {
            Some(p) => (
                Some(RocCurve::compute(data.y_test, p)?),
                Some(PrecisionRecallCurve::compute(data.y_test, p)?),
            ),
            None => (None, None),
        };

        let importances = if kind.has_feature_importances() {
            let imp = model.feature_importances().ok_or_else(|| {
                PipelineError::TrainingError(format!("{kind} did not report feature importances"))
            })?;
            Some(rank_importances(data.feature_names, &imp)?)
        } else {
            None
        };

        let cv_spec = spec.for_cross_validation();
        let cv = cross_val_score(|| Ok(cv_spec.build()), data.x_train, data.y_train, &self.cv)?;

        info!(
            model = %kind,
            accuracy = metrics.accuracy,
            f1 = metrics.f1_score,
            roc_auc = ?metrics.roc_auc,
            cv_mean = cv.mean_score,
            fit_secs = fit_time_secs,
            "Model evaluated"
        );

        Ok(ModelEvaluation {
            kind,
            metrics,
            cv,
            confusion,
            report,
            roc,
            pr,
            importances,
            fit_time_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::{CVStrategy, GradientBoostingConfig, SVMConfig};
    use ndarray::array;

    fn blobs() -> (Array2<f64>, Array1<f64>) {
        let n = 30;
        let x = Array2::from_shape_fn((n, 2), |(i, j)| {
            let offset = if i % 2 == 0 { -1.5 } else { 1.5 };
            offset + ((i * 7 + j * 3) % 5) as f64 * 0.1
        });
        let y = Array1::from_shape_fn(n, |i| (i % 2) as f64);
        (x, y)
    }

    fn evaluate(spec: &ModelSpec) -> ModelEvaluation {
        let (x, y) = blobs();
        let names = vec!["a".to_string(), "b".to_string()];
        let data = EvaluationData {
            x_train: &x,
            y_train: &y,
            x_test: &x,
            y_test: &y,
            feature_names: &names,
        };
        let cv = CrossValidator::new(CVStrategy::StratifiedKFold {
            n_splits: 3,
            shuffle: false,
        });
        Evaluator::new(cv).evaluate(spec, &data).unwrap()
    }

    #[test]
    fn test_rank_importances() {
        let names = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let ranked = rank_importances(&names, &array![0.2, 0.5, 0.3]).unwrap();
        let order: Vec<&str> = ranked.iter().map(|f| f.feature.as_str()).collect();
        assert_eq!(order, vec!["b", "c", "a"]);
        assert!(rank_importances(&names, &array![1.0]).is_err());
    }

    #[test]
    fn test_evaluate_tree_model() {
        let spec = ModelSpec::GradientBoosting(GradientBoostingConfig {
            n_estimators: 10,
            random_state: Some(1),
            ..Default::default()
        });
        let eval = evaluate(&spec);

        assert_eq!(eval.kind, ModelKind::GradientBoosting);
        assert!((eval.metrics.accuracy - 1.0).abs() < 1e-12);
        assert!(eval.metrics.roc_auc.is_some());
        assert!(eval.roc.is_some() && eval.pr.is_some());
        assert_eq!(eval.importances.as_ref().map(Vec::len), Some(2));
        assert_eq!(eval.cv.scores.len(), 3);
        let mean = eval.cv.scores.iter().sum::<f64>() / 3.0;
        assert!((eval.cv.mean_score - mean).abs() < 1e-12);
    }

    #[test]
    fn test_evaluate_svm_without_probability() {
        let spec = ModelSpec::SVM(SVMConfig {
            probability: false,
            random_state: Some(1),
            ..Default::default()
        });
        let eval = evaluate(&spec);

        assert!(eval.metrics.roc_auc.is_none());
        assert!(eval.roc.is_none() && eval.pr.is_none());
        assert!(eval.importances.is_none());
    }
}
