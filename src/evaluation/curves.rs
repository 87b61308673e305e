//! Threshold curves for binary classifiers

use crate::error::{PipelineError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Cumulative false/true positive counts at each distinct score, highest first
struct ThresholdCounts {
    fps: Vec<f64>,
    tps: Vec<f64>,
    thresholds: Vec<f64>,
}

fn threshold_counts(y_true: &Array1<f64>, scores: &Array1<f64>) -> Result<ThresholdCounts> {
    if y_true.len() != scores.len() {
        return Err(PipelineError::ShapeError {
            expected: format!("{} scores", y_true.len()),
            actual: format!("{} scores", scores.len()),
        });
    }
    if y_true.is_empty() {
        return Err(PipelineError::ValidationError(
            "Cannot compute a curve on empty input".to_string(),
        ));
    }
    if scores.iter().any(|s| !s.is_finite()) {
        return Err(PipelineError::ValidationError(
            "Scores must be finite".to_string(),
        ));
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut fps = Vec::new();
    let mut tps = Vec::new();
    let mut thresholds = Vec::new();
    let (mut fp, mut tp) = (0.0, 0.0);

    for (pos, &i) in order.iter().enumerate() {
        if y_true[i] == 1.0 {
            tp += 1.0;
        } else {
            fp += 1.0;
        }
        let last_of_tie = order
            .get(pos + 1)
            .map_or(true, |&next| scores[next] != scores[i]);
        if last_of_tie {
            fps.push(fp);
            tps.push(tp);
            thresholds.push(scores[i]);
        }
    }

    Ok(ThresholdCounts {
        fps,
        tps,
        thresholds,
    })
}

/// Receiver operating characteristic curve
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocCurve {
    /// False positive rate, non-decreasing, starting at 0
    pub fpr: Vec<f64>,
    /// True positive rate, non-decreasing, starting at 0
    pub tpr: Vec<f64>,
    /// Score thresholds, decreasing; the first is +inf
    pub thresholds: Vec<f64>,
    /// Area under the curve (trapezoidal)
    pub auc: f64,
}

impl RocCurve {
    /// Build the curve from labels 0/1 and positive-class scores
    pub fn compute(y_true: &Array1<f64>, scores: &Array1<f64>) -> Result<Self> {
        let counts = threshold_counts(y_true, scores)?;
        let n_pos = counts.tps.last().copied().unwrap_or(0.0);
        let n_neg = counts.fps.last().copied().unwrap_or(0.0);
        if n_pos == 0.0 || n_neg == 0.0 {
            return Err(PipelineError::ValidationError(
                "ROC AUC is undefined when only one class is present".to_string(),
            ));
        }

        let mut fpr = vec![0.0];
        let mut tpr = vec![0.0];
        let mut thresholds = vec![f64::INFINITY];
        for k in 0..counts.thresholds.len() {
            fpr.push(counts.fps[k] / n_neg);
            tpr.push(counts.tps[k] / n_pos);
            thresholds.push(counts.thresholds[k]);
        }

        let auc = fpr
            .windows(2)
            .zip(tpr.windows(2))
            .map(|(f, t)| (f[1] - f[0]) * (t[1] + t[0]) / 2.0)
            .sum();

        Ok(Self {
            fpr,
            tpr,
            thresholds,
            auc,
        })
    }
}

/// Area under the ROC curve; ties between scores count one half
pub fn roc_auc_score(y_true: &Array1<f64>, scores: &Array1<f64>) -> Result<f64> {
    Ok(RocCurve::compute(y_true, scores)?.auc)
}

/// Precision-recall curve
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrecisionRecallCurve {
    /// Precision per point; the first point is (recall 0, precision 1)
    pub precision: Vec<f64>,
    /// Recall per point, non-decreasing
    pub recall: Vec<f64>,
    /// Score thresholds, decreasing, one per point after the first
    pub thresholds: Vec<f64>,
    /// Σ (Rₙ - Rₙ₋₁) Pₙ
    pub average_precision: f64,
}

impl PrecisionRecallCurve {
    pub fn compute(y_true: &Array1<f64>, scores: &Array1<f64>) -> Result<Self> {
        let counts = threshold_counts(y_true, scores)?;
        let n_pos = counts.tps.last().copied().unwrap_or(0.0);
        if n_pos == 0.0 {
            return Err(PipelineError::ValidationError(
                "Precision-recall curve needs at least one positive sample".to_string(),
            ));
        }

        let mut precision = vec![1.0];
        let mut recall = vec![0.0];
        for k in 0..counts.thresholds.len() {
            let predicted = counts.tps[k] + counts.fps[k];
            precision.push(if predicted > 0.0 { counts.tps[k] / predicted } else { 0.0 });
            recall.push(counts.tps[k] / n_pos);
        }

        let average_precision = (1..recall.len())
            .map(|k| (recall[k] - recall[k - 1]) * precision[k])
            .sum();

        Ok(Self {
            precision,
            recall,
            thresholds: counts.thresholds,
            average_precision,
        })
    }
}
