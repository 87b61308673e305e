//! Classification metrics for labels 0/1

use super::curves::roc_auc_score;
use crate::error::{PipelineError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;

fn check_lengths(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<()> {
    if y_true.len() != y_pred.len() {
        return Err(PipelineError::ShapeError {
            expected: format!("{} predictions", y_true.len()),
            actual: format!("{} predictions", y_pred.len()),
        });
    }
    if y_true.is_empty() {
        return Err(PipelineError::ValidationError(
            "Cannot score an empty prediction set".to_string(),
        ));
    }
    Ok(())
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

fn f1(precision: f64, recall: f64) -> f64 {
    if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    }
}

/// 2×2 confusion matrix, class 1 positive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub tn: usize,
    pub fp: usize,
    pub fn_: usize,
    pub tp: usize,
}

impl ConfusionMatrix {
    pub fn from_predictions(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        check_lengths(y_true, y_pred)?;
        let mut cm = Self {
            tn: 0,
            fp: 0,
            fn_: 0,
            tp: 0,
        };
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            match (t == 1.0, p == 1.0) {
                (false, false) => cm.tn += 1,
                (false, true) => cm.fp += 1,
                (true, false) => cm.fn_ += 1,
                (true, true) => cm.tp += 1,
            }
        }
        Ok(cm)
    }

    /// Rows are actual classes, columns predicted classes
    pub fn as_rows(&self) -> [[usize; 2]; 2] {
        [[self.tn, self.fp], [self.fn_, self.tp]]
    }

    pub fn total(&self) -> usize {
        self.tn + self.fp + self.fn_ + self.tp
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.tn + self.tp, self.total())
    }

    /// Precision, recall and F1 treating `class` as positive
    fn scores_for(&self, class: usize) -> (f64, f64, f64, usize) {
        let (tp, fp, fn_) = if class == 1 {
            (self.tp, self.fp, self.fn_)
        } else {
            (self.tn, self.fn_, self.fp)
        };
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        (precision, recall, f1(precision, recall), tp + fn_)
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows = self.as_rows();
        let width = rows
            .iter()
            .flatten()
            .map(|v| v.to_string().len())
            .max()
            .unwrap_or(1)
            .max(6);
        writeln!(f, "{:>10} {:>w$} {:>w$}", "", "pred 0", "pred 1", w = width)?;
        writeln!(f, "{:>10} {:>w$} {:>w$}", "actual 0", rows[0][0], rows[0][1], w = width)?;
        write!(f, "{:>10} {:>w$} {:>w$}", "actual 1", rows[1][0], rows[1][1], w = width)
    }
}

/// Test-set metrics for one model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub accuracy: f64,
    /// Precision of class 1
    pub precision: f64,
    /// Recall of class 1
    pub recall: f64,
    pub f1_score: f64,
    /// Present only when the model produced probabilities
    pub roc_auc: Option<f64>,
}

impl ModelMetrics {
    /// Compute classification metrics
    pub fn compute(
        y_true: &Array1<f64>,
        y_pred: &Array1<f64>,
        y_prob: Option<&Array1<f64>>,
    ) -> Result<Self> {
        let cm = ConfusionMatrix::from_predictions(y_true, y_pred)?;
        let (precision, recall, f1_score, _) = cm.scores_for(1);
        let roc_auc = y_prob.map(|p| roc_auc_score(y_true, p)).transpose()?;

        Ok(Self {
            accuracy: cm.accuracy(),
            precision,
            recall,
            f1_score,
            roc_auc,
        })
    }
}

fn weighted_mean(classes: &[ClassScores], weights: [f64; 2], support: usize) -> ClassScores {
    let w_sum: f64 = weights.iter().sum();
    let mean = |value: fn(&ClassScores) -> f64| {
        if w_sum > 0.0 {
            classes.iter().zip(weights).map(|(c, w)| w * value(c)).sum::<f64>() / w_sum
        } else {
            0.0
        }
    };
    ClassScores {
        precision: mean(|c| c.precision),
        recall: mean(|c| c.recall),
        f1_score: mean(|c| c.f1_score),
        support,
    }
}

/// Scores for one class or one average row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassScores {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// Per-class precision/recall/F1 with macro and weighted averages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationReport {
    /// Indexed by class label (0, 1)
    pub classes: Vec<ClassScores>,
    pub accuracy: f64,
    pub macro_avg: ClassScores,
    pub weighted_avg: ClassScores,
}

impl ClassificationReport {
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        let cm = ConfusionMatrix::from_predictions(y_true, y_pred)?;
        Ok(Self::from_confusion(&cm))
    }

    pub fn from_confusion(cm: &ConfusionMatrix) -> Self {
        let classes: Vec<ClassScores> = (0..2)
            .map(|c| {
                let (precision, recall, f1_score, support) = cm.scores_for(c);
                ClassScores {
                    precision,
                    recall,
                    f1_score,
                    support,
                }
            })
            .collect();

        let total = cm.total();
        let macro_avg = weighted_mean(&classes, [1.0, 1.0], total);
        let weighted_avg = weighted_mean(
            &classes,
            [classes[0].support as f64, classes[1].support as f64],
            total,
        );

        Self {
            accuracy: cm.accuracy(),
            classes,
            macro_avg,
            weighted_avg,
        }
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>14} {:>10} {:>10} {:>10} {:>10}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        for (label, s) in self.classes.iter().enumerate() {
            writeln!(
                f,
                "{:>14} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                label, s.precision, s.recall, s.f1_score, s.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>14} {:>10} {:>10} {:>10.2} {:>10}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        )?;
        for (name, s) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            writeln!(
                f,
                "{:>14} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                name, s.precision, s.recall, s.f1_score, s.support
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_confusion_matrix() {
        let y_true = array![1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 0.0];
        let y_pred = array![1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0];
        let cm = ConfusionMatrix::from_predictions(&y_true, &y_pred).unwrap();

        assert_eq!(cm.as_rows(), [[3, 1], [1, 3]]);
        assert_eq!(cm.total(), 8);
        assert!((cm.accuracy() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_model_metrics() {
        let y_true = array![1.0, 1.0, 1.0, 0.0, 0.0];
        let y_pred = array![1.0, 1.0, 0.0, 1.0, 0.0];
        let y_prob = array![0.9, 0.8, 0.3, 0.6, 0.1];
        let m = ModelMetrics::compute(&y_true, &y_pred, Some(&y_prob)).unwrap();

        assert!((m.accuracy - 0.6).abs() < 1e-12);
        assert!((m.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((m.recall - 2.0 / 3.0).abs() < 1e-12);
        assert!((m.f1_score - 2.0 / 3.0).abs() < 1e-12);
        // pairs (pos, neg) ordered correctly: 5 of 6
        assert!((m.roc_auc.unwrap() - 5.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_division_is_zero() {
        let y_true = array![1.0, 0.0, 1.0];
        let y_pred = array![0.0, 0.0, 0.0];
        let m = ModelMetrics::compute(&y_true, &y_pred, None).unwrap();

        assert_eq!(m.precision, 0.0);
        assert_eq!(m.recall, 0.0);
        assert_eq!(m.f1_score, 0.0);
        assert!(m.roc_auc.is_none());
    }

    #[test]
    fn test_classification_report_averages() {
        let y_true = array![0.0, 0.0, 0.0, 1.0];
        let y_pred = array![0.0, 0.0, 1.0, 1.0];
        let report = ClassificationReport::compute(&y_true, &y_pred).unwrap();

        assert_eq!(report.classes[0].support, 3);
        assert_eq!(report.classes[1].support, 1);
        assert!((report.classes[0].precision - 1.0).abs() < 1e-12);
        assert!((report.classes[1].precision - 0.5).abs() < 1e-12);
        assert!((report.macro_avg.precision - 0.75).abs() < 1e-12);
        // (3 * 1.0 + 1 * 0.5) / 4
        assert!((report.weighted_avg.precision - 0.875).abs() < 1e-12);
        assert_eq!(report.weighted_avg.support, 4);

        let text = report.to_string();
        assert!(text.contains("macro avg"));
        assert!(text.contains("weighted avg"));
    }

    #[test]
    fn test_length_mismatch() {
        let y_true = array![1.0, 0.0];
        let y_pred = array![1.0];
        assert!(ConfusionMatrix::from_predictions(&y_true, &y_pred).is_err());
    }
}
