//! Platt scaling (sigmoid calibration)

use crate::calibration::Calibrator;
use crate::error::{PipelineError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Platt scaling calibrator
///
/// Fits a sigmoid function: P(y=1|f) = 1 / (1 + exp(A*f + B))
/// where f is the raw decision value. Fitting uses Newton's method with a
/// backtracking line search on the regularized targets
/// (n+ + 1)/(n+ + 2) and 1/(n- + 2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlattScaling {
    /// Slope parameter A
    a: Option<f64>,
    /// Intercept parameter B
    b: Option<f64>,
    /// Maximum iterations
    max_iter: usize,
    /// Hessian ridge
    sigma: f64,
    /// Convergence tolerance on the gradient
    tol: f64,
}

impl PlattScaling {
    /// Create new Platt scaling calibrator
    pub fn new() -> Self {
        Self {
            a: None,
            b: None,
            max_iter: 100,
            sigma: 1e-12,
            tol: 1e-5,
        }
    }

    /// Get fitted parameters
    pub fn parameters(&self) -> Option<(f64, f64)> {
        match (self.a, self.b) {
            (Some(a), Some(b)) => Some((a, b)),
            _ => None,
        }
    }

    /// 1 / (1 + exp(z)) without overflow
    fn sigmoid_neg(z: f64) -> f64 {
        if z >= 0.0 {
            let e = (-z).exp();
            e / (1.0 + e)
        } else {
            1.0 / (1.0 + z.exp())
        }
    }

    /// Negative log-likelihood of the targets under parameters (a, b)
    fn objective(scores: &[f64], targets: &[f64], a: f64, b: f64) -> f64 {
        scores
            .iter()
            .zip(targets)
            .map(|(&f, &t)| {
                let z = a * f + b;
                if z >= 0.0 {
                    t * z + (1.0 + (-z).exp()).ln()
                } else {
                    (t - 1.0) * z + (1.0 + z.exp()).ln()
                }
            })
            .sum()
    }
}

impl Default for PlattScaling {
    fn default() -> Self {
        Self::new()
    }
}

impl Calibrator for PlattScaling {
    fn fit(&mut self, scores: &Array1<f64>, labels: &Array1<f64>) -> Result<()> {
        let n = scores.len();
        if n != labels.len() {
            return Err(PipelineError::ValidationError(
                "Scores and labels must have same length".to_string(),
            ));
        }
        if n == 0 {
            return Err(PipelineError::ValidationError("Empty input".to_string()));
        }

        let n_pos = labels.iter().filter(|&&y| y > 0.5).count() as f64;
        let n_neg = n as f64 - n_pos;

        let target_pos = (n_pos + 1.0) / (n_pos + 2.0);
        let target_neg = 1.0 / (n_neg + 2.0);

        let f: Vec<f64> = scores.to_vec();
        let t: Vec<f64> = labels
            .iter()
            .map(|&y| if y > 0.5 { target_pos } else { target_neg })
            .collect();

        let mut a = 0.0;
        let mut b = ((n_neg + 1.0) / (n_pos + 1.0)).ln();
        let mut fval = Self::objective(&f, &t, a, b);

        for _ in 0..self.max_iter {
            let mut h11 = self.sigma;
            let mut h22 = self.sigma;
            let mut h21 = 0.0;
            let mut g1 = 0.0;
            let mut g2 = 0.0;

            for (&fi, &ti) in f.iter().zip(&t) {
                // p is P(y=1), q = 1 - p
                let p = Self::sigmoid_neg(a * fi + b);
                let q = 1.0 - p;
                let d2 = p * q;
                h11 += fi * fi * d2;
                h22 += d2;
                h21 += fi * d2;
                let d1 = ti - p;
                g1 += fi * d1;
                g2 += d1;
            }

            if g1.abs() < self.tol && g2.abs() < self.tol {
                break;
            }

            let det = h11 * h22 - h21 * h21;
            if det.abs() < f64::EPSILON {
                break;
            }
            let da = -(h22 * g1 - h21 * g2) / det;
            let db = -(-h21 * g1 + h11 * g2) / det;
            let gd = g1 * da + g2 * db;

            let mut step = 1.0;
            let mut accepted = false;
            while step >= 1e-10 {
                let new_a = a + step * da;
                let new_b = b + step * db;
                let new_f = Self::objective(&f, &t, new_a, new_b);
                if new_f < fval + 1e-4 * step * gd {
                    a = new_a;
                    b = new_b;
                    fval = new_f;
                    accepted = true;
                    break;
                }
                step /= 2.0;
            }

            if !accepted {
                break;
            }
        }

        self.a = Some(a);
        self.b = Some(b);

        Ok(())
    }

    fn calibrate(&self, scores: &Array1<f64>) -> Result<Array1<f64>> {
        let (a, b) = self.parameters().ok_or(PipelineError::ModelNotFitted)?;
        Ok(scores.mapv(|f| Self::sigmoid_neg(a * f + b)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_platt_scaling_basic() {
        let scores = array![-2.0, -0.5, -0.8, 1.2, 2.5, -1.5, 0.9, 0.3];
        let labels = array![0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 1.0];

        let mut calibrator = PlattScaling::new();
        let calibrated = calibrator.fit_calibrate(&scores, &labels).unwrap();

        assert_eq!(calibrated.len(), scores.len());
        assert!(calibrated.iter().all(|&p| (0.0..=1.0).contains(&p)));
    }

    #[test]
    fn test_platt_is_monotone_in_score() {
        let scores = array![-3.0, -1.0, -0.2, 0.4, 1.1, 2.0, -0.6, 0.1];
        let labels = array![0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0];

        let mut calibrator = PlattScaling::new();
        calibrator.fit(&scores, &labels).unwrap();

        let (a, _) = calibrator.parameters().unwrap();
        assert!(a < 0.0);

        let grid = array![-2.0, -1.0, 0.0, 1.0, 2.0];
        let probs = calibrator.calibrate(&grid).unwrap();
        for w in probs.windows(2) {
            assert!(w[1] > w[0]);
        }
    }

    #[test]
    fn test_platt_unfitted() {
        let calibrator = PlattScaling::new();
        assert!(calibrator.parameters().is_none());
        assert!(calibrator.calibrate(&array![0.0]).is_err());
    }

    #[test]
    fn test_platt_length_mismatch() {
        let mut calibrator = PlattScaling::new();
        assert!(calibrator.fit(&array![0.0, 1.0], &array![1.0]).is_err());
    }
}
