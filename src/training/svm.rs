//! Support Vector Machine classifier
//!
//! C-SVC trained with SMO using second-order working set selection on a
//! precomputed kernel matrix. Probabilities come from Platt scaling fitted on
//! out-of-fold decision values.

use crate::calibration::{Calibrator, PlattScaling};
use crate::error::{PipelineError, Result};
use crate::training::cross_validation::{CVStrategy, CrossValidator};
use crate::training::models::Classifier;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Maximum number of samples for eager kernel matrix computation.
/// Beyond this, training will return an error to prevent OOM.
const MAX_KERNEL_MATRIX_SAMPLES: usize = 10_000;

/// Floor for a non-positive curvature in the two-variable subproblem
const TAU: f64 = 1e-12;

/// Kernel function type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KernelType {
    /// Linear kernel: K(x, y) = x · y
    Linear,
    /// Polynomial kernel: K(x, y) = (γ * x · y + r)^d
    Polynomial { degree: u32, coef0: f64 },
    /// Radial Basis Function (Gaussian): K(x, y) = exp(-γ * ||x - y||²)
    RBF,
    /// Sigmoid kernel: K(x, y) = tanh(γ * x · y + r)
    Sigmoid { coef0: f64 },
}

impl Default for KernelType {
    fn default() -> Self {
        KernelType::RBF
    }
}

/// Kernel coefficient γ
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Gamma {
    /// 1 / (n_features * Var(X)), variance over all entries of X
    Scale,
    /// 1 / n_features
    Auto,
    /// Fixed value
    Value(f64),
}

impl Default for Gamma {
    fn default() -> Self {
        Gamma::Scale
    }
}

impl Gamma {
    /// Resolve to a number for training data `x`
    pub fn resolve(&self, x: &Array2<f64>) -> f64 {
        let n_features = x.ncols().max(1) as f64;
        match *self {
            Gamma::Scale => {
                let var = if x.is_empty() { 0.0 } else { x.var(0.0) };
                if var > 0.0 {
                    1.0 / (n_features * var)
                } else {
                    1.0
                }
            }
            Gamma::Auto => 1.0 / n_features,
            Gamma::Value(g) => g,
        }
    }
}

/// SVM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SVMConfig {
    /// Regularization parameter (C)
    pub c: f64,
    /// Kernel function
    pub kernel: KernelType,
    /// Kernel coefficient
    pub gamma: Gamma,
    /// Tolerance for stopping criterion
    pub tol: f64,
    /// Maximum number of SMO iterations
    pub max_iter: usize,
    /// Fit Platt scaling so that probabilities are available
    pub probability: bool,
    /// Folds producing the out-of-fold decision values for Platt scaling
    pub platt_folds: usize,
    /// Random seed; the pipeline seed is used when unset
    pub random_state: Option<u64>,
}

impl Default for SVMConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            kernel: KernelType::RBF,
            gamma: Gamma::Scale,
            tol: 1e-3,
            max_iter: 100_000,
            probability: true,
            platt_folds: 5,
            random_state: None,
        }
    }
}

impl SVMConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.c > 0.0) {
            return Err(PipelineError::InvalidParameter {
                name: "svm.c".to_string(),
                value: self.c.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if let Gamma::Value(g) = self.gamma {
            if !(g > 0.0) {
                return Err(PipelineError::InvalidParameter {
                    name: "svm.gamma".to_string(),
                    value: g.to_string(),
                    reason: "must be positive".to_string(),
                });
            }
        }
        if self.probability && self.platt_folds < 2 {
            return Err(PipelineError::InvalidParameter {
                name: "svm.platt_folds".to_string(),
                value: self.platt_folds.to_string(),
                reason: "need at least 2 folds".to_string(),
            });
        }
        Ok(())
    }
}

/// Kernel with a resolved γ
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Kernel {
    kind: KernelType,
    gamma: f64,
}

impl Kernel {
    fn eval(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        match &self.kind {
            KernelType::Linear => a.dot(&b),
            KernelType::Polynomial { degree, coef0 } => {
                (self.gamma * a.dot(&b) + coef0).powi(*degree as i32)
            }
            KernelType::RBF => {
                let norm_sq: f64 = a.iter().zip(b.iter()).map(|(p, q)| (p - q) * (p - q)).sum();
                (-self.gamma * norm_sq).exp()
            }
            KernelType::Sigmoid { coef0 } => (self.gamma * a.dot(&b) + coef0).tanh(),
        }
    }

    /// Full Gram matrix, rows computed in parallel
    fn matrix(&self, x: &Array2<f64>) -> Array2<f64> {
        let n = x.nrows();
        let rows: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|i| (0..n).map(|j| self.eval(x.row(i), x.row(j))).collect())
            .collect();
        Array2::from_shape_fn((n, n), |(i, j)| rows[i][j])
    }
}

/// Dual solution of the C-SVC problem
struct SmoSolution {
    alphas: Vec<f64>,
    rho: f64,
    iterations: usize,
    converged: bool,
}

/// Sequential minimal optimization with second-order working set selection.
/// `y` holds ±1 labels; the decision function is Σ αᵢyᵢK(xᵢ, x) - ρ.
fn solve_smo(k: &Array2<f64>, y: &[f64], c: f64, eps: f64, max_iter: usize) -> SmoSolution {
    let n = y.len();
    let mut alpha = vec![0.0; n];
    // Gradient of ½αᵀQα - eᵀα with Qᵢⱼ = yᵢyⱼKᵢⱼ
    let mut grad = vec![-1.0; n];
    let in_up = |t: usize, a: &[f64]| if y[t] > 0.0 { a[t] < c } else { a[t] > 0.0 };
    let in_low = |t: usize, a: &[f64]| if y[t] > 0.0 { a[t] > 0.0 } else { a[t] < c };

    let mut iterations = 0;
    let mut converged = false;

    while iterations < max_iter {
        let mut gmax = f64::NEG_INFINITY;
        let mut i_sel = None;
        for t in 0..n {
            let v = -y[t] * grad[t];
            if in_up(t, &alpha) && v >= gmax {
                gmax = v;
                i_sel = Some(t);
            }
        }

        let mut gmax2 = f64::NEG_INFINITY;
        let mut j_sel = None;
        let mut obj_min = f64::INFINITY;
        if let Some(i) = i_sel {
            for t in 0..n {
                if !in_low(t, &alpha) {
                    continue;
                }
                let v = y[t] * grad[t];
                gmax2 = gmax2.max(v);
                let grad_diff = gmax + v;
                if grad_diff > 0.0 {
                    let quad = k[[i, i]] + k[[t, t]] - 2.0 * k[[i, t]];
                    let obj = -(grad_diff * grad_diff) / if quad > 0.0 { quad } else { TAU };
                    if obj <= obj_min {
                        obj_min = obj;
                        j_sel = Some(t);
                    }
                }
            }
        }

        let (i, j) = match (i_sel, j_sel) {
            (Some(i), Some(j)) if gmax + gmax2 >= eps => (i, j),
            _ => {
                converged = true;
                break;
            }
        };
        iterations += 1;

        let old_i = alpha[i];
        let old_j = alpha[j];
        let quad = {
            let q = k[[i, i]] + k[[j, j]] - 2.0 * k[[i, j]];
            if q > 0.0 {
                q
            } else {
                TAU
            }
        };

        if y[i] != y[j] {
            let delta = (-grad[i] - grad[j]) / quad;
            let diff = alpha[i] - alpha[j];
            alpha[i] += delta;
            alpha[j] += delta;
            if diff > 0.0 {
                if alpha[j] < 0.0 {
                    alpha[j] = 0.0;
                    alpha[i] = diff;
                }
            } else if alpha[i] < 0.0 {
                alpha[i] = 0.0;
                alpha[j] = -diff;
            }
            if diff > 0.0 {
                if alpha[i] > c {
                    alpha[i] = c;
                    alpha[j] = c - diff;
                }
            } else if alpha[j] > c {
                alpha[j] = c;
                alpha[i] = c + diff;
            }
        } else {
            let delta = (grad[i] - grad[j]) / quad;
            let sum = alpha[i] + alpha[j];
            alpha[i] -= delta;
            alpha[j] += delta;
            if sum > c {
                if alpha[i] > c {
                    alpha[i] = c;
                    alpha[j] = sum - c;
                }
            } else if alpha[j] < 0.0 {
                alpha[j] = 0.0;
                alpha[i] = sum;
            }
            if sum > c {
                if alpha[j] > c {
                    alpha[j] = c;
                    alpha[i] = sum - c;
                }
            } else if alpha[i] < 0.0 {
                alpha[i] = 0.0;
                alpha[j] = sum;
            }
        }

        let d_i = (alpha[i] - old_i) * y[i];
        let d_j = (alpha[j] - old_j) * y[j];
        for t in 0..n {
            grad[t] += y[t] * (k[[t, i]] * d_i + k[[t, j]] * d_j);
        }
    }

    // ρ: mean of yG over free variables, midpoint of the feasible range otherwise
    let mut ub = f64::INFINITY;
    let mut lb = f64::NEG_INFINITY;
    let mut sum_free = 0.0;
    let mut n_free = 0usize;
    for t in 0..n {
        let yg = y[t] * grad[t];
        if alpha[t] >= c {
            if y[t] < 0.0 {
                ub = ub.min(yg);
            } else {
                lb = lb.max(yg);
            }
        } else if alpha[t] <= 0.0 {
            if y[t] > 0.0 {
                ub = ub.min(yg);
            } else {
                lb = lb.max(yg);
            }
        } else {
            n_free += 1;
            sum_free += yg;
        }
    }
    let rho = if n_free > 0 {
        sum_free / n_free as f64
    } else {
        (ub + lb) / 2.0
    };

    SmoSolution {
        alphas: alpha,
        rho,
        iterations,
        converged,
    }
}

/// Support Vector Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMClassifier {
    config: SVMConfig,
    kernel: Option<Kernel>,
    /// Support vectors
    support_vectors: Option<Array2<f64>>,
    /// αᵢyᵢ for each support vector
    dual_coef: Option<Array1<f64>>,
    rho: f64,
    /// Sigmoid mapping decision values to probabilities
    platt: Option<PlattScaling>,
    n_features: usize,
}

impl SVMClassifier {
    /// Create a new SVM classifier
    pub fn new(config: SVMConfig) -> Self {
        Self {
            config,
            kernel: None,
            support_vectors: None,
            dual_coef: None,
            rho: 0.0,
            platt: None,
            n_features: 0,
        }
    }

    pub fn config(&self) -> &SVMConfig {
        &self.config
    }

    /// Resolved kernel coefficient after fitting
    pub fn gamma(&self) -> Option<f64> {
        self.kernel.as_ref().map(|k| k.gamma)
    }

    /// Fit the classifier on labels 0/1
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.config.validate()?;
        let n = x.nrows();

        if n != y.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("y length = {}", n),
                actual: format!("y length = {}", y.len()),
            });
        }
        if y.iter().any(|&v| v != 0.0 && v != 1.0) {
            return Err(PipelineError::ValidationError(
                "SVM classifier expects labels 0 or 1".to_string(),
            ));
        }
        let n_pos = y.iter().filter(|&&v| v == 1.0).count();
        if n_pos == 0 || n_pos == n {
            return Err(PipelineError::TrainingError(
                "SVM requires at least 2 distinct classes".to_string(),
            ));
        }
        if n > MAX_KERNEL_MATRIX_SAMPLES {
            return Err(PipelineError::TrainingError(format!(
                "Dataset has {} samples, exceeding the maximum {} for SVM kernel matrix. \
                 Consider subsampling or using a different algorithm.",
                n, MAX_KERNEL_MATRIX_SAMPLES
            )));
        }

        self.fit_dual(x, y);

        self.platt = if self.config.probability {
            Some(self.fit_platt(x, y)?)
        } else {
            None
        };

        Ok(())
    }

    fn fit_dual(&mut self, x: &Array2<f64>, y: &Array1<f64>) {
        let kernel = Kernel {
            kind: self.config.kernel.clone(),
            gamma: self.config.gamma.resolve(x),
        };
        let k = kernel.matrix(x);
        let y_pm: Vec<f64> = y.iter().map(|&v| if v == 1.0 { 1.0 } else { -1.0 }).collect();

        let solution = solve_smo(&k, &y_pm, self.config.c, self.config.tol, self.config.max_iter);
        if !solution.converged {
            warn!(
                iterations = solution.iterations,
                "SMO reached the iteration limit before convergence"
            );
        }

        let support: Vec<usize> = (0..x.nrows())
            .filter(|&i| solution.alphas[i] > 0.0)
            .collect();
        let dual_coef: Array1<f64> = support
            .iter()
            .map(|&i| solution.alphas[i] * y_pm[i])
            .collect();

        debug!(
            n_support = support.len(),
            iterations = solution.iterations,
            gamma = kernel.gamma,
            rho = solution.rho,
            "SVM dual solved"
        );

        self.support_vectors = Some(x.select(Axis(0), &support));
        self.dual_coef = Some(dual_coef);
        self.rho = solution.rho;
        self.kernel = Some(kernel);
        self.n_features = x.ncols();
    }

    /// Platt scaling on decision values of models that did not see each row
    fn fit_platt(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<PlattScaling> {
        let seed = self.config.random_state.unwrap_or(0);
        let cv = CrossValidator::new(CVStrategy::StratifiedKFold {
            n_splits: self.config.platt_folds,
            shuffle: true,
        })
        .with_random_state(seed);

        let inner_config = SVMConfig {
            probability: false,
            ..self.config.clone()
        };

        let mut oof = Array1::<f64>::zeros(x.nrows());
        for split in cv.split(x.nrows(), Some(y))? {
            let x_train = x.select(Axis(0), &split.train_indices);
            let y_train = y.select(Axis(0), &split.train_indices);
            let x_test = x.select(Axis(0), &split.test_indices);

            let mut inner = SVMClassifier::new(inner_config.clone());
            inner.fit(&x_train, &y_train)?;
            let scores = inner.decision_function(&x_test)?;
            for (k, &i) in split.test_indices.iter().enumerate() {
                oof[i] = scores[k];
            }
        }

        let mut platt = PlattScaling::new();
        platt.fit(&oof, y)?;
        debug!(params = ?platt.parameters(), "Platt scaling fitted");
        Ok(platt)
    }

    /// Signed distance to the separating surface; positive means class 1
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (kernel, sv, coef) = match (&self.kernel, &self.support_vectors, &self.dual_coef) {
            (Some(k), Some(sv), Some(coef)) => (k, sv, coef),
            _ => return Err(PipelineError::ModelNotFitted),
        };
        if x.ncols() != self.n_features {
            return Err(PipelineError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }

        let scores: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let row = x.row(i);
                sv.rows()
                    .into_iter()
                    .zip(coef.iter())
                    .map(|(s, &a)| a * kernel.eval(s, row))
                    .sum::<f64>()
                    - self.rho
            })
            .collect();

        Ok(Array1::from_vec(scores))
    }

    /// Predict class labels
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self
            .decision_function(x)?
            .mapv(|s| if s > 0.0 { 1.0 } else { 0.0 }))
    }

    /// Calibrated probabilities of class 1; `None` when calibration is disabled
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Option<Array1<f64>>> {
        let scores = self.decision_function(x)?;
        match &self.platt {
            Some(platt) => Ok(Some(platt.calibrate(&scores)?)),
            None => Ok(None),
        }
    }

    /// Get number of support vectors
    pub fn n_support_vectors(&self) -> usize {
        self.support_vectors.as_ref().map(|sv| sv.nrows()).unwrap_or(0)
    }
}

impl Classifier for SVMClassifier {
    fn name(&self) -> &'static str {
        "SVM"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        SVMClassifier::fit(self, x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        SVMClassifier::predict(self, x)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Option<Array1<f64>>> {
        SVMClassifier::predict_proba(self, x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn two_blobs() -> (Array2<f64>, Array1<f64>) {
        let mut data = Vec::new();
        let mut labels = Vec::new();
        for i in 0..20 {
            let t = i as f64 * 0.1;
            data.extend_from_slice(&[-2.0 + t.sin(), -2.0 + t.cos()]);
            labels.push(0.0);
            data.extend_from_slice(&[2.0 + t.cos(), 2.0 + t.sin()]);
            labels.push(1.0);
        }
        (Array2::from_shape_vec((40, 2), data).unwrap(), Array1::from_vec(labels))
    }

    fn no_probability() -> SVMConfig {
        SVMConfig {
            probability: false,
            random_state: Some(42),
            ..Default::default()
        }
    }

    #[test]
    fn test_separable_blobs() {
        let (x, y) = two_blobs();
        let mut svm = SVMClassifier::new(no_probability());
        svm.fit(&x, &y).unwrap();

        assert_eq!(svm.predict(&x).unwrap(), y);
        assert!(svm.n_support_vectors() > 0);
        assert!(svm.n_support_vectors() < 40);
    }

    #[test]
    fn test_rbf_learns_xor() {
        let x = array![
            [0.0, 0.0],
            [0.1, 0.1],
            [1.0, 1.0],
            [0.9, 0.9],
            [0.0, 1.0],
            [0.1, 0.9],
            [1.0, 0.0],
            [0.9, 0.1]
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];

        let mut svm = SVMClassifier::new(SVMConfig {
            c: 10.0,
            gamma: Gamma::Value(2.0),
            ..no_probability()
        });
        svm.fit(&x, &y).unwrap();
        assert_eq!(svm.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_linear_kernel_margin() {
        let x = array![[-1.0], [-2.0], [1.0], [2.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut svm = SVMClassifier::new(SVMConfig {
            kernel: KernelType::Linear,
            c: 100.0,
            ..no_probability()
        });
        svm.fit(&x, &y).unwrap();

        // Hard margin: w = 1, b = 0
        let scores = svm.decision_function(&array![[0.0], [1.0], [-1.0]]).unwrap();
        assert!(scores[0].abs() < 1e-2);
        assert!((scores[1] - 1.0).abs() < 1e-2);
        assert!((scores[2] + 1.0).abs() < 1e-2);
    }

    #[test]
    fn test_gamma_scale() {
        let x = array![[0.0, 2.0], [2.0, 0.0]];
        // entries 0, 2, 2, 0 -> variance 1
        assert!((Gamma::Scale.resolve(&x) - 0.5).abs() < 1e-12);
        assert!((Gamma::Auto.resolve(&x) - 0.5).abs() < 1e-12);
        assert_eq!(Gamma::Scale.resolve(&Array2::zeros((3, 2))), 1.0);
    }

    #[test]
    fn test_probability_calibration() {
        let (x, y) = two_blobs();
        let mut svm = SVMClassifier::new(SVMConfig {
            random_state: Some(42),
            ..Default::default()
        });
        svm.fit(&x, &y).unwrap();

        let proba = svm.predict_proba(&x).unwrap().unwrap();
        assert_eq!(proba.len(), 40);
        assert!(proba.iter().all(|&p| (0.0..=1.0).contains(&p)));

        let pos_mean: f64 = (0..40).filter(|&i| y[i] == 1.0).map(|i| proba[i]).sum::<f64>() / 20.0;
        let neg_mean: f64 = (0..40).filter(|&i| y[i] == 0.0).map(|i| proba[i]).sum::<f64>() / 20.0;
        assert!(pos_mean > 0.5 && neg_mean < 0.5);
    }

    #[test]
    fn test_probability_disabled() {
        let (x, y) = two_blobs();
        let mut svm = SVMClassifier::new(no_probability());
        svm.fit(&x, &y).unwrap();
        assert!(svm.predict_proba(&x).unwrap().is_none());
    }

    #[test]
    fn test_single_class_rejected() {
        let x = Array2::zeros((4, 2));
        let y = Array1::zeros(4);
        let mut svm = SVMClassifier::new(no_probability());
        assert!(svm.fit(&x, &y).is_err());
    }

    #[test]
    fn test_unfitted() {
        let svm = SVMClassifier::new(SVMConfig::default());
        assert!(matches!(
            svm.predict(&array![[0.0, 0.0]]),
            Err(PipelineError::ModelNotFitted)
        ));
    }
}
