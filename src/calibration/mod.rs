//! Probability calibration
//!
//! Maps raw classifier scores (e.g. SVM decision values) to probabilities.

mod platt;

pub use platt::PlattScaling;

use crate::error::Result;
use ndarray::Array1;

/// Trait for probability calibrators
pub trait Calibrator: Send + Sync {
    /// Fit the calibrator on raw scores and true labels
    fn fit(&mut self, scores: &Array1<f64>, labels: &Array1<f64>) -> Result<()>;

    /// Convert scores to probabilities of the positive class
    fn calibrate(&self, scores: &Array1<f64>) -> Result<Array1<f64>>;

    /// Fit and calibrate in one step
    fn fit_calibrate(&mut self, scores: &Array1<f64>, labels: &Array1<f64>) -> Result<Array1<f64>> {
        self.fit(scores, labels)?;
        self.calibrate(scores)
    }
}
