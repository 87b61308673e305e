//! Cross-validation implementations

use crate::error::{PipelineError, Result};
use crate::training::models::Classifier;
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Cross-validation strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CVStrategy {
    /// K-Fold cross-validation
    KFold { n_splits: usize, shuffle: bool },
    /// Stratified K-Fold (maintains class distribution)
    StratifiedKFold { n_splits: usize, shuffle: bool },
}

impl Default for CVStrategy {
    fn default() -> Self {
        CVStrategy::StratifiedKFold {
            n_splits: 5,
            shuffle: false,
        }
    }
}

/// A single train/test split
#[derive(Debug, Clone)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Cross-validation splitter
#[derive(Debug, Clone)]
pub struct CrossValidator {
    strategy: CVStrategy,
    random_state: Option<u64>,
}

impl CrossValidator {
    /// Create a new cross-validator
    pub fn new(strategy: CVStrategy) -> Self {
        Self {
            strategy,
            random_state: None,
        }
    }

    /// Set random state for reproducibility
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn n_splits(&self) -> usize {
        match self.strategy {
            CVStrategy::KFold { n_splits, .. } | CVStrategy::StratifiedKFold { n_splits, .. } => {
                n_splits
            }
        }
    }

    fn rng(&self) -> ChaCha8Rng {
        match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        }
    }

    /// Generate train/test splits
    pub fn split(&self, n_samples: usize, y: Option<&Array1<f64>>) -> Result<Vec<CVSplit>> {
        let n_splits = self.n_splits();
        if n_splits < 2 {
            return Err(PipelineError::ValidationError(
                "n_splits must be at least 2".to_string(),
            ));
        }
        if n_samples < n_splits {
            return Err(PipelineError::ValidationError(format!(
                "n_samples ({}) must be >= n_splits ({})",
                n_samples, n_splits
            )));
        }

        match &self.strategy {
            CVStrategy::KFold { shuffle, .. } => Ok(self.k_fold_split(n_samples, n_splits, *shuffle)),
            CVStrategy::StratifiedKFold { shuffle, .. } => {
                let y = y.ok_or_else(|| {
                    PipelineError::ValidationError(
                        "StratifiedKFold requires target array".to_string(),
                    )
                })?;
                if y.len() != n_samples {
                    return Err(PipelineError::ShapeError {
                        expected: format!("{} labels", n_samples),
                        actual: format!("{} labels", y.len()),
                    });
                }
                Ok(self.stratified_k_fold_split(y, n_splits, *shuffle))
            }
        }
    }

    fn k_fold_split(&self, n_samples: usize, n_splits: usize, shuffle: bool) -> Vec<CVSplit> {
        let mut indices: Vec<usize> = (0..n_samples).collect();
        if shuffle {
            indices.shuffle(&mut self.rng());
        }

        let base = n_samples / n_splits;
        let remainder = n_samples % n_splits;
        let mut fold_of = vec![0usize; n_samples];
        let mut current = 0;
        for fold_idx in 0..n_splits {
            let fold_size = if fold_idx < remainder { base + 1 } else { base };
            for &i in &indices[current..current + fold_size] {
                fold_of[i] = fold_idx;
            }
            current += fold_size;
        }

        Self::splits_from_assignment(&fold_of, n_splits)
    }

    /// Fold sizes per class follow a round-robin over the sorted labels, and
    /// each class fills its folds in sample order (or shuffled order).
    fn stratified_k_fold_split(&self, y: &Array1<f64>, n_splits: usize, shuffle: bool) -> Vec<CVSplit> {
        let mut class_indices: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (idx, &val) in y.iter().enumerate() {
            class_indices.entry(val.round() as i64).or_default().push(idx);
        }

        if let Some((class, members)) = class_indices.iter().find(|(_, m)| m.len() < n_splits) {
            warn!(
                class,
                members = members.len(),
                n_splits,
                "Least populated class has fewer members than folds"
            );
        }

        // allocation[fold][class position]
        let mut sorted: Vec<i64> = y.iter().map(|v| v.round() as i64).collect();
        sorted.sort_unstable();
        let classes: Vec<i64> = class_indices.keys().copied().collect();
        let mut allocation = vec![vec![0usize; classes.len()]; n_splits];
        for (pos, label) in sorted.iter().enumerate() {
            if let Ok(k) = classes.binary_search(label) {
                allocation[pos % n_splits][k] += 1;
            }
        }

        let mut rng = self.rng_if(shuffle);
        let mut fold_of = vec![0usize; y.len()];
        for (k, members) in class_indices.values().enumerate() {
            let mut members = members.clone();
            if let Some(rng) = rng.as_mut() {
                members.shuffle(rng);
            }
            let mut cursor = members.iter();
            for (fold_idx, counts) in allocation.iter().enumerate() {
                for &i in cursor.by_ref().take(counts[k]) {
                    fold_of[i] = fold_idx;
                }
            }
        }

        Self::splits_from_assignment(&fold_of, n_splits)
    }

    fn rng_if(&self, shuffle: bool) -> Option<ChaCha8Rng> {
        shuffle.then(|| self.rng())
    }

    fn splits_from_assignment(fold_of: &[usize], n_splits: usize) -> Vec<CVSplit> {
        (0..n_splits)
            .map(|fold_idx| {
                let (test_indices, train_indices): (Vec<usize>, Vec<usize>) =
                    (0..fold_of.len()).partition(|&i| fold_of[i] == fold_idx);
                CVSplit {
                    train_indices,
                    test_indices,
                    fold_idx,
                }
            })
            .collect()
    }
}

/// Cross-validation results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CVResults {
    /// Scores for each fold
    pub scores: Vec<f64>,
    /// Mean score across folds
    pub mean_score: f64,
    /// Standard deviation of scores
    pub std_score: f64,
    /// Number of folds
    pub n_folds: usize,
}

impl CVResults {
    /// Create CV results from fold scores (population standard deviation)
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let n_folds = scores.len();
        if n_folds == 0 {
            return Self {
                scores,
                mean_score: f64::NAN,
                std_score: f64::NAN,
                n_folds,
            };
        }
        let mean_score = scores.iter().sum::<f64>() / n_folds as f64;
        let variance =
            scores.iter().map(|s| (s - mean_score).powi(2)).sum::<f64>() / n_folds as f64;
        let std_score = variance.sqrt();

        Self {
            scores,
            mean_score,
            std_score,
            n_folds,
        }
    }
}

/// Fraction of predictions equal to the labels
pub fn accuracy_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| (*t - *p).abs() < 0.5)
        .count();
    correct as f64 / y_true.len() as f64
}

/// Fit a fresh model per fold and score its accuracy on the held-out fold
pub fn cross_val_score<F>(
    make_model: F,
    x: &Array2<f64>,
    y: &Array1<f64>,
    cv: &CrossValidator,
) -> Result<CVResults>
where
    F: Fn() -> Result<Box<dyn Classifier>>,
{
    if x.nrows() != y.len() {
        return Err(PipelineError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }

    let splits = cv.split(x.nrows(), Some(y))?;
    let mut scores = Vec::with_capacity(splits.len());

    for split in &splits {
        let x_train = x.select(Axis(0), &split.train_indices);
        let y_train = y.select(Axis(0), &split.train_indices);
        let x_test = x.select(Axis(0), &split.test_indices);
        let y_test = y.select(Axis(0), &split.test_indices);

        let mut model = make_model()?;
        model.fit(&x_train, &y_train)?;
        let score = accuracy_score(&y_test, &model.predict(&x_test)?);

        debug!(
            model = model.name(),
            fold = split.fold_idx,
            train = split.train_indices.len(),
            test = split.test_indices.len(),
            accuracy = score,
            "Cross-validation fold scored"
        );
        scores.push(score);
    }

    Ok(CVResults::from_scores(scores))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_k_fold() {
        let cv = CrossValidator::new(CVStrategy::KFold {
            n_splits: 5,
            shuffle: false,
        });
        let splits = cv.split(100, None).unwrap();

        assert_eq!(splits.len(), 5);
        for split in &splits {
            assert_eq!(split.test_indices.len(), 20);
            assert_eq!(split.train_indices.len(), 80);
        }

        let mut all_test: Vec<usize> = splits.iter().flat_map(|s| s.test_indices.clone()).collect();
        all_test.sort();
        assert_eq!(all_test, (0..100).collect::<Vec<_>>());
        assert_eq!(splits[0].test_indices, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_k_fold_uneven() {
        let cv = CrossValidator::new(CVStrategy::KFold {
            n_splits: 3,
            shuffle: true,
        })
        .with_random_state(42);
        let sizes: Vec<usize> = cv
            .split(10, None)
            .unwrap()
            .iter()
            .map(|s| s.test_indices.len())
            .collect();
        assert_eq!(sizes, vec![4, 3, 3]);
    }

    #[test]
    fn test_stratified_k_fold() {
        let y = Array1::from_vec(vec![0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0]);

        let cv = CrossValidator::new(CVStrategy::StratifiedKFold {
            n_splits: 5,
            shuffle: false,
        });
        let splits = cv.split(10, Some(&y)).unwrap();

        assert_eq!(splits.len(), 5);
        for split in &splits {
            assert_eq!(split.test_indices.len(), 2);
            let positives = split.test_indices.iter().filter(|&&i| y[i] == 1.0).count();
            assert_eq!(positives, 1);
        }
        // Unshuffled folds take class members in order
        assert_eq!(splits[0].test_indices, vec![0, 5]);
    }

    #[test]
    fn test_stratified_preserves_ratio() {
        let y = Array1::from_iter((0..100).map(|i| if i % 4 == 0 { 1.0 } else { 0.0 }));
        let cv = CrossValidator::new(CVStrategy::default());
        let splits = cv.split(100, Some(&y)).unwrap();

        for split in &splits {
            assert_eq!(split.test_indices.len(), 20);
            let positives = split.test_indices.iter().filter(|&&i| y[i] == 1.0).count();
            assert_eq!(positives, 5);
        }
    }

    #[test]
    fn test_stratified_requires_labels() {
        let cv = CrossValidator::new(CVStrategy::default());
        assert!(cv.split(10, None).is_err());
    }

    #[test]
    fn test_too_many_folds() {
        let cv = CrossValidator::new(CVStrategy::KFold {
            n_splits: 5,
            shuffle: false,
        });
        assert!(cv.split(3, None).is_err());
    }

    #[test]
    fn test_cv_results() {
        let results = CVResults::from_scores(vec![0.8, 0.9, 1.0]);
        assert!((results.mean_score - 0.9).abs() < 1e-12);
        assert!((results.std_score - (0.02f64 / 3.0).sqrt()).abs() < 1e-12);
        assert_eq!(results.n_folds, 3);
    }

    #[test]
    fn test_accuracy_score() {
        let y = Array1::from_vec(vec![1.0, 0.0, 1.0, 1.0]);
        let p = Array1::from_vec(vec![1.0, 1.0, 1.0, 0.0]);
        assert_eq!(accuracy_score(&y, &p), 0.5);
    }
}
