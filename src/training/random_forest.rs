//! Random Forest implementation

use super::decision_tree::{Criterion, DecisionTree};
use super::models::Classifier;
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Strategy for max features
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// Square root of n_features
    Sqrt,
    /// Log2 of n_features
    Log2,
    /// Fraction of n_features
    Fraction(f64),
    /// Fixed number
    Fixed(usize),
    /// All features
    All,
}

impl MaxFeatures {
    /// Features drawn per split for a matrix with `n_features` columns
    pub fn resolve(&self, n_features: usize) -> usize {
        match *self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().floor() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().floor() as usize,
            MaxFeatures::Fraction(f) => (n_features as f64 * f).floor() as usize,
            MaxFeatures::Fixed(n) => n,
            MaxFeatures::All => n_features,
        }
        .clamp(1, n_features.max(1))
    }
}

/// Random Forest configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomForestConfig {
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth per tree (unbounded when unset)
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features considered at each split
    pub max_features: MaxFeatures,
    /// Impurity criterion
    pub criterion: Criterion,
    /// Bootstrap sampling
    pub bootstrap: bool,
    /// Compute the out-of-bag accuracy after fitting
    pub oob_score: bool,
    /// Random seed; the pipeline seed is used when unset
    pub random_state: Option<u64>,
}

impl Default for RandomForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            criterion: Criterion::Gini,
            bootstrap: true,
            oob_score: false,
            random_state: None,
        }
    }
}

impl RandomForestConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(PipelineError::InvalidParameter {
                name: "random_forest.n_estimators".to_string(),
                value: "0".to_string(),
                reason: "need at least one tree".to_string(),
            });
        }
        if self.criterion == Criterion::MSE {
            return Err(PipelineError::InvalidParameter {
                name: "random_forest.criterion".to_string(),
                value: "MSE".to_string(),
                reason: "classification forests use Gini or Entropy".to_string(),
            });
        }
        if let MaxFeatures::Fraction(f) = self.max_features {
            if !(f > 0.0 && f <= 1.0) {
                return Err(PipelineError::InvalidParameter {
                    name: "random_forest.max_features".to_string(),
                    value: f.to_string(),
                    reason: "fraction must lie in (0, 1]".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Random Forest classifier
///
/// Probabilities are the mean over trees of the positive-class fraction in
/// the leaf each sample reaches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    config: RandomForestConfig,
    /// Individual trees
    trees: Vec<DecisionTree>,
    /// Computed OOB score
    oob_score_value: Option<f64>,
    /// Feature importances
    feature_importances: Option<Array1<f64>>,
    /// Number of features
    n_features: usize,
}

impl Default for RandomForestClassifier {
    fn default() -> Self {
        Self::new(RandomForestConfig::default())
    }
}

impl RandomForestClassifier {
    pub fn new(config: RandomForestConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            oob_score_value: None,
            feature_importances: None,
            n_features: 0,
        }
    }

    pub fn config(&self) -> &RandomForestConfig {
        &self.config
    }

    /// Fit the forest to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        self.config.validate()?;
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(PipelineError::TrainingError(
                "cannot fit a forest on zero rows".to_string(),
            ));
        }

        self.n_features = n_features;
        let max_features = self.config.max_features.resolve(n_features);
        let base_seed = self.config.random_state.unwrap_or(0);
        let config = &self.config;

        // Build trees in parallel; each tree owns its seed so the result is
        // independent of thread scheduling
        let fitted: Vec<(DecisionTree, Vec<usize>)> = (0..config.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let seed = base_seed.wrapping_add(tree_idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);

                let sample_indices: Vec<usize> = if config.bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };

                let x_boot = x.select(Axis(0), &sample_indices);
                let y_boot = y.select(Axis(0), &sample_indices);

                let mut tree = DecisionTree::new_classifier()
                    .with_criterion(config.criterion)
                    .with_min_samples_split(config.min_samples_split)
                    .with_min_samples_leaf(config.min_samples_leaf)
                    .with_max_features(max_features)
                    .with_random_state(rng.gen());
                if let Some(d) = config.max_depth {
                    tree = tree.with_max_depth(d);
                }

                tree.fit(&x_boot, &y_boot)?;
                Ok((tree, sample_indices))
            })
            .collect::<Result<Vec<_>>>()?;

        self.oob_score_value = if self.config.oob_score && self.config.bootstrap {
            Self::compute_oob_score(&fitted, x, y)?
        } else {
            None
        };
        self.trees = fitted.into_iter().map(|(tree, _)| tree).collect();
        self.compute_feature_importances();

        debug!(
            n_trees = self.trees.len(),
            max_features,
            oob_score = ?self.oob_score_value,
            "Random forest fitted"
        );

        Ok(self)
    }

    /// Accuracy of each sample under the trees that did not see it
    fn compute_oob_score(
        fitted: &[(DecisionTree, Vec<usize>)],
        x: &Array2<f64>,
        y: &Array1<f64>,
    ) -> Result<Option<f64>> {
        let n = x.nrows();
        let mut proba_sum = vec![0.0; n];
        let mut votes = vec![0usize; n];

        for (tree, in_bag) in fitted {
            let mut seen = vec![false; n];
            for &i in in_bag {
                seen[i] = true;
            }
            let oob: Vec<usize> = (0..n).filter(|&i| !seen[i]).collect();
            if oob.is_empty() {
                continue;
            }
            let preds = tree.predict_value(&x.select(Axis(0), &oob))?;
            for (k, &i) in oob.iter().enumerate() {
                proba_sum[i] += preds[k];
                votes[i] += 1;
            }
        }

        let scored: Vec<usize> = (0..n).filter(|&i| votes[i] > 0).collect();
        if scored.is_empty() {
            return Ok(None);
        }
        let correct = scored
            .iter()
            .filter(|&&i| {
                let label = if proba_sum[i] / votes[i] as f64 > 0.5 { 1.0 } else { 0.0 };
                label == y[i]
            })
            .count();
        Ok(Some(correct as f64 / scored.len() as f64))
    }

    fn compute_feature_importances(&mut self) {
        if self.trees.is_empty() {
            return;
        }

        let mut total = Array1::<f64>::zeros(self.n_features);
        for tree in &self.trees {
            if let Some(imp) = tree.feature_importances() {
                total += imp;
            }
        }

        let sum = total.sum();
        if sum > 0.0 {
            total /= sum;
        }
        self.feature_importances = Some(total);
    }

    /// Predict probabilities of class 1
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(PipelineError::ModelNotFitted);
        }

        let all_predictions: Vec<Array1<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict_value(x))
            .collect::<Result<Vec<_>>>()?;

        let mut proba = Array1::<f64>::zeros(x.nrows());
        for preds in &all_predictions {
            proba += preds;
        }
        proba /= all_predictions.len() as f64;
        Ok(proba)
    }

    /// Make predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self
            .predict_proba(x)?
            .mapv(|p| if p > 0.5 { 1.0 } else { 0.0 }))
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Get OOB score
    pub fn oob_score_value(&self) -> Option<f64> {
        self.oob_score_value
    }

    /// Get number of trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Classifier for RandomForestClassifier {
    fn name(&self) -> &'static str {
        "Random Forest"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        RandomForestClassifier::fit(self, x, y).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        RandomForestClassifier::predict(self, x)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Option<Array1<f64>>> {
        RandomForestClassifier::predict_proba(self, x).map(Some)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.feature_importances.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn forest(n_estimators: usize) -> RandomForestClassifier {
        RandomForestClassifier::new(RandomForestConfig {
            n_estimators,
            random_state: Some(42),
            ..Default::default()
        })
    }

    #[test]
    fn test_classifier() {
        let x = array![
            [0.0, 0.0],
            [0.1, 0.1],
            [0.2, 0.2],
            [1.0, 1.0],
            [1.1, 1.1],
            [1.2, 1.2],
        ];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut rf = forest(25);
        rf.fit(&x, &y).unwrap();

        let predictions = rf.predict(&x).unwrap();
        let accuracy = predictions
            .iter()
            .zip(y.iter())
            .filter(|(p, a)| p == a)
            .count() as f64
            / y.len() as f64;

        assert!(accuracy >= 0.8, "Accuracy too low: {}", accuracy);
        assert_eq!(rf.n_trees(), 25);
    }

    #[test]
    fn test_predict_proba_in_unit_interval() {
        let x = Array2::from_shape_fn((30, 3), |(i, j)| ((i * 5 + j * 3) % 11) as f64);
        let y = Array1::from_iter((0..30).map(|i| if i % 3 == 0 { 1.0 } else { 0.0 }));

        let mut rf = forest(15);
        rf.fit(&x, &y).unwrap();

        let proba = rf.predict_proba(&x).unwrap();
        assert_eq!(proba.len(), 30);
        assert!(proba.iter().all(|&p| (0.0..=1.0).contains(&p)));

        let labels = rf.predict(&x).unwrap();
        for (&p, &l) in proba.iter().zip(labels.iter()) {
            assert_eq!(l, if p > 0.5 { 1.0 } else { 0.0 });
        }
    }

    #[test]
    fn test_reproducible_with_seed() {
        let x = Array2::from_shape_fn((40, 4), |(i, j)| ((i * 7 + j * 13) % 17) as f64);
        let y = Array1::from_iter((0..40).map(|i| (i % 2) as f64));

        let mut a = forest(10);
        let mut b = forest(10);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap());
    }

    #[test]
    fn test_feature_importances() {
        let x = array![
            [1.0, 0.0],
            [2.0, 0.0],
            [3.0, 0.0],
            [4.0, 0.0],
            [5.0, 0.0],
            [6.0, 0.0],
        ];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut rf = forest(10);
        rf.fit(&x, &y).unwrap();

        let importances = rf.feature_importances().unwrap();
        assert_eq!(importances.len(), 2);
        assert!(importances[0] > importances[1]);
        assert!((importances.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_oob_score() {
        let x = Array2::from_shape_fn((60, 2), |(i, j)| i as f64 + j as f64 * 0.5);
        let y = Array1::from_iter((0..60).map(|i| if i >= 30 { 1.0 } else { 0.0 }));

        let mut rf = RandomForestClassifier::new(RandomForestConfig {
            n_estimators: 20,
            oob_score: true,
            random_state: Some(1),
            ..Default::default()
        });
        rf.fit(&x, &y).unwrap();

        let oob = rf.oob_score_value().unwrap();
        assert!(oob > 0.9, "OOB score too low: {}", oob);
    }

    #[test]
    fn test_max_features_resolution() {
        assert_eq!(MaxFeatures::Sqrt.resolve(34), 5);
        assert_eq!(MaxFeatures::Log2.resolve(34), 5);
        assert_eq!(MaxFeatures::Fraction(0.5).resolve(34), 17);
        assert_eq!(MaxFeatures::Fixed(50).resolve(34), 34);
        assert_eq!(MaxFeatures::Sqrt.resolve(1), 1);
    }

    #[test]
    fn test_unfitted() {
        let rf = forest(5);
        assert!(matches!(
            rf.predict(&array![[0.0]]),
            Err(PipelineError::ModelNotFitted)
        ));
    }
}
