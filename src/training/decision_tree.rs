//! Decision tree implementation
//!
//! Binary classification trees (labels 0/1, leaves hold the positive-class
//! fraction) and regression trees (leaves hold the mean target). Used as the
//! base learner of the random forest and of gradient boosting.

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{seq::index, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf { value: f64, n_samples: usize },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Criterion {
    /// Gini impurity (classification)
    Gini,
    /// Entropy (classification)
    Entropy,
    /// Mean squared error (regression)
    MSE,
}

/// Sufficient statistics of a node: count, sum and sum of squares of targets
#[derive(Debug, Clone, Copy, Default)]
struct NodeStats {
    count: usize,
    sum: f64,
    sq_sum: f64,
}

impl NodeStats {
    fn push(&mut self, y: f64) {
        self.count += 1;
        self.sum += y;
        self.sq_sum += y * y;
    }

    fn minus(&self, other: &NodeStats) -> NodeStats {
        NodeStats {
            count: self.count - other.count,
            sum: self.sum - other.sum,
            sq_sum: self.sq_sum - other.sq_sum,
        }
    }
}

/// Best split found for one node
#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

/// Decision tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Tree root
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features drawn at random for each split (all when unset)
    pub max_features: Option<usize>,
    /// Impurity criterion
    pub criterion: Criterion,
    /// Seed for the per-split feature draws
    pub random_state: Option<u64>,
    /// Number of features
    n_features: usize,
    /// Feature importances
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new_classifier()
    }
}

impl DecisionTree {
    /// Create a new classifier tree
    pub fn new_classifier() -> Self {
        Self::with_base_criterion(Criterion::Gini)
    }

    /// Create a new regressor tree
    pub fn new_regressor() -> Self {
        Self::with_base_criterion(Criterion::MSE)
    }

    fn with_base_criterion(criterion: Criterion) -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion,
            random_state: None,
            n_features: 0,
            feature_importances: None,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    /// Set the number of features considered per split
    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features.max(1));
        self
    }

    /// Set criterion
    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn is_classifier(&self) -> bool {
        matches!(self.criterion, Criterion::Gini | Criterion::Entropy)
    }

    /// Fit the tree to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 || n_features == 0 {
            return Err(PipelineError::TrainingError(
                "cannot fit a tree on empty data".to_string(),
            ));
        }
        if self.is_classifier() && y.iter().any(|&v| v != 0.0 && v != 1.0) {
            return Err(PipelineError::ValidationError(
                "classification tree expects labels 0 or 1".to_string(),
            ));
        }

        self.n_features = n_features;

        let mut rng = StdRng::seed_from_u64(self.random_state.unwrap_or(0));
        let mut importances = vec![0.0; n_features];
        let indices: Vec<usize> = (0..n_samples).collect();
        let root = self.build_tree(x, y, &indices, 0, &mut importances, &mut rng);
        self.root = Some(root);

        // Normalize feature importances
        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(self)
    }

    fn stats_of(y: &Array1<f64>, indices: &[usize]) -> NodeStats {
        let mut stats = NodeStats::default();
        for &i in indices {
            stats.push(y[i]);
        }
        stats
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
        rng: &mut StdRng,
    ) -> TreeNode {
        let n_samples = indices.len();
        let stats = Self::stats_of(y, indices);
        let impurity = self.impurity(&stats);
        let leaf = || TreeNode::Leaf {
            value: Self::leaf_value(&stats),
            n_samples,
        };

        // Check stopping conditions
        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || impurity <= 1e-12;

        if should_stop {
            return leaf();
        }

        let features = self.draw_features(rng);
        let best = match self.find_best_split(x, y, indices, &features, &stats, impurity) {
            Some(best) => best,
            None => return leaf(),
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, best.feature_idx]] <= best.threshold);

        if left_indices.is_empty() || right_indices.is_empty() {
            return leaf();
        }

        importances[best.feature_idx] += n_samples as f64 * best.gain;

        let left = Box::new(self.build_tree(x, y, &left_indices, depth + 1, importances, rng));
        let right = Box::new(self.build_tree(x, y, &right_indices, depth + 1, importances, rng));

        TreeNode::Split {
            feature_idx: best.feature_idx,
            threshold: best.threshold,
            left,
            right,
            n_samples,
            impurity,
        }
    }

    /// Candidate features for one split, in ascending order
    fn draw_features(&self, rng: &mut StdRng) -> Vec<usize> {
        match self.max_features {
            Some(k) if k < self.n_features => {
                let mut drawn = index::sample(rng, self.n_features, k).into_vec();
                drawn.sort_unstable();
                drawn
            }
            _ => (0..self.n_features).collect(),
        }
    }

    /// Sort each candidate feature once and sweep thresholds left to right,
    /// keeping running statistics of the left partition.
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        features: &[usize],
        parent: &NodeStats,
        parent_impurity: f64,
    ) -> Option<SplitCandidate> {
        let n = indices.len() as f64;

        let feature_results: Vec<Option<SplitCandidate>> = features
            .par_iter()
            .map(|&feature_idx| {
                let mut pairs: Vec<(f64, f64)> =
                    indices.iter().map(|&i| (x[[i, feature_idx]], y[i])).collect();
                pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

                let mut left = NodeStats::default();
                let mut best: Option<SplitCandidate> = None;

                for i in 0..pairs.len() - 1 {
                    left.push(pairs[i].1);
                    if pairs[i].0 >= pairs[i + 1].0 {
                        continue;
                    }

                    let right = parent.minus(&left);
                    if left.count < self.min_samples_leaf || right.count < self.min_samples_leaf {
                        continue;
                    }

                    let weighted = (left.count as f64 * self.impurity(&left)
                        + right.count as f64 * self.impurity(&right))
                        / n;
                    let gain = parent_impurity - weighted;

                    if gain > best.map_or(1e-12, |b| b.gain) {
                        best = Some(SplitCandidate {
                            feature_idx,
                            threshold: (pairs[i].0 + pairs[i + 1].0) / 2.0,
                            gain,
                        });
                    }
                }

                best
            })
            .collect();

        // Strictly greater gain wins, so ties keep the lowest feature index
        feature_results.into_iter().flatten().fold(None, |acc, cand| match acc {
            Some(a) if a.gain >= cand.gain => Some(a),
            _ => Some(cand),
        })
    }

    fn impurity(&self, stats: &NodeStats) -> f64 {
        if stats.count == 0 {
            return 0.0;
        }
        let n = stats.count as f64;
        match self.criterion {
            Criterion::Gini => {
                let p = stats.sum / n;
                1.0 - p * p - (1.0 - p) * (1.0 - p)
            }
            Criterion::Entropy => {
                let p = stats.sum / n;
                [p, 1.0 - p]
                    .iter()
                    .filter(|&&q| q > 0.0)
                    .map(|&q| -q * q.ln())
                    .sum()
            }
            // Var = E[X²] - E[X]²
            Criterion::MSE => (stats.sq_sum / n - (stats.sum / n).powi(2)).max(0.0),
        }
    }

    /// Mean target: positive-class fraction for classifiers, mean for regressors
    fn leaf_value(stats: &NodeStats) -> f64 {
        if stats.count == 0 {
            0.0
        } else {
            stats.sum / stats.count as f64
        }
    }

    fn root(&self) -> Result<&TreeNode> {
        self.root.as_ref().ok_or(PipelineError::ModelNotFitted)
    }

    fn check_width(&self, x: &Array2<f64>) -> Result<()> {
        if x.ncols() != self.n_features {
            return Err(PipelineError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(())
    }

    /// Raw leaf values: positive-class probability or regression estimate
    pub fn predict_value(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root()?;
        self.check_width(x)?;

        Ok(x.rows()
            .into_iter()
            .map(|row| Self::leaf_for(root, |f| row[f]).0)
            .collect())
    }

    /// Make predictions: class labels for classifiers, values for regressors
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let values = self.predict_value(x)?;
        if self.is_classifier() {
            Ok(values.mapv(|p| if p > 0.5 { 1.0 } else { 0.0 }))
        } else {
            Ok(values)
        }
    }

    fn leaf_for(node: &TreeNode, feature: impl Fn(usize) -> f64) -> (f64, usize) {
        let mut node = node;
        loop {
            match node {
                TreeNode::Leaf { value, n_samples } => return (*value, *n_samples),
                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    node = if feature(*feature_idx) <= *threshold {
                        &**left
                    } else {
                        &**right
                    };
                }
            }
        }
    }

    /// Replace every leaf value with `value_fn(rows)`, where `rows` are the
    /// rows of `x` routed to that leaf. Leaves reached by no row keep their value.
    pub fn refit_leaves<F>(&mut self, x: &Array2<f64>, value_fn: F) -> Result<()>
    where
        F: Fn(&[usize]) -> f64,
    {
        self.check_width(x)?;
        let root = self.root.as_mut().ok_or(PipelineError::ModelNotFitted)?;
        let rows: Vec<usize> = (0..x.nrows()).collect();
        Self::refit_node(root, x, rows, &value_fn);
        Ok(())
    }

    fn refit_node<F>(node: &mut TreeNode, x: &Array2<f64>, rows: Vec<usize>, value_fn: &F)
    where
        F: Fn(&[usize]) -> f64,
    {
        match node {
            TreeNode::Leaf { value, .. } => {
                if !rows.is_empty() {
                    *value = value_fn(&rows);
                }
            }
            TreeNode::Split {
                feature_idx,
                threshold,
                left,
                right,
                ..
            } => {
                let (l, r): (Vec<usize>, Vec<usize>) =
                    rows.into_iter().partition(|&i| x[[i, *feature_idx]] <= *threshold);
                Self::refit_node(left, x, l, value_fn);
                Self::refit_node(right, x, r, value_fn);
            }
        }
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Get tree depth (a single leaf has depth 0)
    pub fn get_depth(&self) -> usize {
        fn depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + depth(left).max(depth(right)),
            }
        }
        self.root.as_ref().map_or(0, depth)
    }

    /// Get number of leaves
    pub fn get_n_leaves(&self) -> usize {
        fn count(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => count(left) + count(right),
            }
        }
        self.root.as_ref().map_or(0, count)
    }
}
