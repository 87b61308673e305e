//! SMOTE (Synthetic Minority Over-sampling Technique)

use crate::error::{PipelineError, Result};
use crate::synthetic::{class_counts, class_indices, ResampleResult, Sampler};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};
use tracing::{debug, info};

/// Ordered float for BinaryHeap-based partial sort
#[derive(Debug, Clone, Copy)]
struct DistIdx(f64, usize);

impl PartialEq for DistIdx {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for DistIdx {}
impl PartialOrd for DistIdx {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for DistIdx {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .partial_cmp(&other.0)
            .unwrap_or(Ordering::Equal)
            .then(self.1.cmp(&other.1))
    }
}

/// SMOTE oversampler.
///
/// Every class is raised to the size of the largest class. Each synthetic
/// row lies on the segment between a random class member and one of its
/// `k_neighbors` nearest same-class neighbours.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SMOTE {
    /// Number of nearest neighbors
    k_neighbors: usize,
    /// Random seed
    seed: Option<u64>,
    /// Target samples per class
    target_counts: Option<BTreeMap<i64, usize>>,
}

impl SMOTE {
    /// Create new SMOTE sampler
    pub fn new() -> Self {
        Self {
            k_neighbors: 5,
            seed: None,
            target_counts: None,
        }
    }

    /// Set number of neighbors
    pub fn with_k_neighbors(mut self, k: usize) -> Self {
        self.k_neighbors = k.max(1);
        self
    }

    /// Set random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn k_neighbors(&self) -> usize {
        self.k_neighbors
    }

    fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        a.iter().zip(b.iter()).map(|(ai, bi)| (ai - bi).powi(2)).sum()
    }

    /// Indices (into `members`) of the k nearest members of `members[pos]`, excluding itself
    fn find_neighbors(x: &Array2<f64>, members: &[usize], pos: usize, k: usize) -> Vec<usize> {
        let point = x.row(members[pos]);
        let mut heap: BinaryHeap<DistIdx> = BinaryHeap::with_capacity(k + 1);

        for (j, &row) in members.iter().enumerate() {
            if j == pos {
                continue;
            }
            let dist = Self::squared_distance(point, x.row(row));
            if heap.len() < k {
                heap.push(DistIdx(dist, j));
            } else if let Some(&top) = heap.peek() {
                let candidate = DistIdx(dist, j);
                if candidate < top {
                    heap.pop();
                    heap.push(candidate);
                }
            }
        }

        heap.into_sorted_vec().into_iter().map(|DistIdx(_, j)| j).collect()
    }

    /// Generate synthetic sample between two points
    fn generate_sample(
        point: ArrayView1<f64>,
        neighbor: ArrayView1<f64>,
        rng: &mut StdRng,
    ) -> Vec<f64> {
        let gap: f64 = rng.gen();
        point
            .iter()
            .zip(neighbor.iter())
            .map(|(&p, &n)| p + gap * (n - p))
            .collect()
    }
}

impl Default for SMOTE {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for SMOTE {
    fn fit(&mut self, _x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let counts = class_counts(y);

        if counts.len() < 2 {
            return Err(PipelineError::ValidationError(
                "Need at least 2 classes for SMOTE".to_string(),
            ));
        }

        let max_count = counts.values().copied().max().unwrap_or(0);
        for (&class, &count) in &counts {
            if count < max_count && count < 2 {
                return Err(PipelineError::ValidationError(format!(
                    "class {} has {} sample(s); SMOTE needs at least 2 to interpolate",
                    class, count
                )));
            }
        }

        let targets = counts.keys().map(|&class| (class, max_count)).collect();
        self.target_counts = Some(targets);
        Ok(())
    }

    fn resample(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<ResampleResult> {
        let targets = self
            .target_counts
            .as_ref()
            .ok_or(PipelineError::ModelNotFitted)?;

        if x.nrows() != y.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} labels", x.nrows()),
                actual: format!("{} labels", y.len()),
            });
        }

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let indices = class_indices(y);
        let n_features = x.ncols();

        // Collect only synthetic samples (original data reused from x directly)
        let mut synthetic_x: Vec<Vec<f64>> = Vec::new();
        let mut synthetic_y: Vec<f64> = Vec::new();
        let mut n_synthetic = BTreeMap::new();

        for (&class, &target_count) in targets {
            let members = indices.get(&class).map(Vec::as_slice).unwrap_or(&[]);
            let n_to_generate = target_count.saturating_sub(members.len());
            n_synthetic.insert(class, n_to_generate);

            if n_to_generate == 0 {
                continue;
            }
            if members.len() < 2 {
                return Err(PipelineError::ValidationError(format!(
                    "class {} has {} sample(s) in the data being resampled",
                    class,
                    members.len()
                )));
            }

            let k = self.k_neighbors.min(members.len() - 1);
            let neighbors: Vec<Vec<usize>> = (0..members.len())
                .map(|pos| Self::find_neighbors(x, members, pos, k))
                .collect();

            debug!(class, n_to_generate, k, "Generating synthetic samples");

            for _ in 0..n_to_generate {
                let pos = rng.gen_range(0..members.len());
                let nn = &neighbors[pos];
                let neighbor = members[nn[rng.gen_range(0..nn.len())]];

                synthetic_x.push(Self::generate_sample(
                    x.row(members[pos]),
                    x.row(neighbor),
                    &mut rng,
                ));
                synthetic_y.push(class as f64);
            }
        }

        // Build result: original rows + synthetic rows using from_shape_fn
        let n_original = x.nrows();
        let n_total = n_original + synthetic_x.len();
        let result_x = Array2::from_shape_fn((n_total, n_features), |(i, j)| {
            if i < n_original {
                x[[i, j]]
            } else {
                synthetic_x[i - n_original][j]
            }
        });

        let mut all_y: Vec<f64> = y.iter().copied().collect();
        all_y.extend_from_slice(&synthetic_y);

        info!(
            original = n_original,
            synthetic = synthetic_x.len(),
            total = n_total,
            "SMOTE resampling complete"
        );

        Ok(ResampleResult {
            x: result_x,
            y: Array1::from_vec(all_y),
            n_synthetic,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_imbalanced_data() -> (Array2<f64>, Array1<f64>) {
        // 20 majority rows around (0, 0), 5 minority rows around (10, 10)
        let mut data = Vec::new();
        let mut labels = Vec::new();

        for i in 0..20 {
            data.push((i % 5) as f64);
            data.push((i / 5) as f64);
            labels.push(0.0);
        }

        for i in 0..5 {
            data.push(10.0 + (i % 3) as f64);
            data.push(10.0 + (i / 3) as f64);
            labels.push(1.0);
        }

        let x = Array2::from_shape_vec((25, 2), data).unwrap();
        let y = Array1::from_vec(labels);

        (x, y)
    }

    #[test]
    fn test_smote_balances_classes() {
        let (x, y) = create_imbalanced_data();

        let mut smote = SMOTE::new().with_k_neighbors(3).with_seed(42);
        let result = smote.fit_resample(&x, &y).unwrap();

        assert_eq!(result.x.nrows(), 40);
        let counts = class_counts(&result.y);
        assert_eq!(counts.get(&0), Some(&20));
        assert_eq!(counts.get(&1), Some(&20));
        assert_eq!(result.n_synthetic.get(&1), Some(&15));
        assert_eq!(result.total_synthetic(), 15);
    }

    #[test]
    fn test_smote_preserves_original() {
        let (x, y) = create_imbalanced_data();
        let mut smote = SMOTE::new().with_seed(42);
        let result = smote.fit_resample(&x, &y).unwrap();

        for i in 0..x.nrows() {
            assert_eq!(result.x.row(i), x.row(i));
            assert_eq!(result.y[i], y[i]);
        }
    }

    #[test]
    fn test_synthetic_rows_stay_inside_minority_hull() {
        let (x, y) = create_imbalanced_data();
        let mut smote = SMOTE::new().with_seed(7);
        let result = smote.fit_resample(&x, &y).unwrap();

        for i in x.nrows()..result.x.nrows() {
            assert_eq!(result.y[i], 1.0);
            assert!(result.x[[i, 0]] >= 10.0 && result.x[[i, 0]] <= 12.0);
            assert!(result.x[[i, 1]] >= 10.0 && result.x[[i, 1]] <= 11.0);
        }
    }

    #[test]
    fn test_smote_is_seeded() {
        let (x, y) = create_imbalanced_data();
        let a = SMOTE::new().with_seed(3).fit_resample(&x, &y).unwrap();
        let b = SMOTE::new().with_seed(3).fit_resample(&x, &y).unwrap();
        assert_eq!(a.x, b.x);
    }

    #[test]
    fn test_balanced_input_unchanged() {
        let x = Array2::from_shape_fn((6, 2), |(i, j)| (i + j) as f64);
        let y = Array1::from_vec(vec![0.0, 1.0, 0.0, 1.0, 0.0, 1.0]);
        let result = SMOTE::new().with_seed(1).fit_resample(&x, &y).unwrap();

        assert_eq!(result.x, x);
        assert_eq!(result.total_synthetic(), 0);
    }

    #[test]
    fn test_single_class_rejected() {
        let x = Array2::zeros((4, 2));
        let y = Array1::zeros(4);
        let result = SMOTE::new().fit_resample(&x, &y);
        assert!(matches!(result, Err(PipelineError::ValidationError(_))));
    }

    #[test]
    fn test_singleton_minority_rejected() {
        let x = Array2::from_shape_fn((5, 2), |(i, j)| (i * j) as f64);
        let y = Array1::from_vec(vec![0.0, 0.0, 0.0, 0.0, 1.0]);
        assert!(SMOTE::new().fit_resample(&x, &y).is_err());
    }

    #[test]
    fn test_find_neighbors_orders_by_distance() {
        let x = Array2::from_shape_vec((4, 1), vec![0.0, 1.0, 5.0, 2.0]).unwrap();
        let members = vec![0, 1, 2, 3];
        let nn = SMOTE::find_neighbors(&x, &members, 0, 2);
        assert_eq!(nn, vec![1, 3]);
    }
}
