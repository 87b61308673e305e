//! Stratified train/test partitioning

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;

/// Train and test partitions of a feature matrix
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub x_train: Array2<f64>,
    pub x_test: Array2<f64>,
    pub y_train: Array1<f64>,
    pub y_test: Array1<f64>,
    /// Source row of each training sample
    pub train_indices: Vec<usize>,
    /// Source row of each test sample
    pub test_indices: Vec<usize>,
}

/// Group row indices by (rounded) class label
pub(crate) fn indices_by_class(y: &Array1<f64>) -> BTreeMap<i64, Vec<usize>> {
    let mut groups: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (i, &label) in y.iter().enumerate() {
        groups.entry(label.round() as i64).or_default().push(i);
    }
    groups
}

/// Number of test rows per class, summing to exactly `n_test`.
///
/// Every class gets at least one test row and keeps at least one training
/// row. The rest is allocated proportionally, remainders going to the classes
/// with the largest fractional share. Rows reserved for small classes are
/// taken back from the class with the most test rows. Callers guarantee
/// `classes <= n_test <= n_total - classes` and at least 2 rows per class.
fn allocate_test_counts(class_sizes: &[usize], n_total: usize, n_test: usize) -> Vec<usize> {
    let exact: Vec<f64> = class_sizes
        .iter()
        .map(|&c| n_test as f64 * c as f64 / n_total as f64)
        .collect();
    let mut counts: Vec<usize> = exact
        .iter()
        .zip(class_sizes)
        .map(|(e, &size)| (e.floor() as usize).clamp(1, size - 1))
        .collect();

    let mut order: Vec<usize> = (0..class_sizes.len()).collect();
    order.sort_by(|&a, &b| {
        let fa = exact[a] - exact[a].floor();
        let fb = exact[b] - exact[b].floor();
        fb.partial_cmp(&fa).unwrap_or(std::cmp::Ordering::Equal).then(a.cmp(&b))
    });

    let mut assigned: usize = counts.iter().sum();
    while assigned < n_test {
        let Some(&class) = order.iter().find(|&&c| counts[c] + 1 < class_sizes[c]) else {
            break;
        };
        counts[class] += 1;
        assigned += 1;
        // Rotate so remainders spread before any class gets a second one
        if let Some(pos) = order.iter().position(|&c| c == class) {
            let c = order.remove(pos);
            order.push(c);
        }
    }

    while assigned > n_test {
        let donor = (0..counts.len())
            .filter(|&c| counts[c] > 1)
            .max_by(|&a, &b| counts[a].cmp(&counts[b]).then(b.cmp(&a)));
        let Some(class) = donor else {
            break;
        };
        counts[class] -= 1;
        assigned -= 1;
    }

    counts
}

/// Stratified split with a fixed seed.
///
/// The test partition holds `ceil(test_size * n)` rows (up to rounding across
/// classes); class proportions are preserved in both partitions.
pub fn stratified_split(
    x: &Array2<f64>,
    y: &Array1<f64>,
    test_size: f64,
    seed: u64,
) -> Result<TrainTestSplit> {
    let n = x.nrows();
    if n != y.len() {
        return Err(PipelineError::ShapeError {
            expected: format!("y length = {}", n),
            actual: format!("y length = {}", y.len()),
        });
    }
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(PipelineError::InvalidParameter {
            name: "test_size".to_string(),
            value: test_size.to_string(),
            reason: "must lie in (0, 1)".to_string(),
        });
    }

    let groups = indices_by_class(y);
    if groups.len() < 2 {
        return Err(PipelineError::ValidationError(
            "stratified split needs at least 2 classes".to_string(),
        ));
    }
    if let Some((class, members)) = groups.iter().find(|(_, m)| m.len() < 2) {
        return Err(PipelineError::ValidationError(format!(
            "class {} has {} member(s); stratified split needs at least 2",
            class,
            members.len()
        )));
    }

    // Tolerance keeps e.g. 0.3 * 100 at 30 despite float representation
    let n_test = (test_size * n as f64 - 1e-9).ceil() as usize;
    if n_test < groups.len() || n - n_test < groups.len() {
        return Err(PipelineError::ValidationError(format!(
            "test size {} leaves too few rows for {} classes",
            n_test,
            groups.len()
        )));
    }

    let sizes: Vec<usize> = groups.values().map(|m| m.len()).collect();
    let test_counts = allocate_test_counts(&sizes, n, n_test);

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train_indices = Vec::with_capacity(n - n_test);
    let mut test_indices = Vec::with_capacity(n_test);

    for (members, &class_test) in groups.values().zip(test_counts.iter()) {
        let mut shuffled = members.clone();
        shuffled.shuffle(&mut rng);
        test_indices.extend_from_slice(&shuffled[..class_test]);
        train_indices.extend_from_slice(&shuffled[class_test..]);
    }

    train_indices.shuffle(&mut rng);
    test_indices.shuffle(&mut rng);

    Ok(TrainTestSplit {
        x_train: x.select(Axis(0), &train_indices),
        x_test: x.select(Axis(0), &test_indices),
        y_train: y.select(Axis(0), &train_indices),
        y_test: y.select(Axis(0), &test_indices),
        train_indices,
        test_indices,
    })
}
