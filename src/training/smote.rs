//! SMOTE oversampling
//!
//! Synthetic Minority Over-sampling Technique: every class is brought up to
//! the size of the largest class by interpolating between a minority sample
//! and one of its k nearest neighbours within the same class. Only training
//! folds should pass through here; evaluation data must stay untouched.

use crate::error::{RadscanError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::collections::HashMap;

/// SMOTE oversampler with a fixed neighbour count and seed.
#[derive(Debug, Clone)]
pub struct Smote {
    pub k_neighbors: usize,
    pub random_state: u64,
}

impl Default for Smote {
    fn default() -> Self {
        Self {
            k_neighbors: 5,
            random_state: 42,
        }
    }
}

/// Max-heap entry so the heap evicts the farthest neighbour first.
struct DistIdx {
    dist: f64,
    idx: usize,
}

impl PartialEq for DistIdx {
    fn eq(&self, other: &Self) -> bool {
        self.dist == other.dist
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
        self.dist.partial_cmp(&other.dist).unwrap_or(Ordering::Equal)
    }
}

impl Smote {
    pub fn new(k_neighbors: usize, random_state: u64) -> Self {
        Self {
            k_neighbors,
            random_state,
        }
    }

    /// Resample `(x, y)` so every class matches the majority count. Original
    /// rows come first in their input order, synthetic rows follow grouped by
    /// class in ascending label order, so output is deterministic for a
    /// fixed seed.
    pub fn fit_resample(
        &self,
        x: &Array2<f64>,
        y: &Array1<i64>,
    ) -> Result<(Array2<f64>, Array1<i64>)> {
        if x.nrows() != y.len() {
            return Err(RadscanError::ShapeMismatch {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        if x.nrows() == 0 {
            return Err(RadscanError::Training(
                "Cannot resample an empty dataset".to_string(),
            ));
        }

        let mut by_class: HashMap<i64, Vec<usize>> = HashMap::new();
        for (i, &label) in y.iter().enumerate() {
            by_class.entry(label).or_default().push(i);
        }
        let target = by_class.values().map(Vec::len).max().unwrap_or(0);

        let mut classes: Vec<i64> = by_class.keys().copied().collect();
        classes.sort_unstable();

        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let n_features = x.ncols();
        let mut synthetic_rows: Vec<Vec<f64>> = Vec::new();
        let mut synthetic_labels: Vec<i64> = Vec::new();

        for class in classes {
            let indices = &by_class[&class];
            let deficit = target - indices.len();
            if deficit == 0 {
                continue;
            }

            // A lone sample has no neighbour to interpolate toward; duplicate it
            if indices.len() == 1 {
                let row = x.row(indices[0]);
                for _ in 0..deficit {
                    synthetic_rows.push(row.to_vec());
                    synthetic_labels.push(class);
                }
                continue;
            }

            let k = self.k_neighbors.min(indices.len() - 1);
            for _ in 0..deficit {
                let base_pos = rng.gen_range(0..indices.len());
                let base = x.row(indices[base_pos]);
                let neighbors = k_nearest(x, indices, base_pos, k);
                let neighbor = x.row(neighbors[rng.gen_range(0..neighbors.len())]);

                let gap: f64 = rng.gen();
                let mut row = Vec::with_capacity(n_features);
                for j in 0..n_features {
                    row.push(base[j] + gap * (neighbor[j] - base[j]));
                }
                synthetic_rows.push(row);
                synthetic_labels.push(class);
            }
        }

        let total = x.nrows() + synthetic_rows.len();
        let mut x_out = Array2::<f64>::zeros((total, n_features));
        let mut y_out = Array1::<i64>::zeros(total);
        for i in 0..x.nrows() {
            x_out.row_mut(i).assign(&x.row(i));
            y_out[i] = y[i];
        }
        for (offset, (row, label)) in synthetic_rows
            .into_iter()
            .zip(synthetic_labels)
            .enumerate()
        {
            let i = x.nrows() + offset;
            x_out
                .row_mut(i)
                .assign(&ArrayView1::from_shape(n_features, &row)?);
            y_out[i] = label;
        }

        Ok((x_out, y_out))
    }
}

/// Indices of the `k` nearest same-class neighbours of `indices[base_pos]`,
/// by squared Euclidean distance.
fn k_nearest(x: &Array2<f64>, indices: &[usize], base_pos: usize, k: usize) -> Vec<usize> {
    let base = x.row(indices[base_pos]);
    let mut heap: BinaryHeap<DistIdx> = BinaryHeap::with_capacity(k + 1);

    for (pos, &idx) in indices.iter().enumerate() {
        if pos == base_pos {
            continue;
        }
        let other = x.row(idx);
        let dist: f64 = base
            .iter()
            .zip(other.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum();
        heap.push(DistIdx { dist, idx });
        if heap.len() > k {
            heap.pop();
        }
    }

    let mut nearest: Vec<usize> = heap.into_iter().map(|d| d.idx).collect();
    nearest.sort_unstable();
    nearest
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn imbalanced() -> (Array2<f64>, Array1<i64>) {
        let x = array![
            [0.0, 0.0],
            [0.2, 0.1],
            [0.1, 0.3],
            [0.3, 0.2],
            [0.0, 0.2],
            [0.2, 0.3],
            [5.0, 5.0],
            [5.2, 5.1],
        ];
        let y = array![0i64, 0, 0, 0, 0, 0, 1, 1];
        (x, y)
    }

    fn count(y: &Array1<i64>, class: i64) -> usize {
        y.iter().filter(|&&l| l == class).count()
    }

    #[test]
    fn test_balances_class_counts() {
        let (x, y) = imbalanced();
        let (x_res, y_res) = Smote::default().fit_resample(&x, &y).unwrap();
        assert_eq!(count(&y_res, 0), 6);
        assert_eq!(count(&y_res, 1), 6);
        assert_eq!(x_res.nrows(), y_res.len());
    }

    #[test]
    fn test_originals_preserved_in_order() {
        let (x, y) = imbalanced();
        let (x_res, y_res) = Smote::default().fit_resample(&x, &y).unwrap();
        for i in 0..x.nrows() {
            assert_eq!(x_res.row(i), x.row(i));
            assert_eq!(y_res[i], y[i]);
        }
    }

    #[test]
    fn test_synthetic_rows_lie_between_class_members() {
        let (x, y) = imbalanced();
        let (x_res, y_res) = Smote::default().fit_resample(&x, &y).unwrap();
        for i in x.nrows()..x_res.nrows() {
            assert_eq!(y_res[i], 1);
            // Interpolation between the two class-1 points stays in their box
            assert!(x_res[[i, 0]] >= 5.0 - 1e-9 && x_res[[i, 0]] <= 5.2 + 1e-9);
            assert!(x_res[[i, 1]] >= 5.0 - 1e-9 && x_res[[i, 1]] <= 5.1 + 1e-9);
        }
    }

    #[test]
    fn test_deterministic_for_fixed_seed() {
        let (x, y) = imbalanced();
        let a = Smote::new(5, 42).fit_resample(&x, &y).unwrap();
        let b = Smote::new(5, 42).fit_resample(&x, &y).unwrap();
        assert_eq!(a.0, b.0);
        assert_eq!(a.1, b.1);
    }

    #[test]
    fn test_single_sample_class_duplicated() {
        let x = array![[0.0], [0.1], [0.2], [9.0]];
        let y = array![0i64, 0, 0, 1];
        let (x_res, y_res) = Smote::default().fit_resample(&x, &y).unwrap();
        assert_eq!(count(&y_res, 1), 3);
        for i in x.nrows()..x_res.nrows() {
            assert_eq!(x_res[[i, 0]], 9.0);
        }
    }
}
