//! Classification decision tree
//!
//! Supports per-class sample weights so the forest can counteract class
//! imbalance: impurity and leaf majorities are computed over weighted class
//! mass rather than raw counts.

use crate::error::{RadscanError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        class: i64,
        n_samples: usize,
    },
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
    },
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Criterion {
    Gini,
    Entropy,
}

/// Classification tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Feature columns considered for splits (all when `None`)
    pub feature_subset: Option<Vec<usize>>,
    pub criterion: Criterion,
    /// Weight per class label; unweighted when `None`
    class_weights: Option<HashMap<i64, f64>>,
    n_features: usize,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTree {
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            feature_subset: None,
            criterion: Criterion::Gini,
            class_weights: None,
            n_features: 0,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_class_weights(mut self, weights: HashMap<i64, f64>) -> Self {
        self.class_weights = Some(weights);
        self
    }

    fn weight_of(&self, class: i64) -> f64 {
        self.class_weights
            .as_ref()
            .and_then(|w| w.get(&class).copied())
            .unwrap_or(1.0)
    }

    /// Fit the tree to training data.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(RadscanError::ShapeMismatch {
                expected: format!("y length = {n_samples}"),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(RadscanError::Validation(
                "Cannot fit a tree on an empty dataset".to_string(),
            ));
        }

        self.n_features = x.ncols();
        let indices: Vec<usize> = (0..n_samples).collect();
        self.root = Some(self.build_node(x, y, &indices, 0));
        Ok(self)
    }

    fn build_node(&self, x: &Array2<f64>, y: &Array1<i64>, indices: &[usize], depth: usize) -> TreeNode {
        let n_samples = indices.len();
        let mass = self.class_mass(y, indices);

        let should_stop = n_samples < self.min_samples_split
            || n_samples <= self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || mass.len() <= 1;

        if should_stop {
            return TreeNode::Leaf {
                class: majority(&mass),
                n_samples,
            };
        }

        if let Some((feature_idx, threshold)) = self.find_best_split(x, y, indices, &mass) {
            let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
                .iter()
                .partition(|&&i| x[[i, feature_idx]] <= threshold);

            if left_indices.len() < self.min_samples_leaf
                || right_indices.len() < self.min_samples_leaf
            {
                return TreeNode::Leaf {
                    class: majority(&mass),
                    n_samples,
                };
            }

            let left = Box::new(self.build_node(x, y, &left_indices, depth + 1));
            let right = Box::new(self.build_node(x, y, &right_indices, depth + 1));
            TreeNode::Split {
                feature_idx,
                threshold,
                left,
                right,
                n_samples,
            }
        } else {
            TreeNode::Leaf {
                class: majority(&mass),
                n_samples,
            }
        }
    }

    /// Weighted class mass of a sample subset.
    fn class_mass(&self, y: &Array1<i64>, indices: &[usize]) -> HashMap<i64, f64> {
        let mut mass: HashMap<i64, f64> = HashMap::new();
        for &i in indices {
            *mass.entry(y[i]).or_insert(0.0) += self.weight_of(y[i]);
        }
        mass
    }

    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<i64>,
        indices: &[usize],
        parent_mass: &HashMap<i64, f64>,
    ) -> Option<(usize, f64)> {
        let all_features: Vec<usize> = (0..x.ncols()).collect();
        let candidates: &[usize] = self
            .feature_subset
            .as_deref()
            .unwrap_or(&all_features);
        let parent_impurity = self.impurity(parent_mass);

        let mut best: Option<(usize, f64, f64)> = None;

        for &feature_idx in candidates {
            let mut values: Vec<f64> = indices.iter().map(|&i| x[[i, feature_idx]]).collect();
            values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            values.dedup();

            for window in values.windows(2) {
                let threshold = (window[0] + window[1]) / 2.0;

                let mut left_mass: HashMap<i64, f64> = HashMap::new();
                let mut right_mass: HashMap<i64, f64> = HashMap::new();
                let mut left_count = 0usize;
                let mut right_count = 0usize;

                for &idx in indices {
                    let class = y[idx];
                    let w = self.weight_of(class);
                    if x[[idx, feature_idx]] <= threshold {
                        left_count += 1;
                        *left_mass.entry(class).or_insert(0.0) += w;
                    } else {
                        right_count += 1;
                        *right_mass.entry(class).or_insert(0.0) += w;
                    }
                }

                if left_count < self.min_samples_leaf || right_count < self.min_samples_leaf {
                    continue;
                }

                let left_total: f64 = left_mass.values().sum();
                let right_total: f64 = right_mass.values().sum();
                let total = left_total + right_total;
                if total <= 0.0 {
                    continue;
                }

                let weighted_impurity = (left_total * self.impurity(&left_mass)
                    + right_total * self.impurity(&right_mass))
                    / total;
                let gain = parent_impurity - weighted_impurity;

                let improves = match best {
                    Some((_, _, best_gain)) => gain > best_gain,
                    None => gain > 0.0,
                };
                if improves {
                    best = Some((feature_idx, threshold, gain));
                }
            }
        }

        best.map(|(f, t, _)| (f, t))
    }

    fn impurity(&self, mass: &HashMap<i64, f64>) -> f64 {
        let total: f64 = mass.values().sum();
        if total <= 0.0 {
            return 0.0;
        }
        match self.criterion {
            Criterion::Gini => {
                1.0 - mass.values().map(|&m| (m / total).powi(2)).sum::<f64>()
            }
            Criterion::Entropy => -mass
                .values()
                .map(|&m| {
                    let p = m / total;
                    if p > 0.0 {
                        p * p.ln()
                    } else {
                        0.0
                    }
                })
                .sum::<f64>(),
        }
    }

    /// Predict class labels for each row.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<i64>> {
        let root = self.root.as_ref().ok_or(RadscanError::ModelNotFitted)?;
        let predictions: Vec<i64> = (0..x.nrows())
            .map(|i| predict_one(root, &x.row(i).to_vec()))
            .collect();
        Ok(Array1::from_vec(predictions))
    }

    pub fn depth(&self) -> usize {
        fn node_depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => 1 + node_depth(left).max(node_depth(right)),
            }
        }
        self.root.as_ref().map(node_depth).unwrap_or(0)
    }
}

/// Class with the largest weighted mass; ties break on the smaller label so
/// results do not depend on hash order.
fn majority(mass: &HashMap<i64, f64>) -> i64 {
    let mut entries: Vec<(i64, f64)> = mass.iter().map(|(&k, &v)| (k, v)).collect();
    entries.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    entries.first().map(|&(class, _)| class).unwrap_or(0)
}

fn predict_one(node: &TreeNode, sample: &[f64]) -> i64 {
    match node {
        TreeNode::Leaf { class, .. } => *class,
        TreeNode::Split {
            feature_idx,
            threshold,
            left,
            right,
            ..
        } => {
            if sample[*feature_idx] <= *threshold {
                predict_one(left, sample)
            } else {
                predict_one(right, sample)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_separable_classes() {
        let x = array![
            [0.0, 0.0],
            [0.1, 0.2],
            [0.2, 0.1],
            [1.0, 1.0],
            [1.1, 0.9],
            [0.9, 1.1],
        ];
        let y = array![0, 0, 0, 1, 1, 1];

        let mut tree = DecisionTree::new();
        tree.fit(&x, &y).unwrap();
        let predictions = tree.predict(&x).unwrap();
        assert_eq!(predictions, y);
    }

    #[test]
    fn test_max_depth_respected() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0], [7.0], [8.0]];
        let y = array![0, 1, 0, 1, 0, 1, 0, 1];

        let mut tree = DecisionTree::new().with_max_depth(2);
        tree.fit(&x, &y).unwrap();
        assert!(tree.depth() <= 2 + 1); // depth counts nodes, not edges
    }

    #[test]
    fn test_class_weights_shift_majority() {
        // Two samples of class 0 vs one of class 1 in an unsplittable set:
        // with a large enough weight the minority class wins the leaf.
        let x = array![[1.0], [1.0], [1.0]];
        let y = array![0, 0, 1];

        let mut weights = HashMap::new();
        weights.insert(0i64, 1.0);
        weights.insert(1i64, 5.0);

        let mut tree = DecisionTree::new().with_class_weights(weights);
        tree.fit(&x, &y).unwrap();
        let predictions = tree.predict(&array![[1.0]]).unwrap();
        assert_eq!(predictions[0], 1);
    }

    #[test]
    fn test_predict_before_fit_fails() {
        let tree = DecisionTree::new();
        assert!(matches!(
            tree.predict(&array![[1.0]]),
            Err(RadscanError::ModelNotFitted)
        ));
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let x = array![[1.0], [2.0]];
        let y = array![0, 1, 0];
        let mut tree = DecisionTree::new();
        assert!(tree.fit(&x, &y).is_err());
    }
}
