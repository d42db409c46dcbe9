//! Bagged random forest classifier
//!
//! Trees are built in parallel over bootstrap samples, each with its own
//! seeded RNG derived from the base seed so runs on identical input produce
//! identical forests. Balanced class weights are computed once from the
//! training labels and shared by every tree.

use crate::error::{RadscanError, Result};
use super::decision_tree::{Criterion, DecisionTree};
use ndarray::{Array1, Array2};
use rand::seq::SliceRandom;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Strategy for the number of features sampled per tree
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// Square root of the feature count
    Sqrt,
    /// Fixed number
    Fixed(usize),
    /// All features
    All,
}

/// Random forest classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub criterion: Criterion,
    /// Weight classes inversely to their frequency
    pub balanced_class_weights: bool,
    pub random_state: u64,
    /// Sorted unique labels seen at fit time
    classes: Vec<i64>,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(100)
    }
}

impl RandomForest {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            criterion: Criterion::Gini,
            balanced_class_weights: false,
            random_state: 42,
            classes: Vec::new(),
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

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_balanced_class_weights(mut self, balanced: bool) -> Self {
        self.balanced_class_weights = balanced;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Labels the forest was fitted on, sorted ascending.
    pub fn classes(&self) -> &[i64] {
        &self.classes
    }

    fn features_per_tree(&self, n_features: usize) -> usize {
        match self.max_features {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().ceil() as usize,
            MaxFeatures::Fixed(n) => n.min(n_features),
            MaxFeatures::All => n_features,
        }
        .max(1)
    }

    /// Balanced weights: `n_samples / (n_classes * count_c)`, computed from
    /// the labels passed to `fit` before any bootstrap resampling.
    fn class_weights(&self, y: &Array1<i64>) -> Option<HashMap<i64, f64>> {
        if !self.balanced_class_weights {
            return None;
        }
        let mut counts: HashMap<i64, usize> = HashMap::new();
        for &label in y.iter() {
            *counts.entry(label).or_insert(0) += 1;
        }
        let n = y.len() as f64;
        let k = counts.len() as f64;
        Some(
            counts
                .into_iter()
                .map(|(class, count)| (class, n / (k * count as f64)))
                .collect(),
        )
    }

    /// Fit the forest. Trees build in parallel with all available compute.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();
        if n_samples != y.len() {
            return Err(RadscanError::ShapeMismatch {
                expected: format!("y length = {n_samples}"),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(RadscanError::Training(
                "Cannot fit a forest on an empty dataset".to_string(),
            ));
        }

        let mut classes: Vec<i64> = y.iter().copied().collect();
        classes.sort_unstable();
        classes.dedup();
        self.classes = classes;

        let weights = self.class_weights(y);
        let features_per_tree = self.features_per_tree(n_features);
        let base_seed = self.random_state;

        let trees: Result<Vec<DecisionTree>> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let mut rng = ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(tree_idx as u64));

                // Bootstrap sample with replacement
                let sample_indices: Vec<usize> = (0..n_samples)
                    .map(|_| (rng.next_u64() as usize) % n_samples)
                    .collect();
                let x_boot = x.select(ndarray::Axis(0), &sample_indices);
                let y_boot =
                    Array1::from_iter(sample_indices.iter().map(|&i| y[i]));

                // Random feature subset per tree
                let mut feature_subset: Vec<usize> = (0..n_features).collect();
                feature_subset.shuffle(&mut rng);
                feature_subset.truncate(features_per_tree);
                feature_subset.sort_unstable();

                let mut tree = DecisionTree::new()
                    .with_min_samples_split(self.min_samples_split)
                    .with_min_samples_leaf(self.min_samples_leaf)
                    .with_criterion(self.criterion);
                if let Some(depth) = self.max_depth {
                    tree = tree.with_max_depth(depth);
                }
                if let Some(w) = &weights {
                    tree = tree.with_class_weights(w.clone());
                }
                tree.feature_subset = Some(feature_subset);
                tree.fit(&x_boot, &y_boot)?;
                Ok(tree)
            })
            .collect();

        self.trees = trees?;
        Ok(self)
    }

    /// Hard-vote predictions.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<i64>> {
        let proba = self.predict_proba(x)?;
        let predictions: Vec<i64> = proba
            .rows()
            .into_iter()
            .map(|row| {
                let best = row
                    .iter()
                    .enumerate()
                    .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
                    .map(|(i, _)| i)
                    .unwrap_or(0);
                self.classes[best]
            })
            .collect();
        Ok(Array1::from_vec(predictions))
    }

    /// Vote-fraction probabilities, one column per fitted class in
    /// `classes()` order. Rows sum to 1.
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.trees.is_empty() {
            return Err(RadscanError::ModelNotFitted);
        }

        let tree_predictions: Vec<Array1<i64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<Vec<_>>>()?;

        let n_samples = x.nrows();
        let n_classes = self.classes.len();
        let mut proba = Array2::<f64>::zeros((n_samples, n_classes));

        for preds in &tree_predictions {
            for (i, &class) in preds.iter().enumerate() {
                if let Ok(class_idx) = self.classes.binary_search(&class) {
                    proba[[i, class_idx]] += 1.0;
                }
            }
        }

        let n_trees = self.trees.len() as f64;
        proba.mapv_inplace(|v| v / n_trees);
        Ok(proba)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn separable_data() -> (Array2<f64>, Array1<i64>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..12 {
            rows.push(vec![0.1 * (i % 4) as f64, 0.1 * (i % 3) as f64]);
            labels.push(0i64);
            rows.push(vec![5.0 + 0.1 * (i % 4) as f64, 5.0 + 0.1 * (i % 3) as f64]);
            labels.push(1i64);
        }
        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        (
            Array2::from_shape_vec((24, 2), flat).unwrap(),
            Array1::from_vec(labels),
        )
    }

    #[test]
    fn test_classifier_learns_separable_data() {
        let (x, y) = separable_data();
        let mut forest = RandomForest::new(20).with_random_state(42);
        forest.fit(&x, &y).unwrap();

        let predictions = forest.predict(&x).unwrap();
        assert_eq!(predictions, y);
    }

    #[test]
    fn test_predict_proba_rows_sum_to_one() {
        let (x, y) = separable_data();
        let mut forest = RandomForest::new(15).with_random_state(7);
        forest.fit(&x, &y).unwrap();

        let proba = forest.predict_proba(&x).unwrap();
        assert_eq!(proba.ncols(), 2);
        for row in proba.rows() {
            let sum: f64 = row.sum();
            assert!((sum - 1.0).abs() < 1e-9, "row sum {sum}");
        }
    }

    #[test]
    fn test_fit_is_deterministic_for_fixed_seed() {
        let (x, y) = separable_data();
        let mut a = RandomForest::new(10).with_random_state(123);
        let mut b = RandomForest::new(10).with_random_state(123);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap());
    }

    #[test]
    fn test_balanced_weights_from_counts() {
        let forest = RandomForest::new(5).with_balanced_class_weights(true);
        let y = array![0i64, 0, 0, 1];
        let weights = forest.class_weights(&y).unwrap();
        assert!((weights[&0] - 4.0 / (2.0 * 3.0)).abs() < 1e-12);
        assert!((weights[&1] - 4.0 / (2.0 * 1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_predict_before_fit_fails() {
        let forest = RandomForest::new(5);
        assert!(matches!(
            forest.predict(&array![[1.0, 2.0]]),
            Err(RadscanError::ModelNotFitted)
        ));
    }
}
