//! Stratified train/test splitting

use crate::error::{RadscanError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;

/// Split `(x, y)` into train and test partitions, keeping each class's
/// proportion in both. Every class contributes at least one test sample,
/// which requires at least two samples per class.
pub fn stratified_split(
    x: &Array2<f64>,
    y: &Array1<i64>,
    test_ratio: f64,
    seed: u64,
) -> Result<(Array2<f64>, Array2<f64>, Array1<i64>, Array1<i64>)> {
    if x.nrows() != y.len() {
        return Err(RadscanError::ShapeMismatch {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if !(0.0..1.0).contains(&test_ratio) || test_ratio == 0.0 {
        return Err(RadscanError::Validation(format!(
            "test_ratio must lie in (0, 1), got {test_ratio}"
        )));
    }

    let mut by_class: HashMap<i64, Vec<usize>> = HashMap::new();
    for (i, &label) in y.iter().enumerate() {
        by_class.entry(label).or_default().push(i);
    }

    let mut classes: Vec<i64> = by_class.keys().copied().collect();
    classes.sort_unstable();

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train_indices: Vec<usize> = Vec::new();
    let mut test_indices: Vec<usize> = Vec::new();

    for class in classes {
        let mut indices = by_class.remove(&class).unwrap_or_default();
        if indices.len() < 2 {
            return Err(RadscanError::Validation(format!(
                "class {class} has {} sample(s); stratified splitting needs at least 2",
                indices.len()
            )));
        }
        indices.shuffle(&mut rng);

        let n_test = ((indices.len() as f64 * test_ratio).round() as usize)
            .max(1)
            .min(indices.len() - 1);
        test_indices.extend_from_slice(&indices[..n_test]);
        train_indices.extend_from_slice(&indices[n_test..]);
    }

    train_indices.sort_unstable();
    test_indices.sort_unstable();

    let x_train = x.select(Axis(0), &train_indices);
    let x_test = x.select(Axis(0), &test_indices);
    let y_train = Array1::from_iter(train_indices.iter().map(|&i| y[i]));
    let y_test = Array1::from_iter(test_indices.iter().map(|&i| y[i]));

    Ok((x_train, x_test, y_train, y_test))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn labeled_data(per_class: &[usize]) -> (Array2<f64>, Array1<i64>) {
        let total: usize = per_class.iter().sum();
        let mut labels = Vec::with_capacity(total);
        for (class, &n) in per_class.iter().enumerate() {
            labels.extend(std::iter::repeat(class as i64).take(n));
        }
        let x = Array2::from_shape_fn((total, 3), |(i, j)| (i * 7 + j) as f64);
        (x, Array1::from_vec(labels))
    }

    fn count(y: &Array1<i64>, class: i64) -> usize {
        y.iter().filter(|&&l| l == class).count()
    }

    #[test]
    fn test_preserves_class_proportions() {
        let (x, y) = labeled_data(&[50, 30, 20]);
        let (_, _, y_train, y_test) = stratified_split(&x, &y, 0.2, 42).unwrap();

        assert_eq!(count(&y_test, 0), 10);
        assert_eq!(count(&y_test, 1), 6);
        assert_eq!(count(&y_test, 2), 4);
        assert_eq!(count(&y_train, 0), 40);
        assert_eq!(count(&y_train, 1), 24);
        assert_eq!(count(&y_train, 2), 16);
    }

    #[test]
    fn test_partitions_are_disjoint_and_complete() {
        let (x, y) = labeled_data(&[12, 8]);
        let (x_train, x_test, y_train, y_test) = stratified_split(&x, &y, 0.25, 1).unwrap();

        assert_eq!(x_train.nrows() + x_test.nrows(), x.nrows());
        assert_eq!(y_train.len() + y_test.len(), y.len());
        assert_eq!(x_train.nrows(), y_train.len());
        assert_eq!(x_test.nrows(), y_test.len());
    }

    #[test]
    fn test_small_class_still_represented_in_test() {
        let (x, y) = labeled_data(&[40, 2]);
        let (_, _, y_train, y_test) = stratified_split(&x, &y, 0.2, 42).unwrap();
        assert_eq!(count(&y_test, 1), 1);
        assert_eq!(count(&y_train, 1), 1);
    }

    #[test]
    fn test_singleton_class_rejected() {
        let (x, y) = labeled_data(&[10, 1]);
        assert!(stratified_split(&x, &y, 0.2, 42).is_err());
    }

    #[test]
    fn test_invalid_ratio_rejected() {
        let (x, y) = labeled_data(&[4, 4]);
        assert!(stratified_split(&x, &y, 0.0, 42).is_err());
        assert!(stratified_split(&x, &y, 1.0, 42).is_err());
    }

    #[test]
    fn test_deterministic_for_fixed_seed() {
        let (x, y) = labeled_data(&[20, 20]);
        let a = stratified_split(&x, &y, 0.2, 7).unwrap();
        let b = stratified_split(&x, &y, 0.2, 7).unwrap();
        assert_eq!(a.1, b.1);
        assert_eq!(a.3, b.3);
    }
}
