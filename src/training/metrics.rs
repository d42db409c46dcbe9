//! Classification metrics
//!
//! Accuracy, per-class precision/recall/F1 with support, and the confusion
//! matrix, computed over a fixed class list so absent classes still get a
//! row in the report.

use crate::error::{RadscanError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Per-class scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassScores {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// True samples of this class in the evaluation set
    pub support: usize,
}

/// Full evaluation summary for a multi-class classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub accuracy: f64,
    /// Indexed like the class list passed at computation time
    pub per_class: Vec<ClassScores>,
    /// `confusion[[true, predicted]]`
    pub confusion: Array2<u64>,
    pub n_samples: usize,
}

impl ClassificationReport {
    /// Compute the report over `classes`, which fixes row/column order. Every
    /// label in `y_true` and `y_pred` must appear in `classes`.
    pub fn compute(y_true: &Array1<i64>, y_pred: &Array1<i64>, classes: &[i64]) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(RadscanError::ShapeMismatch {
                expected: format!("{} predictions", y_true.len()),
                actual: format!("{} predictions", y_pred.len()),
            });
        }
        if y_true.is_empty() {
            return Err(RadscanError::Validation(
                "Cannot score an empty evaluation set".to_string(),
            ));
        }

        let index_of = |label: i64| -> Result<usize> {
            classes
                .iter()
                .position(|&c| c == label)
                .ok_or_else(|| RadscanError::Validation(format!("unknown label {label}")))
        };

        let k = classes.len();
        let mut confusion = Array2::<u64>::zeros((k, k));
        let mut correct = 0usize;
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            confusion[[index_of(t)?, index_of(p)?]] += 1;
            if t == p {
                correct += 1;
            }
        }

        let per_class = (0..k)
            .map(|c| {
                let tp = confusion[[c, c]] as f64;
                let fp: f64 = (0..k).filter(|&r| r != c).map(|r| confusion[[r, c]] as f64).sum();
                let fn_: f64 = (0..k).filter(|&p| p != c).map(|p| confusion[[c, p]] as f64).sum();
                let support = (tp + fn_) as usize;

                let precision = if tp + fp > 0.0 { tp / (tp + fp) } else { 0.0 };
                let recall = if tp + fn_ > 0.0 { tp / (tp + fn_) } else { 0.0 };
                let f1 = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                ClassScores {
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect();

        Ok(Self {
            accuracy: correct as f64 / y_true.len() as f64,
            per_class,
            confusion,
            n_samples: y_true.len(),
        })
    }

    /// Plain-text table, one row per class plus accuracy and a weighted
    /// average line.
    pub fn render_table(&self, class_names: &[&str]) -> String {
        let name_width = class_names
            .iter()
            .map(|n| n.len())
            .max()
            .unwrap_or(5)
            .max("weighted avg".len());

        let mut out = String::new();
        out.push_str(&format!(
            "{:>name_width$}  {:>9}  {:>9}  {:>9}  {:>9}\n\n",
            "", "precision", "recall", "f1-score", "support"
        ));

        for (name, scores) in class_names.iter().zip(&self.per_class) {
            out.push_str(&format!(
                "{name:>name_width$}  {:>9.4}  {:>9.4}  {:>9.4}  {:>9}\n",
                scores.precision, scores.recall, scores.f1, scores.support
            ));
        }

        let total = self.n_samples as f64;
        let (w_p, w_r, w_f) = self.per_class.iter().fold((0.0, 0.0, 0.0), |acc, s| {
            let w = s.support as f64 / total;
            (acc.0 + w * s.precision, acc.1 + w * s.recall, acc.2 + w * s.f1)
        });

        out.push_str(&format!(
            "\n{:>name_width$}  {:>9}  {:>9}  {:>9.4}  {:>9}\n",
            "accuracy", "", "", self.accuracy, self.n_samples
        ));
        out.push_str(&format!(
            "{:>name_width$}  {w_p:>9.4}  {w_r:>9.4}  {w_f:>9.4}  {:>9}\n",
            "weighted avg", self.n_samples
        ));
        out
    }
}
