//! Inference service
//!
//! Loads a persisted model and classifies single radiographs. The model
//! artifact carries the extractor configuration it was trained with; the
//! service refuses to load a model whose geometry no longer matches the
//! current extractor, since predictions over misaligned descriptors would
//! be silently meaningless.

use crate::error::{RadscanError, Result};
use crate::features::{ExtractorConfig, FeatureExtractor};
use crate::training::ModelArtifact;
use ndarray::Axis;
use std::path::Path;

/// A single classification with its full probability distribution.
#[derive(Debug, Clone)]
pub struct Prediction {
    pub class_name: String,
    /// Probability of the predicted class
    pub confidence: f64,
    /// One entry per taxonomy class, in taxonomy order, summing to 1
    pub probabilities: Vec<(String, f64)>,
}

/// Loaded model plus the extractor it was trained against.
pub struct InferenceService {
    model: ModelArtifact,
    extractor: FeatureExtractor,
}

impl InferenceService {
    /// Load a model artifact and verify extractor parity.
    pub fn load(model_path: impl AsRef<Path>) -> Result<Self> {
        let model = ModelArtifact::load(&model_path)?;

        let current = ExtractorConfig::default();
        if model.extractor != current {
            return Err(RadscanError::ModelLoad {
                path: model_path.as_ref().display().to_string(),
                reason: format!(
                    "model was trained with extractor {:?}, current is {:?}",
                    model.extractor, current
                ),
            });
        }
        if !model.forest.is_fitted() {
            return Err(RadscanError::ModelLoad {
                path: model_path.as_ref().display().to_string(),
                reason: "model artifact contains an unfitted forest".to_string(),
            });
        }

        tracing::info!(
            classes = model.taxonomy.len(),
            trained_at = %model.trained_at,
            accuracy = model.accuracy,
            "model loaded"
        );
        Ok(Self {
            extractor: FeatureExtractor::new(model.extractor.clone()),
            model,
        })
    }

    pub fn taxonomy_names(&self) -> &[String] {
        self.model.taxonomy.names()
    }

    /// Classify an image file on disk.
    pub fn predict_path(&self, image_path: impl AsRef<Path>) -> Result<Prediction> {
        let path = image_path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            RadscanError::PredictionInput(format!("{}: {e}", path.display()))
        })?;
        self.predict_bytes(&bytes, &path.display().to_string())
    }

    /// Classify encoded image bytes. `source` labels the input in errors.
    pub fn predict_bytes(&self, bytes: &[u8], source: &str) -> Result<Prediction> {
        if bytes.is_empty() {
            return Err(RadscanError::PredictionInput(format!(
                "{source}: empty input"
            )));
        }

        let features = self.extractor.extract_bytes(bytes, source)?;
        let x = features.insert_axis(Axis(0));
        let proba = self.model.forest.predict_proba(&x)?;
        let forest_classes = self.model.forest.classes();

        // Distribution over the full taxonomy; classes the forest never saw
        // during training get probability zero
        let mut probabilities: Vec<(String, f64)> = Vec::with_capacity(self.model.taxonomy.len());
        for (idx, name) in self.model.taxonomy.names().iter().enumerate() {
            let p = forest_classes
                .binary_search(&(idx as i64))
                .map(|pos| proba[[0, pos]])
                .unwrap_or(0.0);
            probabilities.push((name.clone(), p));
        }

        let (best_idx, &(_, confidence)) = probabilities
            .iter()
            .enumerate()
            .max_by(|a, b| {
                a.1 .1
                    .partial_cmp(&b.1 .1)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .ok_or_else(|| RadscanError::PredictionInput("empty taxonomy".to_string()))?;

        Ok(Prediction {
            class_name: self.model.taxonomy.name(best_idx)?.to_string(),
            confidence,
            probabilities,
        })
    }
}
