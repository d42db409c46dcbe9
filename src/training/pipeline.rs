//! Training pipeline
//!
//! Loads a dataset artifact, splits it with stratification, oversamples the
//! training fold with SMOTE, fits the forest, evaluates on the untouched
//! test fold, and persists the model plus report artifacts.

use crate::dataset::DatasetArtifact;
use crate::error::{RadscanError, Result};
use crate::features::ExtractorConfig;
use crate::memory::MemoryMonitor;
use crate::report;
use crate::taxonomy::ClassTaxonomy;
use crate::training::metrics::ClassificationReport;
use crate::training::random_forest::{MaxFeatures, RandomForest};
use crate::training::smote::Smote;
use crate::training::split::stratified_split;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Knobs for a training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub test_ratio: f64,
    pub seed: u64,
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub smote_k: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_ratio: 0.2,
            seed: 42,
            n_estimators: 150,
            max_depth: 20,
            min_samples_split: 5,
            smote_k: 5,
        }
    }
}

/// Result of a training run, returned alongside the persisted artifacts.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub accuracy: f64,
    pub report: ClassificationReport,
    pub training_time_secs: f64,
    pub peak_memory_mb: f64,
}

/// Persisted trained model with everything inference needs to refuse
/// incompatible inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub forest: RandomForest,
    pub taxonomy: ClassTaxonomy,
    pub extractor: ExtractorConfig,
    pub trained_at: String,
    pub accuracy: f64,
}

impl ModelArtifact {
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_vec(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| RadscanError::ModelLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        serde_json::from_slice(&bytes).map_err(|e| RadscanError::ModelLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

/// Runs split, oversampling, fitting and evaluation over a dataset artifact.
pub struct TrainingPipeline {
    config: TrainingConfig,
}

impl TrainingPipeline {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    /// Train and evaluate. SMOTE only ever sees the training fold.
    pub fn run(&self, artifact: &DatasetArtifact) -> Result<(ModelArtifact, TrainingOutcome)> {
        artifact.validate()?;
        let start = Instant::now();
        let mut monitor = MemoryMonitor::new();

        let (x_train, x_test, y_train, y_test) = stratified_split(
            &artifact.features,
            &artifact.labels,
            self.config.test_ratio,
            self.config.seed,
        )?;
        tracing::info!(
            train = y_train.len(),
            test = y_test.len(),
            "dataset split"
        );

        let smote = Smote::new(self.config.smote_k, self.config.seed);
        let (x_train, y_train) = smote.fit_resample(&x_train, &y_train)?;
        monitor.sample();
        tracing::info!(resampled = y_train.len(), "training fold oversampled");

        let mut forest = RandomForest::new(self.config.n_estimators)
            .with_max_depth(self.config.max_depth)
            .with_min_samples_split(self.config.min_samples_split)
            .with_max_features(MaxFeatures::Sqrt)
            .with_balanced_class_weights(true)
            .with_random_state(self.config.seed);
        forest.fit(&x_train, &y_train)?;
        monitor.sample();

        let y_pred = forest.predict(&x_test)?;
        let classes: Vec<i64> = (0..artifact.taxonomy.len() as i64).collect();
        let report = ClassificationReport::compute(&y_test, &y_pred, &classes)?;

        let training_time_secs = start.elapsed().as_secs_f64();
        tracing::info!(
            accuracy = report.accuracy,
            elapsed_secs = training_time_secs,
            peak_rss_mb = monitor.peak_mb(),
            "training complete"
        );

        let model = ModelArtifact {
            forest,
            taxonomy: artifact.taxonomy.clone(),
            extractor: artifact.extractor.clone(),
            trained_at: chrono::Utc::now().to_rfc3339(),
            accuracy: report.accuracy,
        };
        let outcome = TrainingOutcome {
            accuracy: report.accuracy,
            report,
            training_time_secs,
            peak_memory_mb: monitor.peak_mb(),
        };
        Ok((model, outcome))
    }
}

/// Collaborator-facing call: train from a metadata artifact and write the
/// model, the text report and the confusion matrix PNG, returning the model
/// path.
pub fn train(
    metadata_path: impl AsRef<Path>,
    model_dir: impl AsRef<Path>,
    reports_dir: impl AsRef<Path>,
) -> Result<PathBuf> {
    let artifact = DatasetArtifact::load(metadata_path)?;
    let pipeline = TrainingPipeline::new(TrainingConfig::default());
    let (model, outcome) = pipeline.run(&artifact)?;

    let model_dir = model_dir.as_ref();
    let reports_dir = reports_dir.as_ref();
    std::fs::create_dir_all(model_dir)?;
    std::fs::create_dir_all(reports_dir)?;

    let model_path = model_dir.join("model.json");
    model.save(&model_path)?;

    let class_names: Vec<&str> = model.taxonomy.names().iter().map(String::as_str).collect();
    report::write_text_report(
        &outcome.report,
        &class_names,
        outcome.training_time_secs,
        outcome.peak_memory_mb,
        reports_dir.join("training_report.txt"),
    )?;
    report::write_confusion_png(&outcome.report, reports_dir.join("confusion_matrix.png"))?;

    tracing::info!(path = %model_path.display(), "model saved");
    Ok(model_path)
}
