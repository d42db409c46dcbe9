//! Dataset builder and metadata artifact
//!
//! Orchestrates the catalog and the batch pool to produce aligned feature
//! and label arrays, and persists them as a single JSON metadata artifact
//! stamped with the taxonomy, the extractor configuration, the build
//! timestamp and the array shape.

use crate::dataset::catalog::ArchiveCatalog;
use crate::dataset::pool::{BatchPoolConfig, BatchWorkerPool};
use crate::error::{RadscanError, Result};
use crate::features::{ExtractorConfig, FeatureExtractor};
use crate::memory::MemoryMonitor;
use crate::taxonomy::ClassTaxonomy;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Persisted dataset metadata. Write-once at build time, read by training.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetArtifact {
    /// Row-major feature matrix, one row per sample
    pub features: Array2<f64>,
    /// Label indices aligned with `features` rows
    pub labels: Array1<i64>,
    /// Taxonomy the labels index into
    pub taxonomy: ClassTaxonomy,
    /// Extractor configuration the features were computed with
    pub extractor: ExtractorConfig,
    /// Build time, RFC 3339
    pub timestamp: String,
    /// `(n_samples, feature_len)`, kept redundantly for audit
    pub shape: (usize, usize),
}

impl DatasetArtifact {
    /// Serialize to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_vec(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load and validate. Shape or extractor drift against the current code
    /// is fatal here, before training can consume misaligned data.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(&path)?;
        let artifact: Self = serde_json::from_slice(&bytes)?;
        artifact.validate()?;
        Ok(artifact)
    }

    pub fn validate(&self) -> Result<()> {
        let (rows, cols) = self.features.dim();
        if self.shape != (rows, cols) {
            return Err(RadscanError::ShapeMismatch {
                expected: format!("{:?}", self.shape),
                actual: format!("{:?}", (rows, cols)),
            });
        }
        if cols != self.extractor.feature_len() {
            return Err(RadscanError::ShapeMismatch {
                expected: format!("feature length {}", self.extractor.feature_len()),
                actual: format!("feature length {cols}"),
            });
        }
        if self.labels.len() != rows {
            return Err(RadscanError::ShapeMismatch {
                expected: format!("{rows} labels"),
                actual: format!("{} labels", self.labels.len()),
            });
        }
        let n_classes = self.taxonomy.len() as i64;
        if self.labels.iter().any(|&l| l < 0 || l >= n_classes) {
            return Err(RadscanError::Validation(format!(
                "labels must lie in [0, {n_classes})"
            )));
        }
        Ok(())
    }
}

/// Builds a dataset from an archive: catalog, extract per class in taxonomy
/// order, align, persist.
pub struct DatasetBuilder {
    archive_path: PathBuf,
    taxonomy: ClassTaxonomy,
    extractor: FeatureExtractor,
    pool_config: BatchPoolConfig,
}

impl DatasetBuilder {
    pub fn new(archive_path: impl AsRef<Path>, taxonomy: ClassTaxonomy) -> Self {
        Self {
            archive_path: archive_path.as_ref().to_path_buf(),
            taxonomy,
            extractor: FeatureExtractor::default(),
            pool_config: BatchPoolConfig::default(),
        }
    }

    pub fn with_pool_config(mut self, config: BatchPoolConfig) -> Self {
        self.pool_config = config;
        self
    }

    /// Run the full build. Classes are processed sequentially in taxonomy
    /// order; per-class result counts may be uneven when corrupt entries
    /// were skipped, which downstream code treats as normal.
    pub fn build(&self, max_per_class: Option<usize>) -> Result<DatasetArtifact> {
        let start = Instant::now();
        let catalog = ArchiveCatalog::new(&self.archive_path, self.taxonomy.clone());
        let listing = catalog.catalog(max_per_class)?;

        let pool = BatchWorkerPool::new(&self.archive_path, self.pool_config.clone())?;
        let mut monitor = MemoryMonitor::new();
        let mut rows: Vec<(Array1<f64>, i64)> = Vec::new();

        for class in &listing {
            let class_name = self.taxonomy.name(class.class_idx)?;
            tracing::info!(
                class = class_name,
                entries = class.entries.len(),
                "extracting class"
            );
            let extracted = pool.process_entries(
                &class.entries,
                class.class_idx as i64,
                &self.extractor,
                &mut monitor,
            )?;
            tracing::info!(
                class = class_name,
                extracted = extracted.len(),
                skipped = class.entries.len() - extracted.len(),
                "class done"
            );
            rows.extend(extracted);
        }

        if rows.is_empty() {
            return Err(RadscanError::Archive {
                path: self.archive_path.display().to_string(),
                reason: "no entry could be decoded".to_string(),
            });
        }

        let feature_len = self.extractor.feature_len();
        let n_samples = rows.len();
        let mut features = Array2::<f64>::zeros((n_samples, feature_len));
        let mut labels = Array1::<i64>::zeros(n_samples);
        for (i, (row, label)) in rows.into_iter().enumerate() {
            if row.len() != feature_len {
                return Err(RadscanError::ShapeMismatch {
                    expected: format!("feature length {feature_len}"),
                    actual: format!("feature length {} at row {i}", row.len()),
                });
            }
            features.row_mut(i).assign(&row);
            labels[i] = label;
        }

        tracing::info!(
            samples = n_samples,
            feature_len,
            elapsed_secs = start.elapsed().as_secs_f64(),
            peak_rss_mb = monitor.peak_mb(),
            "dataset built"
        );

        Ok(DatasetArtifact {
            features,
            labels,
            taxonomy: self.taxonomy.clone(),
            extractor: self.extractor.config().clone(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            shape: (n_samples, feature_len),
        })
    }
}

/// Collaborator-facing call: build the dataset from `archive_path` and write
/// the metadata artifact under `output_dir`, returning its path.
pub fn build_dataset(
    archive_path: impl AsRef<Path>,
    max_per_class: Option<usize>,
    output_dir: impl AsRef<Path>,
) -> Result<PathBuf> {
    let output_dir = output_dir.as_ref();
    std::fs::create_dir_all(output_dir)?;

    let builder = DatasetBuilder::new(archive_path, ClassTaxonomy::default());
    let artifact = builder.build(max_per_class)?;

    let metadata_path = output_dir.join("metadata.json");
    artifact.save(&metadata_path)?;
    tracing::info!(path = %metadata_path.display(), "metadata saved");
    Ok(metadata_path)
}
