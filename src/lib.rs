//! radscan: chest radiograph classification pipeline
//!
//! Builds feature datasets from archived radiographs (HOG plus uniform LBP
//! descriptors over equalized grayscale images), trains a random forest on
//! them with stratified splitting and SMOTE oversampling, and serves
//! single-image predictions from the persisted model.

pub mod cli;
pub mod dataset;
pub mod error;
pub mod features;
pub mod inference;
pub mod memory;
pub mod report;
pub mod taxonomy;
pub mod training;

pub use dataset::{build_dataset, DatasetArtifact, DatasetBuilder};
pub use error::{RadscanError, Result};
pub use features::{ExtractorConfig, FeatureExtractor};
pub use inference::{InferenceService, Prediction};
pub use taxonomy::ClassTaxonomy;
pub use training::{train, ModelArtifact, TrainingConfig, TrainingPipeline};
