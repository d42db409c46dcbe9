//! Dataset construction
//!
//! Archive cataloging, batched parallel feature extraction, and the
//! persisted metadata artifact.

mod builder;
mod catalog;
mod pool;

pub use builder::{build_dataset, DatasetArtifact, DatasetBuilder};
pub use catalog::{ArchiveCatalog, ClassEntries};
pub use pool::{BatchPoolConfig, BatchWorkerPool};
