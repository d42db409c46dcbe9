//! Batch worker pool
//!
//! Runs the feature extractor over archive entries in fixed-size batches on
//! a bounded rayon pool. One batch is in flight at a time and its results
//! are drained before the next starts, which bounds peak memory for long
//! runs. Workers share nothing: each opens its own archive handle and reads
//! a single entry.

use crate::error::{RadscanError, Result};
use crate::features::FeatureExtractor;
use crate::memory::MemoryMonitor;
use ndarray::Array1;
use rayon::prelude::*;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use zip::ZipArchive;

/// Pool sizing and batching knobs.
#[derive(Debug, Clone)]
pub struct BatchPoolConfig {
    /// Entries per batch; the drain barrier runs once per batch
    pub batch_size: usize,
    /// Worker threads
    pub num_workers: usize,
}

impl Default for BatchPoolConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            num_workers: default_workers(),
        }
    }
}

/// Available parallel units minus one, so the orchestrating thread keeps a
/// core, never below one worker.
fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1))
        .unwrap_or(1)
        .max(1)
}

/// Executes feature extraction over archive entries in bounded batches.
pub struct BatchWorkerPool {
    archive_path: PathBuf,
    config: BatchPoolConfig,
    pool: rayon::ThreadPool,
}

impl BatchWorkerPool {
    pub fn new(archive_path: impl AsRef<Path>, config: BatchPoolConfig) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.num_workers)
            .build()
            .map_err(|e| RadscanError::ThreadPool(e.to_string()))?;
        Ok(Self {
            archive_path: archive_path.as_ref().to_path_buf(),
            config,
            pool,
        })
    }

    pub fn config(&self) -> &BatchPoolConfig {
        &self.config
    }

    /// Extract descriptors for `entries`, labeling each with `label`.
    ///
    /// A single entry's read or decode failure is logged and skipped; it
    /// never aborts the batch or the run, so the returned list may be
    /// shorter than `entries`. Successful results keep entry order.
    pub fn process_entries(
        &self,
        entries: &[String],
        label: i64,
        extractor: &FeatureExtractor,
        monitor: &mut MemoryMonitor,
    ) -> Result<Vec<(Array1<f64>, i64)>> {
        let mut results: Vec<(Array1<f64>, i64)> = Vec::with_capacity(entries.len());

        for (batch_idx, batch) in entries.chunks(self.config.batch_size).enumerate() {
            let batch_results: Vec<(Array1<f64>, i64)> = self.pool.install(|| {
                batch
                    .par_iter()
                    .filter_map(|entry| {
                        match self.extract_one(entry, label, extractor) {
                            Ok(pair) => Some(pair),
                            Err(err) => {
                                tracing::warn!(entry = %entry, error = %err, "skipping entry");
                                None
                            }
                        }
                    })
                    .collect()
            });

            // Drain barrier: append before the next batch starts
            results.extend(batch_results);
            let rss = monitor.sample();
            tracing::debug!(
                batch = batch_idx,
                processed = results.len(),
                rss_mb = rss,
                "batch drained"
            );
        }

        Ok(results)
    }

    /// One worker's unit of work: open the archive, read one entry, extract.
    fn extract_one(
        &self,
        entry: &str,
        label: i64,
        extractor: &FeatureExtractor,
    ) -> Result<(Array1<f64>, i64)> {
        let bytes = self.read_entry(entry)?;
        let features = extractor.extract_bytes(&bytes, entry)?;
        Ok((features, label))
    }

    fn read_entry(&self, entry: &str) -> Result<Vec<u8>> {
        let path_display = self.archive_path.display().to_string();
        let file = File::open(&self.archive_path).map_err(|e| RadscanError::Archive {
            path: path_display.clone(),
            reason: e.to_string(),
        })?;
        let mut archive = ZipArchive::new(file).map_err(|e| RadscanError::Archive {
            path: path_display.clone(),
            reason: e.to_string(),
        })?;
        let mut zf = archive.by_name(entry).map_err(|e| RadscanError::Archive {
            path: path_display,
            reason: format!("entry {entry}: {e}"),
        })?;
        let mut buf = Vec::with_capacity(zf.size() as usize);
        zf.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, Luma};
    use std::io::{Cursor, Write};
    use tempfile::tempdir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn png_bytes(seed: u8) -> Vec<u8> {
        let img = GrayImage::from_fn(40, 40, |x, y| {
            Luma([((x * 3 + y * 5) as u8).wrapping_add(seed)])
        });
        let mut bytes = Vec::new();
        DynamicImage::ImageLuma8(img)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn write_archive(path: &Path, entries: &[(&str, Vec<u8>)]) {
        let file = File::create(path).unwrap();
        let mut zip = ZipWriter::new(file);
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        for (name, data) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_corrupted_entry_is_skipped_not_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.zip");
        write_archive(
            &path,
            &[
                ("c/1.png", png_bytes(1)),
                ("c/2.png", b"not an image at all".to_vec()),
                ("c/3.png", png_bytes(3)),
            ],
        );

        let pool = BatchWorkerPool::new(&path, BatchPoolConfig::default()).unwrap();
        let extractor = FeatureExtractor::default();
        let mut monitor = MemoryMonitor::new();
        let entries: Vec<String> =
            ["c/1.png", "c/2.png", "c/3.png"].iter().map(|s| s.to_string()).collect();

        let results = pool
            .process_entries(&entries, 0, &extractor, &mut monitor)
            .unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|(f, l)| f.len() == 674 && *l == 0));
    }

    #[test]
    fn test_results_keep_entry_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.zip");
        let pngs: Vec<(String, Vec<u8>)> = (0..7)
            .map(|i| (format!("c/{i}.png"), png_bytes(i as u8 * 17)))
            .collect();
        let borrowed: Vec<(&str, Vec<u8>)> =
            pngs.iter().map(|(n, d)| (n.as_str(), d.clone())).collect();
        write_archive(&path, &borrowed);

        let config = BatchPoolConfig {
            batch_size: 3,
            num_workers: 2,
        };
        let pool = BatchWorkerPool::new(&path, config).unwrap();
        let extractor = FeatureExtractor::default();
        let mut monitor = MemoryMonitor::new();
        let entries: Vec<String> = pngs.iter().map(|(n, _)| n.clone()).collect();

        let results = pool
            .process_entries(&entries, 2, &extractor, &mut monitor)
            .unwrap();
        assert_eq!(results.len(), 7);

        // Order must match a sequential extraction of the same entries
        for (i, entry) in entries.iter().enumerate() {
            let expected = extractor
                .extract_bytes(&pngs[i].1, entry)
                .unwrap();
            assert_eq!(results[i].0, expected);
        }
    }

    #[test]
    fn test_memory_sampled_per_batch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.zip");
        let pngs: Vec<(String, Vec<u8>)> = (0..4)
            .map(|i| (format!("c/{i}.png"), png_bytes(i as u8)))
            .collect();
        let borrowed: Vec<(&str, Vec<u8>)> =
            pngs.iter().map(|(n, d)| (n.as_str(), d.clone())).collect();
        write_archive(&path, &borrowed);

        let config = BatchPoolConfig {
            batch_size: 2,
            num_workers: 1,
        };
        let pool = BatchWorkerPool::new(&path, config).unwrap();
        let extractor = FeatureExtractor::default();
        let mut monitor = MemoryMonitor::new();
        let entries: Vec<String> = pngs.iter().map(|(n, _)| n.clone()).collect();

        pool.process_entries(&entries, 0, &extractor, &mut monitor)
            .unwrap();
        // Initial sample plus one per batch (4 entries / batch_size 2)
        assert_eq!(monitor.history().len(), 3);
    }
}
