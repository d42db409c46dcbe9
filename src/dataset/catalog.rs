//! Archive catalog
//!
//! Enumerates a ZIP archive's image entries and groups them by taxonomy
//! class. Entries are walked in central-directory order so listings, caps and
//! downstream datasets are deterministic for a given archive.

use crate::error::{RadscanError, Result};
use crate::taxonomy::ClassTaxonomy;
use std::fs::File;
use std::path::{Path, PathBuf};
use zip::ZipArchive;

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Entry lists for one class, in archive listing order.
#[derive(Debug, Clone)]
pub struct ClassEntries {
    /// Index into the taxonomy
    pub class_idx: usize,
    /// Entry paths inside the archive
    pub entries: Vec<String>,
}

/// Classifies archive entries by the taxonomy's folder names.
pub struct ArchiveCatalog {
    archive_path: PathBuf,
    taxonomy: ClassTaxonomy,
}

impl ArchiveCatalog {
    pub fn new(archive_path: impl AsRef<Path>, taxonomy: ClassTaxonomy) -> Self {
        Self {
            archive_path: archive_path.as_ref().to_path_buf(),
            taxonomy,
        }
    }

    pub fn taxonomy(&self) -> &ClassTaxonomy {
        &self.taxonomy
    }

    /// List image entries per class, in taxonomy order. `max_per_class`
    /// truncates each class's list to its first N entries. A class with no
    /// entries at all is fatal: the dataset cannot represent the taxonomy.
    pub fn catalog(&self, max_per_class: Option<usize>) -> Result<Vec<ClassEntries>> {
        let path_display = self.archive_path.display().to_string();
        let file = File::open(&self.archive_path).map_err(|e| RadscanError::Archive {
            path: path_display.clone(),
            reason: e.to_string(),
        })?;
        let mut archive = ZipArchive::new(file).map_err(|e| RadscanError::Archive {
            path: path_display.clone(),
            reason: e.to_string(),
        })?;

        let mut per_class: Vec<Vec<String>> = vec![Vec::new(); self.taxonomy.len()];

        for i in 0..archive.len() {
            let entry = archive.by_index_raw(i).map_err(|e| RadscanError::Archive {
                path: path_display.clone(),
                reason: e.to_string(),
            })?;
            let name = entry.name().to_string();
            if !has_image_extension(&name) {
                continue;
            }
            if let Some(class_idx) = self.taxonomy.match_path(&name) {
                per_class[class_idx].push(name);
            }
        }

        let mut result = Vec::with_capacity(self.taxonomy.len());
        for (class_idx, mut entries) in per_class.into_iter().enumerate() {
            if entries.is_empty() {
                return Err(RadscanError::Archive {
                    path: path_display,
                    reason: format!(
                        "no entries found for class {}",
                        self.taxonomy.name(class_idx)?
                    ),
                });
            }
            if let Some(cap) = max_per_class {
                entries.truncate(cap);
            }
            tracing::debug!(
                class = self.taxonomy.name(class_idx)?,
                entries = entries.len(),
                "cataloged class"
            );
            result.push(ClassEntries { class_idx, entries });
        }

        Ok(result)
    }
}

fn has_image_extension(name: &str) -> bool {
    name.rsplit('.')
        .next()
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn write_archive(path: &Path, entries: &[(&str, &[u8])]) {
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

    fn two_class_taxonomy() -> ClassTaxonomy {
        ClassTaxonomy::new(vec!["CaseA".to_string(), "CaseB".to_string()]).unwrap()
    }

    #[test]
    fn test_catalog_groups_and_orders() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.zip");
        write_archive(
            &path,
            &[
                ("CaseA/1.png", b"x"),
                ("CaseB/1.jpg", b"x"),
                ("CaseA/2.jpeg", b"x"),
                ("CaseA/notes.txt", b"skip me"),
                ("unrelated/3.png", b"skip me"),
            ],
        );

        let catalog = ArchiveCatalog::new(&path, two_class_taxonomy());
        let listing = catalog.catalog(None).unwrap();

        assert_eq!(listing.len(), 2);
        assert_eq!(listing[0].entries, vec!["CaseA/1.png", "CaseA/2.jpeg"]);
        assert_eq!(listing[1].entries, vec!["CaseB/1.jpg"]);
    }

    #[test]
    fn test_max_per_class_truncates_in_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.zip");
        write_archive(
            &path,
            &[
                ("CaseA/1.png", b"x"),
                ("CaseA/2.png", b"x"),
                ("CaseA/3.png", b"x"),
                ("CaseB/1.png", b"x"),
            ],
        );

        let catalog = ArchiveCatalog::new(&path, two_class_taxonomy());
        let listing = catalog.catalog(Some(2)).unwrap();
        assert_eq!(listing[0].entries, vec!["CaseA/1.png", "CaseA/2.png"]);
        assert_eq!(listing[1].entries.len(), 1);
    }

    #[test]
    fn test_no_entry_double_counted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.zip");
        // File name contains the other class's name; segment matching must
        // keep it in CaseA only.
        write_archive(
            &path,
            &[("CaseA/CaseB.png", b"x"), ("CaseB/1.png", b"x")],
        );

        let catalog = ArchiveCatalog::new(&path, two_class_taxonomy());
        let listing = catalog.catalog(None).unwrap();
        let total: usize = listing.iter().map(|c| c.entries.len()).sum();
        assert_eq!(total, 2);
        assert_eq!(listing[0].entries, vec!["CaseA/CaseB.png"]);
        assert_eq!(listing[1].entries, vec!["CaseB/1.png"]);
    }

    #[test]
    fn test_missing_class_is_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.zip");
        write_archive(&path, &[("CaseA/1.png", b"x")]);

        let catalog = ArchiveCatalog::new(&path, two_class_taxonomy());
        let err = catalog.catalog(None).unwrap_err();
        assert!(matches!(err, RadscanError::Archive { .. }));
        assert!(err.to_string().contains("CaseB"));
    }

    #[test]
    fn test_missing_archive_is_fatal() {
        let catalog = ArchiveCatalog::new("/nonexistent/data.zip", two_class_taxonomy());
        assert!(matches!(
            catalog.catalog(None),
            Err(RadscanError::Archive { .. })
        ));
    }
}
