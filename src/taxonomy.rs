//! Class taxonomy shared by dataset building, training and inference
//!
//! The taxonomy is a fixed, ordered list of class names. Labels everywhere in
//! the pipeline are indices into this list, and persisted artifacts carry the
//! list they were built against, so a single value travels through every
//! component instead of per-call-site copies.

use crate::error::{RadscanError, Result};
use serde::{Deserialize, Serialize};

/// Ordered, immutable list of diagnostic class names.
///
/// Names double as archive folder names: an entry belongs to a class when one
/// of its path segments equals the class name exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassTaxonomy {
    classes: Vec<String>,
}

impl ClassTaxonomy {
    /// Build a taxonomy from an ordered list of class names.
    pub fn new(classes: Vec<String>) -> Result<Self> {
        if classes.is_empty() {
            return Err(RadscanError::Validation(
                "Taxonomy needs at least one class".to_string(),
            ));
        }
        for (i, a) in classes.iter().enumerate() {
            if classes[..i].contains(a) {
                return Err(RadscanError::Validation(format!(
                    "Duplicate class name in taxonomy: {a}"
                )));
            }
        }
        Ok(Self { classes })
    }

    /// The chest X-ray taxonomy the pipeline ships with.
    pub fn chest_xray() -> Self {
        Self {
            classes: vec![
                "COVID".to_string(),
                "Lung_Opacity".to_string(),
                "Normal".to_string(),
                "Viral Pneumonia".to_string(),
            ],
        }
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Class name for a label index.
    pub fn name(&self, idx: usize) -> Result<&str> {
        self.classes
            .get(idx)
            .map(|s| s.as_str())
            .ok_or_else(|| RadscanError::Validation(format!(
                "Label {idx} outside taxonomy of {} classes",
                self.classes.len()
            )))
    }

    pub fn names(&self) -> &[String] {
        &self.classes
    }

    /// Assign an entry path to a class: the first class (in taxonomy order)
    /// whose name equals a directory segment of the path wins. Matching on
    /// whole segments keeps a class whose name is a substring of another
    /// path from stealing entries.
    pub fn match_path(&self, entry_path: &str) -> Option<usize> {
        let segments: Vec<&str> = entry_path.split('/').collect();
        // The final segment is the file name, never a class folder.
        let dirs = &segments[..segments.len().saturating_sub(1)];
        self.classes
            .iter()
            .position(|class| dirs.iter().any(|seg| seg == class))
    }
}

impl Default for ClassTaxonomy {
    fn default() -> Self {
        Self::chest_xray()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_order() {
        let tax = ClassTaxonomy::chest_xray();
        assert_eq!(tax.len(), 4);
        assert_eq!(tax.name(0).unwrap(), "COVID");
        assert_eq!(tax.name(3).unwrap(), "Viral Pneumonia");
    }

    #[test]
    fn test_match_full_segment_only() {
        let tax = ClassTaxonomy::chest_xray();
        assert_eq!(tax.match_path("data/COVID/img-1.png"), Some(0));
        assert_eq!(tax.match_path("data/Normal/x.jpeg"), Some(2));
        // "Normal" appearing in a file name must not match
        assert_eq!(tax.match_path("data/misc/Normal.png"), None);
        // Nor as a substring of a longer folder name
        assert_eq!(tax.match_path("data/AbNormal/x.png"), None);
        assert_eq!(tax.match_path("README.txt"), None);
    }

    #[test]
    fn test_first_match_wins() {
        let tax =
            ClassTaxonomy::new(vec!["A".to_string(), "B".to_string()]).unwrap();
        // Entry nested under both folders is assigned to the earlier class.
        assert_eq!(tax.match_path("B/A/img.png"), Some(0));
    }

    #[test]
    fn test_rejects_duplicates() {
        let result = ClassTaxonomy::new(vec!["A".to_string(), "A".to_string()]);
        assert!(result.is_err());
    }

    #[test]
    fn test_name_out_of_range() {
        let tax = ClassTaxonomy::chest_xray();
        assert!(tax.name(4).is_err());
    }
}
