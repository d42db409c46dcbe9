//! Error types for the radscan pipeline

use thiserror::Error;

/// Result type alias for radscan operations
pub type Result<T> = std::result::Result<T, RadscanError>;

/// Main error type for the radscan pipeline
#[derive(Error, Debug)]
pub enum RadscanError {
    #[error("Archive error at {path}: {reason}")]
    Archive { path: String, reason: String },

    #[error("Decode error for entry {entry}: {reason}")]
    Decode { entry: String, reason: String },

    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    #[error("Model load error at {path}: {reason}")]
    ModelLoad { path: String, reason: String },

    #[error("Prediction input error: {0}")]
    PredictionInput(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Model not fitted")]
    ModelNotFitted,
}

impl From<serde_json::Error> for RadscanError {
    fn from(err: serde_json::Error) -> Self {
        RadscanError::Serialization(err.to_string())
    }
}

impl From<ndarray::ShapeError> for RadscanError {
    fn from(err: ndarray::ShapeError) -> Self {
        RadscanError::ShapeMismatch {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RadscanError::Decode {
            entry: "COVID/img-1.png".to_string(),
            reason: "truncated".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Decode error for entry COVID/img-1.png: truncated"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: RadscanError = io_err.into();
        assert!(matches!(err, RadscanError::Io(_)));
    }
}
