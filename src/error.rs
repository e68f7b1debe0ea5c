//! Error types for the tabserve crate

use thiserror::Error;

/// Result type alias for tabserve operations
pub type Result<T> = std::result::Result<T, TabserveError>;

/// Main error type for the tabserve crate
#[derive(Error, Debug)]
pub enum TabserveError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    /// A stage was used before `fit`. Treated as a programming defect.
    #[error("Stage '{stage}' used before fit")]
    NotFitted { stage: String },

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Model artifact not found: {0}")]
    ArtifactNotFound(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl TabserveError {
    pub(crate) fn not_fitted(stage: &str) -> Self {
        TabserveError::NotFitted {
            stage: stage.to_string(),
        }
    }
}

impl From<polars::error::PolarsError> for TabserveError {
    fn from(err: polars::error::PolarsError) -> Self {
        TabserveError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for TabserveError {
    fn from(err: serde_json::Error) -> Self {
        TabserveError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for TabserveError {
    fn from(err: ndarray::ShapeError) -> Self {
        TabserveError::ShapeError {
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
        let err = TabserveError::DataError("test error".to_string());
        assert_eq!(err.to_string(), "Data error: test error");
    }

    #[test]
    fn test_not_fitted_names_stage() {
        let err = TabserveError::not_fitted("scaler");
        assert_eq!(err.to_string(), "Stage 'scaler' used before fit");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: TabserveError = io_err.into();
        assert!(matches!(err, TabserveError::IoError(_)));
    }
}
