//! Error types for the preprocessing and training pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Preprocessing error: {0}")]
    PreprocessingError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Column '{column}' has missing values but no imputation method is configured")]
    MissingImputationMethod { column: String },

    #[error("Column '{column}' has categories without an ordinal mapping: {values:?}")]
    UnmappedCategories { column: String, values: Vec<String> },

    #[error(
        "Split fractions must sum to 1.0 (training={training}, testing={testing}, validation={validation})"
    )]
    InvalidSplitFractions {
        training: f64,
        testing: f64,
        validation: f64,
    },

    #[error("Binary one-hot column '{column}' needs exactly 2 distinct values, found {found}")]
    InvalidBinaryCardinality { column: String, found: usize },
}

impl PipelineError {
    /// True for the configuration-error family
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            PipelineError::ConfigError(_)
                | PipelineError::MissingImputationMethod { .. }
                | PipelineError::UnmappedCategories { .. }
                | PipelineError::InvalidSplitFractions { .. }
                | PipelineError::InvalidBinaryCardinality { .. }
        )
    }
}

impl From<polars::error::PolarsError> for PipelineError {
    fn from(err: polars::error::PolarsError) -> Self {
        PipelineError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for PipelineError {
    fn from(err: bincode::Error) -> Self {
        PipelineError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for PipelineError {
    fn from(err: ndarray::ShapeError) -> Self {
        PipelineError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
