//! Data preprocessing module
//!
//! Stages, in the order the pipeline runs them:
//! - Column pruning
//! - Missing value imputation (mean, median, mode)
//! - Categorical encoding (binary one-hot, multi one-hot, ordinal)
//! - Training / testing / validation splitting
//! - Feature scaling fitted on the training split (standard, min-max)
//!
//! Each stage takes its input by reference and returns a new value; the
//! [`DataPreprocessor`] threads the results from one stage to the next.

pub mod statistics;
mod pruner;
mod imputer;
mod encoder;
mod splitter;
mod scaler;
mod pipeline;

pub use statistics::{calculate_statistic, count_missing, ImputationValue};
pub use pruner::ColumnPruner;
pub use imputer::{detect_missing_values, ColumnImputation, ImputationOutcome, MissingValueImputer};
pub use encoder::{
    load_encoding_configs, replay_encodings, validate_registry as validate_encoder_registry,
    BinaryOneHotEncodingConfig, CategoricalEncoder, EncodingConfig, EncodingOutcome,
    MultiOneHotEncodingConfig, OrdinalEncodingConfig,
};
pub use splitter::{DatasetSplits, DatasetSplitter, SplitIndices};
pub use scaler::{FeatureScaler, Scaler, ScalerConfig, ScalerParams, ScalingOutcome};
pub use pipeline::{DataPreprocessor, PreprocessingOutput};
