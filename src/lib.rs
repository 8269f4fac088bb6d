//! ml-workspace - tabular preprocessing and model training
//!
//! Turns a raw CSV dataset plus a declarative column configuration into
//! model-ready training/testing/validation splits, then trains and evaluates
//! a fixed menu of supervised models on them.
//!
//! # Modules
//!
//! - [`config`] - dataset, column and split configuration
//! - [`dataset`] - sample dataset discovery and loading
//! - [`workspace`] - per-run working directory and artifact writers
//! - [`preprocessing`] - prune, impute, encode, split and scale
//! - [`training`] - model registry, training and evaluation
//! - [`workflow`] - the top-level run driver
//! - [`telemetry`] - logging initialisation
//! - [`cli`] - command-line interface

pub mod error;
pub mod config;
pub mod dataset;
pub mod workspace;

pub mod preprocessing;
pub mod training;

pub mod workflow;
pub mod telemetry;
pub mod cli;

pub use error::{PipelineError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{PipelineError, Result};

    pub use crate::config::{
        ColumnConfig, DatasetConfig, DatasetSplitConfig, EncodingMethod, FeatureType,
        ImputationMethod, ProblemType, ScalingMethod,
    };
    pub use crate::dataset::DatasetReader;
    pub use crate::workspace::WorkingDirectory;

    pub use crate::preprocessing::{
        CategoricalEncoder, ColumnPruner, DataPreprocessor, DatasetSplits, DatasetSplitter,
        EncodingConfig, FeatureScaler, MissingValueImputer, PreprocessingOutput, Scaler,
    };
    pub use crate::training::{Model, ModelPerformance, TrainEngine, TrainedModel};

    pub use crate::workflow::{run, RunOptions, RunSummary};
}
