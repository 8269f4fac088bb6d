//! Top-level run driver: load a sample dataset, preprocess it inside a fresh
//! working directory and train the model registry on the result.

use crate::config::{DatasetConfig, SAMPLE_DATASETS_PATH, TEMP_FOLDER_PATH};
use crate::dataset::DatasetReader;
use crate::error::Result;
use crate::preprocessing::{validate_encoder_registry, DataPreprocessor, PreprocessingOutput};
use crate::telemetry;
use crate::training::{registry, ModelPerformance, TrainEngine};
use crate::workspace::WorkingDirectory;
use polars::prelude::DataFrame;
use std::path::PathBuf;
use tracing::{info, info_span};

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub samples_dir: PathBuf,
    pub output_dir: PathBuf,
    pub dataset_name: String,
    /// Stop after preprocessing
    pub skip_training: bool,
}

impl RunOptions {
    pub fn new(dataset_name: impl Into<String>) -> Self {
        Self {
            samples_dir: PathBuf::from(SAMPLE_DATASETS_PATH),
            output_dir: PathBuf::from(TEMP_FOLDER_PATH),
            dataset_name: dataset_name.into(),
            skip_training: false,
        }
    }

    pub fn with_samples_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.samples_dir = dir.into();
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn preprocess_only(mut self) -> Self {
        self.skip_training = true;
        self
    }
}

/// What a finished run produced
#[derive(Debug)]
pub struct RunSummary {
    pub working_directory: WorkingDirectory,
    pub preprocessing: PreprocessingOutput,
    /// Empty when training was skipped
    pub performances: Vec<ModelPerformance>,
}

impl RunSummary {
    pub fn split_sizes(&self) -> Vec<(&'static str, usize)> {
        self.preprocessing
            .splits
            .named()
            .into_iter()
            .map(|(name, df)| (name, df.height()))
            .collect()
    }
}

/// Fail fast if an encoding method or model identifier has no handler
pub fn validate_registries() -> Result<()> {
    validate_encoder_registry()?;
    registry::validate()
}

/// Run the whole workflow for a sample dataset
pub fn run(options: &RunOptions) -> Result<RunSummary> {
    let reader = DatasetReader::new(&options.samples_dir);
    let (dataset, config) = reader.read_dataset(&options.dataset_name)?;
    run_with_data(&dataset, &config, options)
}

/// Run the workflow on an already loaded dataset and configuration
pub fn run_with_data(dataset: &DataFrame, config: &DatasetConfig, options: &RunOptions) -> Result<RunSummary> {
    let _span = info_span!("run", dataset = %config.dataset_name).entered();
    validate_registries()?;
    config.validate()?;

    let working_directory = WorkingDirectory::create(&options.output_dir, &config.dataset_name)?;
    let preprocessing = DataPreprocessor::new(&working_directory).preprocess(dataset, config)?;

    let performances = if options.skip_training {
        info!("Training skipped");
        Vec::new()
    } else {
        TrainEngine::new(&working_directory).train(
            &preprocessing.splits,
            &preprocessing.config,
            &preprocessing.encodings,
        )?
    };

    info!(path = %working_directory.path().display(), "Run finished");
    Ok(RunSummary {
        working_directory,
        preprocessing,
        performances,
    })
}

/// Run with logging installed for the duration of the run only
pub fn run_with_logging(options: &RunOptions, level: &str) -> Result<RunSummary> {
    let _guard = telemetry::init_scoped(level);
    run(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ColumnConfig, DatasetSplitConfig, EncodingMethod, FeatureType, ProblemType, ScalingMethod};
    use polars::prelude::*;
    use tempfile::tempdir;

    #[test]
    fn test_run_with_data_preprocess_only() {
        let dir = tempdir().unwrap();
        let dataset = df!(
            "height" => (0..20).map(|i| 150.0 + i as f64).collect::<Vec<_>>(),
            "label" => (0..20).map(|i| if i % 2 == 0 { "a" } else { "b" }).collect::<Vec<_>>()
        )
        .unwrap();
        let config = DatasetConfig::new(
            "people",
            ProblemType::Classification,
            vec![
                ColumnConfig::new("height", FeatureType::Continuous).with_scale(ScalingMethod::Minmax),
                ColumnConfig::new("label", FeatureType::Categorical)
                    .with_encode(EncodingMethod::BinaryOnehot)
                    .as_target(),
            ],
            DatasetSplitConfig::new(0.5, 0.5, 0.0).with_seed(3),
        );
        let options = RunOptions::new("people").with_output_dir(dir.path()).preprocess_only();

        let summary = run_with_data(&dataset, &config, &options).unwrap();
        assert!(summary.performances.is_empty());
        assert_eq!(summary.split_sizes(), vec![("training", 10), ("testing", 10)]);
        assert!(summary.working_directory.path().starts_with(dir.path()));
    }

    #[test]
    fn test_run_reports_missing_dataset() {
        let dir = tempdir().unwrap();
        let options = RunOptions::new("absent").with_samples_dir(dir.path()).with_output_dir(dir.path());
        assert!(run_with_logging(&options, "debug").is_err());
    }
}
