//! Data preprocessing pipeline

use super::encoder::{CategoricalEncoder, EncodingConfig};
use super::imputer::{ColumnImputation, MissingValueImputer};
use super::pruner::ColumnPruner;
use super::scaler::{FeatureScaler, ScalerConfig};
use super::splitter::{DatasetSplits, DatasetSplitter};
use crate::config::{DatasetConfig, ENCODINGS_CONFIG_FILE, SCALERS_CONFIG_FILE};
use crate::error::Result;
use crate::workspace::WorkingDirectory;
use polars::prelude::*;
use std::time::Instant;
use tracing::{error, info, info_span};

/// Everything the preprocessing run produced
#[derive(Debug, Clone)]
pub struct PreprocessingOutput {
    pub splits: DatasetSplits,
    /// Configuration after pruning
    pub config: DatasetConfig,
    pub imputations: Vec<ColumnImputation>,
    pub encodings: Vec<EncodingConfig>,
    pub scalers: Vec<ScalerConfig>,
}

/// Runs prune -> impute -> encode -> split -> scale, persisting a snapshot
/// after every stage. A failing stage aborts the run.
#[derive(Debug, Clone, Copy)]
pub struct DataPreprocessor<'a> {
    workspace: &'a WorkingDirectory,
}

impl<'a> DataPreprocessor<'a> {
    pub fn new(workspace: &'a WorkingDirectory) -> Self {
        Self { workspace }
    }

    pub fn workspace(&self) -> &WorkingDirectory {
        self.workspace
    }

    pub fn preprocess(&self, dataset: &DataFrame, config: &DatasetConfig) -> Result<PreprocessingOutput> {
        let _span = info_span!("preprocessing", dataset = %config.dataset_name).entered();
        let start = Instant::now();
        info!(rows = dataset.height(), columns = dataset.width(), "DATASET PREPROCESSING");

        let (dataset, config) = stage("drop_unused_columns", || {
            let (pruned, config) = ColumnPruner::new().prune(dataset, config)?;
            self.workspace.save_snapshot(&pruned, "dropped_unused_columns", None)?;
            Ok((pruned, config))
        })?;

        let imputed = stage("handle_missing_values", || {
            let outcome = MissingValueImputer::new().impute(&dataset, &config)?;
            self.workspace.save_snapshot(&outcome.dataset, "missing_values_handled", None)?;
            Ok(outcome)
        })?;

        let encoded = stage("encode_categorical_features", || {
            let outcome = CategoricalEncoder::new().encode(&imputed.dataset, &config)?;
            let path = self.workspace.write_json(ENCODINGS_CONFIG_FILE, &outcome.encodings)?;
            info!(path = %path.display(), "Encoding configurations saved");
            self.workspace.save_snapshot(&outcome.dataset, "categorical_features_encoded", None)?;
            Ok(outcome)
        })?;

        let splits = stage("split_dataset", || {
            let splits = DatasetSplitter::new(config.dataset_split_config.clone()).split(&encoded.dataset)?;
            self.save_splits(&splits, "dataset_splits")?;
            Ok(splits)
        })?;

        let scaled = stage("scale_continuous_features", || {
            let outcome = FeatureScaler::new(self.workspace).scale(&splits, &config)?;
            let path = self.workspace.write_json(SCALERS_CONFIG_FILE, &outcome.scalers)?;
            info!(path = %path.display(), "Scalers configurations saved");
            self.save_splits(&outcome.splits, "continuous_features_scaled")?;
            Ok(outcome)
        })?;

        info!(elapsed_ms = start.elapsed().as_millis() as u64, "Dataset preprocessing finished");
        Ok(PreprocessingOutput {
            splits: scaled.splits,
            config,
            imputations: imputed.imputations,
            encodings: encoded.encodings,
            scalers: scaled.scalers,
        })
    }

    fn save_splits(&self, splits: &DatasetSplits, sub_folder: &str) -> Result<()> {
        for (name, df) in splits.named() {
            self.workspace.save_snapshot(df, name, Some(sub_folder))?;
        }
        Ok(())
    }
}

/// Run one stage inside its own span, logging the failure before propagating it
fn stage<T, F>(name: &'static str, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    let _span = info_span!("stage", name).entered();
    info!("{}", name.replace('_', " "));
    f().inspect_err(|e| error!(stage = name, error = %e, "Preprocessing stage failed"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        ColumnConfig, DatasetSplitConfig, EncodingMethod, FeatureType, ImputationMethod, ProblemType,
        ScalingMethod, INTERMEDIARY_DATASETS_FOLDER,
    };
    use tempfile::tempdir;

    fn sample() -> (DataFrame, DatasetConfig) {
        let n = 20;
        let df = df!(
            "id" => (0..n).collect::<Vec<i64>>(),
            "age" => (0..n).map(|i| if i % 7 == 0 { None } else { Some(i as f64) }).collect::<Vec<_>>(),
            "color" => (0..n).map(|i| ["red", "green", "blue"][i as usize % 3]).collect::<Vec<_>>(),
            "label" => (0..n).map(|i| if i % 2 == 0 { "yes" } else { "no" }).collect::<Vec<_>>()
        )
        .unwrap();
        let config = DatasetConfig::new(
            "toy",
            ProblemType::Classification,
            vec![
                ColumnConfig::new("id", FeatureType::Continuous).with_drop(true),
                ColumnConfig::new("age", FeatureType::Continuous)
                    .with_missing(ImputationMethod::Mean)
                    .with_scale(ScalingMethod::Standard),
                ColumnConfig::new("color", FeatureType::Categorical).with_encode(EncodingMethod::MultiOnehot),
                ColumnConfig::new("label", FeatureType::Categorical)
                    .with_encode(EncodingMethod::BinaryOnehot)
                    .as_target(),
            ],
            DatasetSplitConfig::new(0.6, 0.2, 0.2).with_seed(42),
        );
        (df, config)
    }

    #[test]
    fn test_preprocess_runs_every_stage() {
        let root = tempdir().unwrap();
        let workspace = WorkingDirectory::create(root.path(), "toy").unwrap();
        let (df, config) = sample();

        let output = DataPreprocessor::new(&workspace).preprocess(&df, &config).unwrap();

        assert_eq!(output.splits.total_rows(), 20);
        assert_eq!(output.config.columns.len(), 3);
        assert_eq!(output.imputations.len(), 1);
        assert_eq!(output.encodings.len(), 2);
        assert_eq!(output.scalers.len(), 1);

        let names: Vec<String> = output
            .splits
            .training
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();
        assert_eq!(names, vec!["age", "label_yes", "color_blue", "color_green", "color_red"]);

        let snapshots = workspace.path().join(INTERMEDIARY_DATASETS_FOLDER);
        for file in [
            "dropped_unused_columns.csv",
            "missing_values_handled.csv",
            "categorical_features_encoded.csv",
            "dataset_splits/validation.csv",
            "continuous_features_scaled/training.csv",
        ] {
            assert!(snapshots.join(file).is_file(), "missing snapshot {}", file);
        }
        assert!(workspace.path().join(ENCODINGS_CONFIG_FILE).is_file());
        assert!(workspace.path().join(SCALERS_CONFIG_FILE).is_file());
    }

    #[test]
    fn test_failing_stage_aborts_run() {
        let root = tempdir().unwrap();
        let workspace = WorkingDirectory::create(root.path(), "toy").unwrap();
        let (df, mut config) = sample();
        config.columns[1].missing = None;

        let err = DataPreprocessor::new(&workspace).preprocess(&df, &config).unwrap_err();
        assert!(err.is_config_error());
        assert!(!workspace.path().join(SCALERS_CONFIG_FILE).exists());
    }
}
