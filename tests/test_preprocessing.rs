//! Integration test: Preprocessing stages and their ordering guarantees

use ml_workspace::config::{
    ColumnConfig, DatasetConfig, DatasetSplitConfig, EncodingMethod, FeatureType, ImputationMethod,
    ProblemType, ScalingMethod, ENCODINGS_CONFIG_FILE, INTERMEDIARY_DATASETS_FOLDER, SCALERS_CONFIG_FILE,
};
use ml_workspace::error::PipelineError;
use ml_workspace::preprocessing::{
    CategoricalEncoder, ColumnPruner, DataPreprocessor, DatasetSplitter, EncodingConfig, FeatureScaler,
    MissingValueImputer, ScalerConfig,
};
use ml_workspace::workspace::WorkingDirectory;
use polars::prelude::*;
use tempfile::tempdir;

fn hundred_rows() -> DataFrame {
    let n = 100;
    df!(
        "id" => (0..n).collect::<Vec<i64>>(),
        "income" => (0..n).map(|i| 1000.0 + (i * 37 % 100) as f64 * 10.0).collect::<Vec<_>>(),
        "size" => (0..n).map(|i| ["small", "medium", "large"][i as usize % 3]).collect::<Vec<_>>(),
        "churned" => (0..n).map(|i| if i % 4 == 0 { "yes" } else { "no" }).collect::<Vec<_>>()
    )
    .unwrap()
}

fn hundred_rows_config(split: DatasetSplitConfig) -> DatasetConfig {
    DatasetConfig::new(
        "customers",
        ProblemType::Classification,
        vec![
            ColumnConfig::new("id", FeatureType::Continuous).with_drop(true),
            ColumnConfig::new("income", FeatureType::Continuous).with_scale(ScalingMethod::Standard),
            ColumnConfig::new("size", FeatureType::Categorical)
                .with_encode(EncodingMethod::Ordinal)
                .with_encoding_values([("small", 0), ("medium", 1), ("large", 2)]),
            ColumnConfig::new("churned", FeatureType::Categorical)
                .with_encode(EncodingMethod::BinaryOnehot)
                .as_target(),
        ],
        split,
    )
}

#[test]
fn test_pruner_removes_dropped_columns() {
    let df = hundred_rows();
    let config = hundred_rows_config(DatasetSplitConfig::new(0.7, 0.3, 0.0));

    let (pruned, pruned_config) = ColumnPruner::new().prune(&df, &config).unwrap();
    assert_eq!(pruned.get_column_names(), vec!["income", "size", "churned"]);
    assert!(pruned_config.column("id").is_none());
    assert_eq!(pruned_config.columns.len(), 3);
    // input untouched
    assert_eq!(df.width(), 4);
}

#[test]
fn test_imputation_runs_before_encoding() {
    let df = df!(
        "color" => [Some("red"), None, Some("blue"), Some("red")],
        "y" => [1.0, 2.0, 3.0, 4.0]
    )
    .unwrap();
    let config = DatasetConfig::new(
        "colors",
        ProblemType::Regression,
        vec![
            ColumnConfig::new("color", FeatureType::Categorical)
                .with_missing(ImputationMethod::Mode)
                .with_encode(EncodingMethod::BinaryOnehot),
            ColumnConfig::new("y", FeatureType::Continuous).as_target(),
        ],
        DatasetSplitConfig::new(0.5, 0.5, 0.0),
    );

    let imputed = MissingValueImputer::new().impute(&df, &config).unwrap();
    assert_eq!(imputed.total_filled(), 1);
    assert_eq!(imputed.remaining_missing, 0);

    let encoded = CategoricalEncoder::new().encode(&imputed.dataset, &config).unwrap();
    let column: Vec<Option<i64>> = encoded
        .dataset
        .column("color_red")
        .unwrap()
        .i64()
        .unwrap()
        .into_iter()
        .collect();
    // mode of {red, blue, red} fills the gap
    assert_eq!(column, vec![Some(1), Some(1), Some(0), Some(1)]);
}

#[test]
fn test_missing_method_is_fatal() {
    let df = df!("age" => [Some(1.0), None, Some(3.0)]).unwrap();
    let config = DatasetConfig::new(
        "ages",
        ProblemType::Regression,
        vec![ColumnConfig::new("age", FeatureType::Continuous)],
        DatasetSplitConfig::new(0.5, 0.5, 0.0),
    );

    let err = MissingValueImputer::new().impute(&df, &config).unwrap_err();
    assert!(matches!(err, PipelineError::MissingImputationMethod { ref column } if column == "age"));
}

#[test]
fn test_binary_encoding_mapping_is_lexicographic() {
    let df = df!("answer" => ["b", "a", "b", "a"]).unwrap();
    let config = DatasetConfig::new(
        "answers",
        ProblemType::Classification,
        vec![ColumnConfig::new("answer", FeatureType::Categorical).with_encode(EncodingMethod::BinaryOnehot)],
        DatasetSplitConfig::new(0.5, 0.5, 0.0),
    );

    let outcome = CategoricalEncoder::new().encode(&df, &config).unwrap();
    match &outcome.encodings[0] {
        EncodingConfig::BinaryOnehot(record) => {
            assert_eq!(record.renamed_feature_name, "answer_b");
            assert_eq!(record.mappings.get("a"), Some(&0));
            assert_eq!(record.mappings.get("b"), Some(&1));
        }
        other => panic!("unexpected encoding {:?}", other),
    }
    assert_eq!(outcome.dataset.get_column_names(), vec!["answer_b"]);
}

#[test]
fn test_incomplete_ordinal_mapping_is_a_config_error() {
    let df = df!("grade" => ["low", "high", "extreme"]).unwrap();
    let config = DatasetConfig::new(
        "grades",
        ProblemType::Classification,
        vec![ColumnConfig::new("grade", FeatureType::Categorical)
            .with_encode(EncodingMethod::Ordinal)
            .with_encoding_values([("low", 0), ("high", 1)])],
        DatasetSplitConfig::new(0.5, 0.5, 0.0),
    );

    let err = CategoricalEncoder::new().encode(&df, &config).unwrap_err();
    assert!(err.is_config_error());
    assert!(err.to_string().contains("extreme"));
    assert_eq!(df.column("grade").unwrap().dtype(), &DataType::String);
}

#[test]
fn test_split_hundred_rows() {
    let df = hundred_rows();
    let splitter = DatasetSplitter::new(DatasetSplitConfig::new(0.7, 0.2, 0.1).with_seed(42));

    let splits = splitter.split(&df).unwrap();
    assert_eq!(splits.training.height(), 70);
    assert_eq!(splits.testing.height(), 20);
    assert_eq!(splits.validation.as_ref().unwrap().height(), 10);

    // disjoint and exhaustive
    let mut ids: Vec<i64> = splits
        .named()
        .into_iter()
        .flat_map(|(_, split)| {
            split.column("id").unwrap().i64().unwrap().into_no_null_iter().collect::<Vec<_>>()
        })
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, (0..100).collect::<Vec<i64>>());

    // same seed, same partition
    let again = splitter.split(&df).unwrap();
    assert!(again.training.equals(&splits.training));
}

#[test]
fn test_invalid_split_fractions_are_rejected() {
    let df = hundred_rows();
    let err = DatasetSplitter::new(DatasetSplitConfig::new(0.7, 0.2, 0.2))
        .split(&df)
        .unwrap_err();
    assert!(matches!(err, PipelineError::InvalidSplitFractions { .. }));
}

#[test]
fn test_scaler_is_fitted_on_training_only() {
    let dir = tempdir().unwrap();
    let workspace = WorkingDirectory::create(dir.path(), "customers").unwrap();
    let df = hundred_rows();
    let config = hundred_rows_config(DatasetSplitConfig::new(0.7, 0.2, 0.1).with_seed(7));
    let splits = DatasetSplitter::new(config.dataset_split_config.clone()).split(&df).unwrap();

    let outcome = FeatureScaler::new(&workspace).scale(&splits, &config).unwrap();
    assert_eq!(outcome.scalers.len(), 1);

    let scaler = outcome.scalers[0].load_scaler().unwrap();
    let params = scaler.params("income").unwrap();
    let train_income = splits.training.column("income").unwrap().f64().unwrap();
    let train_mean = train_income.mean().unwrap();
    let train_std = train_income.std(0).unwrap();
    assert!((params.center - train_mean).abs() < 1e-9);
    assert!((params.scale - train_std).abs() < 1e-9);

    let scaled_train = outcome.splits.training.column("income").unwrap().f64().unwrap().mean().unwrap();
    assert!(scaled_train.abs() < 1e-9);

    // testing values use the training parameters
    let raw_test = splits.testing.column("income").unwrap().f64().unwrap().get(0).unwrap();
    let scaled_test = outcome.splits.testing.column("income").unwrap().f64().unwrap().get(0).unwrap();
    assert!((scaled_test - (raw_test - train_mean) / train_std).abs() < 1e-9);
}

#[test]
fn test_preprocessor_persists_artifacts() {
    let dir = tempdir().unwrap();
    let workspace = WorkingDirectory::create(dir.path(), "customers").unwrap();
    let df = hundred_rows();
    let config = hundred_rows_config(DatasetSplitConfig::new(0.7, 0.2, 0.1).with_seed(42));

    let output = DataPreprocessor::new(&workspace).preprocess(&df, &config).unwrap();
    assert_eq!(output.splits.total_rows(), 100);
    assert_eq!(output.splits.training.get_column_names(), vec!["income", "size", "churned_yes"]);

    let intermediary = workspace.path().join(INTERMEDIARY_DATASETS_FOLDER);
    for snapshot in [
        "dropped_unused_columns.csv",
        "missing_values_handled.csv",
        "categorical_features_encoded.csv",
        "dataset_splits/training.csv",
        "dataset_splits/validation.csv",
        "continuous_features_scaled/testing.csv",
    ] {
        assert!(intermediary.join(snapshot).exists(), "missing snapshot {}", snapshot);
    }

    let encodings: Vec<EncodingConfig> = workspace.read_json(ENCODINGS_CONFIG_FILE).unwrap();
    assert_eq!(encodings, output.encodings);
    let scalers: Vec<ScalerConfig> = workspace.read_json(SCALERS_CONFIG_FILE).unwrap();
    assert_eq!(scalers[0].feature_names, vec!["income".to_string()]);
}

#[test]
fn test_failed_stage_aborts_run() {
    let dir = tempdir().unwrap();
    let workspace = WorkingDirectory::create(dir.path(), "customers").unwrap();
    let df = hundred_rows();
    let config = hundred_rows_config(DatasetSplitConfig::new(0.5, 0.2, 0.1));

    assert!(DataPreprocessor::new(&workspace).preprocess(&df, &config).is_err());
    assert!(!workspace.path().join(SCALERS_CONFIG_FILE).exists());
}
