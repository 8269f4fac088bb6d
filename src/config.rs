//! Dataset configuration
//!
//! A dataset ships with a `config.json` describing every column of its CSV:
//! its kind, whether it is dropped, how missing values are filled, how it is
//! encoded or scaled and whether it is the prediction target. The document
//! also carries the split fractions for training, testing and validation.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;
use tracing::warn;

/// Default folder holding the sample datasets
pub const SAMPLE_DATASETS_PATH: &str = "samples/datasets";
/// Default root for per-run working directories
pub const TEMP_FOLDER_PATH: &str = "temp";

pub const INTERMEDIARY_DATASETS_FOLDER: &str = "intermediary_datasets";
pub const SCALERS_FOLDER: &str = "scalers";
pub const MODELS_FOLDER: &str = "models";
pub const SUB_FOLDERS: [&str; 3] = [INTERMEDIARY_DATASETS_FOLDER, SCALERS_FOLDER, MODELS_FOLDER];

pub const ENCODINGS_CONFIG_FILE: &str = "encodings_config.json";
pub const SCALERS_CONFIG_FILE: &str = "scalers_config.json";
pub const MODELS_PERFORMANCE_FILE: &str = "models_performance.json";

pub const SAMPLE_DATASET_FILE_NAME: &str = "dataset.csv";
pub const SAMPLE_CONFIG_FILE_NAME: &str = "config.json";

/// Absolute tolerance used when checking that split fractions add up to one
pub const SPLIT_SUM_TOLERANCE: f64 = 1e-9;

/// Kind of a dataset column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureType {
    /// Free text, never encoded or scaled
    Str,
    /// Numeric measurement, eligible for scaling
    Continuous,
    /// Discrete category, eligible for encoding
    Categorical,
}

/// Statistic used to fill missing values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImputationMethod {
    Mean,
    Median,
    Mode,
}

/// Encoding applied to a categorical column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodingMethod {
    /// Two categories folded into a single 0/1 column
    BinaryOnehot,
    /// One boolean indicator column per category
    MultiOnehot,
    /// Categories replaced by an explicit integer ordering
    Ordinal,
}

impl EncodingMethod {
    pub const ALL: [EncodingMethod; 3] = [
        EncodingMethod::BinaryOnehot,
        EncodingMethod::MultiOnehot,
        EncodingMethod::Ordinal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EncodingMethod::BinaryOnehot => "binary_onehot",
            EncodingMethod::MultiOnehot => "multi_onehot",
            EncodingMethod::Ordinal => "ordinal",
        }
    }
}

/// Scaling applied to a continuous column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingMethod {
    /// Zero mean, unit variance
    Standard,
    /// Rescale into [0, 1]
    Minmax,
}

impl ScalingMethod {
    pub const ALL: [ScalingMethod; 2] = [ScalingMethod::Standard, ScalingMethod::Minmax];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScalingMethod::Standard => "standard",
            ScalingMethod::Minmax => "minmax",
        }
    }
}

impl fmt::Display for ScalingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the dataset is meant to predict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemType {
    Classification,
    Regression,
    Unsupervised,
}

impl ProblemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProblemType::Classification => "classification",
            ProblemType::Regression => "regression",
            ProblemType::Unsupervised => "unsupervised",
        }
    }
}

impl fmt::Display for ProblemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-column configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub feature_type: FeatureType,
    #[serde(default)]
    pub drop: bool,
    #[serde(default)]
    pub missing: Option<ImputationMethod>,
    #[serde(default)]
    pub scale: Option<ScalingMethod>,
    #[serde(default)]
    pub encode: Option<EncodingMethod>,
    /// Explicit category -> integer mapping for ordinal encoding
    #[serde(default)]
    pub encoding_values: Option<BTreeMap<String, i64>>,
    #[serde(default)]
    pub target: bool,
}

impl ColumnConfig {
    /// Create a column of the given kind with every option unset
    pub fn new(name: impl Into<String>, feature_type: FeatureType) -> Self {
        Self {
            name: name.into(),
            feature_type,
            drop: false,
            missing: None,
            scale: None,
            encode: None,
            encoding_values: None,
            target: false,
        }
    }

    pub fn with_drop(mut self, drop: bool) -> Self {
        self.drop = drop;
        self
    }

    pub fn with_missing(mut self, method: ImputationMethod) -> Self {
        self.missing = Some(method);
        self
    }

    pub fn with_scale(mut self, method: ScalingMethod) -> Self {
        self.scale = Some(method);
        self
    }

    pub fn with_encode(mut self, method: EncodingMethod) -> Self {
        self.encode = Some(method);
        self
    }

    pub fn with_encoding_values<I, K>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = (K, i64)>,
        K: Into<String>,
    {
        self.encoding_values = Some(values.into_iter().map(|(k, v)| (k.into(), v)).collect());
        self
    }

    pub fn as_target(mut self) -> Self {
        self.target = true;
        self
    }

    pub fn is_categorical(&self) -> bool {
        self.feature_type == FeatureType::Categorical
    }

    pub fn is_continuous(&self) -> bool {
        self.feature_type == FeatureType::Continuous
    }
}

/// Fractions of the dataset assigned to each split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSplitConfig {
    pub training: f64,
    pub testing: f64,
    #[serde(default)]
    pub validation: f64,
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl Default for DatasetSplitConfig {
    fn default() -> Self {
        Self {
            training: 0.8,
            testing: 0.2,
            validation: 0.0,
            random_seed: None,
        }
    }
}

impl DatasetSplitConfig {
    pub fn new(training: f64, testing: f64, validation: f64) -> Self {
        Self {
            training,
            testing,
            validation,
            random_seed: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    pub fn has_validation(&self) -> bool {
        self.validation > 0.0
    }

    /// Check every fraction lies in [0, 1], training and testing are
    /// non-zero and the three add up to one.
    pub fn validate(&self) -> Result<()> {
        let fractions = [self.training, self.testing, self.validation];
        let in_range = fractions.iter().all(|f| f.is_finite() && (0.0..=1.0).contains(f));
        let total: f64 = fractions.iter().sum();
        if !in_range
            || self.training <= 0.0
            || self.testing <= 0.0
            || (total - 1.0).abs() > SPLIT_SUM_TOLERANCE
        {
            return Err(PipelineError::InvalidSplitFractions {
                training: self.training,
                testing: self.testing,
                validation: self.validation,
            });
        }
        Ok(())
    }
}

/// Configuration of one dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub dataset_name: String,
    #[serde(alias = "task")]
    pub problem_type: ProblemType,
    pub columns: Vec<ColumnConfig>,
    pub dataset_split_config: DatasetSplitConfig,
}

impl DatasetConfig {
    pub fn new(
        dataset_name: impl Into<String>,
        problem_type: ProblemType,
        columns: Vec<ColumnConfig>,
        dataset_split_config: DatasetSplitConfig,
    ) -> Self {
        Self {
            dataset_name: dataset_name.into(),
            problem_type,
            columns,
            dataset_split_config,
        }
    }

    /// Parse and validate a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: DatasetConfig = serde_json::from_str(json)
            .map_err(|e| PipelineError::ConfigError(format!("invalid dataset config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a `config.json` file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnConfig> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Columns flagged as prediction targets
    pub fn target_columns(&self) -> Vec<&ColumnConfig> {
        self.columns.iter().filter(|c| c.target).collect()
    }

    /// Names of the columns that survive pruning, in configuration order
    pub fn kept_column_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| !c.drop)
            .map(|c| c.name.clone())
            .collect()
    }

    /// Semantic checks run once after loading
    pub fn validate(&self) -> Result<()> {
        if self.dataset_name.trim().is_empty() {
            return Err(PipelineError::ConfigError("dataset_name must not be empty".into()));
        }
        if self.columns.is_empty() {
            return Err(PipelineError::ConfigError(format!(
                "dataset '{}' declares no columns",
                self.dataset_name
            )));
        }

        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.name.as_str()) {
                return Err(PipelineError::ConfigError(format!(
                    "column '{}' is declared more than once",
                    column.name
                )));
            }
            if column.encode == Some(EncodingMethod::Ordinal) && column.encoding_values.is_none() {
                return Err(PipelineError::ConfigError(format!(
                    "column '{}' uses ordinal encoding without encoding_values",
                    column.name
                )));
            }
            if column.encode.is_some() && !column.is_categorical() {
                warn!(column = %column.name, "encode is set on a non-categorical column and will be ignored");
            }
            if column.scale.is_some() && !column.is_continuous() {
                warn!(column = %column.name, "scale is set on a non-continuous column and will be ignored");
            }
            if column.drop && column.target {
                warn!(column = %column.name, "target column is dropped");
            }
        }

        self.dataset_split_config.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TITANIC_LIKE: &str = r#"{
        "dataset_name": "passengers",
        "task": "classification",
        "dataset_split_config": {"training": 0.7, "testing": 0.2, "validation": 0.1, "random_seed": 42},
        "columns": [
            {"name": "id", "type": "continuous", "drop": true},
            {"name": "age", "type": "continuous", "drop": false, "missing": "median", "scale": "standard"},
            {"name": "sex", "type": "categorical", "drop": false, "encode": "binary_onehot"},
            {"name": "class", "type": "categorical", "drop": false, "encode": "ordinal",
             "encoding_values": {"first": 1, "second": 2, "third": 3}},
            {"name": "survived", "type": "categorical", "drop": false, "target": true}
        ]
    }"#;

    #[test]
    fn test_parse_config_with_task_alias() {
        let config = DatasetConfig::from_json(TITANIC_LIKE).unwrap();
        assert_eq!(config.problem_type, ProblemType::Classification);
        assert_eq!(config.columns.len(), 5);
        assert_eq!(config.dataset_split_config.random_seed, Some(42));

        let class = config.column("class").unwrap();
        assert_eq!(class.encode, Some(EncodingMethod::Ordinal));
        assert_eq!(class.encoding_values.as_ref().unwrap()["third"], 3);

        assert_eq!(config.target_columns().len(), 1);
        assert_eq!(config.kept_column_names(), vec!["age", "sex", "class", "survived"]);
    }

    #[test]
    fn test_split_fractions_tolerate_float_rounding() {
        assert!(DatasetSplitConfig::new(0.7, 0.2, 0.1).validate().is_ok());
        assert!(DatasetSplitConfig::new(0.8, 0.2, 0.0).validate().is_ok());
    }

    #[test]
    fn test_split_fractions_must_sum_to_one() {
        let err = DatasetSplitConfig::new(0.7, 0.2, 0.2).validate().unwrap_err();
        assert!(matches!(err, PipelineError::InvalidSplitFractions { .. }));
        assert!(DatasetSplitConfig::new(1.0, 0.0, 0.0).validate().is_err());
    }

    #[test]
    fn test_duplicate_columns_rejected() {
        let config = DatasetConfig::new(
            "dup",
            ProblemType::Regression,
            vec![
                ColumnConfig::new("x", FeatureType::Continuous),
                ColumnConfig::new("x", FeatureType::Continuous),
            ],
            DatasetSplitConfig::default(),
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ordinal_requires_mapping() {
        let config = DatasetConfig::new(
            "ord",
            ProblemType::Classification,
            vec![ColumnConfig::new("size", FeatureType::Categorical).with_encode(EncodingMethod::Ordinal)],
            DatasetSplitConfig::default(),
        );
        let err = config.validate().unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_unknown_enum_value_is_config_error() {
        let json = TITANIC_LIKE.replace("\"median\"", "\"geometric\"");
        let err = DatasetConfig::from_json(&json).unwrap_err();
        assert!(matches!(err, PipelineError::ConfigError(_)));
    }
}
