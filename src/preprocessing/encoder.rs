//! Categorical encoding
//!
//! Three strategies are supported:
//! - `binary_onehot`: a two-valued column becomes a single 0/1 column named
//!   `<name>_<second value>`, values ordered by their string form
//! - `multi_onehot`: one boolean column `<name>_<category>` per category,
//!   appended after the existing columns; the original column is removed
//! - `ordinal`: categories replaced by the integers of `encoding_values`
//!
//! Every encoded column yields an [`EncodingConfig`] record that can be
//! replayed on new data with [`EncodingConfig::apply`].

use crate::config::{ColumnConfig, DatasetConfig, EncodingMethod};
use crate::error::{PipelineError, Result};
use crate::workspace::read_json_file;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{error, info, warn};

/// Record of a binary one-hot encoded column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryOneHotEncodingConfig {
    pub original_feature_name: String,
    pub renamed_feature_name: String,
    pub mappings: BTreeMap<String, i64>,
}

/// Record of a multi one-hot encoded column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiOneHotEncodingConfig {
    pub original_feature_name: String,
    pub resulting_columns: Vec<String>,
}

/// Record of an ordinal encoded column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrdinalEncodingConfig {
    pub original_feature_name: String,
    pub mappings: BTreeMap<String, i64>,
}

/// Persisted encoding record, tagged by `encoding_type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "encoding_type", rename_all = "snake_case")]
pub enum EncodingConfig {
    BinaryOnehot(BinaryOneHotEncodingConfig),
    MultiOnehot(MultiOneHotEncodingConfig),
    Ordinal(OrdinalEncodingConfig),
}

impl EncodingConfig {
    pub fn method(&self) -> EncodingMethod {
        match self {
            EncodingConfig::BinaryOnehot(_) => EncodingMethod::BinaryOnehot,
            EncodingConfig::MultiOnehot(_) => EncodingMethod::MultiOnehot,
            EncodingConfig::Ordinal(_) => EncodingMethod::Ordinal,
        }
    }

    pub fn original_feature_name(&self) -> &str {
        match self {
            EncodingConfig::BinaryOnehot(c) => &c.original_feature_name,
            EncodingConfig::MultiOnehot(c) => &c.original_feature_name,
            EncodingConfig::Ordinal(c) => &c.original_feature_name,
        }
    }

    /// Columns the encoding produces in place of the original one
    pub fn output_columns(&self) -> Vec<String> {
        match self {
            EncodingConfig::BinaryOnehot(c) => vec![c.renamed_feature_name.clone()],
            EncodingConfig::MultiOnehot(c) => c.resulting_columns.clone(),
            EncodingConfig::Ordinal(c) => vec![c.original_feature_name.clone()],
        }
    }

    /// Replay this encoding on a dataset that still holds the original column
    pub fn apply(&self, dataset: &DataFrame) -> Result<DataFrame> {
        match self {
            EncodingConfig::BinaryOnehot(c) => apply_binary_onehot(dataset, c),
            EncodingConfig::MultiOnehot(c) => apply_multi_onehot(dataset, c),
            EncodingConfig::Ordinal(c) => apply_ordinal(dataset, c),
        }
    }
}

/// Result of the encoding stage
#[derive(Debug, Clone)]
pub struct EncodingOutcome {
    pub dataset: DataFrame,
    /// One record per encoded column, in configuration order
    pub encodings: Vec<EncodingConfig>,
    /// Categorical columns left untouched because no encoding is configured
    pub skipped: Vec<String>,
}

type EncodeFn = fn(&DataFrame, &ColumnConfig) -> Result<(DataFrame, EncodingConfig)>;

/// Encoding method -> handler. Every [`EncodingMethod`] must appear here.
const ENCODERS: [(EncodingMethod, EncodeFn); 3] = [
    (EncodingMethod::BinaryOnehot, encode_binary_onehot),
    (EncodingMethod::MultiOnehot, encode_multi_onehot),
    (EncodingMethod::Ordinal, encode_ordinal),
];

/// Fail if an encoding method has no registered handler
pub fn validate_registry() -> Result<()> {
    for method in EncodingMethod::ALL {
        if !ENCODERS.iter().any(|(m, _)| *m == method) {
            return Err(PipelineError::ConfigError(format!(
                "no encoder registered for '{}'",
                method.as_str()
            )));
        }
    }
    Ok(())
}

fn encoder_for(method: EncodingMethod) -> Result<EncodeFn> {
    ENCODERS
        .iter()
        .find(|(m, _)| *m == method)
        .map(|(_, f)| *f)
        .ok_or_else(|| PipelineError::ConfigError(format!("unsupported encoding '{}'", method.as_str())))
}

/// Encodes every categorical column with its configured method
#[derive(Debug, Default, Clone, Copy)]
pub struct CategoricalEncoder;

impl CategoricalEncoder {
    pub fn new() -> Self {
        Self
    }

    pub fn encode(&self, dataset: &DataFrame, config: &DatasetConfig) -> Result<EncodingOutcome> {
        let mut result = dataset.clone();
        let mut encodings = Vec::new();
        let mut skipped = Vec::new();

        for column in config.columns.iter().filter(|c| c.is_categorical()) {
            let Some(method) = column.encode else {
                warn!(column = %column.name, "Skipping encoding for categorical feature because no encoding type is specified");
                skipped.push(column.name.clone());
                continue;
            };

            info!(column = %column.name, method = method.as_str(), "Encoding categorical feature");
            let encode = encoder_for(method)?;
            let (encoded, record) = encode(&result, column).inspect_err(|e| {
                error!(column = %column.name, method = method.as_str(), error = %e, "Error while encoding categorical feature");
            })?;
            info!(column = %column.name, outputs = ?record.output_columns(), "Categorical feature encoded successfully");

            result = encoded;
            encodings.push(record);
        }

        let encoded: Vec<&str> = encodings.iter().map(|e| e.original_feature_name()).collect();
        if !encoded.is_empty() {
            info!(columns = ?encoded, "Categorical features encoded successfully");
        }
        if !skipped.is_empty() {
            info!(columns = ?skipped, "Skipped encodings for categorical features");
        }

        Ok(EncodingOutcome {
            dataset: result,
            encodings,
            skipped,
        })
    }
}

fn encode_binary_onehot(dataset: &DataFrame, column: &ColumnConfig) -> Result<(DataFrame, EncodingConfig)> {
    let values = string_values(dataset, &column.name)?;
    let distinct = distinct_values(&values);
    if distinct.len() != 2 {
        return Err(PipelineError::InvalidBinaryCardinality {
            column: column.name.clone(),
            found: distinct.len(),
        });
    }

    let config = BinaryOneHotEncodingConfig {
        original_feature_name: column.name.clone(),
        renamed_feature_name: format!("{}_{}", column.name, distinct[1]),
        mappings: BTreeMap::from([(distinct[0].clone(), 0), (distinct[1].clone(), 1)]),
    };
    let encoded = apply_binary_onehot(dataset, &config)?;
    Ok((encoded, EncodingConfig::BinaryOnehot(config)))
}

fn encode_multi_onehot(dataset: &DataFrame, column: &ColumnConfig) -> Result<(DataFrame, EncodingConfig)> {
    let values = string_values(dataset, &column.name)?;
    let config = MultiOneHotEncodingConfig {
        original_feature_name: column.name.clone(),
        resulting_columns: distinct_values(&values)
            .iter()
            .map(|category| format!("{}_{}", column.name, category))
            .collect(),
    };
    let encoded = apply_multi_onehot(dataset, &config)?;
    Ok((encoded, EncodingConfig::MultiOnehot(config)))
}

fn encode_ordinal(dataset: &DataFrame, column: &ColumnConfig) -> Result<(DataFrame, EncodingConfig)> {
    let mappings = column.encoding_values.clone().ok_or_else(|| {
        PipelineError::ConfigError(format!(
            "column '{}' uses ordinal encoding without encoding_values",
            column.name
        ))
    })?;
    let config = OrdinalEncodingConfig {
        original_feature_name: column.name.clone(),
        mappings,
    };
    let encoded = apply_ordinal(dataset, &config)?;
    Ok((encoded, EncodingConfig::Ordinal(config)))
}

fn apply_binary_onehot(dataset: &DataFrame, config: &BinaryOneHotEncodingConfig) -> Result<DataFrame> {
    let name = &config.original_feature_name;
    let values = string_values(dataset, name)?;
    check_output_names(dataset, name, std::slice::from_ref(&config.renamed_feature_name))?;
    let mapped = map_values(name, &values, &config.mappings)?;
    let series = Series::new(config.renamed_feature_name.as_str().into(), mapped);
    replace_column(dataset, name, vec![series.into()])
}

fn apply_ordinal(dataset: &DataFrame, config: &OrdinalEncodingConfig) -> Result<DataFrame> {
    let name = &config.original_feature_name;
    let values = string_values(dataset, name)?;
    let mapped = map_values(name, &values, &config.mappings)?;
    let series = Series::new(name.as_str().into(), mapped);
    replace_column(dataset, name, vec![series.into()])
}

fn apply_multi_onehot(dataset: &DataFrame, config: &MultiOneHotEncodingConfig) -> Result<DataFrame> {
    let name = &config.original_feature_name;
    let values = string_values(dataset, name)?;
    check_output_names(dataset, name, &config.resulting_columns)?;
    let prefix = format!("{}_", name);

    let mut columns: Vec<Column> = dataset
        .get_columns()
        .iter()
        .filter(|c| c.name().as_str() != name)
        .cloned()
        .collect();
    for output in &config.resulting_columns {
        let category = output.strip_prefix(&prefix).unwrap_or(output.as_str());
        // nulls and unseen categories leave every indicator false
        let indicator: BooleanChunked = values
            .iter()
            .map(|v| Some(v.as_deref() == Some(category)))
            .collect();
        columns.push(indicator.with_name(output.as_str().into()).into_series().into());
    }
    Ok(DataFrame::new(columns)?)
}

/// Outputs of encoding `source` must not reuse the name of another column
fn check_output_names(dataset: &DataFrame, source: &str, outputs: &[String]) -> Result<()> {
    let clash = outputs.iter().find(|output| {
        output.as_str() != source && dataset.get_column_names().iter().any(|n| n.as_str() == output.as_str())
    });
    match clash {
        Some(output) => Err(PipelineError::ConfigError(format!(
            "encoding column '{}' would produce '{}', which already exists in the dataset",
            source, output
        ))),
        None => Ok(()),
    }
}

/// Map string values through `mappings`; nulls stay null, unknown values fail
fn map_values(
    column: &str,
    values: &[Option<String>],
    mappings: &BTreeMap<String, i64>,
) -> Result<Vec<Option<i64>>> {
    let unmapped: BTreeSet<&String> = values
        .iter()
        .flatten()
        .filter(|v| !mappings.contains_key(*v))
        .collect();
    if !unmapped.is_empty() {
        return Err(PipelineError::UnmappedCategories {
            column: column.to_string(),
            values: unmapped.into_iter().cloned().collect(),
        });
    }
    Ok(values
        .iter()
        .map(|v| v.as_ref().and_then(|v| mappings.get(v).copied()))
        .collect())
}

fn string_values(dataset: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = dataset
        .column(name)
        .map_err(|_| PipelineError::FeatureNotFound(name.to_string()))?;
    let values = column.as_materialized_series().cast(&DataType::String)?;
    Ok(values
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Sorted distinct non-null values
fn distinct_values(values: &[Option<String>]) -> Vec<String> {
    values
        .iter()
        .flatten()
        .cloned()
        .collect::<BTreeSet<String>>()
        .into_iter()
        .collect()
}

/// Swap column `name` for `replacements` at the same position
fn replace_column(dataset: &DataFrame, name: &str, replacements: Vec<Column>) -> Result<DataFrame> {
    let mut replacements = Some(replacements);
    let mut columns = Vec::with_capacity(dataset.width());
    for column in dataset.get_columns() {
        if column.name().as_str() == name {
            if let Some(replacements) = replacements.take() {
                columns.extend(replacements);
            }
        } else {
            columns.push(column.clone());
        }
    }
    Ok(DataFrame::new(columns)?)
}

/// Replay persisted encodings in order
pub fn replay_encodings(dataset: &DataFrame, encodings: &[EncodingConfig]) -> Result<DataFrame> {
    let mut result = dataset.clone();
    for encoding in encodings {
        result = encoding.apply(&result)?;
    }
    Ok(result)
}

/// Read an `encodings_config.json` written by a previous run
pub fn load_encoding_configs(path: impl AsRef<Path>) -> Result<Vec<EncodingConfig>> {
    read_json_file(path)
}
