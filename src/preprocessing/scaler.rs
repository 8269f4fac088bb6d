//! Feature scaling
//!
//! [`Scaler`] holds the fitted parameters of one scaling method over a list
//! of columns. [`FeatureScaler`] is the pipeline stage: it groups continuous
//! columns by method, fits one scaler per method on the training split only,
//! applies it to every split and persists it in the working directory.

use super::splitter::DatasetSplits;
use super::statistics::{mean, present_f64_values};
use crate::config::{DatasetConfig, ScalingMethod};
use crate::error::{PipelineError, Result};
use crate::workspace::{read_binary, write_binary, WorkingDirectory};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Fitted parameters of one column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    /// mean or min
    pub center: f64,
    /// std or range
    pub scale: f64,
}

/// Feature scaler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    method: ScalingMethod,
    feature_names: Vec<String>,
    params: Vec<ScalerParams>,
    is_fitted: bool,
}

impl Scaler {
    pub fn new(method: ScalingMethod) -> Self {
        Self {
            method,
            feature_names: Vec::new(),
            params: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn method(&self) -> ScalingMethod {
        self.method
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Parameters of `column`, if it was fitted
    pub fn params(&self, column: &str) -> Option<ScalerParams> {
        self.feature_names
            .iter()
            .position(|n| n == column)
            .map(|i| self.params[i])
    }

    /// Fit the scaler to `columns` of `df`
    pub fn fit(&mut self, df: &DataFrame, columns: &[String]) -> Result<&mut Self> {
        let mut params = Vec::with_capacity(columns.len());
        for col_name in columns {
            let column = df
                .column(col_name)
                .map_err(|_| PipelineError::FeatureNotFound(col_name.clone()))?;
            params.push(self.compute_params(col_name, column.as_materialized_series())?);
        }

        self.feature_names = columns.to_vec();
        self.params = params;
        self.is_fitted = true;
        Ok(self)
    }

    /// Scale the fitted columns of `df`; other columns are left as they are
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        self.map_columns(df, |v, p| (v - p.center) / p.scale)
    }

    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[String]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    pub fn inverse_transform(&self, df: &DataFrame) -> Result<DataFrame> {
        self.map_columns(df, |v, p| v * p.scale + p.center)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        write_binary(path, self)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        read_binary(path)
    }

    fn map_columns<F>(&self, df: &DataFrame, f: F) -> Result<DataFrame>
    where
        F: Fn(f64, &ScalerParams) -> f64,
    {
        if !self.is_fitted {
            return Err(PipelineError::ModelNotFitted);
        }

        let mut result = df.clone();
        for (col_name, params) in self.feature_names.iter().zip(&self.params) {
            let column = df
                .column(col_name)
                .map_err(|_| PipelineError::FeatureNotFound(col_name.clone()))?;
            let values = column.as_materialized_series().cast(&DataType::Float64)?;
            let mapped: Float64Chunked = values
                .f64()?
                .into_iter()
                .map(|opt| opt.map(|v| f(v, params)))
                .collect();
            result.with_column(mapped.with_name(col_name.as_str().into()).into_series())?;
        }
        Ok(result)
    }

    fn compute_params(&self, name: &str, series: &Series) -> Result<ScalerParams> {
        let values = present_f64_values(series)
            .map_err(|_| PipelineError::DataError(format!("column '{}' is not numeric and cannot be scaled", name)))?;
        if values.is_empty() {
            return Err(PipelineError::DataError(format!(
                "column '{}' has no values to fit a scaler on",
                name
            )));
        }

        match self.method {
            ScalingMethod::Standard => {
                let mean = mean(&values).unwrap_or(0.0);
                let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
                let std = variance.sqrt();
                Ok(ScalerParams {
                    center: mean,
                    scale: if std == 0.0 { 1.0 } else { std },
                })
            }
            ScalingMethod::Minmax => {
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let range = max - min;
                Ok(ScalerParams {
                    center: min,
                    scale: if range == 0.0 { 1.0 } else { range },
                })
            }
        }
    }
}

/// Persisted record of one fitted scaler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerConfig {
    pub scaler_type: ScalingMethod,
    pub feature_names: Vec<String>,
    pub file_path: String,
}

impl ScalerConfig {
    /// Restore the fitted scaler this record points at
    pub fn load_scaler(&self) -> Result<Scaler> {
        Scaler::load(PathBuf::from(&self.file_path))
    }
}

/// Result of the scaling stage
#[derive(Debug, Clone)]
pub struct ScalingOutcome {
    pub splits: DatasetSplits,
    /// One record per scaling method actually fitted
    pub scalers: Vec<ScalerConfig>,
}

/// Pipeline stage fitting scalers on the training split
#[derive(Debug, Clone, Copy)]
pub struct FeatureScaler<'a> {
    workspace: &'a WorkingDirectory,
}

impl<'a> FeatureScaler<'a> {
    pub fn new(workspace: &'a WorkingDirectory) -> Self {
        Self { workspace }
    }

    pub fn scale(&self, splits: &DatasetSplits, config: &DatasetConfig) -> Result<ScalingOutcome> {
        let continuous: Vec<&str> = config
            .columns
            .iter()
            .filter(|c| c.is_continuous())
            .map(|c| c.name.as_str())
            .collect();
        let unscaled: Vec<&str> = config
            .columns
            .iter()
            .filter(|c| c.is_continuous() && c.scale.is_none())
            .map(|c| c.name.as_str())
            .collect();
        info!(count = continuous.len(), columns = ?continuous, "All continuous features");
        info!(count = unscaled.len(), columns = ?unscaled, "No scaling features");

        let mut result = splits.clone();
        let mut scalers = Vec::new();

        for method in ScalingMethod::ALL {
            let features: Vec<String> = config
                .columns
                .iter()
                .filter(|c| c.is_continuous() && c.scale == Some(method))
                .map(|c| c.name.clone())
                .collect();
            info!(method = method.as_str(), count = features.len(), columns = ?features, "Scaler features");
            if features.is_empty() {
                continue;
            }

            let record = self
                .fit_and_apply(&mut result, method, &features)
                .inspect_err(|e| {
                    error!(method = method.as_str(), error = %e, "Error while scaling continuous features");
                })?;
            scalers.push(record);
        }

        Ok(ScalingOutcome {
            splits: result,
            scalers,
        })
    }

    fn fit_and_apply(
        &self,
        splits: &mut DatasetSplits,
        method: ScalingMethod,
        features: &[String],
    ) -> Result<ScalerConfig> {
        info!(method = method.as_str(), columns = ?features, "Fitting scaler on training dataset");
        let mut scaler = Scaler::new(method);
        scaler.fit(&splits.training, features)?;

        splits.training = scaler.transform(&splits.training)?;
        splits.testing = scaler.transform(&splits.testing)?;
        if let Some(validation) = &splits.validation {
            splits.validation = Some(scaler.transform(validation)?);
        }
        info!(method = method.as_str(), "Scaler applied to all dataset splits");

        let path = self.workspace.scaler_artifact_path(method);
        scaler.save(&path)?;
        info!(method = method.as_str(), path = %path.display(), "Scaler saved successfully");

        Ok(ScalerConfig {
            scaler_type: method,
            feature_names: features.to_vec(),
            file_path: path.to_string_lossy().into_owned(),
        })
    }
}
