//! Missing-value imputation

use super::statistics::{calculate_statistic, count_missing, ImputationValue};
use crate::config::{DatasetConfig, ImputationMethod};
use crate::error::{PipelineError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

/// One filled column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnImputation {
    pub column: String,
    pub method: ImputationMethod,
    pub value: ImputationValue,
    pub filled: usize,
}

/// Result of the imputation stage
#[derive(Debug, Clone)]
pub struct ImputationOutcome {
    pub dataset: DataFrame,
    pub imputations: Vec<ColumnImputation>,
    /// Missing values left after the completeness re-check
    pub remaining_missing: usize,
}

impl ImputationOutcome {
    pub fn total_filled(&self) -> usize {
        self.imputations.iter().map(|i| i.filled).sum()
    }
}

/// Fills missing values with the statistic configured per column
#[derive(Debug, Default, Clone, Copy)]
pub struct MissingValueImputer;

impl MissingValueImputer {
    pub fn new() -> Self {
        Self
    }

    pub fn impute(&self, dataset: &DataFrame, config: &DatasetConfig) -> Result<ImputationOutcome> {
        let (missing, total) = detect_missing_values(dataset)?;
        if total == 0 {
            info!("No missing values in dataset");
        }

        let mut result = dataset.clone();
        let mut imputations = Vec::new();

        for column in &config.columns {
            let count = missing
                .iter()
                .find(|(name, _)| name == &column.name)
                .map(|(_, count)| *count)
                .ok_or_else(|| PipelineError::FeatureNotFound(column.name.clone()))?;

            if count == 0 {
                debug!(column = %column.name, "No missing values in column");
                continue;
            }

            let Some(method) = column.missing else {
                error!(column = %column.name, missing = count, "Missing values cannot be handled because the handling method is not specified");
                return Err(PipelineError::MissingImputationMethod {
                    column: column.name.clone(),
                });
            };

            info!(column = %column.name, ?method, "Handling missing values");
            let series = result.column(&column.name)?.as_materialized_series().clone();
            let value = calculate_statistic(&series, method)?;
            let filled = fill_missing(&series, &value)?;
            result.with_column(filled)?;
            info!(column = %column.name, ?method, value = %value, filled = count, "Filled missing values");

            imputations.push(ColumnImputation {
                column: column.name.clone(),
                method,
                value,
                filled: count,
            });
        }

        let (_, remaining_missing) = detect_missing_values(&result)?;
        if remaining_missing > 0 {
            warn!(remaining = remaining_missing, "Missing values still exist in the dataset");
        } else {
            info!("Missing values handled successfully");
        }

        Ok(ImputationOutcome {
            dataset: result,
            imputations,
            remaining_missing,
        })
    }
}

/// Missing count per column (dataset order) and the total
pub fn detect_missing_values(dataset: &DataFrame) -> Result<(Vec<(String, usize)>, usize)> {
    let mut per_column = Vec::with_capacity(dataset.width());
    let mut total = 0;
    for column in dataset.get_columns() {
        let count = count_missing(column.as_materialized_series())?;
        debug!(column = %column.name(), missing = count, "Missing values");
        total += count;
        per_column.push((column.name().to_string(), count));
    }
    Ok((per_column, total))
}

/// Replace nulls (and NaN) of `series` with `value`
fn fill_missing(series: &Series, value: &ImputationValue) -> Result<Series> {
    let name = series.name().clone();
    let filled = match value {
        ImputationValue::Number(fill) => {
            let values = series.cast(&DataType::Float64)?;
            let ca: Float64Chunked = values
                .f64()?
                .into_iter()
                .map(|v| match v {
                    Some(x) if !x.is_nan() => Some(x),
                    _ => Some(*fill),
                })
                .collect();
            ca.with_name(name).into_series()
        }
        ImputationValue::Boolean(fill) => {
            let ca: BooleanChunked = series
                .bool()?
                .into_iter()
                .map(|v| Some(v.unwrap_or(*fill)))
                .collect();
            ca.with_name(name).into_series()
        }
        ImputationValue::Text(fill) => {
            let values = series.cast(&DataType::String)?;
            let ca: StringChunked = values
                .str()?
                .into_iter()
                .map(|v| Some(v.unwrap_or(fill.as_str())))
                .collect();
            ca.with_name(name).into_series()
        }
    };
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ColumnConfig, DatasetSplitConfig, FeatureType, ProblemType};

    fn config(columns: Vec<ColumnConfig>) -> DatasetConfig {
        DatasetConfig::new("toy", ProblemType::Regression, columns, DatasetSplitConfig::default())
    }

    #[test]
    fn test_fills_with_configured_statistic() {
        let df = df!(
            "age" => &[Some(10.0), None, Some(30.0)],
            "city" => &[Some("b"), Some("a"), None]
        )
        .unwrap();
        let config = config(vec![
            ColumnConfig::new("age", FeatureType::Continuous).with_missing(ImputationMethod::Mean),
            ColumnConfig::new("city", FeatureType::Categorical).with_missing(ImputationMethod::Mode),
        ]);

        let outcome = MissingValueImputer::new().impute(&df, &config).unwrap();

        assert_eq!(outcome.remaining_missing, 0);
        assert_eq!(outcome.total_filled(), 2);
        let age = outcome.dataset.column("age").unwrap().f64().unwrap().get(1);
        assert_eq!(age, Some(20.0));
        let city = outcome.dataset.column("city").unwrap().str().unwrap().get(2);
        assert_eq!(city, Some("a"));
        // column order preserved
        assert_eq!(outcome.dataset.get_column_names()[0].as_str(), "age");
    }

    #[test]
    fn test_clean_column_needs_no_method() {
        let df = df!("x" => &[1.0, 2.0]).unwrap();
        let config = config(vec![ColumnConfig::new("x", FeatureType::Continuous)]);
        let outcome = MissingValueImputer::new().impute(&df, &config).unwrap();
        assert!(outcome.imputations.is_empty());
        assert!(outcome.dataset.equals(&df));
    }

    #[test]
    fn test_missing_method_is_fatal() {
        let df = df!("x" => &[Some(1.0), None]).unwrap();
        let config = config(vec![ColumnConfig::new("x", FeatureType::Continuous)]);
        let err = MissingValueImputer::new().impute(&df, &config).unwrap_err();
        assert!(matches!(err, PipelineError::MissingImputationMethod { ref column } if column == "x"));
    }

    #[test]
    fn test_nan_counts_as_missing() {
        let df = df!("x" => &[1.0, f64::NAN, 3.0]).unwrap();
        let config = config(vec![
            ColumnConfig::new("x", FeatureType::Continuous).with_missing(ImputationMethod::Median),
        ]);
        let outcome = MissingValueImputer::new().impute(&df, &config).unwrap();
        assert_eq!(outcome.dataset.column("x").unwrap().f64().unwrap().get(1), Some(2.0));
    }

    #[test]
    fn test_integer_column_filled_as_float() {
        let df = df!("n" => &[Some(1i64), None, Some(3)]).unwrap();
        let config = config(vec![
            ColumnConfig::new("n", FeatureType::Continuous).with_missing(ImputationMethod::Mean),
        ]);
        let outcome = MissingValueImputer::new().impute(&df, &config).unwrap();
        let column = outcome.dataset.column("n").unwrap();
        assert_eq!(column.dtype(), &DataType::Float64);
        assert_eq!(column.f64().unwrap().get(1), Some(2.0));
    }

    #[test]
    fn test_imputer_is_idempotent() {
        let df = df!(
            "age" => &[Some(10.0), None, Some(30.0)],
            "city" => &[Some("b"), Some("a"), None]
        )
        .unwrap();
        let config = config(vec![
            ColumnConfig::new("age", FeatureType::Continuous).with_missing(ImputationMethod::Mean),
            ColumnConfig::new("city", FeatureType::Categorical).with_missing(ImputationMethod::Mode),
        ]);
        let imputer = MissingValueImputer::new();

        let first = imputer.impute(&df, &config).unwrap();
        let second = imputer.impute(&first.dataset, &config).unwrap();

        assert_eq!(first.total_filled(), 2);
        assert_eq!(second.total_filled(), 0);
        assert!(second.imputations.is_empty());
        assert!(second.dataset.equals(&first.dataset));
    }

    #[test]
    fn test_remaining_nulls_warn_without_error() {
        // "note" is not configured, so nothing fills it
        let df = df!(
            "x" => &[Some(1.0), None, Some(3.0)],
            "note" => &[Some("a"), None, None]
        )
        .unwrap();
        let config = config(vec![
            ColumnConfig::new("x", FeatureType::Continuous).with_missing(ImputationMethod::Mean),
        ]);

        let outcome = MissingValueImputer::new().impute(&df, &config).unwrap();
        assert_eq!(outcome.total_filled(), 1);
        assert_eq!(outcome.remaining_missing, 2);
        assert_eq!(outcome.dataset.column("note").unwrap().null_count(), 2);
    }
}
