//! Column statistics used for imputation

use crate::config::ImputationMethod;
use crate::error::{PipelineError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Scalar a column's missing values are replaced with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImputationValue {
    Number(f64),
    Boolean(bool),
    Text(String),
}

impl fmt::Display for ImputationValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImputationValue::Number(v) => write!(f, "{}", v),
            ImputationValue::Boolean(v) => write!(f, "{}", v),
            ImputationValue::Text(v) => write!(f, "{}", v),
        }
    }
}

pub(crate) fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

fn is_float_dtype(dtype: &DataType) -> bool {
    matches!(dtype, DataType::Float32 | DataType::Float64)
}

/// Nulls, plus NaN for float columns
pub fn count_missing(series: &Series) -> Result<usize> {
    let mut missing = series.null_count();
    if is_float_dtype(series.dtype()) {
        let values = series.cast(&DataType::Float64)?;
        missing += values
            .f64()?
            .into_iter()
            .filter(|v| matches!(v, Some(x) if x.is_nan()))
            .count();
    }
    Ok(missing)
}

/// Non-missing values of a numeric column as f64
pub(crate) fn present_f64_values(series: &Series) -> Result<Vec<f64>> {
    let values = series.cast(&DataType::Float64)?;
    Ok(values
        .f64()?
        .into_iter()
        .flatten()
        .filter(|v| !v.is_nan())
        .collect())
}

/// Compute the imputation value of `series` over its non-missing values
pub fn calculate_statistic(series: &Series, method: ImputationMethod) -> Result<ImputationValue> {
    let name = series.name().as_str();
    match method {
        ImputationMethod::Mean | ImputationMethod::Median => {
            if !is_numeric_dtype(series.dtype()) {
                return Err(PipelineError::ConfigError(format!(
                    "column '{}' of type {} cannot be imputed with {:?}",
                    name,
                    series.dtype(),
                    method
                )));
            }
            let values = present_f64_values(series)?;
            let value = if method == ImputationMethod::Mean {
                mean(&values)
            } else {
                median(values)
            };
            value.map(ImputationValue::Number).ok_or_else(|| no_values(name))
        }
        ImputationMethod::Mode => {
            if is_numeric_dtype(series.dtype()) {
                let values = present_f64_values(series)?;
                mode_by(values, |a, b| a.total_cmp(b))
                    .map(ImputationValue::Number)
                    .ok_or_else(|| no_values(name))
            } else if series.dtype() == &DataType::Boolean {
                let values: Vec<bool> = series.bool()?.into_iter().flatten().collect();
                mode_by(values, |a, b| a.cmp(b))
                    .map(ImputationValue::Boolean)
                    .ok_or_else(|| no_values(name))
            } else {
                let values = series.cast(&DataType::String)?;
                let values: Vec<String> = values
                    .str()?
                    .into_iter()
                    .flatten()
                    .map(str::to_string)
                    .collect();
                mode_by(values, |a, b| a.cmp(b))
                    .map(ImputationValue::Text)
                    .ok_or_else(|| no_values(name))
            }
        }
    }
}

fn no_values(name: &str) -> PipelineError {
    PipelineError::DataError(format!("column '{}' has no non-missing values", name))
}

pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub(crate) fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Most frequent value; ties go to the smallest in ascending order
fn mode_by<T, F>(mut values: Vec<T>, cmp: F) -> Option<T>
where
    T: Clone,
    F: Fn(&T, &T) -> Ordering,
{
    values.sort_by(&cmp);
    let mut best: Option<(usize, usize)> = None;
    let mut start = 0;
    while start < values.len() {
        let mut end = start + 1;
        while end < values.len() && cmp(&values[start], &values[end]) == Ordering::Equal {
            end += 1;
        }
        let count = end - start;
        // strict comparison keeps the earliest (smallest) run on ties
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((start, count));
        }
        start = end;
    }
    best.map(|(idx, _)| values[idx].clone())
}
