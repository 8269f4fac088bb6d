//! Model trait and evaluation metrics

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::info;

/// Trait for ML models
///
/// Classifiers expect labels encoded as `0.0, 1.0, ..., k - 1` and predict
/// labels in the same encoding.
pub trait Model {
    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Make predictions
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;
}

/// Check that `x` and `y` describe the same, non-empty set of samples
pub(crate) fn check_fit_input(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(PipelineError::ShapeError {
            expected: format!("{} targets", x.nrows()),
            actual: format!("{} targets", y.len()),
        });
    }
    if x.nrows() == 0 {
        return Err(PipelineError::TrainingError("cannot fit on an empty dataset".into()));
    }
    Ok(())
}

pub(crate) fn check_n_features(expected: usize, x: &Array2<f64>) -> Result<()> {
    if x.ncols() != expected {
        return Err(PipelineError::ShapeError {
            expected: format!("{} features", expected),
            actual: format!("{} features", x.ncols()),
        });
    }
    Ok(())
}

/// Number of classes of an encoded label vector (`max + 1`)
pub(crate) fn n_classes(y: &Array1<f64>) -> Result<usize> {
    let mut max = 0usize;
    for &label in y.iter() {
        if label < 0.0 || label.fract() != 0.0 || !label.is_finite() {
            return Err(PipelineError::TrainingError(format!(
                "class labels must be encoded as 0..k, got {}",
                label
            )));
        }
        max = max.max(label as usize);
    }
    Ok(max + 1)
}

/// Index of the largest count; ties go to the smallest index
pub(crate) fn argmax_count(counts: &[usize]) -> usize {
    let mut best = 0;
    for (i, &c) in counts.iter().enumerate() {
        if c > counts[best] {
            best = i;
        }
    }
    best
}

pub(crate) fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}

/// Metrics of a classifier on held-out data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationModelPerformance {
    pub model: String,
    pub model_path: String,
    pub accuracy: f64,
    /// Support-weighted precision
    pub precision: f64,
    /// Support-weighted recall
    pub recall: f64,
    /// Support-weighted F1
    pub f1: f64,
}

impl ClassificationModelPerformance {
    pub fn compute(
        model: impl Into<String>,
        model_path: impl Into<String>,
        y_true: &Array1<f64>,
        y_pred: &Array1<f64>,
    ) -> Self {
        let (precision, recall, f1) = weighted_precision_recall_f1(y_true, y_pred);
        Self {
            model: model.into(),
            model_path: model_path.into(),
            accuracy: accuracy(y_true, y_pred),
            precision,
            recall,
            f1,
        }
    }
}

/// Metrics of a regressor on held-out data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionModelPerformance {
    pub model: String,
    pub model_path: String,
    pub mean_absolute_error: f64,
    pub mean_squared_error: f64,
    pub root_mean_squared_error: f64,
    pub r2_score: f64,
}

impl RegressionModelPerformance {
    pub fn compute(
        model: impl Into<String>,
        model_path: impl Into<String>,
        y_true: &Array1<f64>,
        y_pred: &Array1<f64>,
    ) -> Self {
        let mse = mean_squared_error(y_true, y_pred);
        Self {
            model: model.into(),
            model_path: model_path.into(),
            mean_absolute_error: mean_absolute_error(y_true, y_pred),
            mean_squared_error: mse,
            root_mean_squared_error: mse.sqrt(),
            r2_score: r2_score(y_true, y_pred),
        }
    }
}

/// Evaluation record of one trained model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "problem_type", rename_all = "snake_case")]
pub enum ModelPerformance {
    Classification(ClassificationModelPerformance),
    Regression(RegressionModelPerformance),
}

impl ModelPerformance {
    pub fn model(&self) -> &str {
        match self {
            ModelPerformance::Classification(p) => &p.model,
            ModelPerformance::Regression(p) => &p.model,
        }
    }

    pub fn model_path(&self) -> &str {
        match self {
            ModelPerformance::Classification(p) => &p.model_path,
            ModelPerformance::Regression(p) => &p.model_path,
        }
    }

    /// Log the metrics as a readable block
    pub fn log_summary(&self) {
        for line in self.to_string().lines() {
            info!("{}", line);
        }
    }
}

impl fmt::Display for ModelPerformance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelPerformance::Classification(p) => {
                writeln!(f, "Model: {}", p.model)?;
                writeln!(f, "  Accuracy:  {:.4}", p.accuracy)?;
                writeln!(f, "  Precision: {:.4}", p.precision)?;
                writeln!(f, "  Recall:    {:.4}", p.recall)?;
                write!(f, "  F1:        {:.4}", p.f1)
            }
            ModelPerformance::Regression(p) => {
                writeln!(f, "Model: {}", p.model)?;
                writeln!(f, "  MAE:  {:.4}", p.mean_absolute_error)?;
                writeln!(f, "  MSE:  {:.4}", p.mean_squared_error)?;
                writeln!(f, "  RMSE: {:.4}", p.root_mean_squared_error)?;
                write!(f, "  R2:   {:.4}", p.r2_score)
            }
        }
    }
}

pub fn accuracy(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| (*t - *p).abs() < 1e-9)
        .count();
    correct as f64 / y_true.len() as f64
}

/// Precision, recall and F1 averaged over classes weighted by their support.
/// A class with an undefined ratio contributes zero.
pub fn weighted_precision_recall_f1(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> (f64, f64, f64) {
    #[derive(Default)]
    struct Counts {
        tp: usize,
        fp: usize,
        fn_: usize,
        support: usize,
    }

    let mut per_class: BTreeMap<i64, Counts> = BTreeMap::new();
    for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
        let (t, p) = (t.round() as i64, p.round() as i64);
        per_class.entry(t).or_default().support += 1;
        if t == p {
            per_class.entry(t).or_default().tp += 1;
        } else {
            per_class.entry(p).or_default().fp += 1;
            per_class.entry(t).or_default().fn_ += 1;
        }
    }

    let total: usize = per_class.values().map(|c| c.support).sum();
    if total == 0 {
        return (0.0, 0.0, 0.0);
    }

    let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
    let (mut precision, mut recall, mut f1) = (0.0, 0.0, 0.0);
    for c in per_class.values() {
        let weight = c.support as f64 / total as f64;
        let p = ratio(c.tp, c.tp + c.fp);
        let r = ratio(c.tp, c.tp + c.fn_);
        let f = if p + r == 0.0 { 0.0 } else { 2.0 * p * r / (p + r) };
        precision += weight * p;
        recall += weight * r;
        f1 += weight * f;
    }
    (precision, recall, f1)
}

pub fn mean_absolute_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    (y_true - y_pred).mapv(f64::abs).mean().unwrap_or(0.0)
}

pub fn mean_squared_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    (y_true - y_pred).mapv(|d| d * d).mean().unwrap_or(0.0)
}

/// Coefficient of determination; a constant target scores 1.0 when predicted
/// exactly and 0.0 otherwise
pub fn r2_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let mean = y_true.mean().unwrap_or(0.0);
    let ss_res: f64 = (y_true - y_pred).mapv(|d| d * d).sum();
    let ss_tot: f64 = y_true.mapv(|v| (v - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classification_metrics() {
        let y_true = array![1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 0.0];
        let y_pred = array![1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0];

        let perf = ClassificationModelPerformance::compute("m", "m.bin", &y_true, &y_pred);
        assert!((perf.accuracy - 0.75).abs() < 1e-12);
        // both classes have precision = recall = 0.75
        assert!((perf.precision - 0.75).abs() < 1e-12);
        assert!((perf.recall - 0.75).abs() < 1e-12);
        assert!((perf.f1 - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_weighted_metrics_zero_division() {
        let y_true = array![0.0, 0.0, 1.0];
        let y_pred = array![0.0, 0.0, 0.0];
        let (p, r, f) = weighted_precision_recall_f1(&y_true, &y_pred);
        // class 1 never predicted: precision 0 for it, weighted by 1/3
        assert!((p - (2.0 / 3.0) * (2.0 / 3.0)).abs() < 1e-12);
        assert!((r - 2.0 / 3.0).abs() < 1e-12);
        assert!(f > 0.0 && f < 1.0);
    }

    #[test]
    fn test_regression_metrics() {
        let y_true = array![1.0, 2.0, 3.0, 4.0, 5.0];
        let y_pred = array![1.1, 2.0, 2.9, 4.1, 5.0];

        let perf = RegressionModelPerformance::compute("lr", "lr.bin", &y_true, &y_pred);
        assert!((perf.mean_absolute_error - 0.06).abs() < 1e-12);
        assert!((perf.root_mean_squared_error - perf.mean_squared_error.sqrt()).abs() < 1e-12);
        assert!(perf.r2_score > 0.9);
    }

    #[test]
    fn test_performance_serializes_with_tag() {
        let perf = ModelPerformance::Regression(RegressionModelPerformance {
            model: "linear_regression".into(),
            model_path: "models/regression/linear_regression.bin".into(),
            mean_absolute_error: 0.5,
            mean_squared_error: 0.25,
            root_mean_squared_error: 0.5,
            r2_score: 0.9,
        });
        let json = serde_json::to_value(&perf).unwrap();
        assert_eq!(json["problem_type"], "regression");
        assert_eq!(json["model"], "linear_regression");
        assert!(perf.to_string().contains("R2"));
    }

    #[test]
    fn test_label_checks() {
        assert_eq!(n_classes(&array![0.0, 2.0, 1.0]).unwrap(), 3);
        assert!(n_classes(&array![0.5]).is_err());
        assert_eq!(argmax_count(&[2, 3, 3]), 1);
    }
}
