//! Gaussian Naive Bayes classifier

use super::models::{argmax, check_fit_input, check_n_features, n_classes, Model};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Gaussian Naive Bayes Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaussianNaiveBayes {
    /// `means[class][feature]`
    means: Vec<Vec<f64>>,
    /// `variances[class][feature]`, smoothed
    variances: Vec<Vec<f64>>,
    /// Log prior of each class; `None` for classes absent from training
    log_priors: Vec<Option<f64>>,
    /// Portion of the largest feature variance added to every variance
    pub var_smoothing: f64,
    n_features: usize,
}

impl Default for GaussianNaiveBayes {
    fn default() -> Self {
        Self::new()
    }
}

impl GaussianNaiveBayes {
    pub fn new() -> Self {
        Self {
            means: Vec::new(),
            variances: Vec::new(),
            log_priors: Vec::new(),
            var_smoothing: 1e-9,
            n_features: 0,
        }
    }

    pub fn with_var_smoothing(mut self, smoothing: f64) -> Self {
        self.var_smoothing = smoothing;
        self
    }

    fn joint_log_likelihood(&self, row: &[f64], class: usize) -> Option<f64> {
        let log_prior = self.log_priors[class]?;
        let ll: f64 = row
            .iter()
            .zip(&self.means[class])
            .zip(&self.variances[class])
            .map(|((&xi, &mean), &var)| -0.5 * ((2.0 * PI * var).ln() + (xi - mean).powi(2) / var))
            .sum();
        Some(log_prior + ll)
    }
}

impl Model for GaussianNaiveBayes {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let n_classes = n_classes(y)?;
        let n_samples = x.nrows();
        self.n_features = x.ncols();

        let epsilon = self.var_smoothing
            * x.var_axis(Axis(0), 0.0)
                .iter()
                .cloned()
                .fold(0.0f64, f64::max);
        // a dataset of constant features still needs a positive variance
        let epsilon = if epsilon > 0.0 { epsilon } else { self.var_smoothing.max(f64::MIN_POSITIVE) };

        self.means = vec![vec![0.0; self.n_features]; n_classes];
        self.variances = vec![vec![epsilon; self.n_features]; n_classes];
        self.log_priors = vec![None; n_classes];

        for class in 0..n_classes {
            let rows: Vec<usize> = (0..n_samples).filter(|&i| y[i] as usize == class).collect();
            if rows.is_empty() {
                continue;
            }
            let subset = x.select(Axis(0), &rows);
            if let Some(mean) = subset.mean_axis(Axis(0)) {
                self.means[class] = mean.to_vec();
            }
            self.variances[class] = subset
                .var_axis(Axis(0), 0.0)
                .iter()
                .map(|v| v + epsilon)
                .collect();
            self.log_priors[class] = Some((rows.len() as f64 / n_samples as f64).ln());
        }
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.log_priors.is_empty() {
            return Err(PipelineError::ModelNotFitted);
        }
        check_n_features(self.n_features, x)?;

        Ok(x.axis_iter(Axis(0))
            .map(|row| {
                let row = row.to_vec();
                let scores: Vec<f64> = (0..self.log_priors.len())
                    .map(|c| self.joint_log_likelihood(&row, c).unwrap_or(f64::NEG_INFINITY))
                    .collect();
                argmax(&scores) as f64
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_gaussian_nb() {
        let x = array![[1.0, 2.0], [1.2, 1.8], [0.9, 2.1], [4.0, 5.0], [4.2, 5.1], [3.9, 4.8]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut nb = GaussianNaiveBayes::new();
        nb.fit(&x, &y).unwrap();
        assert_eq!(nb.predict(&x).unwrap(), y);
        assert_eq!(nb.predict(&array![[1.1, 2.0], [4.1, 4.9]]).unwrap(), array![0.0, 1.0]);
    }

    #[test]
    fn test_constant_feature_is_handled() {
        let x = array![[1.0, 0.0], [1.0, 1.0], [1.0, 10.0], [1.0, 11.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];
        let mut nb = GaussianNaiveBayes::new();
        nb.fit(&x, &y).unwrap();
        let preds = nb.predict(&x).unwrap();
        assert!(preds.iter().all(|p| p.is_finite()));
        assert_eq!(preds, y);
    }
}
