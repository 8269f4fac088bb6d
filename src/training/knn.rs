//! K-Nearest Neighbors classifier

use super::models::{argmax_count, check_fit_input, check_n_features, n_classes, Model};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// Majority vote among the `k` closest training samples (Euclidean
/// distance). Equal distances keep training order; vote ties go to the
/// smallest label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNClassifier {
    pub k: usize,
    x_train: Option<Array2<f64>>,
    y_train: Vec<usize>,
    n_classes: usize,
}

impl Default for KNNClassifier {
    fn default() -> Self {
        Self::new(5)
    }
}

impl KNNClassifier {
    pub fn new(k: usize) -> Self {
        Self {
            k: k.max(1),
            x_train: None,
            y_train: Vec::new(),
            n_classes: 0,
        }
    }

    fn nearest(&self, x_train: &Array2<f64>, row: ArrayView1<f64>) -> Vec<usize> {
        let mut distances: Vec<(usize, f64)> = x_train
            .axis_iter(Axis(0))
            .enumerate()
            .map(|(i, train_row)| {
                let d: f64 = train_row.iter().zip(row.iter()).map(|(a, b)| (a - b).powi(2)).sum();
                (i, d)
            })
            .collect();
        let k = self.k.min(distances.len());
        // stable sort keeps training order among equal distances
        distances.sort_by(|a, b| a.1.total_cmp(&b.1));
        distances.into_iter().take(k).map(|(i, _)| i).collect()
    }
}

impl Model for KNNClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        self.n_classes = n_classes(y)?;
        self.x_train = Some(x.clone());
        self.y_train = y.iter().map(|&v| v as usize).collect();
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let x_train = self.x_train.as_ref().ok_or(PipelineError::ModelNotFitted)?;
        check_n_features(x_train.ncols(), x)?;

        Ok(x.axis_iter(Axis(0))
            .map(|row| {
                let mut votes = vec![0usize; self.n_classes];
                for i in self.nearest(x_train, row) {
                    votes[self.y_train[i]] += 1;
                }
                argmax_count(&votes) as f64
            })
            .collect())
    }
}
