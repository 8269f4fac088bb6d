//! Gradient boosting classifier
//!
//! Multinomial deviance boosting: every stage fits one shallow regression
//! tree per class to the residuals `onehot(y) - softmax(F)` and adds it to
//! the raw scores `F` scaled by the learning rate. Scores start at the log
//! class priors.

use super::decision_tree::DecisionTree;
use super::models::{argmax, check_fit_input, check_n_features, n_classes, Model};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    /// `stages[m][k]` is the tree of class `k` at stage `m`
    stages: Vec<Vec<DecisionTree>>,
    initial_scores: Vec<f64>,
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub random_state: u64,
    n_features: usize,
}

impl Default for GradientBoostingClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl GradientBoostingClassifier {
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            initial_scores: Vec::new(),
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            random_state: 0,
            n_features: 0,
        }
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n.max(1);
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth.max(1);
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    fn raw_scores(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let n_classes = self.initial_scores.len();
        let mut scores = Array2::from_shape_fn((x.nrows(), n_classes), |(_, k)| self.initial_scores[k]);
        for stage in &self.stages {
            for (k, tree) in stage.iter().enumerate() {
                let update = tree.predict(x)?;
                scores
                    .column_mut(k)
                    .scaled_add(self.learning_rate, &update);
            }
        }
        Ok(scores)
    }
}

fn softmax_rows(scores: &Array2<f64>) -> Array2<f64> {
    let mut probs = scores.clone();
    for mut row in probs.axis_iter_mut(Axis(0)) {
        let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
    probs
}

impl Model for GradientBoostingClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let n_classes = n_classes(y)?;
        let n_samples = x.nrows();
        self.n_features = x.ncols();

        let mut counts = vec![0usize; n_classes];
        for &label in y.iter() {
            counts[label as usize] += 1;
        }
        // absent classes get a large negative prior instead of -inf
        self.initial_scores = counts
            .iter()
            .map(|&c| if c == 0 { -30.0 } else { (c as f64 / n_samples as f64).ln() })
            .collect();

        let mut scores =
            Array2::from_shape_fn((n_samples, n_classes), |(_, k)| self.initial_scores[k]);
        self.stages = Vec::with_capacity(self.n_estimators);

        for _ in 0..self.n_estimators {
            let probs = softmax_rows(&scores);
            let mut stage = Vec::with_capacity(n_classes);
            for k in 0..n_classes {
                let residuals = Array1::from_shape_fn(n_samples, |i| {
                    let target = if y[i] as usize == k { 1.0 } else { 0.0 };
                    target - probs[[i, k]]
                });
                let mut tree = DecisionTree::new_regressor()
                    .with_max_depth(self.max_depth)
                    .with_random_state(self.random_state);
                tree.fit(x, &residuals)?;
                let update = tree.predict(x)?;
                scores.column_mut(k).scaled_add(self.learning_rate, &update);
                stage.push(tree);
            }
            self.stages.push(stage);
        }
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.initial_scores.is_empty() {
            return Err(PipelineError::ModelNotFitted);
        }
        check_n_features(self.n_features, x)?;
        let scores = self.raw_scores(x)?;
        Ok(scores
            .axis_iter(Axis(0))
            .map(|row| argmax(&row.to_vec()) as f64)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_class_problem() {
        let x = Array2::from_shape_fn((30, 2), |(i, j)| (i / 10) as f64 * 4.0 + (i % 10) as f64 * 0.1 + j as f64);
        let y = Array1::from_shape_fn(30, |i| (i / 10) as f64);

        let mut model = GradientBoostingClassifier::new().with_n_estimators(20);
        model.fit(&x, &y).unwrap();

        let preds = model.predict(&x).unwrap();
        assert_eq!(preds, y);
    }

    #[test]
    fn test_unfitted_predict_fails() {
        let model = GradientBoostingClassifier::new();
        assert!(model.predict(&Array2::zeros((1, 1))).is_err());
    }
}
