//! Random forest classifier

use super::decision_tree::DecisionTree;
use super::models::{argmax_count, check_fit_input, n_classes, Model};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Bagged Gini trees, each drawing `sqrt(n_features)` candidate features per
/// node. Predictions are a majority vote; ties go to the smallest label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub bootstrap: bool,
    pub random_state: u64,
    n_classes: usize,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomForest {
    pub fn new() -> Self {
        Self {
            trees: Vec::new(),
            n_estimators: 100,
            max_depth: None,
            bootstrap: true,
            random_state: 0,
            n_classes: 0,
        }
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n.max(1);
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Model for RandomForest {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        self.n_classes = n_classes(y)?;

        let n_samples = x.nrows();
        let max_features = ((x.ncols() as f64).sqrt() as usize).max(1);
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);

        self.trees = Vec::with_capacity(self.n_estimators);
        for _ in 0..self.n_estimators {
            let indices: Vec<usize> = if self.bootstrap {
                (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
            } else {
                (0..n_samples).collect()
            };

            let mut tree = DecisionTree::new_classifier()
                .with_max_features(max_features)
                .with_random_state(rng.gen());
            tree.max_depth = self.max_depth;
            tree.fit_indices(x, y, indices)?;
            self.trees.push(tree);
        }
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(PipelineError::ModelNotFitted);
        }

        let mut votes = vec![vec![0usize; self.n_classes]; x.nrows()];
        for tree in &self.trees {
            for (row_votes, label) in votes.iter_mut().zip(tree.predict(x)?.iter()) {
                row_votes[*label as usize] += 1;
            }
        }
        Ok(votes.iter().map(|v| argmax_count(v) as f64).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blobs() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((40, 3), |(i, j)| {
            let base = if i < 20 { 0.0 } else { 5.0 };
            base + ((i * 7 + j * 3) % 10) as f64 * 0.1
        });
        let y = Array1::from_shape_fn(40, |i| if i < 20 { 0.0 } else { 1.0 });
        (x, y)
    }

    #[test]
    fn test_forest_fits_separable_data() {
        let (x, y) = blobs();
        let mut forest = RandomForest::new().with_n_estimators(15).with_random_state(42);
        forest.fit(&x, &y).unwrap();

        assert_eq!(forest.n_trees(), 15);
        assert_eq!(forest.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_same_seed_same_forest() {
        let (x, y) = blobs();
        let mut a = RandomForest::new().with_n_estimators(5).with_random_state(1);
        let mut b = RandomForest::new().with_n_estimators(5).with_random_state(1);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();

        let probe = Array2::from_shape_fn((5, 3), |(i, j)| (i + j) as f64);
        assert_eq!(a.predict(&probe).unwrap(), b.predict(&probe).unwrap());
    }
}
