//! Decision tree implementation
//!
//! CART trees grown greedily: every node tries each candidate feature,
//! sweeps its sorted values and keeps the threshold with the lowest
//! weighted impurity (Gini for classification, squared error for
//! regression).

use super::models::{argmax_count, check_fit_input, check_n_features, n_classes, Model};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf { value: f64, n_samples: usize },
    /// Internal node; samples with `x[feature_idx] <= threshold` go left
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
    },
}

impl TreeNode {
    fn predict_row(&self, row: &[f64]) -> f64 {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    node = if row[*feature_idx] <= *threshold { left } else { right };
                }
            }
        }
    }

    fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Criterion {
    /// Gini impurity (classification)
    Gini,
    /// Squared error (regression)
    Mse,
}

/// Decision tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features drawn at random per node; all when unset
    pub max_features: Option<usize>,
    pub criterion: Criterion,
    pub random_state: u64,
    n_features: usize,
    n_classes: usize,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new_classifier()
    }
}

impl DecisionTree {
    pub fn new_classifier() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion: Criterion::Gini,
            random_state: 0,
            n_features: 0,
            n_classes: 0,
        }
    }

    pub fn new_regressor() -> Self {
        Self {
            criterion: Criterion::Mse,
            ..Self::new_classifier()
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features.max(1));
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn is_classifier(&self) -> bool {
        self.criterion == Criterion::Gini
    }

    pub fn depth(&self) -> usize {
        self.root.as_ref().map_or(0, TreeNode::depth)
    }

    /// Fit on the samples listed in `indices` (duplicates allowed, as in a bootstrap)
    pub(crate) fn fit_indices(&mut self, x: &Array2<f64>, y: &Array1<f64>, indices: Vec<usize>) -> Result<()> {
        check_fit_input(x, y)?;
        self.n_features = x.ncols();
        if self.is_classifier() {
            self.n_classes = n_classes(y)?;
        }
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let root = self.build(x, y, indices, 0, &mut rng);
        self.root = Some(root);
        Ok(())
    }

    fn build(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: Vec<usize>,
        depth: usize,
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n_samples = indices.len();
        let leaf = TreeNode::Leaf {
            value: self.leaf_value(y, &indices),
            n_samples,
        };

        let depth_reached = self.max_depth.is_some_and(|d| depth >= d);
        if depth_reached || n_samples < self.min_samples_split || n_samples < 2 * self.min_samples_leaf {
            return leaf;
        }

        let Some((feature_idx, threshold)) = self.best_split(x, y, &indices, rng) else {
            return leaf;
        };

        let (left, right): (Vec<usize>, Vec<usize>) =
            indices.into_iter().partition(|&i| x[[i, feature_idx]] <= threshold);

        TreeNode::Split {
            feature_idx,
            threshold,
            left: Box::new(self.build(x, y, left, depth + 1, rng)),
            right: Box::new(self.build(x, y, right, depth + 1, rng)),
            n_samples,
        }
    }

    fn leaf_value(&self, y: &Array1<f64>, indices: &[usize]) -> f64 {
        if self.is_classifier() {
            let mut counts = vec![0usize; self.n_classes];
            for &i in indices {
                counts[y[i] as usize] += 1;
            }
            argmax_count(&counts) as f64
        } else if indices.is_empty() {
            0.0
        } else {
            indices.iter().map(|&i| y[i]).sum::<f64>() / indices.len() as f64
        }
    }

    fn best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        rng: &mut ChaCha8Rng,
    ) -> Option<(usize, f64)> {
        let mut features: Vec<usize> = (0..self.n_features).collect();
        if let Some(k) = self.max_features {
            if k < self.n_features {
                features.shuffle(rng);
                features.truncate(k);
            }
        }

        let parent = self.impurity_of(y, indices);
        let mut best: Option<(usize, f64, f64)> = None;
        let mut sorted = indices.to_vec();

        for &feature in &features {
            sorted.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));
            if let Some((threshold, score)) = self.sweep(x, y, &sorted, feature) {
                if score < parent - 1e-12 && best.map_or(true, |(_, _, s)| score < s) {
                    best = Some((feature, threshold, score));
                }
            }
        }
        best.map(|(f, t, _)| (f, t))
    }

    /// Best threshold on one feature and its summed child impurity
    fn sweep(&self, x: &Array2<f64>, y: &Array1<f64>, sorted: &[usize], feature: usize) -> Option<(f64, f64)> {
        let n = sorted.len();
        let min_leaf = self.min_samples_leaf;
        let mut best: Option<(f64, f64)> = None;

        let consider = |pos: usize, score: f64, best: &mut Option<(f64, f64)>| {
            let lo = x[[sorted[pos - 1], feature]];
            let hi = x[[sorted[pos], feature]];
            if lo < hi && pos >= min_leaf && n - pos >= min_leaf && best.map_or(true, |(_, s)| score < s) {
                let mut threshold = lo + (hi - lo) / 2.0;
                if threshold >= hi {
                    threshold = lo;
                }
                *best = Some((threshold, score));
            }
        };

        if self.is_classifier() {
            let mut left = vec![0usize; self.n_classes];
            let mut right = vec![0usize; self.n_classes];
            for &i in sorted {
                right[y[i] as usize] += 1;
            }
            for pos in 1..n {
                let label = y[sorted[pos - 1]] as usize;
                left[label] += 1;
                right[label] -= 1;
                let score = pos as f64 * gini(&left, pos) + (n - pos) as f64 * gini(&right, n - pos);
                consider(pos, score, &mut best);
            }
        } else {
            let (mut l_sum, mut l_sq) = (0.0, 0.0);
            let r_sum_total: f64 = sorted.iter().map(|&i| y[i]).sum();
            let r_sq_total: f64 = sorted.iter().map(|&i| y[i] * y[i]).sum();
            for pos in 1..n {
                let v = y[sorted[pos - 1]];
                l_sum += v;
                l_sq += v * v;
                let (r_sum, r_sq) = (r_sum_total - l_sum, r_sq_total - l_sq);
                let score = (l_sq - l_sum * l_sum / pos as f64) + (r_sq - r_sum * r_sum / (n - pos) as f64);
                consider(pos, score, &mut best);
            }
        }
        best
    }

    /// Impurity of a node, scaled by its sample count to match `sweep`
    fn impurity_of(&self, y: &Array1<f64>, indices: &[usize]) -> f64 {
        let n = indices.len();
        if n == 0 {
            return 0.0;
        }
        if self.is_classifier() {
            let mut counts = vec![0usize; self.n_classes];
            for &i in indices {
                counts[y[i] as usize] += 1;
            }
            n as f64 * gini(&counts, n)
        } else {
            let sum: f64 = indices.iter().map(|&i| y[i]).sum();
            let sq: f64 = indices.iter().map(|&i| y[i] * y[i]).sum();
            sq - sum * sum / n as f64
        }
    }
}

fn gini(counts: &[usize], n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    1.0 - counts.iter().map(|&c| (c as f64 / n).powi(2)).sum::<f64>()
}

impl Model for DecisionTree {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.fit_indices(x, y, (0..x.nrows()).collect())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(PipelineError::ModelNotFitted)?;
        check_n_features(self.n_features, x)?;
        Ok(x.rows()
            .into_iter()
            .map(|row| match row.as_slice() {
                Some(slice) => root.predict_row(slice),
                None => root.predict_row(&row.to_vec()),
            })
            .collect())
    }
}
