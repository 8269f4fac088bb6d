//! Support vector classifier
//!
//! RBF-kernel SVM trained with a simplified SMO solver. Multiclass problems
//! are handled one-vs-rest; the class with the largest decision value wins.
//! Features are standardised internally before computing the kernel.

use super::models::{argmax, check_fit_input, check_n_features, n_classes, Model};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// One binary decision function `f(x) = sum_i coef_i K(sv_i, x) + b`
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BinarySvm {
    support_vectors: Array2<f64>,
    /// alpha_i * y_i of each support vector
    dual_coef: Vec<f64>,
    intercept: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMClassifier {
    pub c: f64,
    pub tol: f64,
    pub max_passes: usize,
    pub max_iter: usize,
    pub random_state: u64,
    gamma: f64,
    means: Vec<f64>,
    stds: Vec<f64>,
    machines: Vec<BinarySvm>,
    n_classes: usize,
}

impl Default for SVMClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl SVMClassifier {
    pub fn new() -> Self {
        Self {
            c: 1.0,
            tol: 1e-3,
            max_passes: 5,
            max_iter: 200,
            random_state: 0,
            gamma: 1.0,
            means: Vec::new(),
            stds: Vec::new(),
            machines: Vec::new(),
            n_classes: 0,
        }
    }

    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    fn standardize(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut z = x.clone();
        for (j, mut col) in z.axis_iter_mut(Axis(1)).enumerate() {
            col.mapv_inplace(|v| (v - self.means[j]) / self.stds[j]);
        }
        z
    }

    fn kernel(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        let dist: f64 = a.iter().zip(b.iter()).map(|(p, q)| (p - q).powi(2)).sum();
        (-self.gamma * dist).exp()
    }

    fn train_binary(&self, z: &Array2<f64>, gram: &Array2<f64>, y: &[f64], rng: &mut ChaCha8Rng) -> BinarySvm {
        let n = y.len();
        let mut alpha = vec![0.0; n];
        let mut b = 0.0;
        // errors[i] = f(x_i) - y_i, kept in sync with alpha and b
        let mut errors: Vec<f64> = y.iter().map(|v| -v).collect();

        let mut passes = 0;
        let mut iterations = 0;
        while passes < self.max_passes && iterations < self.max_iter {
            iterations += 1;
            let mut changed = 0;
            for i in 0..n {
                let e_i = errors[i];
                let violates = (y[i] * e_i < -self.tol && alpha[i] < self.c) || (y[i] * e_i > self.tol && alpha[i] > 0.0);
                if !violates || n < 2 {
                    continue;
                }

                let mut j = rng.gen_range(0..n - 1);
                if j >= i {
                    j += 1;
                }
                let e_j = errors[j];
                let (a_i_old, a_j_old) = (alpha[i], alpha[j]);

                let (low, high) = if y[i] != y[j] {
                    ((a_j_old - a_i_old).max(0.0), (self.c + a_j_old - a_i_old).min(self.c))
                } else {
                    ((a_i_old + a_j_old - self.c).max(0.0), (a_i_old + a_j_old).min(self.c))
                };
                if (high - low).abs() < 1e-12 {
                    continue;
                }

                let eta = 2.0 * gram[[i, j]] - gram[[i, i]] - gram[[j, j]];
                if eta >= 0.0 {
                    continue;
                }

                let a_j = (a_j_old - y[j] * (e_i - e_j) / eta).clamp(low, high);
                if (a_j - a_j_old).abs() < 1e-5 {
                    continue;
                }
                let a_i = a_i_old + y[i] * y[j] * (a_j_old - a_j);
                alpha[i] = a_i;
                alpha[j] = a_j;

                let d_i = y[i] * (a_i - a_i_old);
                let d_j = y[j] * (a_j - a_j_old);
                let b1 = b - e_i - d_i * gram[[i, i]] - d_j * gram[[i, j]];
                let b2 = b - e_j - d_i * gram[[i, j]] - d_j * gram[[j, j]];
                let b_new = if a_i > 0.0 && a_i < self.c {
                    b1
                } else if a_j > 0.0 && a_j < self.c {
                    b2
                } else {
                    (b1 + b2) / 2.0
                };
                for (t, e) in errors.iter_mut().enumerate() {
                    *e += d_i * gram[[i, t]] + d_j * gram[[j, t]] + (b_new - b);
                }
                b = b_new;
                changed += 1;
            }
            passes = if changed == 0 { passes + 1 } else { 0 };
        }

        let support: Vec<usize> = (0..n).filter(|&i| alpha[i] > 1e-8).collect();
        let support_vectors = z.select(Axis(0), &support);
        BinarySvm {
            support_vectors,
            dual_coef: support.iter().map(|&i| alpha[i] * y[i]).collect(),
            intercept: b,
        }
    }

    fn decision_function(&self, machine: &BinarySvm, row: ArrayView1<f64>) -> f64 {
        machine
            .support_vectors
            .axis_iter(Axis(0))
            .zip(&machine.dual_coef)
            .map(|(sv, coef)| coef * self.kernel(sv, row))
            .sum::<f64>()
            + machine.intercept
    }
}

impl Model for SVMClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        self.n_classes = n_classes(y)?;
        let n = x.nrows();

        self.means = x.mean_axis(Axis(0)).map(|m| m.to_vec()).unwrap_or_default();
        self.stds = x
            .std_axis(Axis(0), 0.0)
            .iter()
            .map(|&s| if s > 0.0 { s } else { 1.0 })
            .collect();
        let z = self.standardize(x);

        // gamma = 1 / (n_features * Var(X))
        let var = z.var(0.0);
        self.gamma = if var > 0.0 { 1.0 / (z.ncols() as f64 * var) } else { 1.0 };

        let mut gram = Array2::zeros((n, n));
        for i in 0..n {
            for j in i..n {
                let k = self.kernel(z.row(i), z.row(j));
                gram[[i, j]] = k;
                gram[[j, i]] = k;
            }
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        // two classes need a single machine separating class 1 from class 0
        let positives: Vec<usize> = if self.n_classes == 2 { vec![1] } else { (0..self.n_classes).collect() };
        self.machines = positives
            .into_iter()
            .map(|k| {
                let labels: Vec<f64> = y.iter().map(|&v| if v as usize == k { 1.0 } else { -1.0 }).collect();
                self.train_binary(&z, &gram, &labels, &mut rng)
            })
            .collect();
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.machines.is_empty() {
            return Err(PipelineError::ModelNotFitted);
        }
        check_n_features(self.means.len(), x)?;
        let z = self.standardize(x);

        Ok(z.axis_iter(Axis(0))
            .map(|row| {
                if self.n_classes == 2 {
                    if self.decision_function(&self.machines[0], row) > 0.0 { 1.0 } else { 0.0 }
                } else if self.n_classes == 1 {
                    0.0
                } else {
                    let scores: Vec<f64> = self.machines.iter().map(|m| self.decision_function(m, row)).collect();
                    argmax(&scores) as f64
                }
            })
            .collect())
    }
}
