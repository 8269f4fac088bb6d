//! Linear model implementations

use super::models::{argmax, check_fit_input, check_n_features, n_classes, Model};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Solve the square system `a * x = b` by Gaussian elimination with partial
/// pivoting. Returns `None` when the matrix is singular.
fn gaussian_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }

    let mut m = a.clone();
    let mut rhs = b.clone();

    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| m[[i, col]].abs().total_cmp(&m[[j, col]].abs()))?;
        if m[[pivot, col]].abs() < 1e-12 {
            return None;
        }
        if pivot != col {
            for j in 0..n {
                m.swap([col, j], [pivot, j]);
            }
            rhs.swap(col, pivot);
        }

        for row in col + 1..n {
            let factor = m[[row, col]] / m[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for j in col..n {
                m[[row, j]] -= factor * m[[col, j]];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        let mut sum = rhs[i];
        for j in i + 1..n {
            sum -= m[[i, j]] * x[j];
        }
        x[i] = sum / m[[i, i]];
    }
    Some(x)
}

/// Ordinary least squares with an intercept
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRegression {
    pub coefficients: Option<Array1<f64>>,
    pub intercept: f64,
    /// Relative ridge term added to the diagonal of the normal equations so
    /// collinear or constant features still produce a solution
    pub alpha: f64,
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearRegression {
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: 0.0,
            alpha: 1e-10,
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }
}

impl Model for LinearRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let n_features = x.ncols();

        let x_mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(n_features));
        let y_mean = y.mean().unwrap_or(0.0);
        let xc = x - &x_mean;
        let yc = y - y_mean;

        let mut xtx = xc.t().dot(&xc);
        for i in 0..n_features {
            let diag = xtx[[i, i]];
            xtx[[i, i]] += if diag > 0.0 { self.alpha * diag } else { self.alpha };
        }
        let xty = xc.t().dot(&yc);

        let coefficients = if n_features == 0 {
            Array1::zeros(0)
        } else {
            gaussian_solve(&xtx, &xty).ok_or_else(|| {
                PipelineError::TrainingError("normal equations are singular".to_string())
            })?
        };

        self.intercept = y_mean - x_mean.dot(&coefficients);
        self.coefficients = Some(coefficients);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self.coefficients.as_ref().ok_or(PipelineError::ModelNotFitted)?;
        check_n_features(coefficients.len(), x)?;
        Ok(x.dot(coefficients) + self.intercept)
    }
}

/// Multinomial logistic regression with L2 penalty
///
/// Minimises `C * sum(log_loss) + 0.5 * ||W||^2` by full-batch gradient
/// descent on standardised features. Binary problems use the same softmax
/// formulation with two classes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// `weights[[feature, class]]`
    weights: Option<Array2<f64>>,
    intercepts: Array1<f64>,
    means: Array1<f64>,
    stds: Array1<f64>,
    pub c: f64,
    pub max_iter: usize,
    pub learning_rate: f64,
    pub tol: f64,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self {
            weights: None,
            intercepts: Array1::zeros(0),
            means: Array1::zeros(0),
            stds: Array1::zeros(0),
            c: 1.0,
            max_iter: 1000,
            learning_rate: 0.5,
            tol: 1e-6,
        }
    }

    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    fn standardize(&self, x: &Array2<f64>) -> Array2<f64> {
        (x - &self.means) / &self.stds
    }

    fn softmax(scores: &mut Array2<f64>) {
        for mut row in scores.axis_iter_mut(Axis(0)) {
            let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            row.mapv_inplace(|v| (v - max).exp());
            let sum = row.sum();
            row.mapv_inplace(|v| v / sum);
        }
    }

    /// Class probabilities, one row per sample
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let weights = self.weights.as_ref().ok_or(PipelineError::ModelNotFitted)?;
        check_n_features(weights.nrows(), x)?;
        let mut scores = self.standardize(x).dot(weights) + &self.intercepts;
        Self::softmax(&mut scores);
        Ok(scores)
    }
}

impl Model for LogisticRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let n_classes = n_classes(y)?;
        let (n_samples, n_features) = x.dim();

        self.means = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(n_features));
        self.stds = x.std_axis(Axis(0), 0.0).mapv(|s| if s > 0.0 { s } else { 1.0 });
        let z = self.standardize(x);

        let targets = Array2::from_shape_fn((n_samples, n_classes), |(i, k)| {
            if y[i] as usize == k { 1.0 } else { 0.0 }
        });

        let mut weights = Array2::<f64>::zeros((n_features, n_classes));
        let mut intercepts = Array1::<f64>::zeros(n_classes);
        // penalty of the objective divided by C * n_samples
        let penalty = 1.0 / (self.c * n_samples as f64);

        for _ in 0..self.max_iter {
            let mut probs = z.dot(&weights) + &intercepts;
            Self::softmax(&mut probs);
            let residual = probs - &targets;

            let grad_w = z.t().dot(&residual) / n_samples as f64 + &weights * penalty;
            let grad_b = residual.sum_axis(Axis(0)) / n_samples as f64;

            weights.scaled_add(-self.learning_rate, &grad_w);
            intercepts.scaled_add(-self.learning_rate, &grad_b);

            let max_grad = grad_w
                .iter()
                .chain(grad_b.iter())
                .fold(0.0f64, |acc, g| acc.max(g.abs()));
            if max_grad < self.tol {
                break;
            }
        }

        self.weights = Some(weights);
        self.intercepts = intercepts;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let probs = self.predict_proba(x)?;
        Ok(probs
            .axis_iter(Axis(0))
            .map(|row| argmax(&row.to_vec()) as f64)
            .collect())
    }
}
