//! Linear classifiers

use super::models::{check_binary_fit_input, check_n_features, sigmoid, threshold_labels, Capabilities, Classifier};
use crate::error::{EvalError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Lower-triangular Cholesky factor of a symmetric positive-definite matrix.
fn cholesky_factor(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    let mut l = Array2::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }
    Some(l)
}

fn cholesky_substitute(l: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    let n = l.nrows();

    // L * y = b
    let mut y = Array1::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * y[j];
        }
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    // L^T * x = y
    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (y[i] - sum) / l[[i, i]];
    }
    x
}

/// Gauss-Jordan solve with partial pivoting, used when Cholesky fails.
fn gauss_jordan_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    let mut aug = Array2::zeros((n, n + 1));
    for i in 0..n {
        for j in 0..n {
            aug[[i, j]] = a[[i, j]];
        }
        aug[[i, n]] = b[i];
    }

    for col in 0..n {
        let mut pivot_row = col;
        for row in col + 1..n {
            if aug[[row, col]].abs() > aug[[pivot_row, col]].abs() {
                pivot_row = row;
            }
        }
        if aug[[pivot_row, col]].abs() < 1e-12 {
            return None;
        }
        if pivot_row != col {
            for j in 0..=n {
                aug.swap([col, j], [pivot_row, j]);
            }
        }

        let pivot = aug[[col, col]];
        for j in 0..=n {
            aug[[col, j]] /= pivot;
        }
        for row in 0..n {
            if row != col {
                let factor = aug[[row, col]];
                if factor != 0.0 {
                    for j in 0..=n {
                        aug[[row, j]] -= factor * aug[[col, j]];
                    }
                }
            }
        }
    }

    Some(aug.column(n).to_owned())
}

/// Solve a symmetric system `A x = b`.
///
/// Tries Cholesky first, then Cholesky with a small ridge on the diagonal,
/// then Gauss-Jordan. Returns a computation error if the matrix is singular.
pub(crate) fn solve_symmetric(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return Err(EvalError::ShapeError {
            expected: format!("{}x{} system", n, n),
            actual: format!("{}x{} matrix with {} rhs", a.nrows(), a.ncols(), b.len()),
        });
    }

    if let Some(l) = cholesky_factor(a) {
        return Ok(cholesky_substitute(&l, b));
    }

    let ridge = 1e-8 * a.diag().iter().map(|v| v.abs()).sum::<f64>().max(1.0) / n as f64;
    let mut a_reg = a.clone();
    for k in 0..n {
        a_reg[[k, k]] += ridge;
    }
    if let Some(l) = cholesky_factor(&a_reg) {
        return Ok(cholesky_substitute(&l, b));
    }

    gauss_jordan_solve(a, b)
        .ok_or_else(|| EvalError::ComputationError("Singular matrix".to_string()))
}

/// Prepend a column of ones
fn with_intercept_column(x: &Array2<f64>) -> Array2<f64> {
    let mut out = Array2::ones((x.nrows(), x.ncols() + 1));
    out.slice_mut(ndarray::s![.., 1..]).assign(x);
    out
}

/// Logistic regression for binary classification.
///
/// Minimises the L2-penalised log loss `sum(loss) + ||w||^2 / (2C)` with
/// Newton's method and a backtracking line search. The intercept is not
/// penalised. Works on raw (unscaled) features.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Fitted coefficients
    pub coefficients: Option<Array1<f64>>,
    /// Fitted intercept
    pub intercept: Option<f64>,
    /// Inverse regularization strength
    pub c: f64,
    /// Maximum Newton iterations
    pub max_iter: usize,
    /// Convergence tolerance on the largest parameter update
    pub tol: f64,
    /// Number of Newton iterations used by the last fit
    pub n_iter: usize,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    /// Create a new logistic regression model
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: None,
            c: 1.0,
            max_iter: 100,
            tol: 1e-8,
            n_iter: 0,
        }
    }

    /// Set inverse regularization strength
    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    /// Set maximum iterations
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    fn objective(xb: &Array2<f64>, y: &Array1<f64>, w: &Array1<f64>, lambda: f64) -> f64 {
        let z = xb.dot(w);
        let loss: f64 = z
            .iter()
            .zip(y.iter())
            // log(1 + exp(z)) - y*z, written to avoid overflow
            .map(|(&zi, &yi)| zi.max(0.0) + (-zi.abs()).exp().ln_1p() - yi * zi)
            .sum();
        let penalty: f64 = w.iter().skip(1).map(|v| v * v).sum::<f64>() * lambda / 2.0;
        loss + penalty
    }

    fn fitted(&self) -> Result<(&Array1<f64>, f64)> {
        match (&self.coefficients, self.intercept) {
            (Some(c), Some(b)) => Ok((c, b)),
            _ => Err(EvalError::ModelNotFitted),
        }
    }
}

impl Classifier for LogisticRegression {
    fn kind(&self) -> &'static str {
        "LogisticRegression"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE.with_probability().with_decision_function()
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_binary_fit_input(x, y)?;
        if self.c <= 0.0 {
            return Err(EvalError::InvalidParameter {
                name: "C".to_string(),
                value: self.c.to_string(),
                reason: "must be positive".to_string(),
            });
        }

        let xb = with_intercept_column(x);
        let n_params = xb.ncols();
        let lambda = 1.0 / self.c;
        let mut w = Array1::<f64>::zeros(n_params);
        let mut current = Self::objective(&xb, y, &w, lambda);

        self.n_iter = 0;
        for iter in 0..self.max_iter {
            self.n_iter = iter + 1;
            let p = xb.dot(&w).mapv(sigmoid);

            let mut grad = xb.t().dot(&(&p - y));
            for j in 1..n_params {
                grad[j] += lambda * w[j];
            }

            let weights = p.mapv(|pi| (pi * (1.0 - pi)).max(1e-12));
            let weighted = &xb * &weights.view().insert_axis(Axis(1));
            let mut hessian = xb.t().dot(&weighted);
            for j in 1..n_params {
                hessian[[j, j]] += lambda;
            }
            hessian[[0, 0]] += 1e-10;

            let step = solve_symmetric(&hessian, &grad)?;

            let mut t = 1.0;
            let mut candidate = &w - &step;
            let mut value = Self::objective(&xb, y, &candidate, lambda);
            while value > current && t > 1e-6 {
                t *= 0.5;
                candidate = &w - &(&step * t);
                value = Self::objective(&xb, y, &candidate, lambda);
            }

            let max_update = step.iter().fold(0.0f64, |m, v| m.max((v * t).abs()));
            w = candidate;
            current = value;
            if max_update < self.tol {
                break;
            }
        }

        self.intercept = Some(w[0]);
        self.coefficients = Some(w.slice(ndarray::s![1..]).to_owned());
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(threshold_labels(&self.decision_function(x)?, 0.0))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.decision_function(x)?.mapv(sigmoid))
    }

    fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (coefficients, intercept) = self.fitted()?;
        check_n_features(x, coefficients.len())?;
        Ok(x.dot(coefficients) + intercept)
    }
}

/// Ridge classifier: ridge regression on targets mapped to {-1, +1}.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RidgeClassifier {
    pub coefficients: Option<Array1<f64>>,
    pub intercept: Option<f64>,
    /// L2 regularization strength
    pub alpha: f64,
}

impl Default for RidgeClassifier {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl RidgeClassifier {
    pub fn new(alpha: f64) -> Self {
        Self {
            coefficients: None,
            intercept: None,
            alpha,
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }
}

impl Classifier for RidgeClassifier {
    fn kind(&self) -> &'static str {
        "RidgeClassifier"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE.with_decision_function()
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_binary_fit_input(x, y)?;
        if self.alpha < 0.0 {
            return Err(EvalError::InvalidParameter {
                name: "alpha".to_string(),
                value: self.alpha.to_string(),
                reason: "must be non-negative".to_string(),
            });
        }

        let target = y.mapv(|v| 2.0 * v - 1.0);
        let x_mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| EvalError::ComputationError("empty training set".to_string()))?;
        let y_mean = target.mean().unwrap_or(0.0);
        let x_c = x - &x_mean.view().insert_axis(Axis(0));
        let y_c = &target - y_mean;

        let mut xtx = x_c.t().dot(&x_c);
        for i in 0..xtx.nrows() {
            xtx[[i, i]] += self.alpha;
        }
        let xty = x_c.t().dot(&y_c);
        let coefficients = solve_symmetric(&xtx, &xty)?;

        self.intercept = Some(y_mean - coefficients.dot(&x_mean));
        self.coefficients = Some(coefficients);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(threshold_labels(&self.decision_function(x)?, 0.0))
    }

    fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (coefficients, intercept) = match (&self.coefficients, self.intercept) {
            (Some(c), Some(b)) => (c, b),
            _ => return Err(EvalError::ModelNotFitted),
        };
        check_n_features(x, coefficients.len())?;
        Ok(x.dot(coefficients) + intercept)
    }
}
