//! Linear Support Vector Machine
//!
//! Squared-hinge linear SVM trained with dual coordinate descent. The
//! intercept is learned as the weight of a constant feature and is therefore
//! regularised together with the coefficients. Inputs are standardised
//! internally.

use crate::error::{EvalError, Result};
use crate::preprocessing::StandardScaler;
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use super::models::{check_binary_fit_input, check_n_features, threshold_labels, Capabilities, Classifier};

/// Linear SVM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMConfig {
    /// Regularization parameter (C)
    pub c: f64,
    /// Stop when the projected gradient spread falls below this
    pub tol: f64,
    /// Maximum number of passes over the dual variables
    pub max_iter: usize,
    /// Seed for the coordinate visiting order
    pub random_state: Option<u64>,
}

impl Default for SVMConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            tol: 1e-4,
            max_iter: 1000,
            random_state: None,
        }
    }
}

/// Linear Support Vector Classifier (binary)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearSVC {
    config: SVMConfig,
    weights: Option<Array1<f64>>,
    bias: f64,
    scaler: StandardScaler,
    n_iter: usize,
}

impl Default for LinearSVC {
    fn default() -> Self {
        Self::new(SVMConfig::default())
    }
}

impl LinearSVC {
    pub fn new(config: SVMConfig) -> Self {
        Self {
            config,
            weights: None,
            bias: 0.0,
            scaler: StandardScaler::new(),
            n_iter: 0,
        }
    }

    pub fn with_c(mut self, c: f64) -> Self {
        self.config.c = c;
        self
    }

    /// Coefficients in the standardised feature space
    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.weights.as_ref()
    }

    /// Passes run by the last fit
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }
}

impl Classifier for LinearSVC {
    fn kind(&self) -> &'static str {
        "LinearSVC"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE.with_decision_function()
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_binary_fit_input(x, y)?;
        if !(self.config.c > 0.0) || self.config.max_iter == 0 {
            return Err(EvalError::InvalidParameter {
                name: "c/max_iter".to_string(),
                value: format!("{}/{}", self.config.c, self.config.max_iter),
                reason: "both must be positive".to_string(),
            });
        }

        let x_scaled = self.scaler.fit_transform(x)?;
        let (n_samples, n_features) = x_scaled.dim();
        let y_signed: Vec<f64> = y.iter().map(|&v| if v > 0.5 { 1.0 } else { -1.0 }).collect();

        // squared hinge: diagonal term 1/(2C), no upper bound on alpha
        let diag = 0.5 / self.config.c;
        let q_diag: Vec<f64> = x_scaled
            .rows()
            .into_iter()
            .map(|row| row.dot(&row) + 1.0 + diag)
            .collect();

        let mut alphas = vec![0.0; n_samples];
        let mut w = Array1::<f64>::zeros(n_features);
        let mut b = 0.0;
        let mut order: Vec<usize> = (0..n_samples).collect();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state.unwrap_or(0));

        self.n_iter = 0;
        for _ in 0..self.config.max_iter {
            self.n_iter += 1;
            order.shuffle(&mut rng);
            let mut pg_max = f64::NEG_INFINITY;
            let mut pg_min = f64::INFINITY;

            for &i in &order {
                let xi = x_scaled.row(i);
                let yi = y_signed[i];
                let grad = yi * (xi.dot(&w) + b) - 1.0 + diag * alphas[i];
                let projected = if alphas[i] == 0.0 { grad.min(0.0) } else { grad };

                pg_max = pg_max.max(projected);
                pg_min = pg_min.min(projected);

                if projected.abs() > 1e-12 {
                    let old = alphas[i];
                    alphas[i] = (old - grad / q_diag[i]).max(0.0);
                    let delta = (alphas[i] - old) * yi;
                    w.scaled_add(delta, &xi);
                    b += delta;
                }
            }

            if pg_max - pg_min <= self.config.tol {
                break;
            }
        }

        if self.n_iter == self.config.max_iter {
            tracing::debug!(max_iter = self.config.max_iter, "LinearSVC reached max_iter before converging");
        }

        self.weights = Some(w);
        self.bias = b;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(threshold_labels(&self.decision_function(x)?, 0.0))
    }

    fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let w = self.weights.as_ref().ok_or(EvalError::ModelNotFitted)?;
        check_n_features(x, w.len())?;
        let scaled = self.scaler.transform(x)?;
        Ok(scaled.dot(w) + self.bias)
    }
}
