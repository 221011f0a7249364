//! Stochastic Gradient Descent (SGD) linear classifier
//!
//! Supports several loss functions and learning rate schedules. Processes one
//! sample at a time over a seeded shuffle of the training set. Inputs are
//! standardised internally.

use super::models::{check_binary_fit_input, check_n_features, sigmoid, threshold_labels, Capabilities, Capability, Classifier};
use crate::error::{EvalError, Result};
use crate::preprocessing::StandardScaler;
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SGDLoss {
    Hinge,         // linear SVM
    Log,           // logistic regression
    ModifiedHuber, // smooth hinge, gives probability estimates
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LearningRateSchedule {
    Constant,
    Optimal,    // 1 / (alpha * (t + t0))
    InvScaling, // eta0 / t^power_t
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SGDConfig {
    pub loss: SGDLoss,
    pub learning_rate: LearningRateSchedule,
    pub eta0: f64,
    pub alpha: f64, // L2 regularization
    /// Number of passes over the training data
    pub max_iter: usize,
    /// Stop early when the epoch loss improves by less than this; `None` runs every epoch
    pub tol: Option<f64>,
    pub power_t: f64,
    pub random_state: Option<u64>,
}

impl Default for SGDConfig {
    fn default() -> Self {
        Self {
            loss: SGDLoss::Hinge,
            learning_rate: LearningRateSchedule::Optimal,
            eta0: 0.01,
            alpha: 0.0001,
            max_iter: 1000,
            tol: Some(1e-3),
            power_t: 0.5,
            random_state: None,
        }
    }
}

impl SGDConfig {
    /// Initial offset for the optimal schedule, using the usual heuristic of
    /// a step size comparable to the typical weight magnitude.
    fn optimal_t0(&self) -> f64 {
        let typw = (1.0 / self.alpha.sqrt()).sqrt();
        let eta0 = typw / Self::loss_slope(self.loss, -typw, 1.0).abs().max(1.0);
        1.0 / (eta0 * self.alpha)
    }

    fn step_size(&self, t: usize, t0: f64) -> f64 {
        match self.learning_rate {
            LearningRateSchedule::Constant => self.eta0,
            LearningRateSchedule::Optimal => 1.0 / (self.alpha * (t0 + t as f64 - 1.0)),
            LearningRateSchedule::InvScaling => self.eta0 / (t as f64).powf(self.power_t),
        }
    }

    /// Derivative of the loss with respect to the margin `p` for a signed label `y`
    fn loss_slope(loss: SGDLoss, p: f64, y: f64) -> f64 {
        let z = p * y;
        match loss {
            SGDLoss::Hinge => {
                if z < 1.0 {
                    -y
                } else {
                    0.0
                }
            }
            SGDLoss::Log => -y * sigmoid(-z),
            SGDLoss::ModifiedHuber => {
                if z >= 1.0 {
                    0.0
                } else if z >= -1.0 {
                    -2.0 * (1.0 - z) * y
                } else {
                    -4.0 * y
                }
            }
        }
    }

    fn loss_value(loss: SGDLoss, p: f64, y: f64) -> f64 {
        let z = p * y;
        match loss {
            SGDLoss::Hinge => (1.0 - z).max(0.0),
            SGDLoss::Log => z.min(0.0).abs() + (-z.abs()).exp().ln_1p(),
            SGDLoss::ModifiedHuber => {
                if z >= 1.0 {
                    0.0
                } else if z >= -1.0 {
                    (1.0 - z).powi(2)
                } else {
                    -4.0 * z
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SGDClassifier {
    pub config: SGDConfig,
    pub weights: Option<Array1<f64>>,
    pub bias: f64,
    /// Epochs actually run by the last fit
    pub n_iter: usize,
    scaler: StandardScaler,
}

impl Default for SGDClassifier {
    fn default() -> Self {
        Self::new(SGDConfig::default())
    }
}

impl SGDClassifier {
    pub fn new(config: SGDConfig) -> Self {
        Self {
            config,
            weights: None,
            bias: 0.0,
            n_iter: 0,
            scaler: StandardScaler::new(),
        }
    }
}

impl Classifier for SGDClassifier {
    fn kind(&self) -> &'static str {
        "SGDClassifier"
    }

    fn capabilities(&self) -> Capabilities {
        let caps = Capabilities::NONE.with_decision_function();
        match self.config.loss {
            SGDLoss::Hinge => caps,
            SGDLoss::Log | SGDLoss::ModifiedHuber => caps.with_probability(),
        }
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_binary_fit_input(x, y)?;
        if !(self.config.alpha > 0.0) || self.config.max_iter == 0 {
            return Err(EvalError::InvalidParameter {
                name: "alpha/max_iter".to_string(),
                value: format!("{}/{}", self.config.alpha, self.config.max_iter),
                reason: "both must be positive".to_string(),
            });
        }

        let x_scaled = self.scaler.fit_transform(x)?;
        let n = x_scaled.nrows();
        let y_signed: Vec<f64> = y.iter().map(|&v| if v > 0.5 { 1.0 } else { -1.0 }).collect();

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state.unwrap_or(0));
        let mut w = Array1::<f64>::zeros(x_scaled.ncols());
        let mut b = 0.0;
        let mut indices: Vec<usize> = (0..n).collect();
        let t0 = self.config.optimal_t0();
        let mut t = 1usize;
        let mut best_loss = f64::INFINITY;

        self.n_iter = 0;
        for _epoch in 0..self.config.max_iter {
            self.n_iter += 1;
            indices.shuffle(&mut rng);
            let mut epoch_loss = 0.0;

            for &i in &indices {
                let xi = x_scaled.row(i);
                let yi = y_signed[i];
                let margin = xi.dot(&w) + b;
                let eta = self.config.step_size(t, t0);

                epoch_loss += SGDConfig::loss_value(self.config.loss, margin, yi);
                let slope = SGDConfig::loss_slope(self.config.loss, margin, yi);

                w *= 1.0 - eta * self.config.alpha;
                if slope != 0.0 {
                    w.scaled_add(-eta * slope, &xi);
                    b -= eta * slope;
                }
                t += 1;
            }

            if !w.iter().all(|v| v.is_finite()) || !b.is_finite() {
                return Err(EvalError::TrainingError("SGD weights diverged".to_string()));
            }
            if let Some(tol) = self.config.tol {
                if epoch_loss > best_loss - tol * n as f64 {
                    break;
                }
                best_loss = best_loss.min(epoch_loss);
            }
        }

        self.weights = Some(w);
        self.bias = b;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(threshold_labels(&self.decision_function(x)?, 0.0))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let scores = self.decision_function(x)?;
        match self.config.loss {
            SGDLoss::Log => Ok(scores.mapv(sigmoid)),
            SGDLoss::ModifiedHuber => Ok(scores.mapv(|s| (s.clamp(-1.0, 1.0) + 1.0) / 2.0)),
            SGDLoss::Hinge => Err(EvalError::unsupported(self.kind(), Capability::Probability)),
        }
    }

    fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let w = self.weights.as_ref().ok_or(EvalError::ModelNotFitted)?;
        check_n_features(x, w.len())?;
        let scaled = self.scaler.transform(x)?;
        Ok(scaled.dot(w) + self.bias)
    }
}
