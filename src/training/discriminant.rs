//! Linear discriminant analysis

use super::linear_models::solve_symmetric;
use super::models::{check_binary_fit_input, check_n_features, sigmoid, threshold_labels, Capabilities, Classifier};
use crate::error::{EvalError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Two-class linear discriminant analysis with a shared covariance matrix.
///
/// The shared covariance is the prior-weighted average of the per-class
/// (biased) covariances. The log posterior ratio is linear in `x`, so the
/// decision score is `x . w + b` and the probability is its sigmoid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinearDiscriminantAnalysis {
    pub coefficients: Option<Array1<f64>>,
    pub intercept: Option<f64>,
    /// Class means, row 0 for class 0
    pub means: Option<Array2<f64>>,
    /// Class priors
    pub priors: Option<[f64; 2]>,
}

impl LinearDiscriminantAnalysis {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Classifier for LinearDiscriminantAnalysis {
    fn kind(&self) -> &'static str {
        "LinearDiscriminantAnalysis"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE.with_probability().with_decision_function()
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_binary_fit_input(x, y)?;
        let n_samples = x.nrows() as f64;
        let n_features = x.ncols();

        let mut means = Array2::zeros((2, n_features));
        let mut shared_cov = Array2::<f64>::zeros((n_features, n_features));
        let mut priors = [0.0; 2];

        for class in 0..2 {
            let idx: Vec<usize> = y
                .iter()
                .enumerate()
                .filter(|(_, &v)| v == class as f64)
                .map(|(i, _)| i)
                .collect();
            let xc = x.select(Axis(0), &idx);
            let mean = xc
                .mean_axis(Axis(0))
                .ok_or_else(|| EvalError::ComputationError("empty class".to_string()))?;
            let centred = &xc - &mean.view().insert_axis(Axis(0));
            let prior = idx.len() as f64 / n_samples;
            // prior * (centred^T centred / n_c) == centred^T centred / n
            shared_cov = shared_cov + centred.t().dot(&centred) / n_samples;
            means.row_mut(class).assign(&mean);
            priors[class] = prior;
        }

        let diff = &means.row(1) - &means.row(0);
        let w = solve_symmetric(&shared_cov, &diff)?;
        let midpoint = (&means.row(1) + &means.row(0)) / 2.0;
        let b = -midpoint.dot(&w) + (priors[1] / priors[0]).ln();

        self.coefficients = Some(w);
        self.intercept = Some(b);
        self.means = Some(means);
        self.priors = Some(priors);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(threshold_labels(&self.decision_function(x)?, 0.0))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.decision_function(x)?.mapv(sigmoid))
    }

    fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (w, b) = match (&self.coefficients, self.intercept) {
            (Some(w), Some(b)) => (w, b),
            _ => return Err(EvalError::ModelNotFitted),
        };
        check_n_features(x, w.len())?;
        Ok(x.dot(w) + b)
    }
}
