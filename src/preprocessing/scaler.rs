//! Feature scaling for dense matrices

use crate::error::{EvalError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Standard scaling (z-score normalization): (x - mean) / std
///
/// Uses the population standard deviation. Constant columns get a scale of
/// one so they pass through centred instead of dividing by zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Option<Array1<f64>>,
    scale: Option<Array1<f64>>,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit the scaler to the data
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        if x.nrows() == 0 {
            return Err(EvalError::InvalidInput("cannot fit scaler on zero rows".to_string()));
        }
        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| EvalError::ComputationError("mean of empty axis".to_string()))?;
        let scale = x.std_axis(Axis(0), 0.0).mapv(|s| if s > 0.0 { s } else { 1.0 });

        self.mean = Some(mean);
        self.scale = Some(scale);
        Ok(self)
    }

    /// Transform the data
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (mean, scale) = match (&self.mean, &self.scale) {
            (Some(m), Some(s)) => (m, s),
            _ => return Err(EvalError::ModelNotFitted),
        };
        if x.ncols() != mean.len() {
            return Err(EvalError::ShapeError {
                expected: format!("{} columns", mean.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }
        Ok((x - &mean.view().insert_axis(Axis(0))) / &scale.view().insert_axis(Axis(0)))
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    pub fn is_fitted(&self) -> bool {
        self.mean.is_some()
    }
}
