//! Classifier trait and capability declarations

use crate::error::{EvalError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Optional outputs a classifier may offer on top of fit/predict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    /// Positive-class probability estimates
    Probability,
    /// Signed confidence scores (distance from the decision boundary)
    DecisionFunction,
    /// Per-feature importance weights
    FeatureImportances,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Probability => write!(f, "probability estimates"),
            Capability::DecisionFunction => write!(f, "decision scores"),
            Capability::FeatureImportances => write!(f, "feature importances"),
        }
    }
}

/// The set of optional capabilities a classifier declares up front
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub probability: bool,
    pub decision_function: bool,
    pub feature_importances: bool,
}

impl Capabilities {
    /// Only fit and predict
    pub const NONE: Capabilities = Capabilities {
        probability: false,
        decision_function: false,
        feature_importances: false,
    };

    pub fn with_probability(mut self) -> Self {
        self.probability = true;
        self
    }

    pub fn with_decision_function(mut self) -> Self {
        self.decision_function = true;
        self
    }

    pub fn with_feature_importances(mut self) -> Self {
        self.feature_importances = true;
        self
    }

    /// Whether a given capability is offered
    pub fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::Probability => self.probability,
            Capability::DecisionFunction => self.decision_function,
            Capability::FeatureImportances => self.feature_importances,
        }
    }

    /// Whether the classifier produces any continuous score usable for ranking
    pub fn has_scores(&self) -> bool {
        self.probability || self.decision_function
    }
}

/// Common interface for every binary classifier the harness can drive.
///
/// Labels are `0.0` / `1.0`. The optional methods must only be called when
/// [`Classifier::capabilities`] declares them; the default bodies return
/// [`EvalError::Unsupported`].
pub trait Classifier: Send + Sync {
    /// Short algorithm name, used in logs and errors
    fn kind(&self) -> &'static str;

    /// Optional outputs this classifier provides
    fn capabilities(&self) -> Capabilities;

    /// Fit the classifier to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Predict class labels
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Probability of the positive class for each row
    fn predict_proba(&self, _x: &Array2<f64>) -> Result<Array1<f64>> {
        Err(EvalError::unsupported(self.kind(), Capability::Probability))
    }

    /// Signed decision score for each row; larger means more positive
    fn decision_function(&self, _x: &Array2<f64>) -> Result<Array1<f64>> {
        Err(EvalError::unsupported(self.kind(), Capability::DecisionFunction))
    }

    /// Get feature importances (if available)
    fn feature_importances(&self) -> Option<Array1<f64>> {
        None
    }

    /// Mean accuracy on the given data
    fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        let y_pred = self.predict(x)?;
        if y_pred.len() != y.len() {
            return Err(EvalError::length_mismatch(y_pred.len(), y.len()));
        }
        if y.is_empty() {
            return Err(EvalError::InvalidInput("cannot score an empty set".to_string()));
        }
        let correct = y_pred
            .iter()
            .zip(y.iter())
            .filter(|(p, t)| (*p - *t).abs() < 0.5)
            .count();
        Ok(correct as f64 / y.len() as f64)
    }
}

/// Validate a training set: matching lengths, at least one row, 0/1 labels
/// and both classes present.
pub(crate) fn check_binary_fit_input(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(EvalError::length_mismatch(x.nrows(), y.len()));
    }
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(EvalError::InvalidInput("training set is empty".to_string()));
    }
    if let Some(bad) = y.iter().find(|&&v| v != 0.0 && v != 1.0) {
        return Err(EvalError::InvalidInput(format!(
            "labels must be 0 or 1, found {}",
            bad
        )));
    }
    let positives = y.iter().filter(|&&v| v == 1.0).count();
    if positives == 0 || positives == y.len() {
        return Err(EvalError::TrainingError(
            "training labels contain a single class".to_string(),
        ));
    }
    Ok(())
}

/// Check that a prediction matrix matches the fitted feature count
pub(crate) fn check_n_features(x: &Array2<f64>, n_features: usize) -> Result<()> {
    if x.ncols() != n_features {
        return Err(EvalError::ShapeError {
            expected: format!("{} features", n_features),
            actual: format!("{} features", x.ncols()),
        });
    }
    Ok(())
}

/// Map scores to labels: positive when `score > threshold`, ties go negative
pub(crate) fn threshold_labels(scores: &Array1<f64>, threshold: f64) -> Array1<f64> {
    scores.mapv(|s| if s > threshold { 1.0 } else { 0.0 })
}

pub(crate) fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Normalise an importance vector so it sums to one (left untouched when all zero)
pub(crate) fn normalize_importances(importances: &mut [f64]) {
    let total: f64 = importances.iter().sum();
    if total > 0.0 {
        for imp in importances.iter_mut() {
            *imp /= total;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    struct AlwaysOne;

    impl Classifier for AlwaysOne {
        fn kind(&self) -> &'static str {
            "AlwaysOne"
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities::NONE
        }

        fn fit(&mut self, _x: &Array2<f64>, _y: &Array1<f64>) -> Result<()> {
            Ok(())
        }

        fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
            Ok(Array1::ones(x.nrows()))
        }
    }

    #[test]
    fn test_default_optional_methods_are_unsupported() {
        let model = AlwaysOne;
        let x = array![[1.0], [2.0]];

        let err = model.predict_proba(&x).unwrap_err();
        assert!(matches!(
            err,
            EvalError::Unsupported { capability: Capability::Probability, .. }
        ));
        assert!(model.decision_function(&x).is_err());
        assert!(model.feature_importances().is_none());
    }

    #[test]
    fn test_default_score_is_accuracy() {
        let model = AlwaysOne;
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![1.0, 0.0, 1.0, 1.0];
        assert_eq!(model.score(&x, &y).unwrap(), 0.75);
    }

    #[test]
    fn test_capabilities_builder() {
        let caps = Capabilities::NONE.with_probability().with_feature_importances();
        assert!(caps.supports(Capability::Probability));
        assert!(!caps.supports(Capability::DecisionFunction));
        assert!(caps.supports(Capability::FeatureImportances));
        assert!(caps.has_scores());
        assert!(!Capabilities::NONE.has_scores());
    }

    #[test]
    fn test_check_binary_fit_input() {
        let x = array![[1.0], [2.0], [3.0]];
        assert!(check_binary_fit_input(&x, &array![0.0, 1.0, 1.0]).is_ok());
        assert!(check_binary_fit_input(&x, &array![0.0, 1.0]).is_err());
        assert!(check_binary_fit_input(&x, &array![0.0, 2.0, 1.0]).is_err());
        assert!(check_binary_fit_input(&x, &array![1.0, 1.0, 1.0]).is_err());
    }

    #[test]
    fn test_sigmoid_is_stable() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-12);
        assert!(sigmoid(-1000.0) >= 0.0);
        assert!(sigmoid(1000.0) <= 1.0);
        assert!(sigmoid(-1000.0).is_finite());
    }
}
