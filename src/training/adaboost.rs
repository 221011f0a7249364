//! AdaBoost (Adaptive Boosting) implementation
//!
//! AdaBoost builds an ensemble of weak learners (decision stumps), weighting
//! misclassified samples more heavily in subsequent rounds.

use super::models::{check_binary_fit_input, check_n_features, sigmoid, threshold_labels, Capabilities, Classifier};
use crate::error::{EvalError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// A single decision stump: splits on one feature at one threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Stump {
    feature_index: usize,
    threshold: f64,
    /// Prediction when feature <= threshold
    left_label: f64,
    /// Prediction when feature > threshold
    right_label: f64,
}

impl Stump {
    fn predict_sample(&self, sample: ArrayView1<f64>) -> f64 {
        if sample[self.feature_index] <= self.threshold {
            self.left_label
        } else {
            self.right_label
        }
    }
}

/// AdaBoost Classifier (SAMME, binary)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaBoostClassifier {
    pub n_estimators: usize,
    pub learning_rate: f64,
    stumps: Vec<Stump>,
    alphas: Vec<f64>,
    n_features: usize,
}

impl Default for AdaBoostClassifier {
    fn default() -> Self {
        Self::new(50, 1.0)
    }
}

impl AdaBoostClassifier {
    pub fn new(n_estimators: usize, learning_rate: f64) -> Self {
        Self {
            n_estimators,
            learning_rate,
            stumps: Vec::new(),
            alphas: Vec::new(),
            n_features: 0,
        }
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    /// Number of stumps kept after early stopping
    pub fn n_stumps(&self) -> usize {
        self.stumps.len()
    }

    /// Lowest weighted-error stump, found with one sorted sweep per feature
    fn fit_stump(x: &Array2<f64>, y: &Array1<f64>, weights: &Array1<f64>) -> Option<(Stump, f64)> {
        let n_samples = x.nrows();
        let total_pos: f64 = weights.iter().zip(y.iter()).filter(|(_, &t)| t == 1.0).map(|(w, _)| w).sum();
        let total_neg: f64 = weights.sum() - total_pos;

        let mut best: Option<(Stump, f64)> = None;
        for f in 0..x.ncols() {
            let col = x.column(f);
            let mut order: Vec<usize> = (0..n_samples).collect();
            order.sort_by(|&a, &b| col[a].total_cmp(&col[b]));

            let mut left_pos = 0.0;
            let mut left_neg = 0.0;
            for k in 0..n_samples - 1 {
                let i = order[k];
                if y[i] == 1.0 {
                    left_pos += weights[i];
                } else {
                    left_neg += weights[i];
                }
                let (lo, hi) = (col[i], col[order[k + 1]]);
                if lo >= hi {
                    continue;
                }

                // left -> 0, right -> 1 misclassifies left positives and right negatives
                let err_01 = left_pos + (total_neg - left_neg);
                let err_10 = left_neg + (total_pos - left_pos);
                let (err, left_label, right_label) = if err_01 <= err_10 {
                    (err_01, 0.0, 1.0)
                } else {
                    (err_10, 1.0, 0.0)
                };

                if best.as_ref().map_or(true, |(_, e)| err < *e) {
                    let mut threshold = (lo + hi) / 2.0;
                    if threshold >= hi {
                        threshold = lo;
                    }
                    best = Some((
                        Stump {
                            feature_index: f,
                            threshold,
                            left_label,
                            right_label,
                        },
                        err,
                    ));
                }
            }
        }
        best
    }

    fn stump_predictions(stump: &Stump, x: &Array2<f64>) -> Array1<f64> {
        x.rows().into_iter().map(|row| stump.predict_sample(row)).collect()
    }
}

impl Classifier for AdaBoostClassifier {
    fn kind(&self) -> &'static str {
        "AdaBoostClassifier"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE
            .with_probability()
            .with_decision_function()
            .with_feature_importances()
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_binary_fit_input(x, y)?;
        if self.n_estimators == 0 || !(self.learning_rate > 0.0) {
            return Err(EvalError::InvalidParameter {
                name: "n_estimators/learning_rate".to_string(),
                value: format!("{}/{}", self.n_estimators, self.learning_rate),
                reason: "both must be positive".to_string(),
            });
        }

        let n_samples = x.nrows();
        self.n_features = x.ncols();
        let mut weights = Array1::from_elem(n_samples, 1.0 / n_samples as f64);

        self.stumps.clear();
        self.alphas.clear();

        for _round in 0..self.n_estimators {
            let Some((stump, error)) = Self::fit_stump(x, y, &weights) else {
                break;
            };

            if error <= 0.0 {
                // perfect stump: keep it and stop
                self.stumps.push(stump);
                self.alphas.push(1.0);
                break;
            }
            if error >= 0.5 {
                break;
            }

            let alpha = self.learning_rate * ((1.0 - error) / error).ln();
            let predictions = Self::stump_predictions(&stump, x);
            for i in 0..n_samples {
                if predictions[i] != y[i] {
                    weights[i] *= alpha.exp();
                }
            }
            let w_sum = weights.sum();
            if w_sum > 0.0 {
                weights /= w_sum;
            }

            self.stumps.push(stump);
            self.alphas.push(alpha);
        }

        if self.stumps.is_empty() {
            return Err(EvalError::TrainingError(
                "no stump did better than chance".to_string(),
            ));
        }
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(threshold_labels(&self.decision_function(x)?, 0.0))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.decision_function(x)?.mapv(sigmoid))
    }

    /// Alpha-weighted vote in [-1, 1]: `sum(alpha * (+1 | -1)) / sum(alpha)`
    fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.stumps.is_empty() {
            return Err(EvalError::ModelNotFitted);
        }
        check_n_features(x, self.n_features)?;

        let alpha_sum: f64 = self.alphas.iter().sum();
        let mut votes = Array1::zeros(x.nrows());
        for (stump, &alpha) in self.stumps.iter().zip(self.alphas.iter()) {
            let signed = Self::stump_predictions(stump, x).mapv(|p| 2.0 * p - 1.0);
            votes.scaled_add(alpha, &signed);
        }
        Ok(votes / alpha_sum)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        if self.stumps.is_empty() {
            return None;
        }
        let alpha_sum: f64 = self.alphas.iter().sum();
        let mut importances = Array1::zeros(self.n_features);
        for (stump, &alpha) in self.stumps.iter().zip(self.alphas.iter()) {
            importances[stump.feature_index] += alpha / alpha_sum;
        }
        Some(importances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_adaboost_binary() {
        let x = array![
            [1.0, 2.0],
            [2.0, 3.0],
            [3.0, 3.0],
            [6.0, 5.0],
            [7.0, 8.0],
            [8.0, 6.0],
        ];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut model = AdaBoostClassifier::new(10, 1.0);
        model.fit(&x, &y).unwrap();

        assert_eq!(model.predict(&x).unwrap(), y);
        // a single perfect stump ends training early
        assert_eq!(model.n_stumps(), 1);
    }

    #[test]
    fn test_adaboost_needs_several_stumps() {
        // positives sit in the middle of feature 0: no single stump is perfect
        let x = array![[0.0], [1.0], [2.0], [3.0], [4.0], [5.0], [6.0], [7.0]];
        let y = array![0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0];

        let mut model = AdaBoostClassifier::new(20, 1.0);
        model.fit(&x, &y).unwrap();

        assert!(model.n_stumps() > 1);
        assert!(model.score(&x, &y).unwrap() >= 0.75);
        let proba = model.predict_proba(&x).unwrap();
        assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
        let importances = model.feature_importances().unwrap();
        assert!((importances[0] - 1.0).abs() < 1e-12);
    }
}
