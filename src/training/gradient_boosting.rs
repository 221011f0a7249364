//! Gradient Boosting implementation
//!
//! Binary log-loss boosting: each round fits a shallow regression tree to the
//! negative gradient (`y - p`), replaces its leaf values with a Newton step and
//! adds the shrunken output to the log odds.

use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use super::decision_tree::DecisionTree;
use super::models::{check_binary_fit_input, check_n_features, normalize_importances, sigmoid, threshold_labels, Capabilities, Classifier};
use crate::error::{EvalError, Result};

/// Gradient Boosting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// Row subsample ratio for each tree
    pub subsample: f64,
    /// Random seed
    pub random_state: Option<u64>,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 1,
            subsample: 1.0,
            random_state: None,
        }
    }
}

impl GradientBoostingConfig {
    fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(EvalError::InvalidParameter {
                name: "n_estimators".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if !(self.learning_rate > 0.0) {
            return Err(EvalError::InvalidParameter {
                name: "learning_rate".to_string(),
                value: self.learning_rate.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(EvalError::InvalidParameter {
                name: "subsample".to_string(),
                value: self.subsample.to_string(),
                reason: "must be in (0, 1]".to_string(),
            });
        }
        Ok(())
    }
}

/// Gradient Boosting Classifier (binary)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    config: GradientBoostingConfig,
    trees: Vec<DecisionTree>,
    initial_log_odds: f64,
    n_features: usize,
    feature_importances: Vec<f64>,
}

impl Default for GradientBoostingClassifier {
    fn default() -> Self {
        Self::new(GradientBoostingConfig::default())
    }
}

impl GradientBoostingClassifier {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            initial_log_odds: 0.0,
            n_features: 0,
            feature_importances: Vec::new(),
        }
    }

    pub fn config(&self) -> &GradientBoostingConfig {
        &self.config
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn subsample_indices(&self, n_samples: usize, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..n_samples).collect();
        if self.config.subsample < 1.0 {
            let n_sub = ((n_samples as f64 * self.config.subsample).round() as usize).max(1);
            indices.shuffle(rng);
            indices.truncate(n_sub);
            indices.sort_unstable();
        }
        indices
    }
}

impl Classifier for GradientBoostingClassifier {
    fn kind(&self) -> &'static str {
        "GradientBoostingClassifier"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE
            .with_probability()
            .with_decision_function()
            .with_feature_importances()
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_binary_fit_input(x, y)?;
        self.config.validate()?;
        let n_samples = x.nrows();
        let n_features = x.ncols();

        let p = y.mean().unwrap_or(0.5).clamp(1e-10, 1.0 - 1e-10);
        self.initial_log_odds = (p / (1.0 - p)).ln();
        let mut log_odds = Array1::from_elem(n_samples, self.initial_log_odds);

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state.unwrap_or(0));

        self.trees.clear();
        self.n_features = n_features;
        let mut importances = vec![0.0; n_features];

        for _ in 0..self.config.n_estimators {
            let probs = log_odds.mapv(sigmoid);
            let residuals = y - &probs;

            let sample_indices = self.subsample_indices(n_samples, &mut rng);

            let mut tree = DecisionTree::new_regressor()
                .with_max_depth(self.config.max_depth)
                .with_min_samples_leaf(self.config.min_samples_leaf)
                .with_random_state(rng.gen());
            tree.fit_indices(x, &residuals, &sample_indices)?;
            // one Newton step per leaf: sum(residual) / sum(p * (1 - p))
            tree.refit_leaves(x, &sample_indices, |rows| {
                let numerator: f64 = rows.iter().map(|&i| residuals[i]).sum();
                let denominator: f64 = rows.iter().map(|&i| probs[i] * (1.0 - probs[i])).sum();
                if denominator < 1e-150 {
                    0.0
                } else {
                    numerator / denominator
                }
            })?;

            let update = tree.predict_values(x)?;
            log_odds.scaled_add(self.config.learning_rate, &update);

            if let Some(imp) = tree.importances() {
                for (total, v) in importances.iter_mut().zip(imp.iter()) {
                    *total += v;
                }
            }
            self.trees.push(tree);
        }

        normalize_importances(&mut importances);
        self.feature_importances = importances;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(threshold_labels(&self.decision_function(x)?, 0.0))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.decision_function(x)?.mapv(sigmoid))
    }

    fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(EvalError::ModelNotFitted);
        }
        check_n_features(x, self.n_features)?;

        let mut log_odds = Array1::from_elem(x.nrows(), self.initial_log_odds);
        for tree in &self.trees {
            log_odds.scaled_add(self.config.learning_rate, &tree.predict_values(x)?);
        }
        Ok(log_odds)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        if self.trees.is_empty() {
            None
        } else {
            Some(Array1::from_vec(self.feature_importances.clone()))
        }
    }
}
