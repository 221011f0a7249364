//! Extra Trees (Extremely Randomized Trees) implementation
//!
//! Unlike Random Forest, which searches for the best threshold among a random
//! subset of features, Extra Trees draws one threshold per candidate feature
//! at random and trains every tree on the full training set.

use super::decision_tree::{DecisionTree, Splitter};
use super::models::{check_binary_fit_input, threshold_labels, Capabilities, Classifier};
use super::random_forest::{forest_importances, forest_proba, grow_forest, ForestParams, MaxFeatures};
use crate::error::Result;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Extra Trees classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtraTrees {
    trees: Vec<DecisionTree>,
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features drawn at each split
    pub max_features: MaxFeatures,
    pub random_state: Option<u64>,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
}

impl Default for ExtraTrees {
    fn default() -> Self {
        Self::new(100)
    }
}

impl ExtraTrees {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            random_state: None,
            n_features: 0,
            feature_importances: None,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Classifier for ExtraTrees {
    fn kind(&self) -> &'static str {
        "ExtraTreesClassifier"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE.with_probability().with_feature_importances()
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_binary_fit_input(x, y)?;
        let params = ForestParams {
            n_estimators: self.n_estimators,
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            max_features: self.max_features,
            bootstrap: false,
            splitter: Splitter::Random,
            random_state: self.random_state,
        };
        self.n_features = x.ncols();
        self.trees = grow_forest(&params, x, y)?;
        self.feature_importances = Some(forest_importances(&self.trees, self.n_features));
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(threshold_labels(&self.predict_proba(x)?, 0.5))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        forest_proba(&self.trees, self.n_features, x)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.feature_importances.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvalError;
    use ndarray::array;

    #[test]
    fn test_extra_trees_classifier() {
        let x = array![
            [0.0, 0.0],
            [0.1, 0.2],
            [0.2, 0.1],
            [1.0, 1.0],
            [1.1, 0.9],
            [0.9, 1.1],
        ];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut et = ExtraTrees::new(20).with_random_state(42);
        et.fit(&x, &y).unwrap();

        // no bootstrap and unlimited depth: every training point is memorised
        assert_eq!(et.predict(&x).unwrap(), y);
        assert_eq!(et.n_trees(), 20);

        let importances = et.feature_importances().unwrap();
        assert!((importances.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_unfitted() {
        let et = ExtraTrees::default();
        assert!(matches!(et.predict(&array![[0.0]]), Err(EvalError::ModelNotFitted)));
    }
}
