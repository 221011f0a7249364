//! Random Forest implementation

use super::decision_tree::{DecisionTree, Splitter};
use super::models::{
    check_binary_fit_input, check_n_features, normalize_importances, threshold_labels, Capabilities, Classifier,
};
use crate::error::{EvalError, Result};
use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Strategy for max features
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum MaxFeatures {
    /// Square root of n_features
    Sqrt,
    /// Log2 of n_features
    Log2,
    /// Fraction of n_features
    Fraction(f64),
    /// Fixed number
    Fixed(usize),
    /// All features
    All,
}

impl MaxFeatures {
    pub fn resolve(&self, n_features: usize) -> usize {
        match *self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().floor() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().floor() as usize,
            MaxFeatures::Fraction(f) => (n_features as f64 * f).floor() as usize,
            MaxFeatures::Fixed(n) => n.min(n_features),
            MaxFeatures::All => n_features,
        }
        .max(1)
    }
}

/// Settings shared by the bagged tree ensembles
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
    pub splitter: Splitter,
    pub random_state: Option<u64>,
}

/// Grow `n_estimators` trees in parallel. Tree `i` uses its own RNG seeded
/// from `random_state + i`, so the result does not depend on thread scheduling.
pub(crate) fn grow_forest(params: &ForestParams, x: &Array2<f64>, y: &Array1<f64>) -> Result<Vec<DecisionTree>> {
    if params.n_estimators == 0 {
        return Err(EvalError::InvalidParameter {
            name: "n_estimators".to_string(),
            value: "0".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    let n_samples = x.nrows();
    let max_features = params.max_features.resolve(x.ncols());
    let base_seed = params.random_state.unwrap_or(0);

    (0..params.n_estimators)
        .into_par_iter()
        .map(|tree_idx| {
            let mut rng = ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(tree_idx as u64));

            let sample_indices: Vec<usize> = if params.bootstrap {
                (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
            } else {
                (0..n_samples).collect()
            };

            let mut tree = DecisionTree::new_classifier()
                .with_min_samples_split(params.min_samples_split)
                .with_min_samples_leaf(params.min_samples_leaf)
                .with_max_features(max_features)
                .with_splitter(params.splitter)
                .with_random_state(rng.gen());
            if let Some(d) = params.max_depth {
                tree = tree.with_max_depth(d);
            }

            tree.fit_indices(x, y, &sample_indices)?;
            Ok(tree)
        })
        .collect()
}

/// Mean of the per-tree positive-class probabilities
pub(crate) fn forest_proba(trees: &[DecisionTree], n_features: usize, x: &Array2<f64>) -> Result<Array1<f64>> {
    if trees.is_empty() {
        return Err(EvalError::ModelNotFitted);
    }
    check_n_features(x, n_features)?;

    let per_tree: Vec<Array1<f64>> = trees
        .par_iter()
        .map(|tree| tree.predict_values(x))
        .collect::<Result<_>>()?;

    let mut sum = Array1::zeros(x.nrows());
    for p in &per_tree {
        sum += p;
    }
    Ok(sum / trees.len() as f64)
}

/// Mean of the per-tree normalised importances, renormalised over
/// the trees that split at all
pub(crate) fn forest_importances(trees: &[DecisionTree], n_features: usize) -> Array1<f64> {
    let mut total: Array1<f64> = Array1::zeros(n_features);
    for imp in trees.iter().filter_map(|t| t.importances()) {
        total += imp;
    }
    if let Some(slice) = total.as_slice_mut() {
        normalize_importances(slice);
    }
    total
}

/// Random Forest classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    /// Individual trees
    trees: Vec<DecisionTree>,
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features drawn at each split
    pub max_features: MaxFeatures,
    /// Bootstrap sampling
    pub bootstrap: bool,
    /// Random state
    pub random_state: Option<u64>,
    /// Feature importances
    feature_importances: Option<Array1<f64>>,
    /// Number of features
    n_features: usize,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(100)
    }
}

impl RandomForest {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            random_state: None,
            feature_importances: None,
            n_features: 0,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Set max features strategy
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Get number of trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn params(&self) -> ForestParams {
        ForestParams {
            n_estimators: self.n_estimators,
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            max_features: self.max_features,
            bootstrap: self.bootstrap,
            splitter: Splitter::Best,
            random_state: self.random_state,
        }
    }
}

impl Classifier for RandomForest {
    fn kind(&self) -> &'static str {
        "RandomForestClassifier"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE.with_probability().with_feature_importances()
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_binary_fit_input(x, y)?;
        self.n_features = x.ncols();
        self.trees = grow_forest(&self.params(), x, y)?;
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
    use ndarray::array;

    fn blobs() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [0.0, 0.0],
            [0.1, 0.1],
            [0.2, 0.2],
            [1.0, 1.0],
            [1.1, 1.1],
            [1.2, 1.2],
        ];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_classifier() {
        let (x, y) = blobs();
        let mut rf = RandomForest::new(10).with_random_state(42);
        rf.fit(&x, &y).unwrap();

        let accuracy = rf.score(&x, &y).unwrap();
        assert!(accuracy >= 0.8, "Accuracy too low: {}", accuracy);
        assert_eq!(rf.n_trees(), 10);
    }

    #[test]
    fn test_predict_proba_in_range() {
        let (x, y) = blobs();
        let mut rf = RandomForest::new(10).with_random_state(42);
        rf.fit(&x, &y).unwrap();

        let proba = rf.predict_proba(&x).unwrap();
        assert_eq!(proba.len(), 6);
        assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_same_seed_same_forest() {
        let (x, y) = blobs();
        let mut a = RandomForest::new(8).with_random_state(1);
        let mut b = RandomForest::new(8).with_random_state(1);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap());
    }

    #[test]
    fn test_feature_importances() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut rf = RandomForest::new(10)
            .with_max_features(MaxFeatures::All)
            .with_random_state(42);
        rf.fit(&x, &y).unwrap();

        let importances = rf.feature_importances().unwrap();
        assert_eq!(importances.len(), 2);
        assert!(importances[0] >= importances[1]);
    }

    #[test]
    fn test_max_features_resolve() {
        assert_eq!(MaxFeatures::Sqrt.resolve(8), 2);
        assert_eq!(MaxFeatures::Fixed(3).resolve(8), 3);
        assert_eq!(MaxFeatures::Fixed(30).resolve(8), 8);
        assert_eq!(MaxFeatures::Log2.resolve(1), 1);
    }
}
