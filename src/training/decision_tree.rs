//! Decision tree implementation

use super::models::{check_binary_fit_input, check_n_features, normalize_importances, threshold_labels, Capabilities, Classifier};
use crate::error::{EvalError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node. For classifiers the value is the fraction of positive
    /// samples that reached the leaf; for regressors it is the mean target.
    Leaf {
        value: f64,
        n_samples: usize,
    },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Criterion {
    /// Gini impurity (binary classification)
    Gini,
    /// Mean squared error (regression)
    MSE,
}

/// How split thresholds are chosen
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Splitter {
    /// Exhaustive search over midpoints between sorted values
    Best,
    /// One uniformly drawn threshold per candidate feature
    Random,
}

/// Running sums for a set of targets. With 0/1 labels `sum` is the positive count.
#[derive(Debug, Clone, Copy, Default)]
struct NodeStats {
    n: f64,
    sum: f64,
    sum_sq: f64,
}

impl NodeStats {
    fn push(&mut self, v: f64) {
        self.n += 1.0;
        self.sum += v;
        self.sum_sq += v * v;
    }

    fn minus(&self, other: &NodeStats) -> NodeStats {
        NodeStats {
            n: self.n - other.n,
            sum: self.sum - other.sum,
            sum_sq: self.sum_sq - other.sum_sq,
        }
    }

    /// Impurity multiplied by the sample count
    fn weighted_impurity(&self, criterion: Criterion) -> f64 {
        if self.n <= 0.0 {
            return 0.0;
        }
        match criterion {
            // n * (1 - p^2 - (1-p)^2) = 2 * pos * neg / n
            Criterion::Gini => 2.0 * self.sum * (self.n - self.sum) / self.n,
            Criterion::MSE => (self.sum_sq - self.sum * self.sum / self.n).max(0.0),
        }
    }

    fn impurity(&self, criterion: Criterion) -> f64 {
        if self.n <= 0.0 {
            0.0
        } else {
            self.weighted_impurity(criterion) / self.n
        }
    }

    fn mean(&self) -> f64 {
        if self.n > 0.0 {
            self.sum / self.n
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    decrease: f64,
}

/// Decision tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Tree root
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Number of features drawn at each split (all when `None`)
    pub max_features: Option<usize>,
    /// Impurity criterion
    pub criterion: Criterion,
    /// Threshold strategy
    pub splitter: Splitter,
    /// Seed for feature sampling and random thresholds
    pub random_state: u64,
    /// Number of features
    n_features: usize,
    /// Feature importances
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new_classifier()
    }
}

impl DecisionTree {
    /// Create a new classifier tree
    pub fn new_classifier() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion: Criterion::Gini,
            splitter: Splitter::Best,
            random_state: 0,
            n_features: 0,
            feature_importances: None,
        }
    }

    /// Create a new regressor tree
    pub fn new_regressor() -> Self {
        Self {
            criterion: Criterion::MSE,
            ..Self::new_classifier()
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Set the number of features drawn at each split
    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features);
        self
    }

    pub fn with_splitter(mut self, splitter: Splitter) -> Self {
        self.splitter = splitter;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Fit on all rows
    pub fn fit_values(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let indices: Vec<usize> = (0..x.nrows()).collect();
        self.fit_indices(x, y, &indices)
    }

    /// Fit on the given row indices. Repeated indices count once per occurrence,
    /// which is how bootstrap samples are passed in.
    pub fn fit_indices(&mut self, x: &Array2<f64>, y: &Array1<f64>, indices: &[usize]) -> Result<&mut Self> {
        if x.nrows() != y.len() {
            return Err(EvalError::length_mismatch(x.nrows(), y.len()));
        }
        if indices.is_empty() {
            return Err(EvalError::ValidationError("cannot grow a tree on zero samples".to_string()));
        }
        if let Some(&bad) = indices.iter().find(|&&i| i >= x.nrows()) {
            return Err(EvalError::InvalidInput(format!("row index {} out of range", bad)));
        }
        if self.max_features == Some(0) {
            return Err(EvalError::InvalidParameter {
                name: "max_features".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        self.n_features = x.ncols();
        let mut builder = TreeBuilder {
            x,
            y,
            params: self,
            rng: ChaCha8Rng::seed_from_u64(self.random_state),
            importances: vec![0.0; x.ncols()],
        };
        let root = builder.build(indices.to_vec(), 0);
        let mut importances = builder.importances;
        normalize_importances(&mut importances);

        self.root = Some(root);
        self.feature_importances = Some(Array1::from_vec(importances));
        Ok(self)
    }

    /// Raw leaf values (positive fraction or regression mean) for each row
    pub fn predict_values(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(EvalError::ModelNotFitted)?;
        check_n_features(x, self.n_features)?;
        Ok(x.rows().into_iter().map(|row| Self::leaf_value(root, row)).collect())
    }

    fn leaf_value(mut node: &TreeNode, sample: ArrayView1<f64>) -> f64 {
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                    node = if sample[*feature_idx] <= *threshold { left } else { right };
                }
            }
        }
    }

    /// Recompute every leaf value from the training rows that reach it
    pub(crate) fn refit_leaves<F>(&mut self, x: &Array2<f64>, indices: &[usize], mut leaf_value: F) -> Result<()>
    where
        F: FnMut(&[usize]) -> f64,
    {
        fn walk<F: FnMut(&[usize]) -> f64>(node: &mut TreeNode, x: &Array2<f64>, indices: Vec<usize>, leaf_value: &mut F) {
            match node {
                TreeNode::Leaf { value, .. } => *value = leaf_value(&indices),
                TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                    let (l, r): (Vec<usize>, Vec<usize>) = indices
                        .iter()
                        .partition(|&&i| x[[i, *feature_idx]] <= *threshold);
                    walk(left, x, l, leaf_value);
                    walk(right, x, r, leaf_value);
                }
            }
        }

        let root = self.root.as_mut().ok_or(EvalError::ModelNotFitted)?;
        walk(root, x, indices.to_vec(), &mut leaf_value);
        Ok(())
    }

    /// Normalised impurity-decrease importances
    pub fn importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Get tree depth
    pub fn get_depth(&self) -> usize {
        fn depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + depth(left).max(depth(right)),
            }
        }
        self.root.as_ref().map_or(0, depth)
    }

    /// Get number of leaves
    pub fn get_n_leaves(&self) -> usize {
        fn leaves(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => leaves(left) + leaves(right),
            }
        }
        self.root.as_ref().map_or(0, leaves)
    }
}

struct TreeBuilder<'a> {
    x: &'a Array2<f64>,
    y: &'a Array1<f64>,
    params: &'a DecisionTree,
    rng: ChaCha8Rng,
    importances: Vec<f64>,
}

impl<'a> TreeBuilder<'a> {
    fn build(&mut self, indices: Vec<usize>, depth: usize) -> TreeNode {
        let mut stats = NodeStats::default();
        for &i in &indices {
            stats.push(self.y[i]);
        }
        let n_samples = indices.len();
        let criterion = self.params.criterion;

        let should_stop = n_samples < self.params.min_samples_split
            || n_samples < 2 * self.params.min_samples_leaf
            || self.params.max_depth.map_or(false, |d| depth >= d)
            || stats.weighted_impurity(criterion) <= 1e-12;

        if should_stop {
            return TreeNode::Leaf { value: stats.mean(), n_samples };
        }

        let Some(best) = self.find_best_split(&indices, &stats) else {
            return TreeNode::Leaf { value: stats.mean(), n_samples };
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| self.x[[i, best.feature_idx]] <= best.threshold);

        if left_indices.is_empty() || right_indices.is_empty() {
            return TreeNode::Leaf { value: stats.mean(), n_samples };
        }

        self.importances[best.feature_idx] += best.decrease;

        let left = Box::new(self.build(left_indices, depth + 1));
        let right = Box::new(self.build(right_indices, depth + 1));

        TreeNode::Split {
            feature_idx: best.feature_idx,
            threshold: best.threshold,
            left,
            right,
            n_samples,
            impurity: stats.impurity(criterion),
        }
    }

    fn candidate_features(&mut self) -> Vec<usize> {
        let n_features = self.x.ncols();
        let k = self.params.max_features.unwrap_or(n_features).min(n_features);
        if k >= n_features {
            return (0..n_features).collect();
        }
        let mut drawn = rand::seq::index::sample(&mut self.rng, n_features, k).into_vec();
        drawn.sort_unstable();
        drawn
    }

    fn find_best_split(&mut self, indices: &[usize], parent: &NodeStats) -> Option<SplitCandidate> {
        let features = self.candidate_features();
        // thresholds for the random splitter are drawn up front so the parallel
        // scan below stays independent of scheduling
        let draws: Vec<f64> = match self.params.splitter {
            Splitter::Best => vec![0.0; features.len()],
            Splitter::Random => features.iter().map(|_| self.rng.gen::<f64>()).collect(),
        };

        let x = self.x;
        let y = self.y;
        let params = self.params;

        let results: Vec<Option<SplitCandidate>> = features
            .par_iter()
            .zip(draws.par_iter())
            .map(|(&feature_idx, &u)| match params.splitter {
                Splitter::Best => best_threshold(x, y, indices, feature_idx, parent, params),
                Splitter::Random => random_threshold(x, y, indices, feature_idx, parent, params, u),
            })
            .collect();

        let mut best: Option<SplitCandidate> = None;
        for candidate in results.into_iter().flatten() {
            if candidate.decrease > 1e-12 && best.map_or(true, |b| candidate.decrease > b.decrease) {
                best = Some(candidate);
            }
        }
        best
    }
}

fn best_threshold(
    x: &Array2<f64>,
    y: &Array1<f64>,
    indices: &[usize],
    feature_idx: usize,
    parent: &NodeStats,
    params: &DecisionTree,
) -> Option<SplitCandidate> {
    let mut pairs: Vec<(f64, f64)> = indices.iter().map(|&i| (x[[i, feature_idx]], y[i])).collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    let parent_impurity = parent.weighted_impurity(params.criterion);
    let n = pairs.len();
    let mut left = NodeStats::default();
    let mut best: Option<SplitCandidate> = None;

    for k in 0..n - 1 {
        left.push(pairs[k].1);
        let (lo, hi) = (pairs[k].0, pairs[k + 1].0);
        if lo >= hi {
            continue;
        }
        let n_left = k + 1;
        if n_left < params.min_samples_leaf || n - n_left < params.min_samples_leaf {
            continue;
        }

        let right = parent.minus(&left);
        let decrease = parent_impurity
            - left.weighted_impurity(params.criterion)
            - right.weighted_impurity(params.criterion);

        if best.map_or(true, |b| decrease > b.decrease) {
            let mut threshold = (lo + hi) / 2.0;
            if threshold >= hi {
                threshold = lo;
            }
            best = Some(SplitCandidate { feature_idx, threshold, decrease });
        }
    }
    best
}

fn random_threshold(
    x: &Array2<f64>,
    y: &Array1<f64>,
    indices: &[usize],
    feature_idx: usize,
    parent: &NodeStats,
    params: &DecisionTree,
    u: f64,
) -> Option<SplitCandidate> {
    let (min, max) = indices.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
        let v = x[[i, feature_idx]];
        (lo.min(v), hi.max(v))
    });
    if !(max > min) {
        return None;
    }
    let threshold = min + u * (max - min);

    let mut left = NodeStats::default();
    for &i in indices {
        if x[[i, feature_idx]] <= threshold {
            left.push(y[i]);
        }
    }
    let right = parent.minus(&left);
    let min_leaf = params.min_samples_leaf as f64;
    if left.n < min_leaf || right.n < min_leaf {
        return None;
    }

    let decrease = parent.weighted_impurity(params.criterion)
        - left.weighted_impurity(params.criterion)
        - right.weighted_impurity(params.criterion);
    Some(SplitCandidate { feature_idx, threshold, decrease })
}

impl Classifier for DecisionTree {
    fn kind(&self) -> &'static str {
        "DecisionTreeClassifier"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE.with_probability().with_feature_importances()
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if self.criterion != Criterion::Gini {
            return Err(EvalError::InvalidParameter {
                name: "criterion".to_string(),
                value: format!("{:?}", self.criterion),
                reason: "classification trees use Gini".to_string(),
            });
        }
        check_binary_fit_input(x, y)?;
        self.fit_values(x, y)?;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(threshold_labels(&self.predict_values(x)?, 0.5))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.predict_values(x)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.feature_importances.clone()
    }
}
