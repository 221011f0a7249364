//! Cross-validation splitters

use crate::error::{EvalError, Result};
use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How rows are dealt into folds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CVStrategy {
    /// Contiguous folds over the (optionally shuffled) row order
    KFold { n_splits: usize, shuffle: bool },
    /// Folds that keep each class's share of rows
    StratifiedKFold { n_splits: usize, shuffle: bool },
}

impl Default for CVStrategy {
    fn default() -> Self {
        CVStrategy::KFold { n_splits: 10, shuffle: true }
    }
}

impl CVStrategy {
    pub fn n_splits(&self) -> usize {
        match *self {
            CVStrategy::KFold { n_splits, .. } | CVStrategy::StratifiedKFold { n_splits, .. } => n_splits,
        }
    }
}

/// Row indices of one fold
#[derive(Debug, Clone)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Deals row indices into folds
#[derive(Debug, Clone)]
pub struct CrossValidator {
    strategy: CVStrategy,
    random_state: Option<u64>,
}

impl CrossValidator {
    pub fn new(strategy: CVStrategy) -> Self {
        Self {
            strategy,
            random_state: None,
        }
    }

    /// Seed for the shuffle; without one every run deals differently
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn strategy(&self) -> CVStrategy {
        self.strategy
    }

    /// Generate train/test splits. `y` is required for stratification.
    pub fn split(&self, n_samples: usize, y: Option<&Array1<f64>>) -> Result<Vec<CVSplit>> {
        let n_splits = self.strategy.n_splits();
        if n_splits < 2 {
            return Err(EvalError::InvalidInput(format!(
                "n_splits must be at least 2, got {}",
                n_splits
            )));
        }
        if n_samples <= n_splits {
            return Err(EvalError::InvalidInput(format!(
                "n_samples ({}) must exceed n_splits ({})",
                n_samples, n_splits
            )));
        }

        match self.strategy {
            CVStrategy::KFold { n_splits, shuffle } => Ok(self.k_fold_split(n_samples, n_splits, shuffle)),
            CVStrategy::StratifiedKFold { n_splits, shuffle } => {
                let y = y.ok_or_else(|| {
                    EvalError::ValidationError("StratifiedKFold requires target array".to_string())
                })?;
                if y.len() != n_samples {
                    return Err(EvalError::length_mismatch(n_samples, y.len()));
                }
                Ok(self.stratified_k_fold_split(y, n_splits, shuffle))
            }
        }
    }

    fn rng(&self) -> ChaCha8Rng {
        match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        }
    }

    fn k_fold_split(&self, n_samples: usize, n_splits: usize, shuffle: bool) -> Vec<CVSplit> {
        let mut indices: Vec<usize> = (0..n_samples).collect();
        if shuffle {
            indices.shuffle(&mut self.rng());
        }

        // the first n % k folds get one extra sample
        let base = n_samples / n_splits;
        let remainder = n_samples % n_splits;

        let mut splits = Vec::with_capacity(n_splits);
        let mut current = 0;
        for fold_idx in 0..n_splits {
            let fold_size = if fold_idx < remainder { base + 1 } else { base };
            let test_indices = indices[current..current + fold_size].to_vec();
            let train_indices: Vec<usize> = indices[..current]
                .iter()
                .chain(indices[current + fold_size..].iter())
                .copied()
                .collect();

            splits.push(CVSplit {
                train_indices,
                test_indices,
                fold_idx,
            });
            current += fold_size;
        }
        splits
    }

    fn stratified_k_fold_split(&self, y: &Array1<f64>, n_splits: usize, shuffle: bool) -> Vec<CVSplit> {
        // ordered map so folds do not depend on hash iteration order
        let mut class_indices: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (idx, &val) in y.iter().enumerate() {
            class_indices.entry(val.round() as i64).or_default().push(idx);
        }

        if shuffle {
            let mut rng = self.rng();
            for indices in class_indices.values_mut() {
                indices.shuffle(&mut rng);
            }
        }

        // deal each class round-robin, continuing where the previous class stopped
        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); n_splits];
        let mut next = 0;
        for indices in class_indices.values() {
            for &idx in indices {
                folds[next % n_splits].push(idx);
                next += 1;
            }
        }

        (0..n_splits)
            .map(|fold_idx| CVSplit {
                test_indices: folds[fold_idx].clone(),
                train_indices: folds
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != fold_idx)
                    .flat_map(|(_, f)| f.iter().copied())
                    .collect(),
                fold_idx,
            })
            .collect()
    }
}

/// Per-fold scores and their summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CVResults {
    /// Scores for each fold
    pub scores: Vec<f64>,
    pub mean_score: f64,
    /// Population standard deviation of scores
    pub std_score: f64,
    /// Number of folds
    pub n_folds: usize,
}

impl CVResults {
    /// Empty input yields NaN mean and std
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let n_folds = scores.len();
        if n_folds == 0 {
            return Self {
                scores,
                mean_score: f64::NAN,
                std_score: f64::NAN,
                n_folds,
            };
        }
        let mean_score = scores.iter().sum::<f64>() / n_folds as f64;
        let variance = scores.iter().map(|s| (s - mean_score).powi(2)).sum::<f64>() / n_folds as f64;
        let std_score = variance.sqrt();

        Self {
            scores,
            mean_score,
            std_score,
            n_folds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unshuffled_k_fold_partitions_rows() {
        let splits = CrossValidator::new(CVStrategy::KFold { n_splits: 4, shuffle: false })
            .split(12, None)
            .unwrap();

        assert_eq!(splits[0].test_indices, vec![0, 1, 2]);
        assert_eq!(splits[3].test_indices, vec![9, 10, 11]);
        assert_eq!(splits[1].train_indices, vec![0, 1, 2, 6, 7, 8, 9, 10, 11]);

        let mut covered: Vec<usize> = splits.iter().flat_map(|s| s.test_indices.iter().copied()).collect();
        covered.sort_unstable();
        assert_eq!(covered, (0..12).collect::<Vec<_>>());
    }

    #[test]
    fn test_k_fold_uneven_sizes() {
        let cv = CrossValidator::new(CVStrategy::KFold { n_splits: 10, shuffle: true }).with_random_state(1);
        let splits = cv.split(514, None).unwrap();
        let sizes: Vec<usize> = splits.iter().map(|s| s.test_indices.len()).collect();
        assert_eq!(&sizes[..4], &[52, 52, 52, 52]);
        assert!(sizes[4..].iter().all(|&s| s == 51));
    }

    #[test]
    fn test_shuffled_k_fold_is_seeded() {
        let a = CrossValidator::new(CVStrategy::KFold { n_splits: 4, shuffle: true })
            .with_random_state(1)
            .split(40, None)
            .unwrap();
        let b = CrossValidator::new(CVStrategy::KFold { n_splits: 4, shuffle: true })
            .with_random_state(1)
            .split(40, None)
            .unwrap();
        for (sa, sb) in a.iter().zip(b.iter()) {
            assert_eq!(sa.test_indices, sb.test_indices);
        }
    }

    #[test]
    fn test_stratified_folds_keep_class_balance() {
        let y = Array1::from_shape_fn(30, |i| if i < 20 { 0.0 } else { 1.0 });
        let splits = CrossValidator::new(CVStrategy::StratifiedKFold { n_splits: 5, shuffle: true })
            .with_random_state(3)
            .split(30, Some(&y))
            .unwrap();

        for split in &splits {
            let ones = split.test_indices.iter().filter(|&&i| y[i] == 1.0).count();
            assert_eq!(split.test_indices.len(), 6);
            assert_eq!(ones, 2);
        }
        assert!(CrossValidator::new(CVStrategy::StratifiedKFold { n_splits: 5, shuffle: false })
            .split(30, None)
            .is_err());
    }

    #[test]
    fn test_too_few_samples() {
        let cv = CrossValidator::new(CVStrategy::KFold { n_splits: 10, shuffle: false });
        assert!(matches!(cv.split(10, None), Err(EvalError::InvalidInput(_))));

        let cv = CrossValidator::new(CVStrategy::KFold { n_splits: 1, shuffle: false });
        assert!(cv.split(10, None).is_err());
    }

    #[test]
    fn test_cv_results_population_std() {
        let results = CVResults::from_scores(vec![0.5, 0.7]);
        assert!((results.mean_score - 0.6).abs() < 1e-12);
        assert!((results.std_score - 0.1).abs() < 1e-12);
        assert_eq!(results.n_folds, 2);
    }
}
