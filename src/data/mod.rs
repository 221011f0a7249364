//! Labelled datasets and deterministic train/test splits

mod loader;

pub use loader::{dataframe_to_arrays, load_csv, CsvSchema, PIMA_COLUMNS};

use crate::error::{EvalError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// A rectangular table of labelled examples
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    x: Array2<f64>,
    y: Array1<f64>,
    feature_names: Vec<String>,
    label_name: String,
}

impl Dataset {
    /// Build a dataset, checking that every row has a label.
    /// Feature names default to `f0..fN` when empty.
    pub fn new(x: Array2<f64>, y: Array1<f64>, feature_names: Vec<String>) -> Result<Self> {
        if x.nrows() != y.len() {
            return Err(EvalError::ShapeError {
                expected: format!("{} labels (one per row)", x.nrows()),
                actual: format!("{} labels", y.len()),
            });
        }
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(EvalError::DataError("dataset is empty".to_string()));
        }
        let feature_names = if feature_names.is_empty() {
            (0..x.ncols()).map(|i| format!("f{}", i)).collect()
        } else if feature_names.len() == x.ncols() {
            feature_names
        } else {
            return Err(EvalError::ShapeError {
                expected: format!("{} feature names", x.ncols()),
                actual: format!("{} feature names", feature_names.len()),
            });
        };

        Ok(Self {
            x,
            y,
            feature_names,
            label_name: "class".to_string(),
        })
    }

    /// Load a numeric CSV whose last column is the label
    pub fn from_csv(path: impl AsRef<Path>, schema: &CsvSchema) -> Result<Self> {
        let df = load_csv(path.as_ref(), schema)?;
        let (x, y, mut names) = dataframe_to_arrays(&df)?;

        if !schema.has_header {
            if schema.column_names.len() != names.len() {
                return Err(EvalError::DataError(format!(
                    "expected {} columns ({}), found {}",
                    schema.column_names.len(),
                    schema.column_names.join(", "),
                    names.len()
                )));
            }
            names = schema.column_names.clone();
        }

        let label_name = names.pop().unwrap_or_else(|| "class".to_string());
        let mut dataset = Self::new(x, y, names)?;
        dataset.label_name = label_name;
        Ok(dataset)
    }

    pub fn features(&self) -> &Array2<f64> {
        &self.x
    }

    pub fn labels(&self) -> &Array1<f64> {
        &self.y
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn label_name(&self) -> &str {
        &self.label_name
    }

    pub fn n_samples(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }

    /// Row/feature counts and per-class counts (classes ascending)
    pub fn summary(&self) -> DatasetSummary {
        DatasetSummary {
            n_samples: self.n_samples(),
            n_features: self.n_features(),
            class_counts: class_counts(&self.y),
        }
    }

    /// Shuffle with a seeded ChaCha8 permutation and hold out
    /// `ceil(n * test_size)` rows for testing.
    pub fn train_test_split(&self, test_size: f64, seed: u64) -> Result<Split> {
        if !(test_size > 0.0 && test_size < 1.0) {
            return Err(EvalError::InvalidParameter {
                name: "test_size".to_string(),
                value: test_size.to_string(),
                reason: "must be in (0, 1)".to_string(),
            });
        }
        let n = self.n_samples();
        let n_test = (n as f64 * test_size).ceil() as usize;
        if n_test == 0 || n_test >= n {
            return Err(EvalError::InvalidInput(format!(
                "test_size {} leaves an empty partition for {} samples",
                test_size, n
            )));
        }

        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(&mut ChaCha8Rng::seed_from_u64(seed));
        let (test_idx, train_idx) = indices.split_at(n_test);

        Ok(Split {
            x_train: self.x.select(Axis(0), train_idx),
            y_train: self.y.select(Axis(0), train_idx),
            x_test: self.x.select(Axis(0), test_idx),
            y_test: self.y.select(Axis(0), test_idx),
        })
    }
}

/// Training and testing partitions of a dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Split {
    pub x_train: Array2<f64>,
    pub y_train: Array1<f64>,
    pub x_test: Array2<f64>,
    pub y_test: Array1<f64>,
}

impl Split {
    pub fn n_train(&self) -> usize {
        self.y_train.len()
    }

    pub fn n_test(&self) -> usize {
        self.y_test.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub n_samples: usize,
    pub n_features: usize,
    pub class_counts: Vec<(f64, usize)>,
}

impl fmt::Display for DatasetSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} samples, {} features", self.n_samples, self.n_features)?;
        for (class, count) in &self.class_counts {
            write!(f, ", class {}: {}", class, count)?;
        }
        Ok(())
    }
}

fn class_counts(y: &Array1<f64>) -> Vec<(f64, usize)> {
    let mut sorted: Vec<f64> = y.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mut counts: Vec<(f64, usize)> = Vec::new();
    for v in sorted {
        match counts.last_mut() {
            Some((class, count)) if *class == v => *count += 1,
            _ => counts.push((v, 1)),
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array;

    fn dataset(n: usize) -> Dataset {
        let x = Array::from_shape_fn((n, 3), |(i, j)| (i * 3 + j) as f64);
        let y = Array::from_shape_fn(n, |i| (i % 2) as f64);
        Dataset::new(x, y, vec![]).unwrap()
    }

    #[test]
    fn test_row_label_mismatch_rejected() {
        let x = Array2::<f64>::zeros((4, 2));
        let y = Array1::<f64>::zeros(3);
        assert!(matches!(Dataset::new(x, y, vec![]), Err(EvalError::ShapeError { .. })));
    }

    #[test]
    fn test_empty_dataset_rejected() {
        let x = Array2::<f64>::zeros((0, 2));
        let y = Array1::<f64>::zeros(0);
        assert!(matches!(Dataset::new(x, y, vec![]), Err(EvalError::DataError(_))));
    }

    #[test]
    fn test_split_sizes_use_ceil() {
        let split = dataset(768).train_test_split(0.33, 7).unwrap();
        assert_eq!(split.n_test(), 254);
        assert_eq!(split.n_train(), 514);
    }

    #[test]
    fn test_split_is_deterministic_and_disjoint() {
        let data = dataset(50);
        let a = data.train_test_split(0.2, 7).unwrap();
        let b = data.train_test_split(0.2, 7).unwrap();
        assert_eq!(a.x_test, b.x_test);
        assert_eq!(a.y_train, b.y_train);

        // first column is 3 * row index, so it identifies rows
        let mut rows: Vec<usize> = a
            .x_train
            .column(0)
            .iter()
            .chain(a.x_test.column(0).iter())
            .map(|v| (*v / 3.0) as usize)
            .collect();
        rows.sort_unstable();
        assert_eq!(rows, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_rejects_bad_test_size() {
        let data = dataset(10);
        assert!(data.train_test_split(0.0, 1).is_err());
        assert!(data.train_test_split(1.0, 1).is_err());
        assert!(dataset(2).train_test_split(0.9, 1).is_err());
    }

    #[test]
    fn test_summary() {
        let summary = dataset(5).summary();
        assert_eq!(summary.n_samples, 5);
        assert_eq!(summary.class_counts, vec![(0.0, 3), (1.0, 2)]);
        assert_eq!(summary.to_string(), "5 samples, 3 features, class 0: 3, class 1: 2");
    }
}
