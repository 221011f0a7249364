//! Harness configuration

use crate::data::CsvSchema;
use crate::error::{EvalError, Result};
use crate::evaluation::{BatchOptions, Scoring};
use crate::training::{CVStrategy, CrossValidator};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Settings shared by every stage of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// CSV file with the labelled data (label in the last column)
    pub data_path: PathBuf,
    /// Whether the CSV starts with a header row
    pub has_header: bool,
    /// Fraction of rows held out for the single fit/report step
    pub test_size: f64,
    pub split_seed: u64,
    pub folds: usize,
    pub cv_seed: u64,
    pub shuffle: bool,
    pub scorings: Vec<Scoring>,
    /// Where the finalize stage writes fitted models
    pub model_dir: PathBuf,
    pub parallel: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            data_path: std::env::var("CLASSEVAL_DATA")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("pima-indians-diabetes.data.csv")),
            has_header: false,
            test_size: 0.33,
            split_seed: 42,
            folds: 10,
            cv_seed: 1,
            shuffle: true,
            scorings: vec![Scoring::Accuracy, Scoring::RocAuc],
            model_dir: std::env::var("CLASSEVAL_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".")),
            parallel: false,
        }
    }
}

impl HarnessConfig {
    pub fn with_data_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_path = path.into();
        self
    }

    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    pub fn with_split_seed(mut self, seed: u64) -> Self {
        self.split_seed = seed;
        self
    }

    pub fn with_folds(mut self, folds: usize) -> Self {
        self.folds = folds;
        self
    }

    pub fn with_cv_seed(mut self, seed: u64) -> Self {
        self.cv_seed = seed;
        self
    }

    pub fn with_scorings(mut self, scorings: Vec<Scoring>) -> Self {
        self.scorings = scorings;
        self
    }

    pub fn with_model_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.model_dir = dir.into();
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(EvalError::ConfigError(format!(
                "test_size must be in (0, 1), got {}",
                self.test_size
            )));
        }
        if self.folds < 2 {
            return Err(EvalError::ConfigError(format!(
                "folds must be at least 2, got {}",
                self.folds
            )));
        }
        Ok(())
    }

    pub fn csv_schema(&self) -> CsvSchema {
        CsvSchema::default().with_header(self.has_header)
    }

    pub fn cross_validator(&self) -> CrossValidator {
        CrossValidator::new(CVStrategy::KFold {
            n_splits: self.folds,
            shuffle: self.shuffle,
        })
        .with_random_state(self.cv_seed)
    }

    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            scorings: self.scorings.clone(),
            cv: self.cross_validator(),
            parallel: self.parallel,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HarnessConfig::default();
        assert_eq!(config.test_size, 0.33);
        assert_eq!(config.split_seed, 42);
        assert_eq!(config.folds, 10);
        assert_eq!(config.cv_seed, 1);
        assert_eq!(config.scorings, vec![Scoring::Accuracy, Scoring::RocAuc]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(HarnessConfig::default().with_folds(1).validate().is_err());
        assert!(HarnessConfig::default().with_test_size(1.0).validate().is_err());
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = HarnessConfig::default().with_scorings(vec![Scoring::F1]).with_parallel(true);
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"f1\""));
        let back: HarnessConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_batch_options_follow_config() {
        let options = HarnessConfig::default().with_folds(5).batch_options();
        assert_eq!(options.cv.strategy().n_splits(), 5);
        assert!(!options.parallel);
    }
}
