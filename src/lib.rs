//! classeval - evaluation harness for tabular binary classifiers
//!
//! Loads a labelled CSV, cross-validates a roster of classifiers, fits each
//! once on a held-out split for a confusion matrix and classification
//! report, draws ROC data, ranks feature importances and persists finalized
//! models.
//!
//! # Modules
//!
//! - [`data`] - CSV loading, dataset summary, train/test split
//! - [`preprocessing`] - Feature standardization
//! - [`training`] - Classifiers, the [`training::Classifier`] trait, cross-validation folds
//! - [`ensemble`] - Hard and soft voting
//! - [`evaluation`] - Metrics and the evaluation harness
//! - [`export`] - Model persistence
//! - [`stages`] - The demonstration batches
//! - [`config`] - Harness settings
//! - [`cli`] - Command-line interface

pub mod error;

pub mod data;
pub mod preprocessing;
pub mod training;
pub mod ensemble;
pub mod evaluation;
pub mod export;

pub mod config;
pub mod stages;
pub mod cli;

pub use error::{EvalError, Result};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::HarnessConfig;
    pub use crate::data::{CsvSchema, Dataset, Split};
    pub use crate::ensemble::{VotingClassifier, VotingStrategy};
    pub use crate::error::{EvalError, Result};
    pub use crate::evaluation::{
        cross_validate, evaluate_batch, evaluate_model, feature_ranking, fit_and_report, roc_curve_data, BatchOptions,
        ConfusionMatrix, Evaluated, ModelEntry, ModelEvaluation, RocCurve, Scoring,
    };
    pub use crate::export::{load_model, save_model, ModelMetadata};
    pub use crate::preprocessing::StandardScaler;
    pub use crate::stages::{run_stage, Stage};
    pub use crate::training::{
        CVResults, CVStrategy, Capabilities, Capability, Classifier, CrossValidator, Estimator,
    };
}
