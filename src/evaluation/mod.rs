//! Model evaluation harness
//!
//! Cross-validated scoring, a single fit on a held-out split with confusion
//! matrix and classification report, ROC data and feature importance ranking.
//! Optional steps return [`Evaluated`] so a missing capability is an outcome,
//! not an error.

mod harness;
pub mod metrics;

pub use harness::{
    cross_validate, evaluate_batch, evaluate_model, feature_ranking, fit_and_report, report_fitted, roc_curve_data,
    BatchOptions, EvaluationStage, FitReport, ModelEntry, ModelEvaluation, RankedFeature, ScoredCv,
};
pub use metrics::{ClassificationReport, ConfusionMatrix, RocCurve, Scoring};

use crate::training::Capability;
use serde::{Deserialize, Serialize};

/// Outcome of an optional evaluation step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Evaluated<T> {
    Done(T),
    /// The model does not offer what the step needs
    Unsupported { capability: Capability, reason: String },
}

impl<T> Evaluated<T> {
    pub(crate) fn unsupported(model: &str, capability: Capability, what: &str) -> Self {
        Evaluated::Unsupported {
            capability,
            reason: format!("{} does not provide {} needed for {}", model, capability, what),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Evaluated::Done(_))
    }

    pub fn done(&self) -> Option<&T> {
        match self {
            Evaluated::Done(v) => Some(v),
            Evaluated::Unsupported { .. } => None,
        }
    }

    pub fn into_done(self) -> Option<T> {
        match self {
            Evaluated::Done(v) => Some(v),
            Evaluated::Unsupported { .. } => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Evaluated<U> {
        match self {
            Evaluated::Done(v) => Evaluated::Done(f(v)),
            Evaluated::Unsupported { capability, reason } => Evaluated::Unsupported { capability, reason },
        }
    }
}
