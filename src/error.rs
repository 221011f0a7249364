//! Error types for classeval

use crate::training::Capability;
use thiserror::Error;

/// Result type alias for classeval operations
pub type Result<T> = std::result::Result<T, EvalError>;

/// Main error type for the evaluation harness
#[derive(Error, Debug)]
pub enum EvalError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("{model} does not support {capability}")]
    Unsupported {
        model: String,
        capability: Capability,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl EvalError {
    pub(crate) fn unsupported(model: &str, capability: Capability) -> Self {
        EvalError::Unsupported {
            model: model.to_string(),
            capability,
        }
    }

    pub(crate) fn length_mismatch(expected: usize, actual: usize) -> Self {
        EvalError::ShapeError {
            expected: format!("y length = {}", expected),
            actual: format!("y length = {}", actual),
        }
    }
}

impl From<polars::error::PolarsError> for EvalError {
    fn from(err: polars::error::PolarsError) -> Self {
        EvalError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for EvalError {
    fn from(err: serde_json::Error) -> Self {
        EvalError::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for EvalError {
    fn from(err: bincode::Error) -> Self {
        EvalError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for EvalError {
    fn from(err: ndarray::ShapeError) -> Self {
        EvalError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
