//! Data preprocessing module
//!
//! Feature scaling used by the scale-sensitive classifiers.

mod scaler;

pub use scaler::StandardScaler;
