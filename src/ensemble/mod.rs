//! Ensemble methods module
//!
//! Voting ensembles (hard and soft voting) over named member estimators.

mod voting;

pub use voting::{VotingClassifier, VotingStrategy};
