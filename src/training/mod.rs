//! Classifier collection
//!
//! Binary classifiers behind the [`Classifier`] trait:
//! - Linear models (Logistic Regression, Ridge, SGD, Linear SVC)
//! - Linear Discriminant Analysis
//! - Multinomial Naive Bayes
//! - Decision trees, Random Forest and Extra Trees
//! - Gradient boosting and AdaBoost
//! - Neural networks (MLP)
//!
//! plus the cross-validation splitters the harness resamples with.

mod models;
mod estimator;
pub mod cross_validation;
pub mod linear_models;
pub mod discriminant;
pub mod decision_tree;
pub mod random_forest;
pub mod extra_trees;
pub mod gradient_boosting;
pub mod adaboost;
pub mod naive_bayes;
pub mod neural_network;
pub mod sgd;
pub mod svm;

pub use models::{Capabilities, Capability, Classifier};
pub use estimator::Estimator;
pub use cross_validation::{CrossValidator, CVStrategy, CVSplit, CVResults};
pub use linear_models::{LogisticRegression, RidgeClassifier};
pub use discriminant::LinearDiscriminantAnalysis;
pub use decision_tree::{DecisionTree, TreeNode, Criterion, Splitter};
pub use random_forest::{RandomForest, MaxFeatures};
pub use extra_trees::ExtraTrees;
pub use gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
pub use adaboost::AdaBoostClassifier;
pub use naive_bayes::MultinomialNaiveBayes;
pub use neural_network::{MLPClassifier, MLPConfig, Activation};
pub use sgd::{SGDClassifier, SGDConfig, SGDLoss, LearningRateSchedule};
pub use svm::{LinearSVC, SVMConfig};
