//! Closed set of classifiers the harness can evaluate and persist

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use super::adaboost::AdaBoostClassifier;
use super::decision_tree::DecisionTree;
use super::discriminant::LinearDiscriminantAnalysis;
use super::extra_trees::ExtraTrees;
use super::gradient_boosting::GradientBoostingClassifier;
use super::linear_models::{LogisticRegression, RidgeClassifier};
use super::models::{Capabilities, Classifier};
use super::naive_bayes::MultinomialNaiveBayes;
use super::neural_network::MLPClassifier;
use super::random_forest::RandomForest;
use super::sgd::SGDClassifier;
use super::svm::LinearSVC;
use crate::ensemble::VotingClassifier;
use crate::error::Result;

/// Any supported classifier, fitted or not.
///
/// This is the unit stored in a model entry, cloned per fold and written to
/// disk by the exporter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Estimator {
    LogisticRegression(LogisticRegression),
    LinearDiscriminant(LinearDiscriminantAnalysis),
    NaiveBayes(MultinomialNaiveBayes),
    DecisionTree(DecisionTree),
    NeuralNetwork(MLPClassifier),
    Ridge(RidgeClassifier),
    Sgd(SGDClassifier),
    LinearSvc(LinearSVC),
    GradientBoosting(GradientBoostingClassifier),
    AdaBoost(AdaBoostClassifier),
    RandomForest(RandomForest),
    ExtraTrees(ExtraTrees),
    Voting(VotingClassifier),
}

impl Estimator {
    fn inner(&self) -> &dyn Classifier {
        match self {
            Estimator::LogisticRegression(m) => m,
            Estimator::LinearDiscriminant(m) => m,
            Estimator::NaiveBayes(m) => m,
            Estimator::DecisionTree(m) => m,
            Estimator::NeuralNetwork(m) => m,
            Estimator::Ridge(m) => m,
            Estimator::Sgd(m) => m,
            Estimator::LinearSvc(m) => m,
            Estimator::GradientBoosting(m) => m,
            Estimator::AdaBoost(m) => m,
            Estimator::RandomForest(m) => m,
            Estimator::ExtraTrees(m) => m,
            Estimator::Voting(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Classifier {
        match self {
            Estimator::LogisticRegression(m) => m,
            Estimator::LinearDiscriminant(m) => m,
            Estimator::NaiveBayes(m) => m,
            Estimator::DecisionTree(m) => m,
            Estimator::NeuralNetwork(m) => m,
            Estimator::Ridge(m) => m,
            Estimator::Sgd(m) => m,
            Estimator::LinearSvc(m) => m,
            Estimator::GradientBoosting(m) => m,
            Estimator::AdaBoost(m) => m,
            Estimator::RandomForest(m) => m,
            Estimator::ExtraTrees(m) => m,
            Estimator::Voting(m) => m,
        }
    }
}

impl Classifier for Estimator {
    fn kind(&self) -> &'static str {
        self.inner().kind()
    }

    fn capabilities(&self) -> Capabilities {
        self.inner().capabilities()
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.inner_mut().fit(x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.inner().predict(x)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.inner().predict_proba(x)
    }

    fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.inner().decision_function(x)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.inner().feature_importances()
    }

    fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        self.inner().score(x, y)
    }
}

macro_rules! impl_from_classifier {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Estimator {
                fn from(model: $ty) -> Self {
                    Estimator::$variant(model)
                }
            }
        )*
    };
}

impl_from_classifier!(
    LogisticRegression => LogisticRegression,
    LinearDiscriminantAnalysis => LinearDiscriminant,
    MultinomialNaiveBayes => NaiveBayes,
    DecisionTree => DecisionTree,
    MLPClassifier => NeuralNetwork,
    RidgeClassifier => Ridge,
    SGDClassifier => Sgd,
    LinearSVC => LinearSvc,
    GradientBoostingClassifier => GradientBoosting,
    AdaBoostClassifier => AdaBoost,
    RandomForest => RandomForest,
    ExtraTrees => ExtraTrees,
    VotingClassifier => Voting,
);
