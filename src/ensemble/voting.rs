//! Voting ensemble methods

use crate::error::{EvalError, Result};
use crate::training::{Capabilities, Capability, Classifier, Estimator};
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Voting strategy for classification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum VotingStrategy {
    /// Hard voting: majority vote
    Hard,
    /// Soft voting: average probabilities
    Soft,
}

/// Voting classifier ensemble over named member estimators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VotingClassifier {
    /// Voting strategy
    strategy: VotingStrategy,
    /// Named members, fitted in place
    estimators: Vec<(String, Estimator)>,
    /// Weights for each model
    weights: Option<Vec<f64>>,
    fitted: bool,
}

impl VotingClassifier {
    /// Create a new voting classifier.
    ///
    /// Soft voting needs probability estimates from every member; a member
    /// without them is rejected here rather than at predict time.
    pub fn new(strategy: VotingStrategy, estimators: Vec<(String, Estimator)>) -> Result<Self> {
        if estimators.is_empty() {
            return Err(EvalError::InvalidParameter {
                name: "estimators".to_string(),
                value: "[]".to_string(),
                reason: "a voting ensemble needs at least one member".to_string(),
            });
        }
        if strategy == VotingStrategy::Soft {
            if let Some((name, model)) = estimators.iter().find(|(_, m)| !m.capabilities().probability) {
                return Err(EvalError::InvalidParameter {
                    name: "estimators".to_string(),
                    value: format!("{} ({})", name, model.kind()),
                    reason: "soft voting requires probability estimates from every member".to_string(),
                });
            }
        }
        Ok(Self {
            strategy,
            estimators,
            weights: None,
            fitted: false,
        })
    }

    /// Set model weights, one per member
    pub fn with_weights(mut self, weights: Vec<f64>) -> Result<Self> {
        if weights.len() != self.estimators.len() {
            return Err(EvalError::InvalidParameter {
                name: "weights".to_string(),
                value: format!("{} weights", weights.len()),
                reason: format!("expected one per member ({})", self.estimators.len()),
            });
        }
        if weights.iter().any(|w| !(*w >= 0.0)) || weights.iter().sum::<f64>() <= 0.0 {
            return Err(EvalError::InvalidParameter {
                name: "weights".to_string(),
                value: format!("{:?}", weights),
                reason: "must be non-negative with a positive sum".to_string(),
            });
        }
        self.weights = Some(weights);
        Ok(self)
    }

    pub fn strategy(&self) -> VotingStrategy {
        self.strategy
    }

    pub fn estimators(&self) -> &[(String, Estimator)] {
        &self.estimators
    }

    fn normalized_weights(&self) -> Vec<f64> {
        let n_models = self.estimators.len();
        let weights = self
            .weights
            .clone()
            .unwrap_or_else(|| vec![1.0; n_models]);
        let weight_sum: f64 = weights.iter().sum();
        weights.iter().map(|w| w / weight_sum).collect()
    }

    fn check_fitted(&self) -> Result<()> {
        if self.fitted {
            Ok(())
        } else {
            Err(EvalError::ModelNotFitted)
        }
    }

    /// Weighted share of members voting for the positive class.
    /// A class wins only with a strict majority; ties go to class 0.
    fn hard_vote(predictions: &[Array1<f64>], weights: &[f64], n_samples: usize) -> Array1<f64> {
        let mut positive_share = Array1::<f64>::zeros(n_samples);
        for (pred, &weight) in predictions.iter().zip(weights.iter()) {
            positive_share.zip_mut_with(pred, |share, &p| {
                if p > 0.5 {
                    *share += weight;
                }
            });
        }
        positive_share.mapv(|share| if share > 0.5 + 1e-12 { 1.0 } else { 0.0 })
    }

    fn soft_vote(probas: &[Array1<f64>], weights: &[f64], n_samples: usize) -> Array1<f64> {
        let mut result = Array1::zeros(n_samples);
        for (proba, &weight) in probas.iter().zip(weights.iter()) {
            result.scaled_add(weight, proba);
        }
        result
    }

    fn average_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let probas = self
            .estimators
            .iter()
            .map(|(_, m)| m.predict_proba(x))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::soft_vote(&probas, &self.normalized_weights(), x.nrows()))
    }
}

impl Classifier for VotingClassifier {
    fn kind(&self) -> &'static str {
        match self.strategy {
            VotingStrategy::Hard => "VotingClassifier(hard)",
            VotingStrategy::Soft => "VotingClassifier(soft)",
        }
    }

    fn capabilities(&self) -> Capabilities {
        match self.strategy {
            VotingStrategy::Hard => Capabilities::NONE,
            VotingStrategy::Soft => Capabilities::NONE.with_probability(),
        }
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.fitted = false;
        self.estimators
            .par_iter_mut()
            .map(|(name, model)| {
                model.fit(x, y).map_err(|e| {
                    EvalError::TrainingError(format!("voting member '{}' failed: {}", name, e))
                })
            })
            .collect::<Result<Vec<()>>>()?;
        self.fitted = true;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.check_fitted()?;
        match self.strategy {
            VotingStrategy::Hard => {
                let predictions = self
                    .estimators
                    .iter()
                    .map(|(_, m)| m.predict(x))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Self::hard_vote(&predictions, &self.normalized_weights(), x.nrows()))
            }
            VotingStrategy::Soft => {
                let proba = self.average_proba(x)?;
                Ok(proba.mapv(|p| if p > 0.5 { 1.0 } else { 0.0 }))
            }
        }
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self.strategy {
            VotingStrategy::Hard => Err(EvalError::unsupported(self.kind(), Capability::Probability)),
            VotingStrategy::Soft => {
                self.check_fitted()?;
                self.average_proba(x)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::{LinearDiscriminantAnalysis, LogisticRegression, RidgeClassifier};
    use ndarray::array;

    fn data() -> (Array2<f64>, Array1<f64>) {
        let x = array![[0.0, 1.0], [1.0, 0.0], [0.5, 0.5], [3.0, 4.0], [4.0, 3.0], [3.5, 3.5]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_hard_voting() {
        let predictions = vec![
            array![0.0, 1.0, 1.0, 0.0, 1.0],
            array![0.0, 0.0, 1.0, 1.0, 1.0],
            array![1.0, 1.0, 1.0, 0.0, 0.0],
        ];
        let weights = vec![1.0 / 3.0; 3];

        let result = VotingClassifier::hard_vote(&predictions, &weights, 5);

        assert_eq!(result[0], 0.0); // 2 votes for 0
        assert_eq!(result[1], 1.0); // 2 votes for 1
        assert_eq!(result[2], 1.0); // 3 votes for 1
    }

    #[test]
    fn test_hard_voting_tie_goes_to_zero() {
        let predictions = vec![array![1.0, 0.0], array![0.0, 1.0]];
        let result = VotingClassifier::hard_vote(&predictions, &[0.5, 0.5], 2);
        assert_eq!(result, array![0.0, 0.0]);
    }

    #[test]
    fn test_soft_voting() {
        let probas = vec![
            array![0.3, 0.7, 0.9],
            array![0.4, 0.6, 0.8],
            array![0.2, 0.5, 0.7],
        ];
        let result = VotingClassifier::soft_vote(&probas, &[1.0 / 3.0; 3], 3);

        assert!((result[0] - 0.3).abs() < 1e-12);
        assert!((result[1] - 0.6).abs() < 1e-12);
        assert!((result[2] - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_soft_voting_rejects_member_without_proba() {
        let members = vec![
            ("LDA".to_string(), Estimator::from(LinearDiscriminantAnalysis::new())),
            ("Ridge".to_string(), Estimator::from(RidgeClassifier::default())),
        ];
        let err = VotingClassifier::new(VotingStrategy::Soft, members).unwrap_err();
        assert!(matches!(err, EvalError::InvalidParameter { .. }));
    }

    #[test]
    fn test_voting_fit_and_capabilities() {
        let (x, y) = data();
        let members = vec![
            ("LR".to_string(), Estimator::from(LogisticRegression::new())),
            ("LDA".to_string(), Estimator::from(LinearDiscriminantAnalysis::new())),
        ];

        let mut hard = VotingClassifier::new(VotingStrategy::Hard, members.clone()).unwrap();
        assert!(matches!(hard.predict(&x), Err(EvalError::ModelNotFitted)));
        hard.fit(&x, &y).unwrap();
        assert_eq!(hard.predict(&x).unwrap(), y);
        assert!(!hard.capabilities().has_scores());
        assert!(hard.predict_proba(&x).is_err());

        let mut soft = VotingClassifier::new(VotingStrategy::Soft, members).unwrap();
        soft.fit(&x, &y).unwrap();
        assert_eq!(soft.predict(&x).unwrap(), y);
        let proba = soft.predict_proba(&x).unwrap();
        assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_weights_validation() {
        let members = vec![("LR".to_string(), Estimator::from(LogisticRegression::new()))];
        let voting = VotingClassifier::new(VotingStrategy::Hard, members).unwrap();
        assert!(voting.clone().with_weights(vec![1.0, 2.0]).is_err());
        assert!(voting.with_weights(vec![2.0]).is_ok());
    }
}
