//! Multinomial Naive Bayes classifier

use super::models::{check_binary_fit_input, check_n_features, Capabilities, Classifier};
use crate::error::{EvalError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Multinomial Naive Bayes over non-negative count-like features
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultinomialNaiveBayes {
    /// Log probability of each feature per class, row 0 for class 0
    feature_log_probs: Option<Array2<f64>>,
    /// Log prior of each class
    class_log_priors: [f64; 2],
    /// Smoothing parameter (Laplace smoothing)
    pub alpha: f64,
}

impl Default for MultinomialNaiveBayes {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl MultinomialNaiveBayes {
    pub fn new(alpha: f64) -> Self {
        Self {
            feature_log_probs: None,
            class_log_priors: [0.0; 2],
            alpha,
        }
    }

    /// Joint log likelihood per row for class 0 and class 1
    fn joint_log_likelihood(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let log_probs = self.feature_log_probs.as_ref().ok_or(EvalError::ModelNotFitted)?;
        check_n_features(x, log_probs.ncols())?;

        let mut jll = x.dot(&log_probs.t());
        for mut row in jll.rows_mut() {
            row[0] += self.class_log_priors[0];
            row[1] += self.class_log_priors[1];
        }
        Ok(jll)
    }
}

impl Classifier for MultinomialNaiveBayes {
    fn kind(&self) -> &'static str {
        "MultinomialNaiveBayes"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE.with_probability()
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_binary_fit_input(x, y)?;
        if x.iter().any(|&v| v < 0.0) {
            return Err(EvalError::InvalidInput(
                "multinomial naive Bayes needs non-negative features".to_string(),
            ));
        }

        let n_samples = x.nrows() as f64;
        let n_features = x.ncols();
        let mut counts = Array2::from_elem((2, n_features), self.alpha);
        let mut class_counts = [0usize; 2];

        for (row, &label) in x.rows().into_iter().zip(y.iter()) {
            let class = label as usize;
            class_counts[class] += 1;
            let mut target = counts.row_mut(class);
            target += &row;
        }

        let mut log_probs = Array2::zeros((2, n_features));
        for class in 0..2 {
            let total: f64 = counts.row(class).sum();
            for j in 0..n_features {
                log_probs[[class, j]] = (counts[[class, j]] / total).ln();
            }
            self.class_log_priors[class] = (class_counts[class] as f64 / n_samples).ln();
        }

        self.feature_log_probs = Some(log_probs);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let jll = self.joint_log_likelihood(x)?;
        Ok(jll
            .rows()
            .into_iter()
            .map(|row| if row[1] > row[0] { 1.0 } else { 0.0 })
            .collect())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let jll = self.joint_log_likelihood(x)?;
        // softmax over two classes, shifted by the row maximum
        Ok(jll
            .rows()
            .into_iter()
            .map(|row| {
                let m = row[0].max(row[1]);
                let e0 = (row[0] - m).exp();
                let e1 = (row[1] - m).exp();
                e1 / (e0 + e1)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_multinomial_nb() {
        let x = array![
            [5.0, 0.0, 1.0],
            [4.0, 1.0, 0.0],
            [6.0, 0.0, 0.0],
            [0.0, 5.0, 1.0],
            [1.0, 4.0, 0.0],
            [0.0, 6.0, 1.0],
        ];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut mnb = MultinomialNaiveBayes::new(1.0);
        mnb.fit(&x, &y).unwrap();

        assert_eq!(mnb.score(&x, &y).unwrap(), 1.0);
        let proba = mnb.predict_proba(&x).unwrap();
        assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
        assert!(proba[0] < 0.5 && proba[3] > 0.5);
    }

    #[test]
    fn test_rejects_negative_features() {
        let x = array![[1.0], [-1.0]];
        let y = array![0.0, 1.0];
        let mut mnb = MultinomialNaiveBayes::default();
        assert!(matches!(mnb.fit(&x, &y), Err(EvalError::InvalidInput(_))));
    }

    #[test]
    fn test_no_decision_function() {
        let mnb = MultinomialNaiveBayes::default();
        assert!(!mnb.capabilities().decision_function);
    }
}
