//! Neural Network (Multi-Layer Perceptron) classifier
//!
//! A feedforward network trained with mini-batch backpropagation and
//! momentum. Inputs are standardised internally; the output layer is a
//! single logistic unit giving the positive-class probability.

use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use super::models::{check_binary_fit_input, check_n_features, sigmoid, threshold_labels, Capabilities, Classifier};
use crate::error::{EvalError, Result};
use crate::preprocessing::StandardScaler;

/// Activation function for hidden layers
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Activation {
    /// Rectified Linear Unit
    #[default]
    ReLU,
    /// Sigmoid
    Sigmoid,
    /// Hyperbolic tangent
    Tanh,
}

impl Activation {
    fn apply(&self, z: &Array2<f64>) -> Array2<f64> {
        match self {
            Activation::ReLU => z.mapv(|v| v.max(0.0)),
            Activation::Sigmoid => z.mapv(sigmoid),
            Activation::Tanh => z.mapv(|v| v.tanh()),
        }
    }

    fn derivative(&self, z: &Array2<f64>) -> Array2<f64> {
        match self {
            Activation::ReLU => z.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 }),
            Activation::Sigmoid => z.mapv(|v| {
                let s = sigmoid(v);
                s * (1.0 - s)
            }),
            Activation::Tanh => z.mapv(|v| 1.0 - v.tanh().powi(2)),
        }
    }
}

/// Neural Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MLPConfig {
    /// Hidden layer sizes
    pub hidden_layers: Vec<usize>,
    /// Activation function for hidden layers
    pub activation: Activation,
    /// Learning rate
    pub learning_rate: f64,
    /// Number of epochs
    pub max_epochs: usize,
    /// Batch size
    pub batch_size: usize,
    /// L2 regularization
    pub alpha: f64,
    /// Random seed for weight init and shuffling
    pub random_state: Option<u64>,
    /// Momentum
    pub momentum: f64,
}

impl Default for MLPConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![100],
            activation: Activation::ReLU,
            learning_rate: 0.01,
            max_epochs: 200,
            batch_size: 32,
            alpha: 0.0001,
            random_state: None,
            momentum: 0.9,
        }
    }
}

/// Multi-Layer Perceptron Classifier (binary)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MLPClassifier {
    config: MLPConfig,
    weights: Vec<Array2<f64>>,
    biases: Vec<Array1<f64>>,
    scaler: StandardScaler,
    n_features: usize,
}

impl Default for MLPClassifier {
    fn default() -> Self {
        Self::new(MLPConfig::default())
    }
}

impl MLPClassifier {
    pub fn new(config: MLPConfig) -> Self {
        Self {
            config,
            weights: Vec::new(),
            biases: Vec::new(),
            scaler: StandardScaler::new(),
            n_features: 0,
        }
    }

    pub fn config(&self) -> &MLPConfig {
        &self.config
    }

    fn validate_config(&self) -> Result<()> {
        if self.config.batch_size == 0 || self.config.hidden_layers.iter().any(|&n| n == 0) {
            return Err(EvalError::InvalidParameter {
                name: "batch_size/hidden_layers".to_string(),
                value: format!("{}/{:?}", self.config.batch_size, self.config.hidden_layers),
                reason: "sizes must be positive".to_string(),
            });
        }
        if !(self.config.learning_rate > 0.0) {
            return Err(EvalError::InvalidParameter {
                name: "learning_rate".to_string(),
                value: self.config.learning_rate.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    fn initialize_weights(&mut self, rng: &mut Xoshiro256PlusPlus) {
        self.weights.clear();
        self.biases.clear();

        let mut layer_sizes = vec![self.n_features];
        layer_sizes.extend(&self.config.hidden_layers);
        layer_sizes.push(1);

        for pair in layer_sizes.windows(2) {
            let (n_in, n_out) = (pair[0], pair[1]);
            // Glorot uniform
            let scale = (6.0 / (n_in + n_out) as f64).sqrt();
            let weights = Array2::from_shape_fn((n_in, n_out), |_| rng.gen_range(-scale..scale));
            self.weights.push(weights);
            self.biases.push(Array1::zeros(n_out));
        }
    }

    /// Returns per-layer activations (input first) and pre-activations
    fn forward(&self, x: &Array2<f64>) -> (Vec<Array2<f64>>, Vec<Array2<f64>>) {
        let mut activations = vec![x.clone()];
        let mut z_values = Vec::with_capacity(self.weights.len());
        let last = self.weights.len() - 1;

        for (i, (w, b)) in self.weights.iter().zip(self.biases.iter()).enumerate() {
            let z = activations[i].dot(w) + b;
            let a = if i < last {
                self.config.activation.apply(&z)
            } else {
                z.mapv(sigmoid)
            };
            z_values.push(z);
            activations.push(a);
        }

        (activations, z_values)
    }

    fn backward(
        &self,
        y: &Array2<f64>,
        activations: &[Array2<f64>],
        z_values: &[Array2<f64>],
    ) -> Vec<(Array2<f64>, Array1<f64>)> {
        let n = y.nrows() as f64;
        let mut gradients = Vec::with_capacity(self.weights.len());

        // log-loss gradient through the logistic output
        let mut delta = (&activations[activations.len() - 1] - y) / n;

        for i in (0..self.weights.len()).rev() {
            let grad_w = activations[i].t().dot(&delta) + &self.weights[i] * self.config.alpha;
            let grad_b = delta.sum_axis(Axis(0));
            gradients.push((grad_w, grad_b));

            if i > 0 {
                delta = delta.dot(&self.weights[i].t()) * self.config.activation.derivative(&z_values[i - 1]);
            }
        }

        gradients.reverse();
        gradients
    }

    fn output(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.weights.is_empty() {
            return Err(EvalError::ModelNotFitted);
        }
        check_n_features(x, self.n_features)?;
        let scaled = self.scaler.transform(x)?;
        let (mut activations, _) = self.forward(&scaled);
        let out = activations
            .pop()
            .ok_or_else(|| EvalError::ComputationError("network has no layers".to_string()))?;
        Ok(out.column(0).to_owned())
    }
}

impl Classifier for MLPClassifier {
    fn kind(&self) -> &'static str {
        "MLPClassifier"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE.with_probability()
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_binary_fit_input(x, y)?;
        self.validate_config()?;

        let n_samples = x.nrows();
        self.n_features = x.ncols();
        let x_scaled = self.scaler.fit_transform(x)?;
        let y_col = y.view().insert_axis(Axis(1)).to_owned();

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state.unwrap_or(0));
        self.initialize_weights(&mut rng);

        let mut velocities_w: Vec<Array2<f64>> = self.weights.iter().map(|w| Array2::zeros(w.raw_dim())).collect();
        let mut velocities_b: Vec<Array1<f64>> = self.biases.iter().map(|b| Array1::zeros(b.len())).collect();

        let mut indices: Vec<usize> = (0..n_samples).collect();
        for _epoch in 0..self.config.max_epochs {
            indices.shuffle(&mut rng);

            for batch in indices.chunks(self.config.batch_size) {
                let x_batch = x_scaled.select(Axis(0), batch);
                let y_batch = y_col.select(Axis(0), batch);

                let (activations, z_values) = self.forward(&x_batch);
                let gradients = self.backward(&y_batch, &activations, &z_values);

                for (i, (grad_w, grad_b)) in gradients.into_iter().enumerate() {
                    velocities_w[i] = &velocities_w[i] * self.config.momentum - &grad_w * self.config.learning_rate;
                    velocities_b[i] = &velocities_b[i] * self.config.momentum - &grad_b * self.config.learning_rate;
                    self.weights[i] += &velocities_w[i];
                    self.biases[i] += &velocities_b[i];
                }
            }
        }

        if self.weights.iter().any(|w| w.iter().any(|v| !v.is_finite())) {
            return Err(EvalError::TrainingError("MLP weights diverged".to_string()));
        }
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(threshold_labels(&self.output(x)?, 0.5))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.output(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn small_config() -> MLPConfig {
        MLPConfig {
            hidden_layers: vec![8],
            max_epochs: 300,
            batch_size: 4,
            learning_rate: 0.05,
            random_state: Some(1),
            ..Default::default()
        }
    }

    #[test]
    fn test_mlp_classifier_learns_separable_data() {
        let x = array![
            [0.0, 0.0],
            [0.2, 0.1],
            [0.1, 0.3],
            [0.3, 0.2],
            [2.0, 2.0],
            [2.2, 1.9],
            [1.8, 2.1],
            [2.1, 2.3],
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];

        let mut model = MLPClassifier::new(small_config());
        model.fit(&x, &y).unwrap();

        assert_eq!(model.score(&x, &y).unwrap(), 1.0);
        let proba = model.predict_proba(&x).unwrap();
        assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_mlp_is_reproducible() {
        let x = array![[0.0, 1.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]];
        let y = array![1.0, 1.0, 0.0, 0.0];

        let mut a = MLPClassifier::new(small_config());
        let mut b = MLPClassifier::new(small_config());
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap());
    }

    #[test]
    fn test_mlp_unfitted() {
        let model = MLPClassifier::default();
        assert!(matches!(model.predict(&array![[0.0]]), Err(EvalError::ModelNotFitted)));
    }
}
