use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{Classifier, ModelError, check_training_set, sigmoid};

/// Training options for the logistic regression classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogRegParams {
    pub epochs: usize,
    pub learning_rate: f64,
    pub l2: f64,
    pub batch_size: usize,
    pub seed: u64,
}

impl Default for LogRegParams {
    fn default() -> Self {
        Self {
            epochs: 200,
            learning_rate: 0.1,
            l2: 1e-4,
            batch_size: 32,
            seed: 42,
        }
    }
}

/// Binary logistic regression over standardized features.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub params: LogRegParams,
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
    pub weights: Vec<f64>,
    pub bias: f64,
}

impl LogisticRegression {
    pub fn new(params: LogRegParams) -> Self {
        Self {
            params,
            means: Vec::new(),
            scales: Vec::new(),
            weights: Vec::new(),
            bias: 0.0,
        }
    }

    fn logit(&self, row: &[f64]) -> f64 {
        self.weights
            .iter()
            .zip(&self.means)
            .zip(&self.scales)
            .zip(row)
            .fold(self.bias, |sum, (((w, mean), scale), x)| {
                sum + w * (x - mean) / scale
            })
    }
}

impl Classifier for LogisticRegression {
    fn fit(&mut self, rows: &[Vec<f64>], labels: &[u8]) -> Result<(), ModelError> {
        let dim = check_training_set(rows, labels)?;
        let (means, scales) = standardization(rows, dim);
        let x: Vec<Vec<f64>> = rows
            .iter()
            .map(|row| {
                row.iter()
                    .zip(means.iter().zip(&scales))
                    .map(|(v, (mean, scale))| (v - mean) / scale)
                    .collect()
            })
            .collect();

        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let mut weights: Vec<f64> = (0..dim).map(|_| (rng.random::<f64>() - 0.5) * 0.01).collect();
        let mut bias = 0.0;
        let mut indices: Vec<usize> = (0..x.len()).collect();
        let batch_size = self.params.batch_size.max(1);
        let lr = self.params.learning_rate;
        let l2 = self.params.l2.max(0.0);

        for _epoch in 0..self.params.epochs {
            indices.shuffle(&mut rng);
            for chunk in indices.chunks(batch_size) {
                let mut grad_w = vec![0.0; dim];
                let mut grad_b = 0.0;
                for &idx in chunk {
                    let z = x[idx].iter().zip(&weights).fold(bias, |sum, (v, w)| sum + v * w);
                    let diff = sigmoid(z) - f64::from(labels[idx]);
                    for (grad, v) in grad_w.iter_mut().zip(&x[idx]) {
                        *grad += diff * v;
                    }
                    grad_b += diff;
                }
                let inv = 1.0 / chunk.len() as f64;
                for (w, grad) in weights.iter_mut().zip(&grad_w) {
                    *w -= lr * (grad * inv + l2 * *w);
                }
                bias -= lr * grad_b * inv;
            }
        }

        self.means = means;
        self.scales = scales;
        self.weights = weights;
        self.bias = bias;
        tracing::debug!(
            "Logistic regression fitted on {} rows x {} features",
            rows.len(),
            dim
        );
        Ok(())
    }

    fn predict_probability(&self, row: &[f64]) -> f64 {
        sigmoid(self.logit(row))
    }

    fn feature_count(&self) -> Option<usize> {
        (!self.weights.is_empty()).then_some(self.weights.len())
    }
}

/// Per-feature mean and standard deviation; constant features get scale `1`.
fn standardization(rows: &[Vec<f64>], dim: usize) -> (Vec<f64>, Vec<f64>) {
    let n = rows.len() as f64;
    let mut means = vec![0.0; dim];
    for row in rows {
        for (mean, v) in means.iter_mut().zip(row) {
            *mean += v / n;
        }
    }
    let mut scales = vec![0.0; dim];
    for row in rows {
        for ((scale, mean), v) in scales.iter_mut().zip(&means).zip(row) {
            *scale += (v - mean) * (v - mean) / n;
        }
    }
    for scale in &mut scales {
        *scale = scale.sqrt();
        if !scale.is_normal() {
            *scale = 1.0;
        }
    }
    (means, scales)
}
