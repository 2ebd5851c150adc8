//! Logistic regression via batch gradient descent

use super::{validate_input, Classifier, ModelError};
use serde::{Deserialize, Serialize};

/// Binary logistic regression.
///
/// Plain full-batch gradient descent on the logistic loss; the input is
/// expected to be standardized, which the pipeline's preprocessor
/// guarantees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    learning_rate: f64,
    max_iter: usize,
    weights: Vec<f64>,
    bias: f64,
}

impl LogisticRegression {
    pub fn new(learning_rate: f64, max_iter: usize) -> Self {
        Self {
            learning_rate,
            max_iter,
            weights: Vec::new(),
            bias: 0.0,
        }
    }

    fn decision(&self, row: &[f64]) -> f64 {
        let z: f64 = self
            .weights
            .iter()
            .zip(row)
            .map(|(w, v)| w * v)
            .sum::<f64>()
            + self.bias;
        sigmoid(z)
    }
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new(0.1, 300)
    }
}

impl Classifier for LogisticRegression {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), ModelError> {
        let width = validate_input(x, y)?;
        let n = x.len() as f64;

        self.weights = vec![0.0; width];
        self.bias = 0.0;

        for _ in 0..self.max_iter {
            let mut grad_w = vec![0.0; width];
            let mut grad_b = 0.0;

            for (row, &label) in x.iter().zip(y) {
                let err = self.decision(row) - label;
                for (g, v) in grad_w.iter_mut().zip(row) {
                    *g += err * v;
                }
                grad_b += err;
            }

            for (w, g) in self.weights.iter_mut().zip(&grad_w) {
                *w -= self.learning_rate * g / n;
            }
            self.bias -= self.learning_rate * grad_b / n;
        }
        Ok(())
    }

    fn predict_row(&self, row: &[f64]) -> f64 {
        if self.decision(row) >= 0.5 {
            1.0
        } else {
            0.0
        }
    }
}

pub(crate) fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}
