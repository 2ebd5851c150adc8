//! Boosted-tree classifiers on the logistic loss
//!
//! Both families share one regression-tree builder driven by per-row
//! gradients and hessians. Plain gradient boosting uses unit hessians;
//! the extreme variant uses the true logistic hessian p(1-p) plus L2
//! regularization on leaf weights.

use super::linear::sigmoid;
use super::{has_both_classes, validate_input, Classifier, ModelError};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
enum RegNode {
    Leaf {
        weight: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<RegNode>,
        right: Box<RegNode>,
    },
}

impl RegNode {
    fn score_row(&self, row: &[f64]) -> f64 {
        match self {
            RegNode::Leaf { weight } => *weight,
            RegNode::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if row[*feature] <= *threshold {
                    left.score_row(row)
                } else {
                    right.score_row(row)
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct TreeParams {
    max_depth: usize,
    min_samples_leaf: usize,
    lambda: f64,
}

/// Leaf weight is the Newton step -G/(H+λ) expressed with G = Σ(y - p),
/// so the weight is added, not subtracted.
fn leaf_weight(grad_sum: f64, hess_sum: f64, lambda: f64) -> f64 {
    grad_sum / (hess_sum + lambda)
}

fn split_score(grad_sum: f64, hess_sum: f64, lambda: f64) -> f64 {
    grad_sum * grad_sum / (hess_sum + lambda)
}

fn build_tree(
    x: &[Vec<f64>],
    grad: &[f64],
    hess: &[f64],
    indices: &[usize],
    depth: usize,
    params: TreeParams,
) -> RegNode {
    let grad_sum: f64 = indices.iter().map(|&i| grad[i]).sum();
    let hess_sum: f64 = indices.iter().map(|&i| hess[i]).sum();
    let leaf = RegNode::Leaf {
        weight: leaf_weight(grad_sum, hess_sum, params.lambda),
    };

    if depth >= params.max_depth || indices.len() < 2 * params.min_samples_leaf {
        return leaf;
    }

    let parent_score = split_score(grad_sum, hess_sum, params.lambda);
    let mut best: Option<(f64, usize, f64)> = None;

    for feature in 0..x[indices[0]].len() {
        let mut order: Vec<usize> = indices.to_vec();
        order.sort_by(|&a, &b| x[a][feature].total_cmp(&x[b][feature]));

        let mut left_grad = 0.0;
        let mut left_hess = 0.0;
        for (rank, &i) in order.iter().enumerate() {
            left_grad += grad[i];
            left_hess += hess[i];
            if rank + 1 >= order.len() {
                break;
            }
            let next = order[rank + 1];
            if x[next][feature] <= x[i][feature] {
                continue;
            }
            let left_n = rank + 1;
            let right_n = order.len() - left_n;
            if left_n < params.min_samples_leaf || right_n < params.min_samples_leaf {
                continue;
            }

            let gain = split_score(left_grad, left_hess, params.lambda)
                + split_score(grad_sum - left_grad, hess_sum - left_hess, params.lambda)
                - parent_score;
            if gain > 1e-12 && best.map_or(true, |(g, _, _)| gain > g) {
                best = Some((
                    gain,
                    feature,
                    (x[i][feature] + x[next][feature]) / 2.0,
                ));
            }
        }
    }

    let Some((_, feature, threshold)) = best else {
        return leaf;
    };
    let (left_idx, right_idx): (Vec<usize>, Vec<usize>) =
        indices.iter().partition(|&&i| x[i][feature] <= threshold);

    RegNode::Split {
        feature,
        threshold,
        left: Box::new(build_tree(x, grad, hess, &left_idx, depth + 1, params)),
        right: Box::new(build_tree(x, grad, hess, &right_idx, depth + 1, params)),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BoostedEnsemble {
    init_score: f64,
    trees: Vec<RegNode>,
}

impl BoostedEnsemble {
    fn empty() -> Self {
        Self {
            init_score: 0.0,
            trees: Vec::new(),
        }
    }

    fn score_row(&self, row: &[f64], learning_rate: f64) -> f64 {
        self.init_score
            + learning_rate
                * self
                    .trees
                    .iter()
                    .map(|tree| tree.score_row(row))
                    .sum::<f64>()
    }
}

#[allow(clippy::too_many_arguments)]
fn fit_boosted(
    x: &[Vec<f64>],
    y: &[f64],
    n_estimators: usize,
    learning_rate: f64,
    subsample: f64,
    seed: u64,
    params: TreeParams,
    second_order: bool,
) -> Result<BoostedEnsemble, ModelError> {
    validate_input(x, y)?;
    if !has_both_classes(y) {
        return Err(ModelError::DegenerateTarget);
    }

    let n = x.len();
    let positive = y.iter().filter(|&&v| v >= 0.5).count() as f64 / n as f64;
    let init_score = (positive / (1.0 - positive)).ln();

    let mut scores = vec![init_score; n];
    let mut ensemble = BoostedEnsemble {
        init_score,
        trees: Vec::with_capacity(n_estimators),
    };

    for round in 0..n_estimators {
        let mut grad = vec![0.0; n];
        let mut hess = vec![0.0; n];
        for i in 0..n {
            let p = sigmoid(scores[i]);
            grad[i] = y[i] - p;
            hess[i] = if second_order { (p * (1.0 - p)).max(1e-12) } else { 1.0 };
        }

        let indices: Vec<usize> = if subsample < 1.0 {
            let mut all: Vec<usize> = (0..n).collect();
            all.shuffle(&mut StdRng::seed_from_u64(seed.wrapping_add(round as u64)));
            let take = ((subsample * n as f64).round() as usize).clamp(1, n);
            all.truncate(take);
            all
        } else {
            (0..n).collect()
        };

        let tree = build_tree(x, &grad, &hess, &indices, 0, params);
        for i in 0..n {
            scores[i] += learning_rate * tree.score_row(&x[i]);
        }
        ensemble.trees.push(tree);
    }
    Ok(ensemble)
}

/// Gradient-boosted trees with first-order (unit-hessian) leaf estimates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoosting {
    learning_rate: f64,
    n_estimators: usize,
    subsample: f64,
    max_depth: usize,
    seed: u64,
    ensemble: BoostedEnsemble,
}

impl GradientBoosting {
    pub fn new(learning_rate: f64, n_estimators: usize, subsample: f64, seed: u64) -> Self {
        Self {
            learning_rate,
            n_estimators,
            subsample,
            max_depth: 3,
            seed,
            ensemble: BoostedEnsemble::empty(),
        }
    }
}

impl Default for GradientBoosting {
    fn default() -> Self {
        Self::new(0.1, 100, 1.0, 42)
    }
}

impl Classifier for GradientBoosting {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), ModelError> {
        self.ensemble = fit_boosted(
            x,
            y,
            self.n_estimators,
            self.learning_rate,
            self.subsample,
            self.seed,
            TreeParams {
                max_depth: self.max_depth,
                min_samples_leaf: 1,
                lambda: 0.0,
            },
            false,
        )?;
        Ok(())
    }

    fn predict_row(&self, row: &[f64]) -> f64 {
        if self.ensemble.trees.is_empty() {
            return 0.0;
        }
        if sigmoid(self.ensemble.score_row(row, self.learning_rate)) >= 0.5 {
            1.0
        } else {
            0.0
        }
    }
}

/// Extreme gradient boosting: second-order leaf estimates with L2
/// regularization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XgBoost {
    learning_rate: f64,
    n_estimators: usize,
    max_depth: usize,
    subsample: f64,
    lambda: f64,
    seed: u64,
    ensemble: BoostedEnsemble,
}

impl XgBoost {
    pub fn new(
        learning_rate: f64,
        n_estimators: usize,
        max_depth: usize,
        subsample: f64,
        seed: u64,
    ) -> Self {
        Self {
            learning_rate,
            n_estimators,
            max_depth,
            subsample,
            lambda: 1.0,
            seed,
            ensemble: BoostedEnsemble::empty(),
        }
    }
}

impl Default for XgBoost {
    fn default() -> Self {
        Self::new(0.3, 100, 6, 1.0, 42)
    }
}

impl Classifier for XgBoost {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), ModelError> {
        self.ensemble = fit_boosted(
            x,
            y,
            self.n_estimators,
            self.learning_rate,
            self.subsample,
            self.seed,
            TreeParams {
                max_depth: self.max_depth,
                min_samples_leaf: 1,
                lambda: self.lambda,
            },
            true,
        )?;
        Ok(())
    }

    fn predict_row(&self, row: &[f64]) -> f64 {
        if self.ensemble.trees.is_empty() {
            return 0.0;
        }
        if sigmoid(self.ensemble.score_row(row, self.learning_rate)) >= 0.5 {
            1.0
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xor_free_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..60)
            .map(|i| vec![(i % 10) as f64, if i < 30 { -2.0 } else { 2.0 }])
            .collect();
        let y: Vec<f64> = (0..60).map(|i| if i < 30 { 0.0 } else { 1.0 }).collect();
        (x, y)
    }

    #[test]
    fn test_gradient_boosting_fits() {
        let (x, y) = xor_free_data();
        let mut model = GradientBoosting::new(0.1, 32, 1.0, 42);
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&x), y);
    }

    #[test]
    fn test_xgboost_fits() {
        let (x, y) = xor_free_data();
        let mut model = XgBoost::new(0.1, 32, 3, 1.0, 42);
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&x), y);
    }

    #[test]
    fn test_subsample_is_deterministic() {
        let (x, y) = xor_free_data();
        let mut a = XgBoost::new(0.1, 16, 3, 0.7, 42);
        let mut b = XgBoost::new(0.1, 16, 3, 0.7, 42);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict(&x), b.predict(&x));
    }

    #[test]
    fn test_boosting_rejects_single_class() {
        let x = vec![vec![0.0], vec![1.0]];
        let y = vec![0.0, 0.0];
        assert!(matches!(
            GradientBoosting::default().fit(&x, &y),
            Err(ModelError::DegenerateTarget)
        ));
        assert!(matches!(
            XgBoost::default().fit(&x, &y),
            Err(ModelError::DegenerateTarget)
        ));
    }
}
