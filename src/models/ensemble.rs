//! Ensemble classifiers: bagged random forest and boosted stumps

use super::tree::{DecisionTree, SplitCriterion};
use super::{has_both_classes, validate_input, Classifier, ModelError};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Random forest: seeded bootstrap samples, a random feature subspace per
/// tree, majority vote across trees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    n_estimators: usize,
    max_depth: usize,
    min_samples_leaf: usize,
    seed: u64,
    trees: Vec<ForestTree>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ForestTree {
    features: Vec<usize>,
    tree: DecisionTree,
}

impl RandomForest {
    pub fn new(n_estimators: usize, seed: u64) -> Self {
        Self {
            n_estimators,
            max_depth: 12,
            min_samples_leaf: 1,
            seed,
            trees: Vec::new(),
        }
    }
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(100, 42)
    }
}

impl Classifier for RandomForest {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), ModelError> {
        let width = validate_input(x, y)?;
        let n = x.len();
        let subspace = ((width as f64).sqrt().round() as usize).clamp(1, width);

        self.trees = Vec::with_capacity(self.n_estimators);
        for tree_idx in 0..self.n_estimators {
            let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(tree_idx as u64));

            let mut features: Vec<usize> = (0..width).collect();
            features.shuffle(&mut rng);
            features.truncate(subspace);
            features.sort_unstable();

            let mut sub_x = Vec::with_capacity(n);
            let mut sub_y = Vec::with_capacity(n);
            for _ in 0..n {
                let row = rng.gen_range(0..n);
                sub_x.push(features.iter().map(|&f| x[row][f]).collect::<Vec<f64>>());
                sub_y.push(y[row]);
            }

            let mut tree =
                DecisionTree::new(SplitCriterion::Gini, self.max_depth, self.min_samples_leaf);
            tree.fit(&sub_x, &sub_y)?;
            self.trees.push(ForestTree { features, tree });
        }
        Ok(())
    }

    fn predict_row(&self, row: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let votes = self
            .trees
            .iter()
            .filter(|t| {
                let projected: Vec<f64> = t.features.iter().map(|&f| row[f]).collect();
                t.tree.predict_row(&projected) >= 0.5
            })
            .count();
        if votes * 2 >= self.trees.len() {
            1.0
        } else {
            0.0
        }
    }
}

/// One weighted decision stump: the weak learner AdaBoost boosts over.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Stump {
    feature: usize,
    threshold: f64,
    /// Label predicted for rows at or below the threshold; the other side
    /// predicts the complement.
    left_label: f64,
}

impl Stump {
    fn predict_row(&self, row: &[f64]) -> f64 {
        if row[self.feature] <= self.threshold {
            self.left_label
        } else {
            1.0 - self.left_label
        }
    }

    /// Exhaustive search for the stump with minimal weighted error.
    fn best(x: &[Vec<f64>], y: &[f64], weights: &[f64]) -> (Stump, f64) {
        let width = x[0].len();
        let total_pos: f64 = y
            .iter()
            .zip(weights)
            .filter(|(l, _)| **l >= 0.5)
            .map(|(_, w)| w)
            .sum();
        let total: f64 = weights.iter().sum();

        // Fallback: predict the heavier class everywhere (no row sits at or
        // below -inf, so every row lands on the right side).
        let (majority, fallback_err) = if total_pos >= total - total_pos {
            (1.0, total - total_pos)
        } else {
            (0.0, total_pos)
        };
        let mut best = (
            Stump {
                feature: 0,
                threshold: f64::NEG_INFINITY,
                left_label: 1.0 - majority,
            },
            fallback_err,
        );

        for feature in 0..width {
            let mut order: Vec<usize> = (0..x.len()).collect();
            order.sort_by(|&a, &b| x[a][feature].total_cmp(&x[b][feature]));

            let mut left_pos = 0.0;
            let mut left_all = 0.0;
            for (rank, &i) in order.iter().enumerate() {
                left_all += weights[i];
                if y[i] >= 0.5 {
                    left_pos += weights[i];
                }
                if rank + 1 >= order.len() {
                    break;
                }
                let next = order[rank + 1];
                if x[next][feature] <= x[i][feature] {
                    continue;
                }
                let threshold = (x[i][feature] + x[next][feature]) / 2.0;

                // left side predicts 1: wrong on left negatives and right positives
                let err_left_one = (left_all - left_pos) + (total_pos - left_pos);
                if err_left_one < best.1 {
                    best = (
                        Stump {
                            feature,
                            threshold,
                            left_label: 1.0,
                        },
                        err_left_one,
                    );
                }
                // left side predicts 0: the complement
                let err_left_zero = total - err_left_one;
                if err_left_zero < best.1 {
                    best = (
                        Stump {
                            feature,
                            threshold,
                            left_label: 0.0,
                        },
                        err_left_zero,
                    );
                }
            }
        }
        best
    }
}

/// AdaBoost (SAMME) over weighted decision stumps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaBoost {
    n_estimators: usize,
    learning_rate: f64,
    stages: Vec<(Stump, f64)>,
}

impl AdaBoost {
    pub fn new(n_estimators: usize, learning_rate: f64) -> Self {
        Self {
            n_estimators,
            learning_rate,
            stages: Vec::new(),
        }
    }
}

impl Default for AdaBoost {
    fn default() -> Self {
        Self::new(50, 1.0)
    }
}

impl Classifier for AdaBoost {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), ModelError> {
        validate_input(x, y)?;
        if !has_both_classes(y) {
            return Err(ModelError::DegenerateTarget);
        }

        let n = x.len();
        let mut weights = vec![1.0 / n as f64; n];
        self.stages = Vec::with_capacity(self.n_estimators);

        for _ in 0..self.n_estimators {
            let (stump, err) = Stump::best(x, y, &weights);
            if err >= 0.5 {
                break;
            }
            let err = err.max(1e-10);
            let alpha = self.learning_rate * ((1.0 - err) / err).ln();

            let mut sum = 0.0;
            for (i, w) in weights.iter_mut().enumerate() {
                let wrong = (stump.predict_row(&x[i]) >= 0.5) != (y[i] >= 0.5);
                if wrong {
                    *w *= alpha.exp();
                }
                sum += *w;
            }
            for w in &mut weights {
                *w /= sum;
            }

            let perfect = err <= 1e-10;
            self.stages.push((stump, alpha));
            if perfect {
                break;
            }
        }
        Ok(())
    }

    fn predict_row(&self, row: &[f64]) -> f64 {
        let score: f64 = self
            .stages
            .iter()
            .map(|(stump, alpha)| alpha * (2.0 * stump.predict_row(row) - 1.0))
            .sum();
        if score > 0.0 {
            1.0
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_cluster_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..40)
            .map(|i| {
                let offset = if i < 20 { 0.0 } else { 5.0 };
                vec![offset + (i % 4) as f64 * 0.1, offset - (i % 3) as f64 * 0.1]
            })
            .collect();
        let y: Vec<f64> = (0..40).map(|i| if i < 20 { 0.0 } else { 1.0 }).collect();
        (x, y)
    }

    #[test]
    fn test_forest_fits_clusters() {
        let (x, y) = two_cluster_data();
        let mut forest = RandomForest::new(16, 42);
        forest.fit(&x, &y).unwrap();
        assert_eq!(forest.predict(&x), y);
    }

    #[test]
    fn test_forest_is_deterministic_per_seed() {
        let (x, y) = two_cluster_data();
        let mut a = RandomForest::new(8, 42);
        let mut b = RandomForest::new(8, 42);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict(&x), b.predict(&x));
    }

    #[test]
    fn test_adaboost_fits_clusters() {
        let (x, y) = two_cluster_data();
        let mut model = AdaBoost::new(16, 1.0);
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&x), y);
    }

    #[test]
    fn test_adaboost_rejects_single_class() {
        let x = vec![vec![1.0], vec![2.0]];
        let y = vec![1.0, 1.0];
        let mut model = AdaBoost::default();
        assert!(matches!(
            model.fit(&x, &y),
            Err(ModelError::DegenerateTarget)
        ));
    }
}
