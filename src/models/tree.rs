//! Exact-greedy CART decision tree

use super::{validate_input, Classifier, ModelError};
use serde::{Deserialize, Serialize};

/// Impurity measure used to score candidate splits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitCriterion {
    Gini,
    Entropy,
}

impl SplitCriterion {
    fn impurity(&self, ones: usize, total: usize) -> f64 {
        if total == 0 {
            return 0.0;
        }
        let p1 = ones as f64 / total as f64;
        let p0 = 1.0 - p1;
        match self {
            SplitCriterion::Gini => 1.0 - p0 * p0 - p1 * p1,
            SplitCriterion::Entropy => {
                let term = |p: f64| if p > 0.0 { -p * p.log2() } else { 0.0 };
                term(p0) + term(p1)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        prediction: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    fn predict_row(&self, row: &[f64]) -> f64 {
        match self {
            TreeNode::Leaf { prediction } => *prediction,
            TreeNode::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if row[*feature] <= *threshold {
                    left.predict_row(row)
                } else {
                    right.predict_row(row)
                }
            }
        }
    }
}

/// Binary classification tree with exact-greedy splits: every distinct
/// threshold of every feature is scanned, the best impurity reduction wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    criterion: SplitCriterion,
    max_depth: usize,
    min_samples_leaf: usize,
    root: Option<TreeNode>,
}

impl DecisionTree {
    pub fn new(criterion: SplitCriterion, max_depth: usize, min_samples_leaf: usize) -> Self {
        Self {
            criterion,
            max_depth,
            min_samples_leaf,
            root: None,
        }
    }

    fn build(&self, x: &[Vec<f64>], y: &[f64], indices: &[usize], depth: usize) -> TreeNode {
        let ones = indices.iter().filter(|&&i| y[i] >= 0.5).count();
        let majority = if ones * 2 >= indices.len() { 1.0 } else { 0.0 };

        if ones == 0
            || ones == indices.len()
            || depth >= self.max_depth
            || indices.len() < 2 * self.min_samples_leaf
        {
            return TreeNode::Leaf {
                prediction: majority,
            };
        }

        let Some((feature, threshold)) = self.best_split(x, y, indices, ones) else {
            return TreeNode::Leaf {
                prediction: majority,
            };
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[i][feature] <= threshold);

        TreeNode::Split {
            feature,
            threshold,
            left: Box::new(self.build(x, y, &left_idx, depth + 1)),
            right: Box::new(self.build(x, y, &right_idx, depth + 1)),
        }
    }

    fn best_split(
        &self,
        x: &[Vec<f64>],
        y: &[f64],
        indices: &[usize],
        ones: usize,
    ) -> Option<(usize, f64)> {
        let n = indices.len();
        let parent = self.criterion.impurity(ones, n);
        let mut best: Option<(f64, usize, f64)> = None;

        for feature in 0..x[indices[0]].len() {
            let mut values: Vec<(f64, bool)> = indices
                .iter()
                .map(|&i| (x[i][feature], y[i] >= 0.5))
                .collect();
            values.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left_n = 0usize;
            let mut left_ones = 0usize;
            for i in 0..n - 1 {
                left_n += 1;
                if values[i].1 {
                    left_ones += 1;
                }
                // Only cut between distinct values
                if values[i + 1].0 <= values[i].0 {
                    continue;
                }
                let right_n = n - left_n;
                if left_n < self.min_samples_leaf || right_n < self.min_samples_leaf {
                    continue;
                }

                let weighted = (left_n as f64 * self.criterion.impurity(left_ones, left_n)
                    + right_n as f64 * self.criterion.impurity(ones - left_ones, right_n))
                    / n as f64;
                let gain = parent - weighted;
                if gain > 1e-12 && best.map_or(true, |(g, _, _)| gain > g) {
                    best = Some((gain, feature, (values[i].0 + values[i + 1].0) / 2.0));
                }
            }
        }
        best.map(|(_, feature, threshold)| (feature, threshold))
    }
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new(SplitCriterion::Gini, 24, 1)
    }
}

impl Classifier for DecisionTree {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), ModelError> {
        validate_input(x, y)?;
        let indices: Vec<usize> = (0..x.len()).collect();
        self.root = Some(self.build(x, y, &indices, 0));
        Ok(())
    }

    fn predict_row(&self, row: &[f64]) -> f64 {
        match &self.root {
            Some(root) => root.predict_row(row),
            None => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn threshold_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64, 0.0]).collect();
        let y: Vec<f64> = (0..20).map(|i| if i < 10 { 0.0 } else { 1.0 }).collect();
        (x, y)
    }

    #[test]
    fn test_learns_single_threshold() {
        let (x, y) = threshold_data();
        for criterion in [SplitCriterion::Gini, SplitCriterion::Entropy] {
            let mut tree = DecisionTree::new(criterion, 4, 1);
            tree.fit(&x, &y).unwrap();
            assert_eq!(tree.predict(&x), y);
        }
    }

    #[test]
    fn test_single_class_yields_constant_leaf() {
        let x = vec![vec![1.0], vec![2.0], vec![3.0]];
        let y = vec![1.0, 1.0, 1.0];
        let mut tree = DecisionTree::default();
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.predict(&x), y);
    }

    #[test]
    fn test_serialization_round_trip() {
        let (x, y) = threshold_data();
        let mut tree = DecisionTree::default();
        tree.fit(&x, &y).unwrap();

        let encoded = serde_json::to_string(&tree).unwrap();
        let decoded: DecisionTree = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.predict(&x), tree.predict(&x));
    }
}
