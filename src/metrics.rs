//! Classification metrics for trained-model evaluation.

use serde::{Deserialize, Serialize};

/// Quality of a model's predictions on one dataset split.
///
/// Derived once per (model, split) pair and never mutated afterwards. The
/// positive class is 1; zero denominators yield 0.0 rather than NaN.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetric {
    pub f1_score: f64,
    pub precision_score: f64,
    pub recall_score: f64,
}

impl ClassificationMetric {
    /// Compute precision, recall and F1 from parallel label sequences.
    pub fn from_predictions(y_true: &[f64], y_pred: &[f64]) -> Self {
        let counts = ConfusionCounts::from_predictions(y_true, y_pred);

        let precision = ratio(counts.true_positive, counts.true_positive + counts.false_positive);
        let recall = ratio(counts.true_positive, counts.true_positive + counts.false_negative);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Self {
            f1_score: f1,
            precision_score: precision,
            recall_score: recall,
        }
    }
}

/// Fraction of predictions matching the true labels.
pub fn accuracy(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let hits = y_true
        .iter()
        .zip(y_pred)
        .filter(|(t, p)| is_positive(**t) == is_positive(**p))
        .count();
    hits as f64 / y_true.len() as f64
}

/// Binary confusion counts with the positive class = 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfusionCounts {
    pub true_positive: u64,
    pub false_positive: u64,
    pub true_negative: u64,
    pub false_negative: u64,
}

impl ConfusionCounts {
    pub fn from_predictions(y_true: &[f64], y_pred: &[f64]) -> Self {
        let mut counts = Self::default();
        for (t, p) in y_true.iter().zip(y_pred) {
            match (is_positive(*t), is_positive(*p)) {
                (true, true) => counts.true_positive += 1,
                (false, true) => counts.false_positive += 1,
                (false, false) => counts.true_negative += 1,
                (true, false) => counts.false_negative += 1,
            }
        }
        counts
    }
}

fn is_positive(label: f64) -> bool {
    label >= 0.5
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_predictions() {
        let y = [1.0, 0.0, 1.0, 0.0];
        let metric = ClassificationMetric::from_predictions(&y, &y);

        assert_eq!(metric.precision_score, 1.0);
        assert_eq!(metric.recall_score, 1.0);
        assert_eq!(metric.f1_score, 1.0);
        assert_eq!(accuracy(&y, &y), 1.0);
    }

    #[test]
    fn test_known_confusion() {
        // tp=2, fp=1, fn=1, tn=1
        let y_true = [1.0, 1.0, 1.0, 0.0, 0.0];
        let y_pred = [1.0, 1.0, 0.0, 1.0, 0.0];
        let metric = ClassificationMetric::from_predictions(&y_true, &y_pred);

        assert!((metric.precision_score - 2.0 / 3.0).abs() < 1e-12);
        assert!((metric.recall_score - 2.0 / 3.0).abs() < 1e-12);
        assert!((metric.f1_score - 2.0 / 3.0).abs() < 1e-12);
        assert!((accuracy(&y_true, &y_pred) - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_no_positive_predictions_is_zero_not_nan() {
        let y_true = [1.0, 1.0];
        let y_pred = [0.0, 0.0];
        let metric = ClassificationMetric::from_predictions(&y_true, &y_pred);

        assert_eq!(metric.precision_score, 0.0);
        assert_eq!(metric.recall_score, 0.0);
        assert_eq!(metric.f1_score, 0.0);
    }
}
