//! Candidate classifier families for the model search

pub mod boosting;
pub mod ensemble;
pub mod linear;
pub mod search;
pub mod tree;

pub use boosting::{GradientBoosting, XgBoost};
pub use ensemble::{AdaBoost, RandomForest};
pub use linear::LogisticRegression;
pub use search::{candidate_roster, CandidateSpec, ModelReport};
pub use tree::{DecisionTree, SplitCriterion};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while fitting an estimator.
///
/// During the model search a fit failure only removes that candidate family
/// from consideration; the search itself fails only when every family fails.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("empty training set")]
    EmptyTrainingSet,

    #[error("feature count mismatch: expected {expected}, got {got}")]
    FeatureMismatch { expected: usize, got: usize },

    #[error("target contains a single class; boosting requires both")]
    DegenerateTarget,
}

/// A trainable binary classifier: fit on numeric feature rows with {0,1}
/// labels, then predict a label per input row.
pub trait Classifier {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), ModelError>;

    fn predict_row(&self, row: &[f64]) -> f64;

    fn predict(&self, x: &[Vec<f64>]) -> Vec<f64> {
        x.iter().map(|row| self.predict_row(row)).collect()
    }
}

/// The closed set of candidate families.
///
/// Serializes as the model's parameter state (hyperparameters plus fitted
/// coefficients/trees), which is what gets persisted and logged; no variant
/// holds a runtime handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Model {
    RandomForest(RandomForest),
    DecisionTree(DecisionTree),
    GradientBoosting(GradientBoosting),
    LogisticRegression(LogisticRegression),
    AdaBoost(AdaBoost),
    XgBoost(XgBoost),
}

impl Model {
    /// Family name, used for selection reports and registry entries.
    pub fn name(&self) -> &'static str {
        match self {
            Model::RandomForest(_) => "random_forest",
            Model::DecisionTree(_) => "decision_tree",
            Model::GradientBoosting(_) => "gradient_boosting",
            Model::LogisticRegression(_) => "logistic_regression",
            Model::AdaBoost(_) => "adaboost",
            Model::XgBoost(_) => "xgboost",
        }
    }

    pub fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), ModelError> {
        match self {
            Model::RandomForest(m) => m.fit(x, y),
            Model::DecisionTree(m) => m.fit(x, y),
            Model::GradientBoosting(m) => m.fit(x, y),
            Model::LogisticRegression(m) => m.fit(x, y),
            Model::AdaBoost(m) => m.fit(x, y),
            Model::XgBoost(m) => m.fit(x, y),
        }
    }

    pub fn predict(&self, x: &[Vec<f64>]) -> Vec<f64> {
        match self {
            Model::RandomForest(m) => m.predict(x),
            Model::DecisionTree(m) => m.predict(x),
            Model::GradientBoosting(m) => m.predict(x),
            Model::LogisticRegression(m) => m.predict(x),
            Model::AdaBoost(m) => m.predict(x),
            Model::XgBoost(m) => m.predict(x),
        }
    }
}

pub(crate) fn validate_input(x: &[Vec<f64>], y: &[f64]) -> Result<usize, ModelError> {
    if x.is_empty() || y.len() != x.len() {
        return Err(ModelError::EmptyTrainingSet);
    }
    let width = x[0].len();
    if width == 0 {
        return Err(ModelError::EmptyTrainingSet);
    }
    for row in x {
        if row.len() != width {
            return Err(ModelError::FeatureMismatch {
                expected: width,
                got: row.len(),
            });
        }
    }
    Ok(width)
}

pub(crate) fn has_both_classes(y: &[f64]) -> bool {
    y.iter().any(|&v| v >= 0.5) && y.iter().any(|&v| v < 0.5)
}
