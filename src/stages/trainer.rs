//! Model search stage: grid search, selection, quality measurement

use crate::config::TrainingConfig;
use crate::error::{PipelineError, Result};
use crate::metrics::ClassificationMetric;
use crate::models::search::{self, ModelReport};
use crate::models::Model;
use crate::persist;
use crate::types::artifact::DataTransformationArtifact;
use tracing::info;

/// Everything the search produced: the fitted winner, the per-family
/// evaluation grid, and the winner's measured quality on both partitions.
#[derive(Debug)]
pub struct SearchOutcome {
    pub model: Model,
    pub report: ModelReport,
    pub train_metric: ClassificationMetric,
    pub test_metric: ClassificationMetric,
}

/// Third pipeline stage: loads the transformed arrays, searches the fixed
/// candidate roster, and measures the winner.
pub struct ModelSearchStage {
    cv_folds: usize,
    search_seed: u64,
}

impl ModelSearchStage {
    pub fn new(config: &TrainingConfig) -> Self {
        Self {
            cv_folds: config.cv_folds,
            search_seed: config.search_seed,
        }
    }

    /// Load arrays from the transformation artifact (label is the last
    /// column) and run [`search`](Self::search).
    pub fn run(&self, transformation: &DataTransformationArtifact) -> Result<SearchOutcome> {
        let train: Vec<Vec<f64>> =
            persist::load_json(&transformation.transformed_train_file_path)?;
        let test: Vec<Vec<f64>> = persist::load_json(&transformation.transformed_test_file_path)?;

        let (x_train, y_train) = split_features_label(train)?;
        let (x_test, y_test) = split_features_label(test)?;
        self.search(&x_train, &y_train, &x_test, &y_test)
    }

    /// Search the candidate roster and compute the winner's classification
    /// metrics on both partitions.
    pub fn search(
        &self,
        x_train: &[Vec<f64>],
        y_train: &[f64],
        x_test: &[Vec<f64>],
        y_test: &[f64],
    ) -> Result<SearchOutcome> {
        let (model, report) = search::search(
            x_train,
            y_train,
            x_test,
            y_test,
            self.cv_folds,
            self.search_seed,
        )?;

        let train_metric =
            ClassificationMetric::from_predictions(y_train, &model.predict(x_train));
        let test_metric = ClassificationMetric::from_predictions(y_test, &model.predict(x_test));
        info!(
            family = model.name(),
            train_f1 = train_metric.f1_score,
            test_f1 = test_metric.f1_score,
            "Model search complete"
        );

        Ok(SearchOutcome {
            model,
            report,
            train_metric,
            test_metric,
        })
    }
}

fn split_features_label(array: Vec<Vec<f64>>) -> Result<(Vec<Vec<f64>>, Vec<f64>)> {
    let mut x = Vec::with_capacity(array.len());
    let mut y = Vec::with_capacity(array.len());
    for mut row in array {
        let label = row.pop().ok_or_else(|| {
            PipelineError::Training("transformed array contains an empty row".to_string())
        })?;
        if row.is_empty() {
            return Err(PipelineError::Training(
                "transformed array has no feature columns".to_string(),
            ));
        }
        x.push(row);
        y.push(label);
    }
    Ok((x, y))
}
