//! Data transformation stage: fitted preprocessing plus numeric arrays

use crate::config::ArtifactStore;
use crate::error::{PipelineError, Result};
use crate::persist;
use crate::types::artifact::{DataIngestionArtifact, DataTransformationArtifact};
use crate::types::frame::DataFrame;
use serde::{Deserialize, Serialize};
use tracing::info;

/// A fitted, reusable preprocessing transform: per-feature median
/// imputation followed by standardization.
///
/// Fitting records the training schema (the feature names in training
/// order, with the label excluded), which the packaged predictor later uses
/// to validate and reorder serving input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    label_column: String,
    feature_names: Vec<String>,
    medians: Vec<f64>,
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl Preprocessor {
    /// Fit on a training frame; the label column is excluded from the
    /// schema and must be the only non-feature column present.
    pub fn fit(frame: &DataFrame, label_column: &str) -> Result<Self> {
        let features = frame.drop_column(label_column);
        if features.n_cols() == 0 || features.n_rows() == 0 {
            return Err(PipelineError::Schema(
                "cannot fit a preprocessor on an empty frame".to_string(),
            ));
        }

        let mut medians = Vec::with_capacity(features.n_cols());
        let mut means = Vec::with_capacity(features.n_cols());
        let mut stds = Vec::with_capacity(features.n_cols());

        for name in features.columns() {
            let cells = features.column(name).unwrap_or_default();
            let mut present: Vec<f64> = cells.iter().filter_map(|c| *c).collect();
            if present.is_empty() {
                return Err(PipelineError::Schema(format!(
                    "feature column {name:?} has no observed values"
                )));
            }
            present.sort_by(|a, b| a.total_cmp(b));
            let median = present[present.len() / 2];

            let imputed: Vec<f64> = cells.iter().map(|c| c.unwrap_or(median)).collect();
            let mean = imputed.iter().sum::<f64>() / imputed.len() as f64;
            let variance = imputed.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
                / imputed.len() as f64;
            let std = variance.sqrt();

            medians.push(median);
            means.push(mean);
            stds.push(if std > 0.0 { std } else { 1.0 });
        }

        Ok(Self {
            label_column: label_column.to_string(),
            feature_names: features.columns().to_vec(),
            medians,
            means,
            stds,
        })
    }

    /// The fitted training schema, in training column order.
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn label_column(&self) -> &str {
        &self.label_column
    }

    /// Transform a frame whose columns already match the fitted schema in
    /// both membership and order.
    pub fn transform(&self, frame: &DataFrame) -> Result<Vec<Vec<f64>>> {
        if frame.columns() != self.feature_names.as_slice() {
            return Err(PipelineError::Schema(format!(
                "columns {:?} do not match the fitted schema {:?}",
                frame.columns(),
                self.feature_names
            )));
        }
        Ok(frame
            .rows()
            .iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .map(|(i, cell)| {
                        let value = cell.unwrap_or(self.medians[i]);
                        (value - self.means[i]) / self.stds[i]
                    })
                    .collect()
            })
            .collect())
    }
}

/// Second pipeline stage: fit the preprocessor on the train partition,
/// transform both partitions into numeric arrays (label appended as the
/// last column), persist everything.
pub struct DataTransformationStage {
    label_column: String,
    store: ArtifactStore,
}

impl DataTransformationStage {
    pub fn new(label_column: &str, store: &ArtifactStore) -> Self {
        Self {
            label_column: label_column.to_string(),
            store: store.clone(),
        }
    }

    pub fn run(&self, ingestion: &DataIngestionArtifact) -> Result<DataTransformationArtifact> {
        let train = DataFrame::from_csv_path(&ingestion.trained_file_path)?;
        let test = DataFrame::from_csv_path(&ingestion.test_file_path)?;

        let preprocessor = Preprocessor::fit(&train, &self.label_column)?;
        let train_array = self.transform_with_label(&preprocessor, &train)?;
        let test_array = self.transform_with_label(&preprocessor, &test)?;
        info!(
            features = preprocessor.feature_names().len(),
            train_rows = train_array.len(),
            test_rows = test_array.len(),
            "Fitted preprocessor and transformed both partitions"
        );

        let artifact = DataTransformationArtifact {
            transformed_object_file_path: self.store.preprocessor_path(),
            transformed_train_file_path: self.store.transformed_train_path(),
            transformed_test_file_path: self.store.transformed_test_path(),
        };
        persist::save_json(&artifact.transformed_object_file_path, &preprocessor)?;
        persist::save_json(&artifact.transformed_train_file_path, &train_array)?;
        persist::save_json(&artifact.transformed_test_file_path, &test_array)?;
        Ok(artifact)
    }

    fn transform_with_label(
        &self,
        preprocessor: &Preprocessor,
        frame: &DataFrame,
    ) -> Result<Vec<Vec<f64>>> {
        let labels = frame.column(&self.label_column).ok_or_else(|| {
            PipelineError::Schema(format!(
                "label column {:?} is missing from the ingested data",
                self.label_column
            ))
        })?;

        let features = frame.select(&preprocessor.feature_names().to_vec())?;
        let mut rows = preprocessor.transform(&features)?;
        for (row, label) in rows.iter_mut().zip(labels) {
            let label = label.ok_or_else(|| {
                PipelineError::Schema(format!(
                    "label column {:?} contains a missing value",
                    self.label_column
                ))
            })?;
            if label != 0.0 && label != 1.0 {
                return Err(PipelineError::Schema(format!(
                    "label column {:?} must be binary, found {label}",
                    self.label_column
                )));
            }
            row.push(label);
        }
        Ok(rows)
    }
}
