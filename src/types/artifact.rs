//! Stage artifact records
//!
//! Every pipeline stage returns exactly one artifact: a set of file-path
//! handles (plus measured quality, for the final one). Artifacts are
//! immutable once returned; the on-disk files they point at, not the
//! in-memory objects, are the unit of hand-off between stages.

use crate::metrics::ClassificationMetric;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Output of the data-ingestion stage: two disjoint row partitions of the
/// same schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataIngestionArtifact {
    pub trained_file_path: PathBuf,
    pub test_file_path: PathBuf,
}

/// Output of the data-transformation stage: a fitted preprocessing transform
/// plus numeric arrays aligned row-for-row with the ingestion split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataTransformationArtifact {
    pub transformed_object_file_path: PathBuf,
    pub transformed_train_file_path: PathBuf,
    pub transformed_test_file_path: PathBuf,
}

/// Final artifact of a pipeline run: where the packaged predictor lives and
/// how it measured on both partitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelTrainerArtifact {
    pub trained_model_file_path: PathBuf,
    pub train_metric: ClassificationMetric,
    pub test_metric: ClassificationMetric,
}
