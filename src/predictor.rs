//! Deployable predictor bundle and its packaging stage

use crate::config::{ArtifactStore, CloudConfig};
use crate::error::{PipelineError, Result};
use crate::metrics::ClassificationMetric;
use crate::models::Model;
use crate::persist;
use crate::stages::transformation::Preprocessor;
use crate::types::artifact::{DataTransformationArtifact, ModelTrainerArtifact};
use crate::types::frame::DataFrame;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{info, warn};

/// Optional remote-endpoint predictor.
///
/// Expensive to reach and never required: `predict` returns `None` on any
/// failure so callers fall back to the local model. Held behind a lazy
/// accessor on [`PackagedPredictor`] and excluded from serialized state.
#[derive(Debug)]
pub struct CloudPredictor {
    config: CloudConfig,
}

impl CloudPredictor {
    pub fn new(config: &CloudConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Invoke the deployed endpoint; `None` signals the caller to fall back
    /// to local prediction.
    pub fn predict(&self, frame: &DataFrame) -> Option<Vec<f64>> {
        if self.config.endpoint_name.is_empty() {
            return None;
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .ok()?;
        let url = format!(
            "{}/workspaces/{}/score",
            self.config.endpoint_name, self.config.workspace
        );
        let response = client.post(url).json(frame).send().ok()?;
        let labels = response.error_for_status().ok()?.json::<Vec<f64>>().ok()?;
        if labels.len() == frame.n_rows() {
            Some(labels)
        } else {
            warn!("Cloud endpoint returned a mismatched label count");
            None
        }
    }
}

/// The deployable bundle: one fitted preprocessing transform plus one
/// fitted estimator behind a single predict interface.
///
/// The cloud handle is a transient field: `#[serde(skip)]` keeps it out of
/// serialized state, so deserialization never attempts a network call and
/// the handle is reconstructed lazily on first access after load.
#[derive(Debug, Serialize, Deserialize)]
pub struct PackagedPredictor {
    preprocessor: Preprocessor,
    model: Model,
    #[serde(skip)]
    cloud: OnceLock<CloudPredictor>,
}

impl PackagedPredictor {
    pub fn new(preprocessor: Preprocessor, model: Model) -> Self {
        Self {
            preprocessor,
            model,
            cloud: OnceLock::new(),
        }
    }

    /// Family name of the wrapped estimator.
    pub fn model_name(&self) -> &'static str {
        self.model.name()
    }

    /// Construct-once-and-cache accessor for the cloud predictor.
    pub fn cloud_predictor(&self, config: &CloudConfig) -> &CloudPredictor {
        self.cloud.get_or_init(|| CloudPredictor::new(config))
    }

    /// Predict one label per input row, in input row order.
    ///
    /// The input is validated against the fitted training schema: the label
    /// column is dropped if present, missing features are fatal, extra
    /// columns are dropped with a warning, and columns are reordered to the
    /// fitted training order before the transform runs, since a silent
    /// order mismatch would corrupt every downstream value.
    pub fn predict(&self, input: &DataFrame) -> Result<Vec<f64>> {
        let required = self.preprocessor.feature_names();
        let frame = input.drop_column(self.preprocessor.label_column());

        let missing: Vec<String> = required
            .iter()
            .filter(|name| !frame.has_column(name))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::MissingFeatures(missing));
        }

        let extra: Vec<&str> = frame
            .columns()
            .iter()
            .filter(|name| !required.contains(name))
            .map(|name| name.as_str())
            .collect();
        if !extra.is_empty() {
            warn!(columns = ?extra, "Ignoring extra feature columns");
        }

        let ordered = frame.select(&required.to_vec())?;
        let features = self.preprocessor.transform(&ordered)?;
        Ok(self.model.predict(&features))
    }

    /// Predict from a bare numeric array, coercing it into the fitted
    /// schema; rows that do not match the schema's width are a
    /// [`PipelineError::Schema`].
    pub fn predict_rows(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        let required = self.preprocessor.feature_names();
        let mut frame = DataFrame::new(required.to_vec());
        for row in rows {
            if row.len() != required.len() {
                return Err(PipelineError::Schema(format!(
                    "cannot coerce a row of {} values into {} features",
                    row.len(),
                    required.len()
                )));
            }
            frame.push_row(row.iter().map(|v| Some(*v)).collect())?;
        }
        self.predict(&frame)
    }
}

/// Final pipeline stage: bundles the winner with its preprocessor and
/// persists the three deployable artifacts.
pub struct ModelPackager {
    store: ArtifactStore,
}

impl ModelPackager {
    pub fn new(store: &ArtifactStore) -> Self {
        Self {
            store: store.clone(),
        }
    }

    /// Persist the raw model, the raw preprocessor, and the combined
    /// predictor; each must independently deserialize, because serving
    /// loads only the bundle while diagnostics load the raw parts.
    pub fn package(
        &self,
        transformation: &DataTransformationArtifact,
        model: Model,
        train_metric: ClassificationMetric,
        test_metric: ClassificationMetric,
    ) -> Result<ModelTrainerArtifact> {
        let preprocessor: Preprocessor =
            persist::load_json(&transformation.transformed_object_file_path)?;

        persist::save_json(&self.store.final_model_path(), &model)?;
        persist::save_json(&self.store.final_preprocessor_path(), &preprocessor)?;

        let predictor = PackagedPredictor::new(preprocessor, model);
        let trained_model_file_path = self.store.trained_model_path();
        persist::save_json(&trained_model_file_path, &predictor)?;
        info!(
            model = predictor.model_name(),
            path = %trained_model_file_path.display(),
            "Model, preprocessor and combined predictor saved"
        );

        Ok(ModelTrainerArtifact {
            trained_model_file_path,
            train_metric,
            test_metric,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Classifier, LogisticRegression};

    fn fitted_predictor() -> PackagedPredictor {
        let mut frame = DataFrame::new(vec![
            "V1".to_string(),
            "V2".to_string(),
            "Class".to_string(),
        ]);
        for i in 0..20 {
            let v = i as f64;
            frame
                .push_row(vec![Some(v), Some(-v), Some(if i < 10 { 0.0 } else { 1.0 })])
                .unwrap();
        }
        let preprocessor = Preprocessor::fit(&frame, "Class").unwrap();
        let features = frame
            .select(&preprocessor.feature_names().to_vec())
            .unwrap();
        let x = preprocessor.transform(&features).unwrap();
        let y: Vec<f64> = frame
            .column("Class")
            .unwrap()
            .into_iter()
            .map(|c| c.unwrap())
            .collect();

        let mut model = LogisticRegression::default();
        model.fit(&x, &y).unwrap();
        PackagedPredictor::new(preprocessor, Model::LogisticRegression(model))
    }

    fn canonical_input() -> DataFrame {
        let mut frame = DataFrame::new(vec!["V1".to_string(), "V2".to_string()]);
        frame.push_row(vec![Some(2.0), Some(-2.0)]).unwrap();
        frame.push_row(vec![Some(18.0), Some(-18.0)]).unwrap();
        frame
    }

    #[test]
    fn test_permuted_columns_predict_identically() {
        let predictor = fitted_predictor();
        let canonical = canonical_input();
        let permuted = canonical
            .select(&["V2".to_string(), "V1".to_string()])
            .unwrap();

        assert_eq!(
            predictor.predict(&canonical).unwrap(),
            predictor.predict(&permuted).unwrap()
        );
    }

    #[test]
    fn test_extra_column_is_dropped() {
        let predictor = fitted_predictor();
        let mut extra = DataFrame::new(vec![
            "V1".to_string(),
            "V2".to_string(),
            "unexpected".to_string(),
        ]);
        extra
            .push_row(vec![Some(2.0), Some(-2.0), Some(99.0)])
            .unwrap();
        extra
            .push_row(vec![Some(18.0), Some(-18.0), Some(99.0)])
            .unwrap();

        assert_eq!(
            predictor.predict(&extra).unwrap(),
            predictor.predict(&canonical_input()).unwrap()
        );
    }

    #[test]
    fn test_label_column_is_ignored() {
        let predictor = fitted_predictor();
        let mut labelled = DataFrame::new(vec![
            "Class".to_string(),
            "V1".to_string(),
            "V2".to_string(),
        ]);
        labelled
            .push_row(vec![Some(1.0), Some(2.0), Some(-2.0)])
            .unwrap();

        let labels = predictor.predict(&labelled).unwrap();
        assert_eq!(labels.len(), 1);
    }

    #[test]
    fn test_missing_feature_is_fatal_and_named() {
        let predictor = fitted_predictor();
        let mut partial = DataFrame::new(vec!["V1".to_string()]);
        partial.push_row(vec![Some(2.0)]).unwrap();

        match predictor.predict(&partial) {
            Err(PipelineError::MissingFeatures(names)) => assert_eq!(names, vec!["V2"]),
            other => panic!("expected MissingFeatures, got {other:?}"),
        }
    }

    #[test]
    fn test_uncoercible_array_is_schema_error() {
        let predictor = fitted_predictor();
        assert!(matches!(
            predictor.predict_rows(&[vec![1.0, 2.0, 3.0]]),
            Err(PipelineError::Schema(_))
        ));
    }

    #[test]
    fn test_serialization_round_trip_predicts_identically() {
        let predictor = fitted_predictor();
        let input = canonical_input();
        let before = predictor.predict(&input).unwrap();

        let encoded = serde_json::to_string(&predictor).unwrap();
        assert!(!encoded.contains("cloud"));
        let restored: PackagedPredictor = serde_json::from_str(&encoded).unwrap();

        assert_eq!(restored.predict(&input).unwrap(), before);
    }

    #[test]
    fn test_cloud_predictor_without_endpoint_returns_none() {
        let predictor = fitted_predictor();
        let cloud = predictor.cloud_predictor(&CloudConfig::default());
        assert!(cloud.predict(&canonical_input()).is_none());
    }
}
