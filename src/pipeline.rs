//! Pipeline driver: sequences the stages into one training run

use crate::config::{AppConfig, ArtifactStore};
use crate::error::Result;
use crate::predictor::ModelPackager;
use crate::source::DataSource;
use crate::stages::{DataIngestionStage, DataTransformationStage, ModelSearchStage};
use crate::tracking::MetricsTracker;
use crate::types::artifact::ModelTrainerArtifact;
use tracing::info;

/// Runs ingestion → transformation → model search → tracking → packaging,
/// strictly in order, each stage consuming the previous stage's artifact.
///
/// The first fatal stage failure short-circuits the run, wrapped with the
/// stage name and the original cause. Nothing is retried and stages are not
/// individually resumable; a failed run is re-run from scratch by the
/// caller, producing a fresh artifact set.
pub struct PipelineDriver {
    config: AppConfig,
    store: ArtifactStore,
}

impl PipelineDriver {
    /// Validate the configuration and resolve artifact paths for a fresh
    /// run. Invalid settings fail here, before any I/O.
    pub fn new(config: AppConfig) -> Result<Self> {
        config.validate()?;
        let store = ArtifactStore::new(&config.artifacts);
        Ok(Self { config, store })
    }

    /// As [`new`](Self::new), with an explicit artifact store (used when the
    /// run location must be pinned, e.g. in tests).
    pub fn with_store(config: AppConfig, store: ArtifactStore) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, store })
    }

    pub fn artifact_store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Execute one full training run and return the final model artifact.
    pub fn run(&self) -> Result<ModelTrainerArtifact> {
        info!(run_dir = %self.store.run_dir().display(), "Starting training pipeline");

        let source = DataSource::from_config(&self.config.source);
        let ingestion_artifact =
            DataIngestionStage::new(source, &self.config.ingestion, &self.store)
                .run()
                .map_err(|e| e.in_stage("data_ingestion"))?;

        let transformation_artifact =
            DataTransformationStage::new(&self.config.source.label_column, &self.store)
                .run(&ingestion_artifact)
                .map_err(|e| e.in_stage("data_transformation"))?;

        let outcome = ModelSearchStage::new(&self.config.training)
            .run(&transformation_artifact)
            .map_err(|e| e.in_stage("model_trainer"))?;

        // Observability only: tracking failures never abort the run.
        let tracker = MetricsTracker::new(&self.config.tracking);
        tracker.record(&outcome.model, &outcome.train_metric);
        tracker.record(&outcome.model, &outcome.test_metric);

        let artifact = ModelPackager::new(&self.store)
            .package(
                &transformation_artifact,
                outcome.model,
                outcome.train_metric,
                outcome.test_metric,
            )
            .map_err(|e| e.in_stage("model_packaging"))?;

        info!(
            model = %artifact.trained_model_file_path.display(),
            test_f1 = artifact.test_metric.f1_score,
            "Training pipeline complete"
        );
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;

    #[test]
    fn test_invalid_config_fails_before_any_io() {
        let mut config = AppConfig::default();
        config.ingestion.split_ratio = 2.0;
        assert!(matches!(
            PipelineDriver::new(config),
            Err(PipelineError::Configuration(_))
        ));
    }

    #[test]
    fn test_missing_data_fails_in_ingestion_stage() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        // Unreachable remote plus an absent fallback file
        config.source.url = "http://127.0.0.1:1".to_string();
        config.source.timeout_secs = 1;
        config.source.fallback_path = dir.path().join("absent.csv");
        config.artifacts.root = dir.path().join("artifacts");
        config.artifacts.final_dir = dir.path().join("final_model");

        let driver = PipelineDriver::new(config).unwrap();
        match driver.run() {
            Err(PipelineError::Stage { stage, source }) => {
                assert_eq!(stage, "data_ingestion");
                assert!(matches!(*source, PipelineError::DataUnavailable(_)));
            }
            other => panic!("expected a wrapped ingestion failure, got {other:?}"),
        }
    }
}
