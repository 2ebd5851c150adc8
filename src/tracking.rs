//! Best-effort experiment tracking
//!
//! Tracking is observability, not correctness: any failure here is logged
//! and swallowed so it can never abort a training run.

use crate::config::TrackingConfig;
use crate::metrics::ClassificationMetric;
use crate::models::Model;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};
use uuid::Uuid;

#[derive(Debug, Error)]
enum TrackingError {
    #[error("unsupported tracking URI scheme: {0}")]
    UnsupportedScheme(String),

    #[error("failed to write run record: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode run record: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("tracking server request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Serialize)]
struct RunRecord<'a> {
    run_id: &'a str,
    experiment: &'a str,
    model: &'a str,
    f1_score: f64,
    precision: f64,
    recall_score: f64,
}

/// Records metric values and the fitted model to an experiment store.
///
/// The store is addressed by an explicit URI from configuration, never by
/// ambient process state: `file:<dir>` for a local store, `http(s)://` for
/// a tracking server.
pub struct MetricsTracker {
    uri: String,
    experiment: String,
}

impl MetricsTracker {
    pub fn new(config: &TrackingConfig) -> Self {
        Self {
            uri: config.uri.clone(),
            experiment: config.experiment.clone(),
        }
    }

    /// Open a run, log the three metric values, and log the model's
    /// parameter state as an artifact. Never fails: problems are logged at
    /// error level and otherwise ignored.
    pub fn record(&self, model: &Model, metric: &ClassificationMetric) {
        match self.try_record(model, metric) {
            Ok(run_id) => debug!(run_id = %run_id, "Recorded experiment run"),
            Err(e) => error!(error = %e, "Experiment tracking failed; continuing"),
        }
    }

    fn try_record(
        &self,
        model: &Model,
        metric: &ClassificationMetric,
    ) -> Result<String, TrackingError> {
        let run_id = Uuid::new_v4().to_string();
        let record = RunRecord {
            run_id: &run_id,
            experiment: &self.experiment,
            model: model.name(),
            f1_score: metric.f1_score,
            precision: metric.precision_score,
            recall_score: metric.recall_score,
        };

        if let Some(root) = self.file_store_root() {
            self.record_local(&root, &record, model)?;
        } else if self.uri.starts_with("http://") || self.uri.starts_with("https://") {
            self.record_remote(&record, model)?;
        } else {
            return Err(TrackingError::UnsupportedScheme(self.uri.clone()));
        }
        Ok(run_id)
    }

    fn file_store_root(&self) -> Option<PathBuf> {
        self.uri
            .strip_prefix("file://")
            .or_else(|| self.uri.strip_prefix("file:"))
            .map(PathBuf::from)
    }

    fn record_local(
        &self,
        root: &Path,
        record: &RunRecord<'_>,
        model: &Model,
    ) -> Result<(), TrackingError> {
        let run_dir = root.join(&self.experiment).join(record.run_id);
        std::fs::create_dir_all(&run_dir)?;
        std::fs::write(
            run_dir.join("metrics.json"),
            serde_json::to_string_pretty(record)?,
        )?;
        // The serialized Model is its parameter state; there is no foreign
        // runtime handle to strip first.
        std::fs::write(
            run_dir.join("model.json"),
            serde_json::to_string_pretty(model)?,
        )?;
        // Named registry entries need a server-backed store.
        debug!("Model registration skipped: file-backed tracking store");
        Ok(())
    }

    fn record_remote(&self, record: &RunRecord<'_>, model: &Model) -> Result<(), TrackingError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        let base = self.uri.trim_end_matches('/');

        client
            .post(format!("{base}/api/runs"))
            .json(record)
            .send()?
            .error_for_status()?;
        client
            .post(format!("{base}/api/runs/{}/artifacts/model", record.run_id))
            .json(model)
            .send()?
            .error_for_status()?;
        // Server-backed stores also get a named, versioned registry entry.
        client
            .post(format!("{base}/api/registered-models"))
            .json(&serde_json::json!({
                "name": record.model,
                "run_id": record.run_id,
            }))
            .send()?
            .error_for_status()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Classifier, LogisticRegression};

    fn fitted_model() -> Model {
        let mut inner = LogisticRegression::default();
        inner
            .fit(&[vec![0.0], vec![1.0]], &[0.0, 1.0])
            .unwrap();
        Model::LogisticRegression(inner)
    }

    fn metric() -> ClassificationMetric {
        ClassificationMetric {
            f1_score: 0.9,
            precision_score: 0.8,
            recall_score: 1.0,
        }
    }

    #[test]
    fn test_file_store_writes_metrics_and_model() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = MetricsTracker::new(&TrackingConfig {
            uri: format!("file:{}", dir.path().display()),
            experiment: "unit".to_string(),
        });

        tracker.record(&fitted_model(), &metric());

        let experiment_dir = dir.path().join("unit");
        let runs: Vec<_> = std::fs::read_dir(&experiment_dir).unwrap().collect();
        assert_eq!(runs.len(), 1);
        let run_dir = runs[0].as_ref().unwrap().path();
        assert!(run_dir.join("metrics.json").exists());
        assert!(run_dir.join("model.json").exists());
    }

    #[test]
    fn test_unreachable_server_is_swallowed() {
        let tracker = MetricsTracker::new(&TrackingConfig {
            uri: "http://127.0.0.1:1".to_string(),
            experiment: "unit".to_string(),
        });
        // Must neither panic nor return an error surface.
        tracker.record(&fitted_model(), &metric());
    }

    #[test]
    fn test_unsupported_scheme_is_swallowed() {
        let tracker = MetricsTracker::new(&TrackingConfig {
            uri: "ftp://tracking".to_string(),
            experiment: "unit".to_string(),
        });
        tracker.record(&fitted_model(), &metric());
    }
}
