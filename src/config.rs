//! Configuration management for the training pipeline

use crate::error::{PipelineError, Result};
use anyhow::Context;
use chrono::Utc;
use config::{Config, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub ingestion: IngestionConfig,
    #[serde(default)]
    pub training: TrainingConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub artifacts: ArtifactConfig,
    #[serde(default)]
    pub cloud: CloudConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Data source configuration: primary remote store plus local fallback
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Base URL of the remote record store's document API
    pub url: String,
    /// Database name at the remote store
    pub database: String,
    /// Collection name within the database
    pub collection: String,
    /// Local CSV snapshot used when the remote store is unreachable
    pub fallback_path: PathBuf,
    /// Name of the binary label column
    #[serde(default = "default_label_column")]
    pub label_column: String,
    /// Hard cap on fetched rows; larger sets are down-sampled
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,
    /// Seed for the row-cap down-sample
    #[serde(default = "default_seed")]
    pub sample_seed: u64,
    /// Remote request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Train/test partitioning configuration
#[derive(Debug, Clone, Deserialize)]
pub struct IngestionConfig {
    /// Fraction of rows held out for the test partition, in (0, 1)
    pub split_ratio: f64,
    /// Seed for the shuffle split
    #[serde(default = "default_seed")]
    pub split_seed: u64,
}

/// Model search configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TrainingConfig {
    /// Folds for the cross-validated hyperparameter search
    #[serde(default = "default_cv_folds")]
    pub cv_folds: usize,
    /// Seed for fold assignment and seeded estimators
    #[serde(default = "default_seed")]
    pub search_seed: u64,
}

/// Experiment tracking configuration
///
/// Passed explicitly into the tracker rather than read from ambient
/// environment state, so isolated runs can use isolated stores.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackingConfig {
    /// Tracking store URI: `file:<dir>` or an `http(s)://` server
    pub uri: String,
    /// Experiment name runs are grouped under
    pub experiment: String,
}

/// Artifact directory layout configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactConfig {
    /// Root under which each run gets a timestamped directory
    pub root: PathBuf,
    /// Stable directory holding the serving model/preprocessor pair
    pub final_dir: PathBuf,
}

/// Cloud deployment identifiers, consumed by the deployment collaborator
/// and the lazy cloud predictor handle
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CloudConfig {
    #[serde(default)]
    pub endpoint_name: String,
    #[serde(default)]
    pub workspace: String,
    #[serde(default)]
    pub resource_group: String,
    #[serde(default)]
    pub subscription_id: String,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

fn default_label_column() -> String {
    "Class".to_string()
}

fn default_max_rows() -> usize {
    10_000
}

fn default_seed() -> u64 {
    42
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_cv_folds() -> usize {
    3
}

impl AppConfig {
    /// Load configuration from file
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Reject invalid settings before any I/O happens.
    pub fn validate(&self) -> Result<()> {
        let ratio = self.ingestion.split_ratio;
        if !ratio.is_finite() || ratio <= 0.0 || ratio >= 1.0 {
            return Err(PipelineError::Configuration(format!(
                "ingestion.split_ratio must lie in (0, 1), got {ratio}"
            )));
        }
        if self.source.max_rows == 0 {
            return Err(PipelineError::Configuration(
                "source.max_rows must be at least 1".to_string(),
            ));
        }
        if self.training.cv_folds < 2 {
            return Err(PipelineError::Configuration(format!(
                "training.cv_folds must be at least 2, got {}",
                self.training.cv_folds
            )));
        }
        if self.source.fallback_path.as_os_str().is_empty() {
            return Err(PipelineError::Configuration(
                "source.fallback_path must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:27017".to_string(),
            database: "fraud".to_string(),
            collection: "creditcard".to_string(),
            fallback_path: PathBuf::from("data/creditcard_2023.csv"),
            label_column: default_label_column(),
            max_rows: default_max_rows(),
            sample_seed: default_seed(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            split_ratio: 0.2,
            split_seed: default_seed(),
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            cv_folds: default_cv_folds(),
            search_seed: default_seed(),
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            uri: "file:mlruns".to_string(),
            experiment: "fraud-training".to_string(),
        }
    }
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("artifacts"),
            final_dir: PathBuf::from("final_model"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Versioned filesystem locations for every artifact of one pipeline run.
///
/// Each run gets a fresh timestamped directory under the artifact root; only
/// the `final_model/` pair lives at a stable path, because the serving side
/// loads from it without knowing the run timestamp.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    run_dir: PathBuf,
    final_dir: PathBuf,
}

impl ArtifactStore {
    /// Resolve paths for a new run, stamped with the current UTC time.
    pub fn new(config: &ArtifactConfig) -> Self {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
        Self::with_timestamp(config, &stamp)
    }

    /// Resolve paths for a run with an explicit timestamp string.
    pub fn with_timestamp(config: &ArtifactConfig, stamp: &str) -> Self {
        Self {
            run_dir: config.root.join(stamp),
            final_dir: config.final_dir.clone(),
        }
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Full audit snapshot of the fetched dataset.
    pub fn feature_store_path(&self) -> PathBuf {
        self.run_dir.join("feature_store").join("creditcard.csv")
    }

    pub fn training_file_path(&self) -> PathBuf {
        self.run_dir.join("ingested").join("train.csv")
    }

    pub fn testing_file_path(&self) -> PathBuf {
        self.run_dir.join("ingested").join("test.csv")
    }

    pub fn transformed_train_path(&self) -> PathBuf {
        self.run_dir.join("transformed").join("train.json")
    }

    pub fn transformed_test_path(&self) -> PathBuf {
        self.run_dir.join("transformed").join("test.json")
    }

    pub fn preprocessor_path(&self) -> PathBuf {
        self.run_dir.join("transformed").join("preprocessor.json")
    }

    /// The combined packaged predictor for this run.
    pub fn trained_model_path(&self) -> PathBuf {
        self.run_dir.join("trained_model").join("model.json")
    }

    /// Stable serving copy of the raw model.
    pub fn final_model_path(&self) -> PathBuf {
        self.final_dir.join("model.json")
    }

    /// Stable serving copy of the raw preprocessor.
    pub fn final_preprocessor_path(&self) -> PathBuf {
        self.final_dir.join("preprocessor.json")
    }
}
