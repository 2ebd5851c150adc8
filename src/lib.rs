//! Fraud Model Training Pipeline
//!
//! Trains and packages a binary fraud-classification model from tabular
//! transaction records: data ingestion with a remote-first/local-fallback
//! source, train/test partitioning, a multi-family hyperparameter search,
//! best-effort experiment tracking, and versioned artifact persistence.

pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod persist;
pub mod pipeline;
pub mod predictor;
pub mod source;
pub mod stages;
pub mod tracking;
pub mod types;

pub use config::{AppConfig, ArtifactStore};
pub use error::PipelineError;
pub use metrics::ClassificationMetric;
pub use models::Model;
pub use pipeline::PipelineDriver;
pub use predictor::{ModelPackager, PackagedPredictor};
pub use source::DataSource;
pub use tracking::MetricsTracker;
pub use types::frame::DataFrame;
pub use types::{DataIngestionArtifact, DataTransformationArtifact, ModelTrainerArtifact};
