//! Domain errors for the training pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the training pipeline and the packaged predictor.
///
/// Every stage wraps the failure it hit in one of these variants; the
/// pipeline driver adds stage context via [`PipelineError::in_stage`] so a
/// caller always sees which stage failed and the original cause.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Both the primary source and the local fallback are unavailable.
    #[error("data unavailable: {0}")]
    DataUnavailable(String),

    /// Invalid configuration, detected before any I/O happens.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A required ingestion artifact could not be persisted.
    #[error("failed to persist ingestion artifact {}", .path.display())]
    IngestionIo {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Every candidate family failed to fit.
    #[error("no candidate model could be fitted")]
    NoViableModel,

    /// Prediction input cannot be coerced into the fitted schema.
    #[error("input does not match the expected schema: {0}")]
    Schema(String),

    /// Prediction input lacks required feature columns.
    #[error("missing required features: {}", .0.join(", "))]
    MissingFeatures(Vec<String>),

    /// Model fitting failed outside the per-family search (where individual
    /// failures only drop that family).
    #[error("model training failed: {0}")]
    Training(String),

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{context}")]
    Csv {
        context: String,
        #[source]
        source: csv::Error,
    },

    #[error("{context}")]
    Serde {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// A stage failed; the original cause is preserved as the source.
    #[error("{stage} stage failed")]
    Stage {
        stage: &'static str,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    /// Wrap this error with the name of the pipeline stage it occurred in.
    pub fn in_stage(self, stage: &'static str) -> Self {
        PipelineError::Stage {
            stage,
            source: Box::new(self),
        }
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        PipelineError::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn serde(context: impl Into<String>, source: serde_json::Error) -> Self {
        PipelineError::Serde {
            context: context.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_wrapping_preserves_cause() {
        let err = PipelineError::Configuration("split ratio out of range".to_string())
            .in_stage("data_ingestion");

        assert!(err.to_string().contains("data_ingestion"));
        let source = std::error::Error::source(&err).expect("stage error keeps its cause");
        assert!(source.to_string().contains("split ratio"));
    }

    #[test]
    fn test_missing_features_names_columns() {
        let err = PipelineError::MissingFeatures(vec!["V1".to_string(), "V2".to_string()]);
        assert_eq!(err.to_string(), "missing required features: V1, V2");
    }
}
