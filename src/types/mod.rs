//! Type definitions for the training pipeline

pub mod artifact;
pub mod frame;

pub use artifact::{DataIngestionArtifact, DataTransformationArtifact, ModelTrainerArtifact};
pub use frame::{DataFrame, DatasetRecord};
