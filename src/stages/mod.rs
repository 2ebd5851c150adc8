//! Pipeline stages, in execution order

pub mod ingestion;
pub mod trainer;
pub mod transformation;

pub use ingestion::DataIngestionStage;
pub use trainer::{ModelSearchStage, SearchOutcome};
pub use transformation::{DataTransformationStage, Preprocessor};
