//! Data ingestion stage: fetch, snapshot, partition

use crate::config::{ArtifactStore, IngestionConfig};
use crate::error::{PipelineError, Result};
use crate::source::DataSource;
use crate::types::artifact::DataIngestionArtifact;
use crate::types::frame::DataFrame;
use tracing::info;

/// First pipeline stage: resolves the dataset through the data source,
/// persists a full audit snapshot to the feature store, then partitions
/// rows into train/test files.
pub struct DataIngestionStage {
    source: DataSource,
    split_ratio: f64,
    split_seed: u64,
    store: ArtifactStore,
}

impl DataIngestionStage {
    pub fn new(source: DataSource, config: &IngestionConfig, store: &ArtifactStore) -> Self {
        Self {
            source,
            split_ratio: config.split_ratio,
            split_seed: config.split_seed,
            store: store.clone(),
        }
    }

    /// Run the stage. Either both partitions are persisted and the artifact
    /// is returned, or the stage fails with no partial artifact.
    pub fn run(&self) -> Result<DataIngestionArtifact> {
        // Ratio problems must surface before any I/O.
        if !self.split_ratio.is_finite() || self.split_ratio <= 0.0 || self.split_ratio >= 1.0 {
            return Err(PipelineError::Configuration(format!(
                "train/test split ratio must lie in (0, 1), got {}",
                self.split_ratio
            )));
        }

        let frame = self.source.fetch()?;
        info!(rows = frame.n_rows(), "Dataset resolved");

        self.export_feature_store(&frame)?;
        let (train, test) = frame.train_test_split(self.split_ratio, self.split_seed)?;
        info!(
            train_rows = train.n_rows(),
            test_rows = test.n_rows(),
            "Performed train/test split"
        );

        let trained_file_path = self.store.training_file_path();
        let test_file_path = self.store.testing_file_path();
        write_split(&train, &trained_file_path)?;
        write_split(&test, &test_file_path)?;
        info!(
            train = %trained_file_path.display(),
            test = %test_file_path.display(),
            "Exported train and test files"
        );

        Ok(DataIngestionArtifact {
            trained_file_path,
            test_file_path,
        })
    }

    /// Persist the full fetched set as an audit snapshot; later stages read
    /// the partition files, never this one.
    fn export_feature_store(&self, frame: &DataFrame) -> Result<()> {
        let path = self.store.feature_store_path();
        frame
            .to_csv_path(&path)
            .map_err(|e| PipelineError::IngestionIo {
                path: path.clone(),
                source: Box::new(e),
            })?;
        info!(path = %path.display(), "Saved feature-store snapshot");
        Ok(())
    }
}

fn write_split(frame: &DataFrame, path: &std::path::Path) -> Result<()> {
    frame
        .to_csv_path(path)
        .map_err(|e| PipelineError::IngestionIo {
            path: path.to_path_buf(),
            source: Box::new(e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ArtifactConfig, SourceConfig};
    use crate::source::RecordStore;
    use crate::types::frame::DatasetRecord;

    struct FailingStore;

    impl RecordStore for FailingStore {
        fn fetch_all(&self, _: &str, _: &str) -> anyhow::Result<Vec<DatasetRecord>> {
            anyhow::bail!("unreachable")
        }
    }

    fn fixture(dir: &std::path::Path, ratio: f64) -> DataIngestionStage {
        let fallback = dir.join("snapshot.csv");
        let mut body = String::from("V1,V2,Class\n");
        for i in 0..100 {
            body.push_str(&format!("{}.0,{}.5,{}\n", i, i, i % 2));
        }
        std::fs::write(&fallback, body).unwrap();

        let source_config = SourceConfig {
            fallback_path: fallback,
            ..SourceConfig::default()
        };
        let source = DataSource::with_store(Box::new(FailingStore), &source_config);

        let artifact_config = ArtifactConfig {
            root: dir.join("artifacts"),
            final_dir: dir.join("final_model"),
        };
        let store = ArtifactStore::with_timestamp(&artifact_config, "test_run");
        let ingestion_config = IngestionConfig {
            split_ratio: ratio,
            split_seed: 42,
        };
        DataIngestionStage::new(source, &ingestion_config, &store)
    }

    #[test]
    fn test_run_produces_disjoint_partitions() {
        let dir = tempfile::tempdir().unwrap();
        let stage = fixture(dir.path(), 0.2);

        let artifact = stage.run().unwrap();
        let train = DataFrame::from_csv_path(&artifact.trained_file_path).unwrap();
        let test = DataFrame::from_csv_path(&artifact.test_file_path).unwrap();

        assert_eq!(train.n_rows(), 80);
        assert_eq!(test.n_rows(), 20);
        assert_eq!(train.columns(), test.columns());

        let train_ids: Vec<f64> = train.rows().iter().map(|r| r[0].unwrap()).collect();
        for row in test.rows() {
            assert!(!train_ids.contains(&row[0].unwrap()));
        }
    }

    #[test]
    fn test_feature_store_snapshot_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let stage = fixture(dir.path(), 0.2);
        stage.run().unwrap();

        let snapshot = dir
            .path()
            .join("artifacts/test_run/feature_store/creditcard.csv");
        let frame = DataFrame::from_csv_path(&snapshot).unwrap();
        assert_eq!(frame.n_rows(), 100);
    }

    #[test]
    fn test_invalid_ratio_fails_before_io() {
        let dir = tempfile::tempdir().unwrap();
        let stage = fixture(dir.path(), 1.5);

        assert!(matches!(
            stage.run(),
            Err(PipelineError::Configuration(_))
        ));
        assert!(!dir.path().join("artifacts").exists());
    }
}
