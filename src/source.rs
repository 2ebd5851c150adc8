//! Canonical dataset resolution with remote-first, local-fallback strategy

use crate::config::SourceConfig;
use crate::error::{PipelineError, Result};
use crate::types::frame::{DataFrame, DatasetRecord};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// A queryable collection of transaction records.
///
/// The production implementation talks to the remote document store; tests
/// substitute their own to exercise the fallback path without a live
/// backend.
pub trait RecordStore: Send + Sync {
    fn fetch_all(&self, database: &str, collection: &str) -> anyhow::Result<Vec<DatasetRecord>>;
}

/// Record store backed by a row-oriented JSON document API.
pub struct RemoteRecordStore {
    base_url: String,
    timeout: Duration,
}

impl RemoteRecordStore {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }
}

impl RecordStore for RemoteRecordStore {
    fn fetch_all(&self, database: &str, collection: &str) -> anyhow::Result<Vec<DatasetRecord>> {
        let url = format!("{}/{}/{}", self.base_url, database, collection);
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()?;

        let records = client
            .get(&url)
            .send()?
            .error_for_status()?
            .json::<Vec<DatasetRecord>>()?;
        Ok(records)
    }
}

/// Resolves the canonical dataset: primary remote source first, local CSV
/// snapshot on any remote failure, hard row cap on whatever was fetched.
pub struct DataSource {
    store: Box<dyn RecordStore>,
    database: String,
    collection: String,
    fallback_path: PathBuf,
    max_rows: usize,
    sample_seed: u64,
}

impl DataSource {
    pub fn from_config(config: &SourceConfig) -> Self {
        let store = RemoteRecordStore::new(&config.url, Duration::from_secs(config.timeout_secs));
        Self::with_store(Box::new(store), config)
    }

    /// Build a source over an explicit record store.
    pub fn with_store(store: Box<dyn RecordStore>, config: &SourceConfig) -> Self {
        Self {
            store,
            database: config.database.clone(),
            collection: config.collection.clone(),
            fallback_path: config.fallback_path.clone(),
            max_rows: config.max_rows,
            sample_seed: config.sample_seed,
        }
    }

    /// Fetch the dataset.
    ///
    /// Remote failures are logged and recovered through the local snapshot;
    /// a missing snapshot is the one unrecoverable case. Does not persist
    /// anything itself.
    pub fn fetch(&self) -> Result<DataFrame> {
        let frame = match self.fetch_remote() {
            Ok(frame) => {
                info!(
                    rows = frame.n_rows(),
                    collection = %self.collection,
                    "Retrieved data from remote store"
                );
                frame
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch from remote store");
                info!(path = %self.fallback_path.display(), "Falling back to local data file");
                self.fetch_fallback()?
            }
        };

        if frame.n_rows() > self.max_rows {
            info!(
                rows = frame.n_rows(),
                cap = self.max_rows,
                "Row cap exceeded; taking a fixed-seed sample"
            );
            Ok(frame.sample_n(self.max_rows, self.sample_seed))
        } else {
            Ok(frame)
        }
    }

    fn fetch_remote(&self) -> anyhow::Result<DataFrame> {
        let records = self.store.fetch_all(&self.database, &self.collection)?;
        // Remote documents carry a store-internal id column the model must
        // never see.
        let frame = DataFrame::from_records(&records)?.drop_column("_id");
        Ok(frame)
    }

    fn fetch_fallback(&self) -> Result<DataFrame> {
        if !self.fallback_path.exists() {
            return Err(PipelineError::DataUnavailable(format!(
                "remote store unreachable and fallback file {} not found",
                self.fallback_path.display()
            )));
        }
        DataFrame::from_csv_path(&self.fallback_path)
    }
}
