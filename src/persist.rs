//! Serialization helpers for file-addressed artifacts

use crate::error::{PipelineError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Serialize a value as pretty JSON at `path`, creating parent directories.
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| PipelineError::io(format!("failed to create {}", parent.display()), e))?;
    }
    let payload = serde_json::to_string_pretty(value)
        .map_err(|e| PipelineError::serde(format!("failed to encode {}", path.display()), e))?;
    std::fs::write(path, payload)
        .map_err(|e| PipelineError::io(format!("failed to write {}", path.display()), e))
}

/// Deserialize a JSON value from `path`.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let payload = std::fs::read_to_string(path)
        .map_err(|e| PipelineError::io(format!("failed to read {}", path.display()), e))?;
    serde_json::from_str(&payload)
        .map_err(|e| PipelineError::serde(format!("failed to decode {}", path.display()), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("value.json");

        save_json(&path, &vec![vec![1.0_f64, 2.0], vec![3.0, 4.0]]).unwrap();
        let loaded: Vec<Vec<f64>> = load_json(&path).unwrap();
        assert_eq!(loaded, vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result: Result<Vec<f64>> = load_json(&dir.path().join("absent.json"));
        assert!(matches!(result, Err(PipelineError::Io { .. })));
    }
}
