//! End-to-end pipeline runs against a synthetic fallback dataset.
//!
//! The remote store points at an unreachable address throughout, so every
//! run exercises the fallback path with no live backend.

use fraud_training_pipeline::{
    config::{AppConfig, ArtifactConfig, ArtifactStore},
    persist,
    pipeline::PipelineDriver,
    predictor::PackagedPredictor,
    types::frame::DataFrame,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;

/// 100 rows, 2 numeric features, binary label, fixed seed 42.
fn write_synthetic_dataset(path: &Path) {
    let mut rng = StdRng::seed_from_u64(42);
    let mut body = String::from("V1,V2,Class\n");
    for _ in 0..100 {
        let a: f64 = rng.gen_range(-1.0..1.0);
        let b: f64 = rng.gen_range(-1.0..1.0);
        let label = if a + b > 0.0 { 1 } else { 0 };
        body.push_str(&format!("{a},{b},{label}\n"));
    }
    std::fs::write(path, body).unwrap();
}

fn scenario_config(dir: &Path) -> AppConfig {
    let fallback = dir.join("creditcard_2023.csv");
    write_synthetic_dataset(&fallback);

    let mut config = AppConfig::default();
    config.source.url = "http://127.0.0.1:1".to_string();
    config.source.timeout_secs = 1;
    config.source.fallback_path = fallback;
    config.ingestion.split_ratio = 0.2;
    config.tracking.uri = format!("file:{}", dir.join("mlruns").display());
    config.artifacts.root = dir.join("artifacts");
    config.artifacts.final_dir = dir.join("final_model");
    config
}

fn driver_for_run(config: &AppConfig, stamp: &str) -> PipelineDriver {
    let artifact_config = ArtifactConfig {
        root: config.artifacts.root.clone(),
        final_dir: config.artifacts.final_dir.clone(),
    };
    let store = ArtifactStore::with_timestamp(&artifact_config, stamp);
    PipelineDriver::with_store(config.clone(), store).unwrap()
}

#[test]
fn test_full_run_produces_deployable_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let config = scenario_config(dir.path());
    let driver = driver_for_run(&config, "run_a");

    let artifact = driver.run().unwrap();

    // Split arithmetic: 0.2 of 100 rows → 80 train / 20 test
    let train =
        DataFrame::from_csv_path(dir.path().join("artifacts/run_a/ingested/train.csv")).unwrap();
    let test =
        DataFrame::from_csv_path(dir.path().join("artifacts/run_a/ingested/test.csv")).unwrap();
    assert_eq!(train.n_rows(), 80);
    assert_eq!(test.n_rows(), 20);

    // Measured quality is a real metric
    assert!((0.0..=1.0).contains(&artifact.train_metric.f1_score));
    assert!((0.0..=1.0).contains(&artifact.test_metric.f1_score));

    // All three persisted artifacts independently deserialize
    let predictor: PackagedPredictor =
        persist::load_json(&artifact.trained_model_file_path).unwrap();
    let _model: fraud_training_pipeline::Model =
        persist::load_json(&dir.path().join("final_model/model.json")).unwrap();
    let _preprocessor: fraud_training_pipeline::stages::Preprocessor =
        persist::load_json(&dir.path().join("final_model/preprocessor.json")).unwrap();

    // The reloaded bundle predicts one label per row, robust to permutation
    let input = DataFrame::from_csv_path(&config.source.fallback_path).unwrap();
    let permuted = input
        .select(&["Class".to_string(), "V2".to_string(), "V1".to_string()])
        .unwrap();
    let canonical_labels = predictor.predict(&input).unwrap();
    let permuted_labels = predictor.predict(&permuted).unwrap();
    assert_eq!(canonical_labels.len(), 100);
    assert_eq!(canonical_labels, permuted_labels);
}

#[test]
fn test_repeated_runs_select_the_same_family() {
    let dir = tempfile::tempdir().unwrap();
    let config = scenario_config(dir.path());

    let first = driver_for_run(&config, "run_a").run().unwrap();
    let second = driver_for_run(&config, "run_b").run().unwrap();

    let predictor_a: PackagedPredictor =
        persist::load_json(&first.trained_model_file_path).unwrap();
    let predictor_b: PackagedPredictor =
        persist::load_json(&second.trained_model_file_path).unwrap();

    assert_eq!(predictor_a.model_name(), predictor_b.model_name());
    assert_eq!(first.train_metric, second.train_metric);
    assert_eq!(first.test_metric, second.test_metric);
}

#[test]
fn test_tracking_failure_does_not_alter_the_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = scenario_config(dir.path());

    let healthy = driver_for_run(&config, "run_a").run().unwrap();

    // Unreachable tracking server: the run must still succeed, with the
    // same measured quality.
    config.tracking.uri = "http://127.0.0.1:1".to_string();
    let degraded = driver_for_run(&config, "run_b").run().unwrap();

    assert_eq!(healthy.train_metric, degraded.train_metric);
    assert_eq!(healthy.test_metric, degraded.test_metric);
}

#[test]
fn test_file_tracking_store_records_runs() {
    let dir = tempfile::tempdir().unwrap();
    let config = scenario_config(dir.path());
    driver_for_run(&config, "run_a").run().unwrap();

    // One run record per recorded metric (train and test)
    let experiment_dir = dir.path().join("mlruns").join("fraud-training");
    let runs: Vec<_> = std::fs::read_dir(&experiment_dir).unwrap().collect();
    assert_eq!(runs.len(), 2);
}
