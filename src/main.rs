//! Fraud Training Pipeline - Main Entry Point
//!
//! Runs the full training pipeline or serves batch predictions from the
//! most recently packaged model.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fraud_training_pipeline::{
    config::{AppConfig, ArtifactStore, LoggingConfig},
    metrics::{accuracy, ClassificationMetric},
    persist,
    pipeline::PipelineDriver,
    predictor::PackagedPredictor,
    types::frame::DataFrame,
};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "fraud-pipeline")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Train and serve a binary fraud-classification model", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full training pipeline
    Train,
    /// Predict labels for a CSV of transaction records
    Predict {
        /// Input CSV with the feature columns (label column optional)
        #[arg(short, long)]
        input: PathBuf,
        /// Where to write the predictions
        #[arg(short, long, default_value = "prediction_output/output.csv")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = if cli.config.exists() {
        AppConfig::load_from_path(&cli.config)?
    } else {
        AppConfig::default()
    };
    init_tracing(&config.logging)?;

    match cli.command {
        Command::Train => train(config),
        Command::Predict { input, output } => predict(config, &input, &output),
    }
}

fn train(config: AppConfig) -> Result<()> {
    let driver = PipelineDriver::new(config)?;
    let artifact = driver.run()?;

    info!(
        model = %artifact.trained_model_file_path.display(),
        train_f1 = artifact.train_metric.f1_score,
        test_f1 = artifact.test_metric.f1_score,
        "Training completed successfully"
    );
    Ok(())
}

fn predict(config: AppConfig, input: &PathBuf, output: &PathBuf) -> Result<()> {
    let store = ArtifactStore::new(&config.artifacts);
    let model = persist::load_json(&store.final_model_path())
        .context("Failed to load the packaged model; run `fraud-pipeline train` first")?;
    let preprocessor = persist::load_json(&store.final_preprocessor_path())
        .context("Failed to load the packaged preprocessor")?;
    let predictor = PackagedPredictor::new(preprocessor, model);
    info!(model = predictor.model_name(), "Model and preprocessor loaded");

    let frame = DataFrame::from_csv_path(input)?;
    let predictions = predictor.predict(&frame)?;

    // Self-evaluation when the caller supplied the label column
    if let Some(labels) = frame.column(config.source.label_column.as_str()) {
        let y_true: Vec<f64> = labels.into_iter().map(|c| c.unwrap_or(0.0)).collect();
        let metric = ClassificationMetric::from_predictions(&y_true, &predictions);
        info!(
            accuracy = accuracy(&y_true, &predictions),
            f1_score = metric.f1_score,
            "Self-evaluation against supplied labels"
        );
    }

    let mut results = DataFrame::new(vec!["Prediction".to_string()]);
    for label in &predictions {
        results.push_row(vec![Some(*label)])?;
    }
    results.to_csv_path(output)?;
    info!(
        rows = predictions.len(),
        output = %output.display(),
        "Predictions written"
    );
    Ok(())
}

fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&config.level))
        .context("Invalid log level")?;

    if config.format == "json" {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}
