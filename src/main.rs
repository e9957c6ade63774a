//! AML Detection Pipeline - Main Entry Point
//!
//! Loads a transaction file, runs the selected detectors concurrently and
//! writes the ranked suspicion report.

use aml_detection_pipeline::{
    config::{AppConfig, LoggingConfig, DEFAULT_CONFIG_PATH},
    metrics::PipelineMetrics,
    DetectorKind, Pipeline, ReportPaths, ReportWriter, TransactionLoader,
};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "aml-pipeline")]
#[command(about = "Detect money-laundering patterns in a transaction file")]
#[command(version)]
struct Cli {
    /// Transaction CSV file
    #[arg(short, long)]
    input: PathBuf,

    /// Detectors to run (comma separated)
    #[arg(
        short,
        long,
        value_enum,
        value_delimiter = ',',
        default_values_t = DetectorKind::ALL
    )]
    detectors: Vec<DetectorKind>,

    /// Configuration file (defaults are used when it does not exist)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Directory for report files (overrides output.dir)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Also write a JSON report with full evidence
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    init_logging(&config.logging)?;

    info!("Starting AML Detection Pipeline");
    info!(
        "Flow threshold: {:.2}, structuring: {} txs < {:.2} within {} min, layering: depth {} within {} min",
        config.detection.flow_imbalance.threshold,
        config.detection.structuring.min_count,
        config.detection.structuring.unit_limit,
        config.detection.structuring.window_minutes,
        config.detection.layering.max_depth,
        config.detection.layering.time_window_minutes
    );

    let metrics = Arc::new(PipelineMetrics::new());

    let batch = TransactionLoader::new().load_path(&cli.input)?;
    metrics.record_load(batch.transactions.len(), batch.skipped);

    if batch.transactions.is_empty() {
        warn!(input = %cli.input.display(), "No valid transactions loaded, nothing to analyse");
        return Ok(());
    }

    let pipeline = Pipeline::new(&config.detection, &config.pipeline).with_metrics(metrics.clone());
    let outcome = pipeline.run(&batch.transactions, &cli.detectors).await;

    println!("--- RANKED SUSPICIOUS ACCOUNTS ---");
    if outcome.ranked.is_empty() {
        println!("No suspicious activity detected");
    }
    for finding in &outcome.ranked {
        println!("{}", finding);
    }
    println!();
    println!("--- DETECTOR EXECUTION TIMES ---");
    for run in &outcome.runs {
        println!("{}: {} ms ({})", run.detector, run.elapsed.as_millis(), run.status.as_str());
    }
    println!("Total detector time: {} ms", outcome.detector_time().as_millis());

    metrics.print_summary();

    let output_dir = cli.output_dir.unwrap_or(config.output.dir);
    let paths = ReportPaths::for_run(&output_dir, &cli.input, &cli.detectors);
    let dataset = cli.input.display().to_string();
    ReportWriter::new().save(&paths, &outcome.ranked, &outcome.runs, &dataset, cli.json)?;

    Ok(())
}

/// Install the tracing subscriber; `RUST_LOG` wins over the configured level
fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&logging.level)
            .with_context(|| format!("Invalid log level '{}'", logging.level))?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}
