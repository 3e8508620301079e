//! bcdash evaluation CLI
//!
//! Builds `evaluation_report.json` from the deployed artifacts.

use anyhow::{Context, Result};
use bcdash_evaluation::{EvaluationBuilder, EvaluationSettings, DEFAULT_SEED, DEFAULT_TEST_SIZE};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "bcdash-eval")]
#[command(author = "bcdash Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Build the model evaluation report from a held-out split", long_about = None)]
struct Args {
    /// Artifacts directory (schema, scaler, registry, models)
    #[arg(short, long, default_value = "artifacts")]
    artifacts: PathBuf,

    /// Directory searched for the newest *.csv dataset
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Fallback dataset (defaults to <artifacts>/reference_dataset.csv)
    #[arg(long)]
    reference_dataset: Option<PathBuf>,

    /// Report path (defaults to <artifacts>/evaluation_report.json)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Held-out fraction
    #[arg(long, default_value_t = DEFAULT_TEST_SIZE)]
    test_size: f64,

    /// Seed for the stratified split
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: i64,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("bcdash evaluation v{}", env!("CARGO_PKG_VERSION"));

    let mut settings = EvaluationSettings::new(&args.artifacts);
    settings.data_dir = args.data_dir;
    settings.test_size = args.test_size;
    settings.seed = args.seed;
    if let Some(reference) = args.reference_dataset {
        settings.reference_dataset = reference;
    }
    if let Some(output) = args.output {
        settings.output = output;
    }

    EvaluationBuilder::new(settings)
        .run()
        .context("Evaluation failed")?;

    Ok(())
}
