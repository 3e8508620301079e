//! bcdash serving binary
//!
//! Loads the artifact bundle, then serves predictions and monitoring over HTTP.

use anyhow::{Context, Result};
use bcdash_model_core::ServingArtifacts;
use bcdash_serving::{start_server, AppState, ServingConfig};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "bcdash-serving")]
#[command(author = "bcdash Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Breast-cancer classifier prediction and monitoring API", long_about = None)]
struct Args {
    /// Configuration file (defaults to config/serving.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen address
    #[arg(long)]
    bind: Option<String>,

    /// Override the artifacts directory
    #[arg(long)]
    artifacts: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServingConfig::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(artifacts) = args.artifacts {
        config.artifacts_dir = artifacts;
    }
    config.validate()?;

    init_logging(&config)?;
    info!("bcdash serving v{}", env!("CARGO_PKG_VERSION"));

    let artifacts = ServingArtifacts::load(&config.layout()).with_context(|| {
        format!(
            "Failed to load artifacts from {}",
            config.artifacts_dir.display()
        )
    })?;

    if !artifacts.registry.contains(&config.default_model_id) {
        warn!(
            "Default model '{}' is not in the registry; requests without model_id will fail",
            config.default_model_id
        );
    }

    let state = AppState::new(&config, artifacts);
    if let Err(err) = start_server(state, &config.bind_addr, shutdown_signal()).await {
        error!("Server error: {:#}", err);
        return Err(err);
    }

    info!("bcdash serving shutdown complete");
    Ok(())
}

fn init_logging(config: &ServingConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .context("Failed to install tracing subscriber")?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()
            .context("Failed to install tracing subscriber")?;
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
