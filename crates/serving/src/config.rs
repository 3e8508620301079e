//! Serving configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional TOML
//! file, then `BCDASH_*` environment variables. Nested keys use a double
//! underscore, e.g. `BCDASH_TELEMETRY__FEED_CAPACITY=100`.

use anyhow::{bail, Context, Result};
use bcdash_model_core::artifacts::{ArtifactLayout, EVALUATION_REPORT_FILE};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Config file picked up when `--config` is not given
pub const DEFAULT_CONFIG_PATH: &str = "config/serving.toml";
pub const ENV_PREFIX: &str = "BCDASH";

/// Hard upper bound for the live feed `limit` parameter
pub const MAX_LIVE_FEED_LIMIT: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Latency samples kept for mean and p95
    pub latency_capacity: usize,
    /// Recent predictions kept for the live feed
    pub feed_capacity: usize,
    /// Request outcomes kept for the error rate
    pub error_window: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            latency_capacity: 500,
            feed_capacity: MAX_LIVE_FEED_LIMIT,
            error_window: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServingConfig {
    pub bind_addr: String,
    pub artifacts_dir: PathBuf,
    /// Model used when `/predict` is called without `model_id`
    pub default_model_id: String,
    pub log_level: String,
    /// `pretty` or `json`
    pub log_format: String,
    pub cors_allow_any_origin: bool,
    /// Report file name, relative to `artifacts_dir`
    pub evaluation_report_file: String,
    pub telemetry: TelemetryConfig,
}

impl Default for ServingConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            artifacts_dir: PathBuf::from("./artifacts"),
            default_model_id: "random_forest".to_string(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            cors_allow_any_origin: true,
            evaluation_report_file: EVALUATION_REPORT_FILE.to_string(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl ServingConfig {
    /// Load from the process environment and the resolved config file
    pub fn load(config_path_override: Option<&Path>) -> Result<Self> {
        let resolved_path = match config_path_override {
            Some(path) => {
                if !path.exists() {
                    bail!(
                        "Configuration file {} not found (specified via --config)",
                        path.display()
                    );
                }
                Some(path.to_path_buf())
            }
            None => {
                let path = PathBuf::from(DEFAULT_CONFIG_PATH);
                path.exists().then_some(path)
            }
        };

        Self::from_sources(resolved_path.as_deref(), Environment::with_prefix(ENV_PREFIX))
    }

    /// Build from an explicit file and environment source
    pub fn from_sources(path: Option<&Path>, env: Environment) -> Result<Self> {
        let defaults = Config::try_from(&ServingConfig::default())
            .context("Failed to encode default configuration")?;

        let mut builder = Config::builder().add_source(defaults);
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }
        builder = builder.add_source(
            env.prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: ServingConfig = builder
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.bind_addr
            .parse::<SocketAddr>()
            .with_context(|| format!("bind_addr '{}' is not a socket address", self.bind_addr))?;

        if self.default_model_id.trim().is_empty() {
            bail!("default_model_id must not be empty");
        }
        if !matches!(self.log_format.as_str(), "pretty" | "json") {
            bail!("log_format must be 'pretty' or 'json', got '{}'", self.log_format);
        }

        let t = &self.telemetry;
        if t.latency_capacity == 0 || t.feed_capacity == 0 || t.error_window == 0 {
            bail!("telemetry capacities must be positive");
        }
        if t.feed_capacity > MAX_LIVE_FEED_LIMIT {
            bail!(
                "telemetry.feed_capacity must be at most {}",
                MAX_LIVE_FEED_LIMIT
            );
        }
        Ok(())
    }

    pub fn layout(&self) -> ArtifactLayout {
        ArtifactLayout::new(&self.artifacts_dir)
    }

    pub fn evaluation_report_path(&self) -> PathBuf {
        self.artifacts_dir.join(&self.evaluation_report_file)
    }
}
