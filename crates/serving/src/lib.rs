//! Online prediction API for the breast-cancer classifier dashboard
//!
//! Modules:
//! - `config`: Layered serving configuration
//! - `prediction`: Request validation, preprocessing and model invocation
//! - `telemetry`: Bounded, day-scoped prediction telemetry
//! - `monitoring`: Summary, live feed and ping views
//! - `server`: HTTP routes
//! - `errors`: Request-scoped error categories

pub mod config;
pub mod errors;
pub mod monitoring;
pub mod prediction;
pub mod server;
pub mod telemetry;

pub use config::{ServingConfig, TelemetryConfig};
pub use errors::PredictionError;
pub use monitoring::{MonitoringReporter, MonitoringSummary};
pub use prediction::{PredictionResult, PredictionService};
pub use server::{build_router, start_server, AppState};
pub use telemetry::{Clock, ServiceStatus, SystemClock, TelemetryRecorder};
