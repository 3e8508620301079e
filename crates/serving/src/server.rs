use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bcdash_model_core::{EvaluationReport, ServingArtifacts};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ServingConfig;
use crate::errors::PredictionError;
use crate::monitoring::{MonitoringReporter, MonitoringSummary, PingResponse, DEFAULT_LIVE_FEED_LIMIT};
use crate::prediction::{PredictionResult, PredictionService};
use crate::telemetry::{FeedRecord, TelemetryRecorder};

#[derive(Clone, Debug)]
pub struct AppState {
    pub prediction: PredictionService,
    pub monitoring: MonitoringReporter,
    pub default_model_id: String,
    pub cors_allow_any_origin: bool,
    pub evaluation_report_path: PathBuf,
    pub evaluation_table_path: PathBuf,
    pub metrics_path: PathBuf,
}

impl AppState {
    pub fn new(config: &ServingConfig, artifacts: ServingArtifacts) -> Self {
        let telemetry = Arc::new(TelemetryRecorder::new(config.telemetry.clone()));
        Self::with_telemetry(config, artifacts, telemetry)
    }

    pub fn with_telemetry(
        config: &ServingConfig,
        artifacts: ServingArtifacts,
        telemetry: Arc<TelemetryRecorder>,
    ) -> Self {
        let layout = config.layout();
        Self {
            prediction: PredictionService::new(Arc::new(artifacts), telemetry.clone()),
            monitoring: MonitoringReporter::new(telemetry),
            default_model_id: config.default_model_id.clone(),
            cors_allow_any_origin: config.cors_allow_any_origin,
            evaluation_report_path: config.evaluation_report_path(),
            evaluation_table_path: layout.evaluation_table(),
            metrics_path: layout.metrics(),
        }
    }
}

type SharedState = Arc<AppState>;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: &'static str,
    detail: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    category: &'static str,
    message: String,
}

impl ApiError {
    fn new<S: Into<String>>(status: StatusCode, category: &'static str, message: S) -> Self {
        Self {
            status,
            category,
            message: message.into(),
        }
    }

    fn bad_request<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", message)
    }

    fn internal<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
    }
}

impl From<PredictionError> for ApiError {
    fn from(err: PredictionError) -> Self {
        let status = if err.is_validation() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self::new(status, err.category(), err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = Json(ErrorResponse {
            error: self.category,
            detail: self.message,
        });
        (self.status, payload).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub data: HashMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct PredictQuery {
    #[serde(default)]
    model_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LiveQuery {
    #[serde(default)]
    limit: Option<i64>,
}

#[derive(Debug, Serialize)]
struct FeaturesResponse {
    features: Vec<String>,
}

pub async fn start_server<F>(state: AppState, addr: &str, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(Arc::new(state));
    let listener = bind_listener(addr).await?;
    info!("Serving HTTP API on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server terminated unexpectedly")
}

async fn bind_listener(addr: &str) -> Result<tokio::net::TcpListener> {
    if let Ok(socket_addr) = addr.parse::<SocketAddr>() {
        tokio::net::TcpListener::bind(socket_addr)
            .await
            .with_context(|| format!("failed to bind HTTP listener on {socket_addr}"))
    } else {
        tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind HTTP listener on {addr}"))
    }
}

pub fn build_router(state: SharedState) -> Router {
    let router = Router::new()
        .route("/models", get(handle_models))
        .route("/features", get(handle_features))
        .route("/predict", post(handle_predict))
        .route("/monitoring/summary", get(handle_summary))
        .route("/monitoring/live", get(handle_live))
        .route("/monitoring/ping", get(handle_ping))
        .route("/evaluation-report", get(handle_evaluation_report))
        .route("/evaluation-table", get(handle_evaluation_table))
        .route("/metrics", get(handle_metrics));

    let router = if state.cors_allow_any_origin {
        router.layer(CorsLayer::permissive())
    } else {
        router
    };

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

async fn handle_models(State(state): State<SharedState>) -> Json<Value> {
    Json(
        state
            .prediction
            .artifacts()
            .registry
            .descriptor()
            .to_json_value(),
    )
}

async fn handle_features(State(state): State<SharedState>) -> Json<FeaturesResponse> {
    Json(FeaturesResponse {
        features: state.prediction.artifacts().schema.names().to_vec(),
    })
}

async fn handle_predict(
    State(state): State<SharedState>,
    query: Result<Query<PredictQuery>, QueryRejection>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictionResult>, ApiError> {
    let Query(query) = query.map_err(|err| ApiError::bad_request(err.body_text()))?;
    let Json(request) = payload.map_err(|err| ApiError::bad_request(err.body_text()))?;
    let model_id = query
        .model_id
        .as_deref()
        .unwrap_or(&state.default_model_id);

    let result = state.prediction.predict(model_id, &request.data)?;
    Ok(Json(result))
}

async fn handle_summary(State(state): State<SharedState>) -> Json<MonitoringSummary> {
    Json(state.monitoring.summary())
}

async fn handle_live(
    State(state): State<SharedState>,
    query: Result<Query<LiveQuery>, QueryRejection>,
) -> Result<Json<Vec<FeedRecord>>, ApiError> {
    let Query(query) = query.map_err(|err| ApiError::bad_request(err.body_text()))?;
    let limit = query.limit.unwrap_or(DEFAULT_LIVE_FEED_LIMIT);
    Ok(Json(state.monitoring.live_feed(limit)))
}

async fn handle_ping(State(state): State<SharedState>) -> Json<PingResponse> {
    Json(state.monitoring.ping())
}

async fn handle_evaluation_report(
    State(state): State<SharedState>,
) -> Result<Json<Value>, ApiError> {
    let fallback = serde_json::to_value(EvaluationReport::empty())
        .map_err(|err| ApiError::internal(format!("failed to encode empty report: {err}")))?;
    read_json_or(&state.evaluation_report_path, fallback).await
}

async fn handle_evaluation_table(
    State(state): State<SharedState>,
) -> Result<Json<Value>, ApiError> {
    read_json_or(&state.evaluation_table_path, Value::Array(Vec::new())).await
}

async fn handle_metrics(State(state): State<SharedState>) -> Result<Json<Value>, ApiError> {
    read_json_or(&state.metrics_path, Value::Object(Default::default())).await
}

/// Serve a JSON artifact verbatim, or `fallback` when it does not exist
async fn read_json_or(path: &Path, fallback: Value) -> Result<Json<Value>, ApiError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Json(fallback)),
        Err(err) => {
            warn!("Failed to read {}: {}", path.display(), err);
            return Err(ApiError::internal(format!(
                "failed to read {}",
                path.display()
            )));
        }
    };

    serde_json::from_str(&content).map(Json).map_err(|err| {
        warn!("Malformed JSON in {}: {}", path.display(), err);
        ApiError::internal(format!("malformed JSON in {}", path.display()))
    })
}
