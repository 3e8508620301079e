//! Prediction service
//!
//! Validates a request against the registry and schema, assembles the row in
//! schema order, applies the shared transform and invokes the selected model.
//! Only completed predictions become telemetry samples; transform and
//! inference failures mark the service degraded.

use crate::errors::{PredictionError, Result};
use crate::telemetry::TelemetryRecorder;
use bcdash_model_core::{LoadedModel, ServingArtifacts};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredictionResult {
    pub model_id: String,
    pub model_name: String,
    pub prediction: u8,
    /// `[P(0), P(1)]`; null for models without probability estimates
    pub probabilities: Option<[f64; 2]>,
    /// Largest class probability; null whenever `probabilities` is
    pub confidence: Option<f64>,
    pub latency_ms: f64,
}

#[derive(Debug, Clone)]
pub struct PredictionService {
    artifacts: Arc<ServingArtifacts>,
    telemetry: Arc<TelemetryRecorder>,
}

impl PredictionService {
    pub fn new(artifacts: Arc<ServingArtifacts>, telemetry: Arc<TelemetryRecorder>) -> Self {
        Self {
            artifacts,
            telemetry,
        }
    }

    pub fn artifacts(&self) -> &ServingArtifacts {
        &self.artifacts
    }

    pub fn telemetry(&self) -> &Arc<TelemetryRecorder> {
        &self.telemetry
    }

    #[instrument(skip(self, features), fields(model_id = %model_id))]
    pub fn predict(
        &self,
        model_id: &str,
        features: &HashMap<String, f64>,
    ) -> Result<PredictionResult> {
        let start = Instant::now();

        let loaded = self
            .artifacts
            .registry
            .get(model_id)
            .ok_or_else(|| PredictionError::UnknownModel(model_id.to_string()))?;
        let row = self.artifacts.schema.assemble(features)?;

        match self.infer(loaded, row.as_slice()) {
            Ok((prediction, probabilities)) => {
                let result = PredictionResult {
                    model_id: loaded.id().to_string(),
                    model_name: loaded.name().to_string(),
                    prediction,
                    probabilities,
                    confidence: probabilities.map(|p| p[0].max(p[1])),
                    latency_ms: start.elapsed().as_secs_f64() * 1000.0,
                };
                self.telemetry.record_prediction(&result);
                debug!(
                    prediction = result.prediction,
                    latency_ms = result.latency_ms,
                    "Prediction served"
                );
                Ok(result)
            }
            Err(e) => {
                self.telemetry.record_failure();
                warn!("Prediction failed: {}", e);
                Err(e)
            }
        }
    }

    fn infer(&self, loaded: &LoadedModel, row: &[f64]) -> Result<(u8, Option<[f64; 2]>)> {
        let scaled = self.artifacts.transform.transform(row)?;

        let prediction = loaded
            .model
            .predict(&scaled)
            .map_err(|e| PredictionError::Internal(e.to_string()))?;

        let probabilities = match loaded.model.probability() {
            Some(proba) => Some(
                proba
                    .predict_proba(&scaled)
                    .map_err(|e| PredictionError::Internal(e.to_string()))?,
            ),
            None => None,
        };

        Ok((prediction, probabilities))
    }
}
