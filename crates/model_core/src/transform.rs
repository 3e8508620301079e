//! Preprocessing transform shared by every model
//!
//! A fitted standard scaler, `(x - mean) / scale`, loaded once and applied
//! identically at serving and evaluation time.

use crate::errors::{ModelCoreError, Result, TransformError};
use crate::schema::FeatureSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Fitted standard scaler
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StandardScaler {
    /// Per-feature mean, in schema order
    pub mean: Vec<f64>,
    /// Per-feature scale; zero is treated as one, as for constant columns
    pub scale: Vec<f64>,
    /// Feature order the scaler was fitted on, when recorded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_names: Option<Vec<String>>,
}

impl StandardScaler {
    /// Scaler that leaves values untouched
    pub fn identity(n_features: usize) -> Self {
        Self {
            mean: vec![0.0; n_features],
            scale: vec![1.0; n_features],
            feature_names: None,
        }
    }

    /// Load a scaler from JSON and check it against the schema
    pub fn load<P: AsRef<Path>>(path: P, schema: &FeatureSchema) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| ModelCoreError::io(path, e))?;
        let scaler: StandardScaler =
            serde_json::from_str(&json).map_err(|e| ModelCoreError::parse(path, e))?;
        scaler.check_schema(schema)?;
        Ok(scaler)
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    /// Verify the scaler was fitted on exactly the schema's layout
    pub fn check_schema(&self, schema: &FeatureSchema) -> Result<()> {
        if self.mean.len() != self.scale.len() {
            return Err(ModelCoreError::InvalidTransform(format!(
                "mean has {} entries but scale has {}",
                self.mean.len(),
                self.scale.len()
            )));
        }
        if self.mean.len() != schema.len() {
            return Err(ModelCoreError::InvalidTransform(format!(
                "fitted on {} features, schema has {}",
                self.mean.len(),
                schema.len()
            )));
        }
        if let Some(i) = self
            .mean
            .iter()
            .zip(&self.scale)
            .position(|(m, s)| !m.is_finite() || !s.is_finite())
        {
            return Err(ModelCoreError::InvalidTransform(format!(
                "non-finite parameter for feature {i}"
            )));
        }
        if let Some(fitted) = &self.feature_names {
            if fitted.as_slice() != schema.names() {
                return Err(ModelCoreError::InvalidTransform(
                    "fitted feature order differs from the feature schema".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Scale a single row that is already in schema order
    pub fn transform(&self, row: &[f64]) -> std::result::Result<Vec<f64>, TransformError> {
        if row.len() != self.mean.len() {
            return Err(TransformError::LengthMismatch {
                expected: self.mean.len(),
                actual: row.len(),
            });
        }

        row.iter()
            .zip(self.mean.iter().zip(&self.scale))
            .enumerate()
            .map(|(i, (&x, (&mean, &scale)))| {
                let scale = if scale == 0.0 { 1.0 } else { scale };
                let scaled = (x - mean) / scale;
                if scaled.is_finite() {
                    Ok(scaled)
                } else {
                    Err(TransformError::NonFinite {
                        feature: self.feature_label(i),
                    })
                }
            })
            .collect()
    }

    fn feature_label(&self, index: usize) -> String {
        self.feature_names
            .as_ref()
            .and_then(|names| names.get(index).cloned())
            .unwrap_or_else(|| format!("#{index}"))
    }
}
