//! Request-scoped errors of the prediction path

use bcdash_model_core::{MissingFeatures, TransformError};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PredictionError {
    #[error("Unknown model_id: {0}")]
    UnknownModel(String),

    #[error(transparent)]
    MissingFeatures(#[from] MissingFeatures),

    #[error("Preprocessing failed: {0}")]
    Transform(#[from] TransformError),

    #[error("Prediction failed: {0}")]
    Internal(String),
}

impl PredictionError {
    /// Stable category reported to clients
    pub fn category(&self) -> &'static str {
        match self {
            PredictionError::UnknownModel(_) => "unknown_model",
            PredictionError::MissingFeatures(_) => "missing_features",
            PredictionError::Transform(_) => "transform_error",
            PredictionError::Internal(_) => "internal_error",
        }
    }

    /// Caller mistakes: reported, never recorded as failures
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            PredictionError::UnknownModel(_) | PredictionError::MissingFeatures(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PredictionError>;
