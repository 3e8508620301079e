//! Error types for the model core

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating serving artifacts.
///
/// Every variant is fatal at startup: a process that hits one of these must
/// not begin serving predictions.
#[derive(Error, Debug)]
pub enum ModelCoreError {
    /// A required artifact file does not exist
    #[error("Artifact not found: {}", path.display())]
    MissingArtifact { path: PathBuf },

    /// Feature schema is empty, malformed or contains duplicates
    #[error("Invalid feature schema: {0}")]
    InvalidSchema(String),

    /// Preprocessing transform does not match the feature schema
    #[error("Invalid preprocessing transform: {0}")]
    InvalidTransform(String),

    /// Model registry descriptor is malformed
    #[error("Invalid model registry: {0}")]
    InvalidRegistry(String),

    /// A model artifact failed structural validation
    #[error("Invalid model '{model_id}': {reason}")]
    InvalidModel { model_id: String, reason: String },

    /// I/O error
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Serialization error
    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ModelCoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            ModelCoreError::MissingArtifact { path }
        } else {
            ModelCoreError::Io { path, source }
        }
    }

    pub(crate) fn parse(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        ModelCoreError::Parse {
            path: path.into(),
            source,
        }
    }
}

/// Failure while applying the preprocessing transform to a single row.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("expected {expected} features, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("non-finite value for feature '{feature}' after scaling")]
    NonFinite { feature: String },
}

/// Failure inside a classifier while scoring a single row.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InferenceError {
    #[error("model expects {expected} features, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("model produced a non-finite {0}")]
    NonFinite(&'static str),

    #[error("malformed model structure: {0}")]
    Malformed(String),
}

/// Result type for model core operations
pub type Result<T> = std::result::Result<T, ModelCoreError>;
