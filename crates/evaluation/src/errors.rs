//! Evaluation run errors

use bcdash_model_core::ModelCoreError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort an evaluation run.
///
/// Any of these leaves a previously written report untouched.
#[derive(Error, Debug)]
pub enum EvaluationError {
    #[error(transparent)]
    Artifacts(#[from] ModelCoreError),

    /// No dataset source matched, or the matched source is unusable
    #[error("Dataset resolution failed: {0}")]
    DatasetResolution(String),

    #[error("Dataset is missing features used by the API: {0:?}")]
    MissingFeatures(Vec<String>),

    #[error("Invalid dataset {}: {reason}", path.display())]
    InvalidDataset { path: PathBuf, reason: String },

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode report: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EvaluationError>;
