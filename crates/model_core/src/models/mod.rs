//! Binary classifier families and their capabilities
//!
//! Every classifier supports hard prediction. Probability estimates and a
//! continuous decision function are optional capabilities: callers ask for
//! them with [`Classifier::probability`] and [`Classifier::decision`] and
//! branch on presence, never on the concrete type.
//!
//! Model artifacts are JSON documents tagged by `kind`:
//!
//! ```json
//! {"kind": "logistic_regression", "coef": [0.8, -1.2], "intercept": 0.1}
//! ```

pub mod linear;
pub mod neighbors;
pub mod tree;

use crate::errors::{InferenceError, ModelCoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::path::Path;

pub use linear::{LinearSvm, LogisticRegression};
pub use neighbors::KNeighbors;
pub use tree::{DecisionTree, GradientBoosting, Node, RandomForest, Tree};

/// Negative (benign) class label
pub const NEGATIVE: u8 = 0;
/// Positive (malignant) class label
pub const POSITIVE: u8 = 1;

/// A binary classifier over scaled feature rows.
pub trait Classifier: Debug + Send + Sync {
    /// Artifact kind, as written in the `kind` tag
    fn kind(&self) -> &'static str;

    /// Width of the rows this model expects
    fn n_features(&self) -> usize;

    /// Hard class prediction (0 or 1)
    fn predict(&self, row: &[f64]) -> std::result::Result<u8, InferenceError>;

    /// Probability capability, if the model can estimate class probabilities
    fn probability(&self) -> Option<&dyn PredictProba> {
        None
    }

    /// Decision-function capability, if the model exposes a raw margin
    fn decision(&self) -> Option<&dyn DecisionFunction> {
        None
    }
}

/// Class probability estimates, ordered `[P(0), P(1)]`.
pub trait PredictProba: Send + Sync {
    fn predict_proba(&self, row: &[f64]) -> std::result::Result<[f64; 2], InferenceError>;
}

/// Continuous, threshold-free score where larger means more positive.
pub trait DecisionFunction: Send + Sync {
    fn decision_function(&self, row: &[f64]) -> std::result::Result<f64, InferenceError>;
}

/// Serialized model artifact
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    LogisticRegression(LogisticRegression),
    LinearSvm(LinearSvm),
    DecisionTree(DecisionTree),
    RandomForest(RandomForest),
    GradientBoosting(GradientBoosting),
    KNeighbors(KNeighbors),
}

impl ModelSpec {
    /// Structural validation performed before a model is accepted
    pub fn validate(&self) -> std::result::Result<(), String> {
        match self {
            ModelSpec::LogisticRegression(m) => m.validate(),
            ModelSpec::LinearSvm(m) => m.validate(),
            ModelSpec::DecisionTree(m) => m.validate(),
            ModelSpec::RandomForest(m) => m.validate(),
            ModelSpec::GradientBoosting(m) => m.validate(),
            ModelSpec::KNeighbors(m) => m.validate(),
        }
    }

    pub fn into_classifier(self) -> Box<dyn Classifier> {
        match self {
            ModelSpec::LogisticRegression(m) => Box::new(m),
            ModelSpec::LinearSvm(m) => Box::new(m),
            ModelSpec::DecisionTree(m) => Box::new(m),
            ModelSpec::RandomForest(m) => Box::new(m),
            ModelSpec::GradientBoosting(m) => Box::new(m),
            ModelSpec::KNeighbors(m) => Box::new(m),
        }
    }
}

/// Load and validate a model artifact from disk
pub fn load_model<P: AsRef<Path>>(model_id: &str, path: P) -> Result<Box<dyn Classifier>> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path).map_err(|e| ModelCoreError::io(path, e))?;
    let spec: ModelSpec = serde_json::from_str(&json).map_err(|e| ModelCoreError::parse(path, e))?;
    spec.validate()
        .map_err(|reason| ModelCoreError::InvalidModel {
            model_id: model_id.to_string(),
            reason,
        })?;
    Ok(spec.into_classifier())
}

/// Continuous positive-class score used for ranking metrics.
///
/// Prefers the positive-class probability and falls back to the decision
/// function, mirroring how the capabilities are advertised. Returns `None`
/// when the model has neither capability.
pub fn positive_score(
    model: &dyn Classifier,
    row: &[f64],
) -> Option<std::result::Result<f64, InferenceError>> {
    if let Some(proba) = model.probability() {
        return Some(proba.predict_proba(row).map(|p| p[1]));
    }
    model.decision().map(|d| d.decision_function(row))
}

pub(crate) fn check_width(expected: usize, row: &[f64]) -> std::result::Result<(), InferenceError> {
    if row.len() != expected {
        return Err(InferenceError::DimensionMismatch {
            expected,
            actual: row.len(),
        });
    }
    Ok(())
}

pub(crate) fn finite(value: f64, what: &'static str) -> std::result::Result<f64, InferenceError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(InferenceError::NonFinite(what))
    }
}

/// Numerically stable logistic function
pub(crate) fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Class label from a positive-class probability; ties go to the negative class
pub(crate) fn label_from_probability(p_positive: f64) -> u8 {
    if p_positive > 0.5 {
        POSITIVE
    } else {
        NEGATIVE
    }
}
