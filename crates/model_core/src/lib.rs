//! Model core for the breast-cancer classifier dashboard
//!
//! Provides the pieces shared by the serving process and the offline
//! evaluation builder.
//!
//! Modules:
//! - `schema`: Canonical feature order and schema-ordered vector assembly
//! - `transform`: Fitted standard scaler applied before every model
//! - `models`: Classifier families and their optional capabilities
//! - `registry`: Model registry descriptor and loaded models
//! - `artifacts`: Artifact directory layout and the serving bundle
//! - `report`: Evaluation report document
//! - `errors`: Error types

pub mod artifacts;
pub mod errors;
pub mod models;
pub mod registry;
pub mod report;
pub mod schema;
pub mod transform;

pub use artifacts::{ArtifactLayout, ServingArtifacts};
pub use errors::{InferenceError, ModelCoreError, Result, TransformError};
pub use models::{
    load_model, positive_score, Classifier, DecisionFunction, ModelSpec, PredictProba, NEGATIVE,
    POSITIVE,
};
pub use registry::{LoadedModel, ModelRegistry, RegistryDescriptor, RegistryEntry};
pub use report::{EvaluationReport, EvaluationRow, RocCurve};
pub use schema::{FeatureSchema, FeatureVector, MissingFeatures};
pub use transform::StandardScaler;

/// Crate version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
