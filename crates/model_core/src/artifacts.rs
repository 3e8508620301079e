//! Artifact directory layout and the startup bundle

use crate::errors::Result;
use crate::registry::{ModelRegistry, RegistryDescriptor};
use crate::schema::FeatureSchema;
use crate::transform::StandardScaler;
use std::path::{Path, PathBuf};
use tracing::info;

pub const FEATURE_NAMES_FILE: &str = "feature_names.csv";
pub const REGISTRY_FILE: &str = "models_registry.json";
pub const SCALER_FILE: &str = "scaler.json";
pub const EVALUATION_REPORT_FILE: &str = "evaluation_report.json";
pub const EVALUATION_TABLE_FILE: &str = "evaluation_table.json";
pub const METRICS_FILE: &str = "metrics.json";
pub const REFERENCE_DATASET_FILE: &str = "reference_dataset.csv";

/// Well-known file locations inside an artifacts directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    root: PathBuf,
}

impl ArtifactLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn feature_names(&self) -> PathBuf {
        self.root.join(FEATURE_NAMES_FILE)
    }

    pub fn registry(&self) -> PathBuf {
        self.root.join(REGISTRY_FILE)
    }

    pub fn scaler(&self) -> PathBuf {
        self.root.join(SCALER_FILE)
    }

    pub fn evaluation_report(&self) -> PathBuf {
        self.root.join(EVALUATION_REPORT_FILE)
    }

    pub fn evaluation_table(&self) -> PathBuf {
        self.root.join(EVALUATION_TABLE_FILE)
    }

    pub fn metrics(&self) -> PathBuf {
        self.root.join(METRICS_FILE)
    }

    pub fn reference_dataset(&self) -> PathBuf {
        self.root.join(REFERENCE_DATASET_FILE)
    }

    /// Schema, then scaler (checked against the schema), then registry descriptor
    pub fn load_inputs(&self) -> Result<(FeatureSchema, StandardScaler, RegistryDescriptor)> {
        let schema = FeatureSchema::from_csv_file(self.feature_names())?;
        let scaler = StandardScaler::load(self.scaler(), &schema)?;
        let descriptor = RegistryDescriptor::from_json_file(self.registry())?;
        Ok((schema, scaler, descriptor))
    }
}

/// Everything the prediction path needs, resident and immutable
#[derive(Debug, Clone)]
pub struct ServingArtifacts {
    pub schema: FeatureSchema,
    pub transform: StandardScaler,
    pub registry: ModelRegistry,
}

impl ServingArtifacts {
    /// Load the full bundle; any missing or invalid artifact fails startup.
    pub fn load(layout: &ArtifactLayout) -> Result<Self> {
        info!("Loading artifacts from {}", layout.root().display());

        let (schema, transform, descriptor) = layout.load_inputs()?;
        info!("Feature schema has {} features", schema.len());

        let registry = ModelRegistry::load(descriptor, layout.root(), &schema)?;

        Ok(Self {
            schema,
            transform,
            registry,
        })
    }
}
