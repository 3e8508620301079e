//! Model registry: identifier → loaded classifier plus display metadata
//!
//! The descriptor file is a JSON object `{"<id>": {"name": "...", "file": "..."}}`.
//! Entries keep file order. Relative `file` paths resolve against the
//! artifacts directory.

use crate::errors::{ModelCoreError, Result};
use crate::models::{load_model, Classifier};
use crate::schema::FeatureSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// One registry entry as described on disk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistryEntry {
    pub id: String,
    /// Display name; falls back to the id when the descriptor omits it
    pub name: String,
    /// Artifact reference, relative to the artifacts directory
    pub file: String,
}

impl RegistryEntry {
    pub fn new(id: impl Into<String>, name: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            file: file.into(),
        }
    }

    /// Artifact path resolved against `base_dir`
    pub fn artifact_path(&self, base_dir: &Path) -> PathBuf {
        let file = Path::new(&self.file);
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            base_dir.join(file)
        }
    }
}

/// Parsed registry descriptor, in file order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryDescriptor {
    entries: Vec<RegistryEntry>,
}

impl RegistryDescriptor {
    pub fn new(entries: Vec<RegistryEntry>) -> Result<Self> {
        if entries.is_empty() {
            return Err(ModelCoreError::InvalidRegistry(
                "registry lists no models".to_string(),
            ));
        }
        let mut seen = HashMap::new();
        for (i, entry) in entries.iter().enumerate() {
            if entry.id.trim().is_empty() {
                return Err(ModelCoreError::InvalidRegistry(format!(
                    "entry {i} has a blank id"
                )));
            }
            if seen.insert(entry.id.as_str(), i).is_some() {
                return Err(ModelCoreError::InvalidRegistry(format!(
                    "duplicate model id '{}'",
                    entry.id
                )));
            }
        }
        Ok(Self { entries })
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| ModelCoreError::io(path, e))?;
        let value: Value =
            serde_json::from_str(&json).map_err(|e| ModelCoreError::parse(path, e))?;
        Self::from_json_value(&value)
    }

    pub fn from_json_value(value: &Value) -> Result<Self> {
        let object = value.as_object().ok_or_else(|| {
            ModelCoreError::InvalidRegistry("descriptor must be a JSON object".to_string())
        })?;

        let mut entries = Vec::with_capacity(object.len());
        for (id, info) in object {
            let info = info.as_object().ok_or_else(|| {
                ModelCoreError::InvalidRegistry(format!("entry '{id}' must be an object"))
            })?;
            let file = info.get("file").and_then(Value::as_str).ok_or_else(|| {
                ModelCoreError::InvalidRegistry(format!("entry '{id}' has no 'file'"))
            })?;
            let name = info
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or(id.as_str());
            entries.push(RegistryEntry::new(id.as_str(), name, file));
        }

        Self::new(entries)
    }

    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    /// Descriptor in its on-disk shape, order preserved
    pub fn to_json_value(&self) -> Value {
        let mut object = Map::with_capacity(self.entries.len());
        for entry in &self.entries {
            let mut info = Map::new();
            info.insert("name".to_string(), Value::String(entry.name.clone()));
            info.insert("file".to_string(), Value::String(entry.file.clone()));
            object.insert(entry.id.clone(), Value::Object(info));
        }
        Value::Object(object)
    }
}

/// A registry entry with its resident classifier
#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub entry: RegistryEntry,
    pub model: Arc<dyn Classifier>,
}

impl LoadedModel {
    pub fn id(&self) -> &str {
        &self.entry.id
    }

    pub fn name(&self) -> &str {
        &self.entry.name
    }
}

/// Immutable set of loaded models
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    descriptor: RegistryDescriptor,
    models: Vec<LoadedModel>,
    index: HashMap<String, usize>,
}

/// Load one artifact and check it against the schema width
pub fn load_entry(
    entry: &RegistryEntry,
    base_dir: &Path,
    schema: &FeatureSchema,
) -> Result<Arc<dyn Classifier>> {
    let path = entry.artifact_path(base_dir);
    let model = load_model(&entry.id, &path)?;
    if model.n_features() != schema.len() {
        return Err(ModelCoreError::InvalidModel {
            model_id: entry.id.clone(),
            reason: format!(
                "model expects {} features but the schema has {}",
                model.n_features(),
                schema.len()
            ),
        });
    }
    debug!(
        model_id = %entry.id,
        kind = model.kind(),
        path = %path.display(),
        "Loaded model artifact"
    );
    Ok(Arc::from(model))
}

impl ModelRegistry {
    /// Load every model in the descriptor; the first failure aborts.
    #[instrument(skip_all, fields(models = descriptor.entries().len()))]
    pub fn load(
        descriptor: RegistryDescriptor,
        base_dir: &Path,
        schema: &FeatureSchema,
    ) -> Result<Self> {
        let mut models = Vec::with_capacity(descriptor.entries().len());
        for entry in descriptor.entries() {
            let model = load_entry(entry, base_dir, schema)?;
            models.push(LoadedModel {
                entry: entry.clone(),
                model,
            });
        }
        info!("Model registry loaded with {} models", models.len());
        Ok(Self::assemble(descriptor, models))
    }

    /// Load what can be loaded; failing entries are returned with their error.
    ///
    /// The resulting registry may be empty.
    pub fn load_available(
        descriptor: RegistryDescriptor,
        base_dir: &Path,
        schema: &FeatureSchema,
    ) -> (Self, Vec<(RegistryEntry, ModelCoreError)>) {
        let mut models = Vec::new();
        let mut skipped = Vec::new();
        for entry in descriptor.entries() {
            match load_entry(entry, base_dir, schema) {
                Ok(model) => models.push(LoadedModel {
                    entry: entry.clone(),
                    model,
                }),
                Err(e) => {
                    warn!(model_id = %entry.id, "Skipping model: {}", e);
                    skipped.push((entry.clone(), e));
                }
            }
        }
        (Self::assemble(descriptor, models), skipped)
    }

    /// Build a registry from models already in memory
    pub fn from_models(models: Vec<(RegistryEntry, Arc<dyn Classifier>)>) -> Result<Self> {
        let descriptor =
            RegistryDescriptor::new(models.iter().map(|(entry, _)| entry.clone()).collect())?;
        let models = models
            .into_iter()
            .map(|(entry, model)| LoadedModel { entry, model })
            .collect();
        Ok(Self::assemble(descriptor, models))
    }

    fn assemble(descriptor: RegistryDescriptor, models: Vec<LoadedModel>) -> Self {
        let index = models
            .iter()
            .enumerate()
            .map(|(i, m)| (m.entry.id.clone(), i))
            .collect();
        Self {
            descriptor,
            models,
            index,
        }
    }

    pub fn get(&self, model_id: &str) -> Option<&LoadedModel> {
        self.index.get(model_id).map(|&i| &self.models[i])
    }

    pub fn contains(&self, model_id: &str) -> bool {
        self.index.contains_key(model_id)
    }

    /// Loaded models in registry order
    pub fn models(&self) -> &[LoadedModel] {
        &self.models
    }

    pub fn descriptor(&self) -> &RegistryDescriptor {
        &self.descriptor
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_descriptor_keeps_file_order_and_name_fallback() {
        let value: Value = serde_json::from_str(
            r#"{"svm": {"name": "Linear SVM", "file": "svm.json"},
                "knn": {"file": "knn.json"},
                "logreg": {"name": "Logistic Regression", "file": "logreg.json"}}"#,
        )
        .unwrap();
        let descriptor = RegistryDescriptor::from_json_value(&value).unwrap();

        let ids: Vec<&str> = descriptor.entries().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["svm", "knn", "logreg"]);
        assert_eq!(descriptor.entries()[1].name, "knn");

        let back = descriptor.to_json_value();
        let keys: Vec<&String> = back.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["svm", "knn", "logreg"]);
        assert_eq!(back["knn"], json!({"name": "knn", "file": "knn.json"}));
    }

    #[test]
    fn test_descriptor_rejects_malformed_entries() {
        assert!(RegistryDescriptor::from_json_value(&json!([])).is_err());
        assert!(RegistryDescriptor::from_json_value(&json!({})).is_err());
        assert!(RegistryDescriptor::from_json_value(&json!({"m": {"name": "x"}})).is_err());
        assert!(RegistryDescriptor::from_json_value(&json!({"m": "file.json"})).is_err());
    }

    #[test]
    fn test_artifact_path_resolution() {
        let entry = RegistryEntry::new("m", "M", "models/m.json");
        assert_eq!(
            entry.artifact_path(Path::new("/srv/artifacts")),
            PathBuf::from("/srv/artifacts/models/m.json")
        );
    }
}
