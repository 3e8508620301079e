//! Feature schema: the canonical, ordered list of input names
//!
//! Every model, the preprocessing transform and the evaluation dataset share
//! this layout. Vectors are always assembled in schema order, never in the
//! order a caller happened to supply values.

use crate::errors::{ModelCoreError, Result};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use thiserror::Error;

/// Ordered feature names, fixed for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    names: Vec<String>,
}

/// Request did not provide every schema feature.
///
/// Names are sorted so the error is deterministic regardless of schema or
/// request order.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Missing features: {0:?}")]
pub struct MissingFeatures(pub Vec<String>);

/// A single row of raw feature values in schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: Vec<f64>,
}

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.values
    }
}

impl FeatureSchema {
    /// Build a schema, rejecting empty, blank or duplicated names
    pub fn new(names: Vec<String>) -> Result<Self> {
        if names.is_empty() {
            return Err(ModelCoreError::InvalidSchema(
                "schema has no features".to_string(),
            ));
        }

        let mut seen = HashSet::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(ModelCoreError::InvalidSchema(format!(
                    "feature {i} has a blank name"
                )));
            }
            if !seen.insert(name.as_str()) {
                return Err(ModelCoreError::InvalidSchema(format!(
                    "duplicate feature name '{name}'"
                )));
            }
        }

        Ok(Self { names })
    }

    /// Load a header-less CSV file holding one feature name per line.
    ///
    /// Only the first column is read; surrounding quotes and whitespace are
    /// stripped and blank lines are skipped.
    pub fn from_csv_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ModelCoreError::io(path, e))?;

        let names = content
            .lines()
            .filter_map(|line| {
                let first = line.split(',').next().unwrap_or_default();
                let name = first.trim().trim_matches('"').trim();
                (!name.is_empty()).then(|| name.to_string())
            })
            .collect();

        Self::new(names)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Names from the schema that are absent from `available`, sorted
    pub fn missing_from<'a, I>(&self, available: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let provided: HashSet<&str> = available.into_iter().collect();
        let mut missing: Vec<String> = self
            .names
            .iter()
            .filter(|name| !provided.contains(name.as_str()))
            .cloned()
            .collect();
        missing.sort();
        missing
    }

    /// Assemble a vector in schema order from a name → value map.
    ///
    /// Extra names in `values` are ignored.
    pub fn assemble(
        &self,
        values: &HashMap<String, f64>,
    ) -> std::result::Result<FeatureVector, MissingFeatures> {
        let missing = self.missing_from(values.keys().map(String::as_str));
        if !missing.is_empty() {
            return Err(MissingFeatures(missing));
        }

        let values = self
            .names
            .iter()
            .map(|name| values.get(name).copied().unwrap_or_default())
            .collect();
        Ok(FeatureVector { values })
    }
}
