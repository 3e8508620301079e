//! Offline evaluation run
//!
//! Resolves a labelled dataset, holds out a stratified test fold, scores
//! every loadable registry model on it and writes the report atomically.
//! Any failure before the write leaves the previous report in place.

use crate::dataset::{
    resolve_dataset, BundledReference, DatasetStrategy, LabeledDataset, LatestCsvIn,
};
use crate::errors::{EvaluationError, Result};
use crate::metrics::{ClassificationMetrics, ConfusionMatrix};
use crate::roc::roc_curve;
use crate::selection::{recommended, sort_rows};
use crate::split::stratified_split;
use bcdash_model_core::artifacts::{EVALUATION_REPORT_FILE, REFERENCE_DATASET_FILE};
use bcdash_model_core::{
    positive_score, ArtifactLayout, Classifier, EvaluationReport, EvaluationRow, InferenceError,
    LoadedModel, ModelRegistry, RocCurve,
};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_TEST_SIZE: f64 = 0.2;
pub const DEFAULT_SEED: i64 = 42;

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationSettings {
    pub artifacts_dir: PathBuf,
    /// Directory searched for the newest `*.csv`
    pub data_dir: PathBuf,
    /// Fallback dataset when `data_dir` has no CSV
    pub reference_dataset: PathBuf,
    pub output: PathBuf,
    pub test_size: f64,
    pub seed: i64,
}

impl EvaluationSettings {
    pub fn new(artifacts_dir: impl Into<PathBuf>) -> Self {
        let artifacts_dir = artifacts_dir.into();
        Self {
            data_dir: PathBuf::from("data"),
            reference_dataset: artifacts_dir.join(REFERENCE_DATASET_FILE),
            output: artifacts_dir.join(EVALUATION_REPORT_FILE),
            artifacts_dir,
            test_size: DEFAULT_TEST_SIZE,
            seed: DEFAULT_SEED,
        }
    }

    /// Dataset sources in priority order
    pub fn dataset_chain(&self) -> Vec<Box<dyn DatasetStrategy>> {
        vec![
            Box::new(LatestCsvIn {
                dir: self.data_dir.clone(),
            }),
            Box::new(BundledReference {
                path: self.reference_dataset.clone(),
            }),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct EvaluationBuilder {
    settings: EvaluationSettings,
}

impl EvaluationBuilder {
    pub fn new(settings: EvaluationSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &EvaluationSettings {
        &self.settings
    }

    /// Build the report and persist it to the configured output
    #[instrument(skip(self), fields(artifacts = %self.settings.artifacts_dir.display()))]
    pub fn run(&self) -> Result<EvaluationReport> {
        let report = self.build()?;
        write_report_atomically(&self.settings.output, &report)?;

        info!("Wrote {}", self.settings.output.display());
        info!(
            "Recommended: {}",
            report.recommended_model_id.as_deref().unwrap_or("none")
        );
        let ranked: Vec<&str> = report.rows.iter().map(|r| r.model_id.as_str()).collect();
        info!("Models: {:?}", ranked);

        Ok(report)
    }

    /// Build the report without writing it
    pub fn build(&self) -> Result<EvaluationReport> {
        let layout = ArtifactLayout::new(&self.settings.artifacts_dir);
        let (schema, scaler, descriptor) = layout.load_inputs()?;

        let resolved = resolve_dataset(&self.settings.dataset_chain())?;
        let dataset = LabeledDataset::from_resolved(resolved, &schema)?;

        let split = stratified_split(&dataset.labels, self.settings.test_size, self.settings.seed)?;
        info!(
            "Held out {} of {} rows (seed {})",
            split.test.len(),
            dataset.len(),
            self.settings.seed
        );

        let y_test: Vec<u8> = split.test.iter().map(|&i| dataset.labels[i]).collect();
        let x_test = split
            .test
            .iter()
            .map(|&i| {
                scaler.transform(&dataset.rows[i]).map_err(|e| {
                    EvaluationError::DatasetResolution(format!(
                        "{}: row {} cannot be preprocessed: {}",
                        dataset.source,
                        i + 1,
                        e
                    ))
                })
            })
            .collect::<Result<Vec<Vec<f64>>>>()?;

        let (registry, skipped) =
            ModelRegistry::load_available(descriptor, layout.root(), &schema);
        if !skipped.is_empty() {
            warn!("{} model(s) could not be loaded and were skipped", skipped.len());
        }

        let (mut rows, roc) = evaluate_registry(&registry, &x_test, &y_test);
        sort_rows(&mut rows);

        let positives = y_test.iter().filter(|&&y| y == 1).count();
        Ok(EvaluationReport {
            source: Some(dataset.source),
            n_test: Some(y_test.len()),
            positive_rate_test: Some(positives as f64 / y_test.len() as f64),
            recommended_model_id: recommended(&rows),
            rows,
            roc,
        })
    }
}

/// Score every model; models that fail inference are skipped
pub fn evaluate_registry(
    registry: &ModelRegistry,
    x_test: &[Vec<f64>],
    y_test: &[u8],
) -> (Vec<EvaluationRow>, BTreeMap<String, RocCurve>) {
    let mut rows = Vec::with_capacity(registry.len());
    let mut roc = BTreeMap::new();

    for loaded in registry.models() {
        match evaluate_model(loaded, x_test, y_test) {
            Ok((row, curve)) => {
                debug!(
                    model_id = %row.model_id,
                    fnr = row.fnr,
                    auc = ?row.auc,
                    "Model evaluated"
                );
                if let Some(curve) = curve {
                    roc.insert(row.model_id.clone(), curve);
                }
                rows.push(row);
            }
            Err(e) => warn!(model_id = %loaded.id(), "Skipping model: {}", e),
        }
    }

    (rows, roc)
}

fn evaluate_model(
    loaded: &LoadedModel,
    x_test: &[Vec<f64>],
    y_test: &[u8],
) -> std::result::Result<(EvaluationRow, Option<RocCurve>), InferenceError> {
    let y_pred = x_test
        .iter()
        .map(|row| loaded.model.predict(row))
        .collect::<std::result::Result<Vec<u8>, _>>()?;

    let confusion = ConfusionMatrix::from_predictions(y_test, &y_pred);
    let metrics = ClassificationMetrics::from_confusion(&confusion);

    let curve = continuous_scores(loaded.model.as_ref(), x_test, loaded.id())
        .and_then(|scores| roc_curve(y_test, &scores));

    let row = EvaluationRow {
        model_id: loaded.id().to_string(),
        model_name: loaded.name().to_string(),
        accuracy: metrics.accuracy,
        precision: metrics.precision,
        recall: metrics.recall,
        specificity: metrics.specificity,
        fnr: metrics.fnr,
        f1: metrics.f1,
        auc: curve.as_ref().map(|c| c.auc),
        tn: confusion.tn,
        fp: confusion.fp,
        fn_: confusion.fn_,
        tp: confusion.tp,
    };
    Ok((row, curve))
}

/// Positive-class scores, or `None` when the model has no continuous output
fn continuous_scores(model: &dyn Classifier, x_test: &[Vec<f64>], model_id: &str) -> Option<Vec<f64>> {
    let mut scores = Vec::with_capacity(x_test.len());
    for row in x_test {
        match positive_score(model, row)? {
            Ok(score) => scores.push(score),
            Err(e) => {
                warn!(model_id, "No ROC curve, scoring failed: {}", e);
                return None;
            }
        }
    }
    Some(scores)
}

/// Write to a sibling temporary file, then rename over `path`
pub fn write_report_atomically(path: &Path, report: &EvaluationReport) -> Result<()> {
    let io_error = |source: std::io::Error| EvaluationError::Io {
        path: path.to_path_buf(),
        source,
    };

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(io_error)?;

    let json = serde_json::to_vec_pretty(report)?;
    let mut tmp = NamedTempFile::new_in(dir).map_err(io_error)?;
    tmp.write_all(&json).map_err(io_error)?;
    tmp.as_file().sync_all().map_err(io_error)?;
    tmp.persist(path).map_err(|e| io_error(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bcdash_model_core::models::{LinearSvm, LogisticRegression};
    use bcdash_model_core::RegistryEntry;
    use std::sync::Arc;

    #[test]
    fn test_settings_defaults() {
        let settings = EvaluationSettings::new("/srv/artifacts");
        assert_eq!(settings.test_size, 0.2);
        assert_eq!(settings.seed, 42);
        assert_eq!(
            settings.output,
            PathBuf::from("/srv/artifacts/evaluation_report.json")
        );
        assert_eq!(
            settings.reference_dataset,
            PathBuf::from("/srv/artifacts/reference_dataset.csv")
        );
        assert_eq!(settings.dataset_chain().len(), 2);
    }

    #[test]
    fn test_decision_only_model_gets_roc() {
        let svm: Arc<dyn Classifier> = Arc::new(LinearSvm {
            coef: vec![1.0],
            intercept: 0.0,
        });
        let wide: Arc<dyn Classifier> = Arc::new(LogisticRegression {
            coef: vec![1.0, 1.0],
            intercept: 0.0,
        });
        let registry = ModelRegistry::from_models(vec![
            (RegistryEntry::new("svm", "SVM", "svm.json"), svm),
            (RegistryEntry::new("wide", "Wide", "wide.json"), wide),
        ])
        .unwrap();

        let x = vec![vec![-2.0], vec![-1.0], vec![1.0], vec![2.0]];
        let y = vec![0, 0, 1, 1];
        let (rows, roc) = evaluate_registry(&registry, &x, &y);

        // the two-feature model fails on one-feature rows and is skipped
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].model_id, "svm");
        assert_eq!(rows[0].auc, Some(1.0));
        assert_eq!(rows[0].fnr, 0.0);
        assert!(roc.contains_key("svm"));
    }

    #[test]
    fn test_atomic_write_replaces_report() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("report.json");

        write_report_atomically(&path, &EvaluationReport::empty()).unwrap();
        let report = EvaluationReport {
            recommended_model_id: Some("svm".into()),
            ..EvaluationReport::empty()
        };
        write_report_atomically(&path, &report).unwrap();

        let stored: EvaluationReport =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(stored, report);
        assert_eq!(std::fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }
}
