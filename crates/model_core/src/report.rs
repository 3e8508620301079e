//! Evaluation report document shared by the builder and the serving layer

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-model held-out metrics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationRow {
    pub model_id: String,
    pub model_name: String,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub specificity: f64,
    pub fnr: f64,
    pub f1: f64,
    /// Absent when the model has no continuous score or the fold is single-class
    pub auc: Option<f64>,
    pub tn: u64,
    pub fp: u64,
    #[serde(rename = "fn")]
    pub fn_: u64,
    pub tp: u64,
}

/// ROC curve points ordered by decreasing threshold
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RocCurve {
    pub fpr: Vec<f64>,
    pub tpr: Vec<f64>,
    pub auc: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EvaluationReport {
    /// Dataset provenance, e.g. `csv:wdbc.csv`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_test: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub positive_rate_test: Option<f64>,
    #[serde(default)]
    pub recommended_model_id: Option<String>,
    /// Sorted by the recommendation rule; the first row is recommended
    #[serde(default)]
    pub rows: Vec<EvaluationRow>,
    #[serde(default)]
    pub roc: BTreeMap<String, RocCurve>,
}

impl EvaluationReport {
    /// Placeholder served before any evaluation has run
    pub fn empty() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_report_shape() {
        let value = serde_json::to_value(EvaluationReport::empty()).unwrap();
        assert_eq!(
            value,
            json!({"rows": [], "roc": {}, "recommended_model_id": null})
        );
    }

    #[test]
    fn test_row_uses_fn_key() {
        let row = EvaluationRow {
            model_id: "svm".into(),
            model_name: "Linear SVM".into(),
            accuracy: 0.9,
            precision: 0.8,
            recall: 0.7,
            specificity: 0.95,
            fnr: 0.3,
            f1: 0.75,
            auc: None,
            tn: 19,
            fp: 1,
            fn_: 3,
            tp: 7,
        };
        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["fn"], json!(3));
        assert_eq!(value["auc"], json!(null));
        assert!(value.get("fn_").is_none());
    }
}
