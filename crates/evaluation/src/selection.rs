//! Recommended-model selection: lowest false-negative rate first, then
//! highest AUC.

use bcdash_model_core::EvaluationRow;
use std::cmp::Ordering;

/// Undefined FNR sorts last; within equal FNR a missing AUC sorts last.
fn compare_rows(a: &EvaluationRow, b: &EvaluationRow) -> Ordering {
    let fnr = |r: &EvaluationRow| if r.fnr.is_nan() { f64::INFINITY } else { r.fnr };
    let auc = |r: &EvaluationRow| r.auc.filter(|v| !v.is_nan()).unwrap_or(f64::NEG_INFINITY);

    fnr(a)
        .total_cmp(&fnr(b))
        .then_with(|| auc(b).total_cmp(&auc(a)))
}

/// Stable sort; complete ties keep registry order.
pub fn sort_rows(rows: &mut [EvaluationRow]) {
    rows.sort_by(compare_rows);
}

pub fn recommended(rows: &[EvaluationRow]) -> Option<String> {
    rows.first().map(|r| r.model_id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, fnr: f64, auc: Option<f64>) -> EvaluationRow {
        EvaluationRow {
            model_id: id.to_string(),
            model_name: id.to_string(),
            accuracy: 0.9,
            precision: 0.9,
            recall: 1.0 - fnr,
            specificity: 0.9,
            fnr,
            f1: 0.9,
            auc,
            tn: 0,
            fp: 0,
            fn_: 0,
            tp: 0,
        }
    }

    fn ranked(mut rows: Vec<EvaluationRow>) -> Vec<String> {
        sort_rows(&mut rows);
        rows.into_iter().map(|r| r.model_id).collect()
    }

    #[test]
    fn test_auc_breaks_fnr_ties() {
        let mut rows = vec![row("a", 0.10, Some(0.90)), row("b", 0.10, Some(0.95))];
        sort_rows(&mut rows);
        assert_eq!(recommended(&rows).as_deref(), Some("b"));
    }

    #[test]
    fn test_fnr_dominates_missing_auc() {
        let mut rows = vec![row("a", 0.05, None), row("b", 0.08, Some(0.99))];
        sort_rows(&mut rows);
        assert_eq!(recommended(&rows).as_deref(), Some("a"));
    }

    #[test]
    fn test_missing_auc_last_within_tie() {
        assert_eq!(
            ranked(vec![
                row("no_auc", 0.1, None),
                row("low", 0.1, Some(0.7)),
                row("best_fnr", 0.0, Some(0.5)),
            ]),
            vec!["best_fnr", "low", "no_auc"]
        );
    }

    #[test]
    fn test_undefined_fnr_last_and_ties_stable() {
        assert_eq!(
            ranked(vec![
                row("nan", f64::NAN, Some(1.0)),
                row("first", 0.2, Some(0.8)),
                row("second", 0.2, Some(0.8)),
            ]),
            vec!["first", "second", "nan"]
        );
    }

    #[test]
    fn test_empty_has_no_recommendation() {
        assert_eq!(recommended(&[]), None);
    }
}
