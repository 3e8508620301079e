//! ROC curve and area under it

use bcdash_model_core::RocCurve;

/// ROC curve over the distinct score thresholds, highest first.
///
/// Collinear intermediate points are dropped and `(0, 0)` is prepended.
/// Returns `None` when either class is absent, since one of the rates is
/// then undefined.
pub fn roc_curve(y_true: &[u8], scores: &[f64]) -> Option<RocCurve> {
    if y_true.len() != scores.len() || y_true.is_empty() {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    // cumulative counts at the last index of each distinct score
    let mut tps: Vec<f64> = Vec::new();
    let mut fps: Vec<f64> = Vec::new();
    let (mut tp, mut fp) = (0.0, 0.0);
    for (rank, &i) in order.iter().enumerate() {
        if y_true[i] == 1 {
            tp += 1.0;
        } else {
            fp += 1.0;
        }
        let last_of_run = order
            .get(rank + 1)
            .map_or(true, |&next| scores[next] != scores[i]);
        if last_of_run {
            tps.push(tp);
            fps.push(fp);
        }
    }

    let (total_pos, total_neg) = (tp, fp);
    if total_pos == 0.0 || total_neg == 0.0 {
        return None;
    }

    if fps.len() > 2 {
        let last = fps.len() - 1;
        let kept: Vec<usize> = (0..fps.len())
            .filter(|&k| {
                k == 0
                    || k == last
                    || fps[k + 1] - 2.0 * fps[k] + fps[k - 1] != 0.0
                    || tps[k + 1] - 2.0 * tps[k] + tps[k - 1] != 0.0
            })
            .collect();
        fps = kept.iter().map(|&k| fps[k]).collect();
        tps = kept.iter().map(|&k| tps[k]).collect();
    }

    let fpr: Vec<f64> = std::iter::once(0.0)
        .chain(fps.iter().map(|f| f / total_neg))
        .collect();
    let tpr: Vec<f64> = std::iter::once(0.0)
        .chain(tps.iter().map(|t| t / total_pos))
        .collect();
    let auc = trapezoid_auc(&fpr, &tpr);

    Some(RocCurve { fpr, tpr, auc })
}

/// Trapezoidal area under a curve with non-decreasing `x`
pub fn trapezoid_auc(x: &[f64], y: &[f64]) -> f64 {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| (xs[1] - xs[0]) * (ys[1] + ys[0]) / 2.0)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_ranking() {
        let curve = roc_curve(&[0, 0, 1, 1], &[0.1, 0.2, 0.8, 0.9]).unwrap();
        assert_eq!(curve.auc, 1.0);
        assert_eq!(curve.fpr, vec![0.0, 0.0, 0.0, 1.0]);
        assert_eq!(curve.tpr, vec![0.0, 0.5, 1.0, 1.0]);
    }

    #[test]
    fn test_reference_example() {
        // y = [0, 0, 1, 1], scores = [0.1, 0.4, 0.35, 0.8]
        let curve = roc_curve(&[0, 0, 1, 1], &[0.1, 0.4, 0.35, 0.8]).unwrap();
        assert_eq!(curve.fpr, vec![0.0, 0.0, 0.5, 0.5, 1.0]);
        assert_eq!(curve.tpr, vec![0.0, 0.5, 0.5, 1.0, 1.0]);
        assert!((curve.auc - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_ties_collapse_to_one_threshold() {
        let curve = roc_curve(&[0, 1, 0, 1], &[0.5, 0.5, 0.5, 0.5]).unwrap();
        assert_eq!(curve.fpr, vec![0.0, 1.0]);
        assert_eq!(curve.tpr, vec![0.0, 1.0]);
        assert!((curve.auc - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_decision_scores_need_not_be_probabilities() {
        let curve = roc_curve(&[1, 0, 1, 0], &[3.5, -2.0, 0.7, 1.1]).unwrap();
        assert!((curve.auc - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_single_class_is_undefined() {
        assert!(roc_curve(&[1, 1, 1], &[0.2, 0.5, 0.9]).is_none());
        assert!(roc_curve(&[], &[]).is_none());
    }
}
