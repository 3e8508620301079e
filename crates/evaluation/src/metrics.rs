//! Confusion counts and threshold metrics for the positive (malignant) class

/// Confusion counts with label order (0, 1)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfusionMatrix {
    pub tn: u64,
    pub fp: u64,
    pub fn_: u64,
    pub tp: u64,
}

impl ConfusionMatrix {
    pub fn from_predictions(y_true: &[u8], y_pred: &[u8]) -> Self {
        let mut m = Self::default();
        for (&truth, &pred) in y_true.iter().zip(y_pred) {
            match (truth, pred) {
                (0, 0) => m.tn += 1,
                (0, _) => m.fp += 1,
                (_, 0) => m.fn_ += 1,
                _ => m.tp += 1,
            }
        }
        m
    }

    pub fn total(&self) -> u64 {
        self.tn + self.fp + self.fn_ + self.tp
    }
}

/// Ratio that is 0 when the denominator is 0
fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    /// 0 when there are no true negatives or false positives
    pub specificity: f64,
    /// 0 when there are no positives; a known approximation kept for report compatibility
    pub fnr: f64,
    pub f1: f64,
}

impl ClassificationMetrics {
    pub fn from_confusion(m: &ConfusionMatrix) -> Self {
        Self {
            accuracy: ratio(m.tn + m.tp, m.total()),
            precision: ratio(m.tp, m.tp + m.fp),
            recall: ratio(m.tp, m.tp + m.fn_),
            specificity: ratio(m.tn, m.tn + m.fp),
            fnr: ratio(m.fn_, m.fn_ + m.tp),
            f1: ratio(2 * m.tp, 2 * m.tp + m.fp + m.fn_),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confusion_and_metrics() {
        let y_true = [0, 0, 0, 0, 1, 1, 1, 1, 1, 0];
        let y_pred = [0, 0, 0, 1, 1, 1, 1, 0, 1, 0];
        let m = ConfusionMatrix::from_predictions(&y_true, &y_pred);
        assert_eq!(
            m,
            ConfusionMatrix {
                tn: 4,
                fp: 1,
                fn_: 1,
                tp: 4
            }
        );

        let metrics = ClassificationMetrics::from_confusion(&m);
        assert_eq!(metrics.accuracy, 0.8);
        assert_eq!(metrics.precision, 0.8);
        assert_eq!(metrics.recall, 0.8);
        assert_eq!(metrics.specificity, 0.8);
        assert_eq!(metrics.fnr, 0.2);
        assert_eq!(metrics.f1, 0.8);
    }

    #[test]
    fn test_zero_denominators() {
        // no positives at all
        let m = ConfusionMatrix::from_predictions(&[0, 0], &[0, 0]);
        let metrics = ClassificationMetrics::from_confusion(&m);
        assert_eq!(metrics.fnr, 0.0);
        assert_eq!(metrics.recall, 0.0);
        assert_eq!(metrics.precision, 0.0);
        assert_eq!(metrics.f1, 0.0);
        assert_eq!(metrics.specificity, 1.0);

        // no negatives at all
        let m = ConfusionMatrix::from_predictions(&[1, 1], &[1, 0]);
        let metrics = ClassificationMetrics::from_confusion(&m);
        assert_eq!(metrics.specificity, 0.0);
        assert_eq!(metrics.fnr, 0.5);
    }
}
