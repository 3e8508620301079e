//! Linear classifiers: logistic regression and linear SVM

use super::{
    check_width, finite, label_from_probability, sigmoid, Classifier, DecisionFunction,
    PredictProba, NEGATIVE, POSITIVE,
};
use crate::errors::InferenceError;
use serde::{Deserialize, Serialize};

fn margin(coef: &[f64], intercept: f64, row: &[f64]) -> Result<f64, InferenceError> {
    check_width(coef.len(), row)?;
    let z = coef.iter().zip(row).map(|(w, x)| w * x).sum::<f64>() + intercept;
    finite(z, "decision value")
}

fn validate_linear(coef: &[f64], intercept: f64) -> Result<(), String> {
    if coef.is_empty() {
        return Err("coefficient vector is empty".to_string());
    }
    if let Some(i) = coef.iter().position(|w| !w.is_finite()) {
        return Err(format!("coefficient {i} is not finite"));
    }
    if !intercept.is_finite() {
        return Err("intercept is not finite".to_string());
    }
    Ok(())
}

/// Binary logistic regression: `P(1) = sigmoid(w·x + b)`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogisticRegression {
    pub coef: Vec<f64>,
    pub intercept: f64,
}

impl LogisticRegression {
    pub fn validate(&self) -> Result<(), String> {
        validate_linear(&self.coef, self.intercept)
    }
}

impl Classifier for LogisticRegression {
    fn kind(&self) -> &'static str {
        "logistic_regression"
    }

    fn n_features(&self) -> usize {
        self.coef.len()
    }

    fn predict(&self, row: &[f64]) -> Result<u8, InferenceError> {
        let p = self.predict_proba(row)?;
        Ok(label_from_probability(p[1]))
    }

    fn probability(&self) -> Option<&dyn PredictProba> {
        Some(self)
    }

    fn decision(&self) -> Option<&dyn DecisionFunction> {
        Some(self)
    }
}

impl PredictProba for LogisticRegression {
    fn predict_proba(&self, row: &[f64]) -> Result<[f64; 2], InferenceError> {
        let p = sigmoid(margin(&self.coef, self.intercept, row)?);
        Ok([1.0 - p, p])
    }
}

impl DecisionFunction for LogisticRegression {
    fn decision_function(&self, row: &[f64]) -> Result<f64, InferenceError> {
        margin(&self.coef, self.intercept, row)
    }
}

/// Linear support vector machine.
///
/// Exposes a decision function but no calibrated probabilities.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinearSvm {
    pub coef: Vec<f64>,
    pub intercept: f64,
}

impl LinearSvm {
    pub fn validate(&self) -> Result<(), String> {
        validate_linear(&self.coef, self.intercept)
    }
}

impl Classifier for LinearSvm {
    fn kind(&self) -> &'static str {
        "linear_svm"
    }

    fn n_features(&self) -> usize {
        self.coef.len()
    }

    fn predict(&self, row: &[f64]) -> Result<u8, InferenceError> {
        let z = margin(&self.coef, self.intercept, row)?;
        Ok(if z > 0.0 { POSITIVE } else { NEGATIVE })
    }

    fn decision(&self) -> Option<&dyn DecisionFunction> {
        Some(self)
    }
}

impl DecisionFunction for LinearSvm {
    fn decision_function(&self, row: &[f64]) -> Result<f64, InferenceError> {
        margin(&self.coef, self.intercept, row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logistic_probabilities_sum_to_one() {
        let model = LogisticRegression {
            coef: vec![1.5, -0.5],
            intercept: 0.25,
        };
        let p = model.predict_proba(&[0.3, 1.2]).unwrap();
        assert!((p[0] + p[1] - 1.0).abs() < 1e-12);
        assert_eq!(model.predict(&[0.3, 1.2]).unwrap(), label_from_probability(p[1]));
    }

    #[test]
    fn test_logistic_boundary_goes_negative() {
        let model = LogisticRegression {
            coef: vec![1.0],
            intercept: 0.0,
        };
        assert_eq!(model.predict(&[0.0]).unwrap(), NEGATIVE);
        assert_eq!(model.predict(&[0.1]).unwrap(), POSITIVE);
    }

    #[test]
    fn test_svm_has_no_probability() {
        let model = LinearSvm {
            coef: vec![1.0, 1.0],
            intercept: -1.0,
        };
        assert!(model.probability().is_none());
        assert!(model.decision().is_some());
        assert_eq!(model.predict(&[1.0, 1.0]).unwrap(), POSITIVE);
        assert_eq!(model.predict(&[0.2, 0.3]).unwrap(), NEGATIVE);
    }

    #[test]
    fn test_width_mismatch() {
        let model = LinearSvm {
            coef: vec![1.0, 1.0],
            intercept: 0.0,
        };
        assert_eq!(
            model.predict(&[1.0]),
            Err(InferenceError::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        );
    }
}
