//! k-nearest-neighbours classifier

use super::{check_width, label_from_probability, Classifier, PredictProba, NEGATIVE, POSITIVE};
use crate::errors::InferenceError;
use serde::{Deserialize, Serialize};

/// Uniform-weight kNN over stored, already-scaled training points.
///
/// Ties in distance are broken by training order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KNeighbors {
    pub k: usize,
    pub points: Vec<Vec<f64>>,
    pub labels: Vec<u8>,
}

impl KNeighbors {
    pub fn validate(&self) -> Result<(), String> {
        if self.k == 0 {
            return Err("k must be positive".to_string());
        }
        if self.points.is_empty() {
            return Err("no training points".to_string());
        }
        if self.points.len() != self.labels.len() {
            return Err(format!(
                "{} points but {} labels",
                self.points.len(),
                self.labels.len()
            ));
        }
        if self.k > self.points.len() {
            return Err(format!(
                "k = {} exceeds the {} stored points",
                self.k,
                self.points.len()
            ));
        }

        let width = self.points[0].len();
        if width == 0 {
            return Err("training points have no features".to_string());
        }
        for (i, point) in self.points.iter().enumerate() {
            if point.len() != width {
                return Err(format!("point {i} has {} features, expected {width}", point.len()));
            }
            if point.iter().any(|v| !v.is_finite()) {
                return Err(format!("point {i} has a non-finite value"));
            }
        }
        if let Some(i) = self
            .labels
            .iter()
            .position(|l| *l != NEGATIVE && *l != POSITIVE)
        {
            return Err(format!("label {i} is not 0 or 1"));
        }
        Ok(())
    }

    fn width(&self) -> usize {
        self.points.first().map(Vec::len).unwrap_or_default()
    }
}

impl Classifier for KNeighbors {
    fn kind(&self) -> &'static str {
        "k_neighbors"
    }

    fn n_features(&self) -> usize {
        self.width()
    }

    fn predict(&self, row: &[f64]) -> Result<u8, InferenceError> {
        let p = self.predict_proba(row)?;
        Ok(label_from_probability(p[1]))
    }

    fn probability(&self) -> Option<&dyn PredictProba> {
        Some(self)
    }
}

impl PredictProba for KNeighbors {
    fn predict_proba(&self, row: &[f64]) -> Result<[f64; 2], InferenceError> {
        check_width(self.width(), row)?;

        let mut distances: Vec<(f64, usize)> = self
            .points
            .iter()
            .enumerate()
            .map(|(i, point)| {
                let d = point
                    .iter()
                    .zip(row)
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum::<f64>();
                (d, i)
            })
            .collect();
        distances.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let k = self.k.min(distances.len());
        if k == 0 {
            return Err(InferenceError::Malformed("no neighbours available".to_string()));
        }
        let positives = distances[..k]
            .iter()
            .filter(|(_, i)| self.labels[*i] == POSITIVE)
            .count();
        let p = positives as f64 / k as f64;
        Ok([1.0 - p, p])
    }
}
