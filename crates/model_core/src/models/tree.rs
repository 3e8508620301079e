//! Decision tree structures and tree ensembles
//!
//! Trees are flat node arrays with node 0 as the root. Traversal goes left
//! when `row[feature_idx] <= threshold`. Leaves carry either class weights
//! (`[w0, w1]`, used by single trees and forests) or a raw additive value
//! (used by gradient boosting).

use super::{
    check_width, finite, label_from_probability, sigmoid, Classifier, DecisionFunction,
    PredictProba, NEGATIVE, POSITIVE,
};
use crate::errors::InferenceError;
use serde::{Deserialize, Serialize};

fn no_child() -> i32 {
    -1
}

/// A decision tree node (internal or leaf)
///
/// For internal nodes `feature_idx >= 0`, `left`/`right` index into the
/// node array and `leaf` is `None`. Leaves carry `leaf: Some(value)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node<L> {
    /// Node ID (for reference, not used in traversal)
    #[serde(default)]
    pub id: i32,

    /// Left child index (-1 for leaf nodes)
    #[serde(default = "no_child")]
    pub left: i32,

    /// Right child index (-1 for leaf nodes)
    #[serde(default = "no_child")]
    pub right: i32,

    /// Feature index to split on (-1 for leaf nodes)
    #[serde(default = "no_child", rename = "feature_idx", alias = "feature")]
    pub feature_idx: i32,

    /// Split threshold on the scaled feature value
    #[serde(default)]
    pub threshold: f64,

    /// Leaf payload
    pub leaf: Option<L>,
}

impl<L> Node<L> {
    /// Create a new internal (split) node
    pub fn internal(id: i32, feature_idx: i32, threshold: f64, left: i32, right: i32) -> Self {
        Self {
            id,
            left,
            right,
            feature_idx,
            threshold,
            leaf: None,
        }
    }

    /// Create a new leaf node
    pub fn leaf(id: i32, value: L) -> Self {
        Self {
            id,
            left: -1,
            right: -1,
            feature_idx: -1,
            threshold: 0.0,
            leaf: Some(value),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.leaf.is_some() || self.feature_idx < 0
    }
}

/// A single decision tree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Tree<L> {
    pub nodes: Vec<Node<L>>,
}

impl<L> Tree<L> {
    pub fn new(nodes: Vec<Node<L>>) -> Self {
        Self { nodes }
    }

    /// Walk from the root to the leaf selected by `row`.
    ///
    /// A well-formed tree reaches a leaf in at most `nodes.len()` steps;
    /// anything longer is a cycle.
    pub fn leaf_for(&self, row: &[f64]) -> Result<&L, InferenceError> {
        let mut idx = 0usize;

        for _ in 0..self.nodes.len() {
            let node = self
                .nodes
                .get(idx)
                .ok_or_else(|| InferenceError::Malformed(format!("node {idx} out of range")))?;

            if let Some(value) = &node.leaf {
                return Ok(value);
            }

            let feature = usize::try_from(node.feature_idx).map_err(|_| {
                InferenceError::Malformed(format!("node {idx} has no split feature"))
            })?;
            let value = *row.get(feature).ok_or(InferenceError::DimensionMismatch {
                expected: feature + 1,
                actual: row.len(),
            })?;

            let next = if value <= node.threshold {
                node.left
            } else {
                node.right
            };
            idx = usize::try_from(next).map_err(|_| {
                InferenceError::Malformed(format!("node {idx} has an invalid child {next}"))
            })?;
        }

        Err(InferenceError::Malformed(
            "traversal did not reach a leaf".to_string(),
        ))
    }

    /// Validate tree structure against the model's feature width
    pub fn validate_with(
        &self,
        n_features: usize,
        check_leaf: impl Fn(&L) -> Result<(), String>,
    ) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("Tree has no nodes".to_string());
        }

        for (i, node) in self.nodes.iter().enumerate() {
            if let Some(value) = &node.leaf {
                check_leaf(value).map_err(|e| format!("Leaf node {i}: {e}"))?;
                continue;
            }
            if node.feature_idx < 0 {
                return Err(format!("Leaf node {i} has no leaf value"));
            }
            if node.feature_idx as usize >= n_features {
                return Err(format!(
                    "Node {} splits on feature {} but the model has {} features",
                    i, node.feature_idx, n_features
                ));
            }
            if !node.threshold.is_finite() {
                return Err(format!("Node {i} has a non-finite threshold"));
            }
            for (side, child) in [("left", node.left), ("right", node.right)] {
                if child < 0 || child as usize >= self.nodes.len() {
                    return Err(format!("Node {i} has invalid {side} child: {child}"));
                }
            }
        }

        Ok(())
    }
}

fn check_class_weights(w: &[f64; 2]) -> Result<(), String> {
    if w.iter().any(|v| !v.is_finite() || *v < 0.0) {
        return Err("class weights must be finite and non-negative".to_string());
    }
    if w[0] + w[1] <= 0.0 {
        return Err("class weights sum to zero".to_string());
    }
    Ok(())
}

fn normalized(w: &[f64; 2]) -> Result<[f64; 2], InferenceError> {
    let total = w[0] + w[1];
    if !(total > 0.0) {
        return Err(InferenceError::Malformed(
            "leaf class weights sum to zero".to_string(),
        ));
    }
    Ok([w[0] / total, w[1] / total])
}

/// Single classification tree with class-weight leaves
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionTree {
    pub n_features: usize,
    pub tree: Tree<[f64; 2]>,
}

impl DecisionTree {
    pub fn validate(&self) -> Result<(), String> {
        if self.n_features == 0 {
            return Err("n_features must be positive".to_string());
        }
        self.tree.validate_with(self.n_features, check_class_weights)
    }
}

impl Classifier for DecisionTree {
    fn kind(&self) -> &'static str {
        "decision_tree"
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict(&self, row: &[f64]) -> Result<u8, InferenceError> {
        let p = self.predict_proba(row)?;
        Ok(label_from_probability(p[1]))
    }

    fn probability(&self) -> Option<&dyn PredictProba> {
        Some(self)
    }
}

impl PredictProba for DecisionTree {
    fn predict_proba(&self, row: &[f64]) -> Result<[f64; 2], InferenceError> {
        check_width(self.n_features, row)?;
        normalized(self.tree.leaf_for(row)?)
    }
}

/// Bagged ensemble of classification trees; probabilities are averaged
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RandomForest {
    pub n_features: usize,
    pub trees: Vec<Tree<[f64; 2]>>,
}

impl RandomForest {
    pub fn validate(&self) -> Result<(), String> {
        if self.n_features == 0 {
            return Err("n_features must be positive".to_string());
        }
        if self.trees.is_empty() {
            return Err("forest has no trees".to_string());
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate_with(self.n_features, check_class_weights)
                .map_err(|e| format!("Tree {i} validation failed: {e}"))?;
        }
        Ok(())
    }
}

impl Classifier for RandomForest {
    fn kind(&self) -> &'static str {
        "random_forest"
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict(&self, row: &[f64]) -> Result<u8, InferenceError> {
        let p = self.predict_proba(row)?;
        Ok(label_from_probability(p[1]))
    }

    fn probability(&self) -> Option<&dyn PredictProba> {
        Some(self)
    }
}

impl PredictProba for RandomForest {
    fn predict_proba(&self, row: &[f64]) -> Result<[f64; 2], InferenceError> {
        check_width(self.n_features, row)?;
        let mut sum = [0.0; 2];
        for tree in &self.trees {
            let p = normalized(tree.leaf_for(row)?)?;
            sum[0] += p[0];
            sum[1] += p[1];
        }
        let n = self.trees.len() as f64;
        Ok([sum[0] / n, sum[1] / n])
    }
}

/// Gradient-boosted regression trees on the log-odds scale
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GradientBoosting {
    pub n_features: usize,
    /// Initial log-odds
    pub init: f64,
    pub learning_rate: f64,
    pub trees: Vec<Tree<f64>>,
}

impl GradientBoosting {
    pub fn validate(&self) -> Result<(), String> {
        if self.n_features == 0 {
            return Err("n_features must be positive".to_string());
        }
        if !self.init.is_finite() || !self.learning_rate.is_finite() || self.learning_rate <= 0.0
        {
            return Err("init and learning_rate must be finite, learning_rate > 0".to_string());
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate_with(self.n_features, |v| {
                if v.is_finite() {
                    Ok(())
                } else {
                    Err("leaf value is not finite".to_string())
                }
            })
            .map_err(|e| format!("Tree {i} validation failed: {e}"))?;
        }
        Ok(())
    }

    fn raw_margin(&self, row: &[f64]) -> Result<f64, InferenceError> {
        check_width(self.n_features, row)?;
        let mut sum = 0.0;
        for tree in &self.trees {
            sum += *tree.leaf_for(row)?;
        }
        finite(self.init + self.learning_rate * sum, "boosting margin")
    }
}

impl Classifier for GradientBoosting {
    fn kind(&self) -> &'static str {
        "gradient_boosting"
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict(&self, row: &[f64]) -> Result<u8, InferenceError> {
        let z = self.raw_margin(row)?;
        Ok(if z > 0.0 { POSITIVE } else { NEGATIVE })
    }

    fn probability(&self) -> Option<&dyn PredictProba> {
        Some(self)
    }

    fn decision(&self) -> Option<&dyn DecisionFunction> {
        Some(self)
    }
}

impl PredictProba for GradientBoosting {
    fn predict_proba(&self, row: &[f64]) -> Result<[f64; 2], InferenceError> {
        let p = sigmoid(self.raw_margin(row)?);
        Ok([1.0 - p, p])
    }
}

impl DecisionFunction for GradientBoosting {
    fn decision_function(&self, row: &[f64]) -> Result<f64, InferenceError> {
        self.raw_margin(row)
    }
}
