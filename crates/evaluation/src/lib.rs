//! Offline evaluation report builder
//!
//! Compares every registered classifier on one held-out, stratified split
//! and recommends the model that misses the fewest malignant cases.

pub mod builder;
pub mod dataset;
pub mod errors;
pub mod metrics;
pub mod roc;
pub mod selection;
pub mod split;

pub use builder::{EvaluationBuilder, EvaluationSettings, DEFAULT_SEED, DEFAULT_TEST_SIZE};
pub use dataset::{LabeledDataset, LABEL_MAPPING, TARGET_CANDIDATES};
pub use errors::{EvaluationError, Result};
pub use metrics::{ClassificationMetrics, ConfusionMatrix};
pub use roc::roc_curve;
pub use selection::{recommended, sort_rows};
pub use split::{stratified_split, ShuffleRng, SplitIndices};
