//! Model Module
//!
//! The risk classifier:
//! - Regression trees over schema-ordered feature vectors
//! - Gradient-boosted binary classifier with gain-based importance
//! - Accuracy, ROC AUC and per-class reports

pub mod gbdt;
pub mod metrics;
pub mod tree;

pub use gbdt::{FeatureImportance, GbdtConfig, GradientBoostedClassifier, ModelInfo};
pub use metrics::{accuracy, roc_auc, ClassificationReport, EvaluationMetrics};
pub use tree::{RegressionTree, TreeNode};
