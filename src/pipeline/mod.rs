//! Pipeline Module
//!
//! Offline training runs that produce the deployable model/explainer pair.

pub mod trainer;

pub use trainer::{ShardReport, TrainingOutput, TrainingPipeline, TrainingReport};
