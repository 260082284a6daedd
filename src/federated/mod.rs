//! Federated Learning Module
//!
//! Simulated multi-party training:
//! - Deterministic partitioning into client shards
//! - Non-IID label distribution analysis
//! - Per-shard diagnostic training
//! - Global model fitting on pooled data

pub mod aggregator;
pub mod learner;
pub mod noniid;
pub mod partition;

pub use aggregator::{AggregationMethod, GlobalAggregator, GlobalFit, TrainedModel, MODEL_VERSION};
pub use learner::{LocalSummary, LocalTrainer, LocalTrainingResult};
pub use noniid::{DataDistribution, HeterogeneityReport, NonIIDAnalyzer};
pub use partition::{partition, ClientShard, DataPartitioner};
