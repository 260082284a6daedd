//! # KredAI - Explainable Alternative-Data Credit Risk Scoring
//!
//! A credit risk scoring library providing:
//! - **Features**: a fixed 27-feature schema shared by training and inference
//! - **Federated**: simulated client shards with per-shard diagnostics and a pooled global model
//! - **Explain**: additive per-feature attributions, readable text and recommendations
//! - **Inference**: decision policy, batch-safe scoring and atomic artifact swaps
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kredai::artifacts::FsArtifactStore;
//! use kredai::config::KredaiConfig;
//! use kredai::features::RawApplication;
//! use kredai::inference::ScoringService;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> kredai::Result<()> {
//!     let config = KredaiConfig::load(None)?;
//!     let store = Arc::new(FsArtifactStore::new(&config.artifacts.dir));
//!     let service = ScoringService::load(store, config).await?;
//!
//!     let raw = RawApplication::new()
//!         .with("person_income", 50000.0)
//!         .with("loan_amnt", 15000.0)
//!         .with("late_payments_12m", 3.0);
//!     let decision = service.predict_application(&raw)?;
//!     let explained = service.explain_application(&raw, Some(5))?;
//!     println!("{:?} {:?}", decision.loan_status, explained.recommendations);
//!     Ok(())
//! }
//! ```

pub mod artifacts;
pub mod config;
pub mod core;
pub mod dataset;
pub mod explain;
pub mod features;
pub mod federated;
pub mod inference;
pub mod model;
pub mod monitoring;
pub mod pipeline;

pub use crate::core::error::{BatchItemError, Error, Result};
pub use crate::config::KredaiConfig;
pub use explain::{Explanation, ExplanationEngine};
pub use features::{FeatureEngineer, FeatureVector, RawApplication};
pub use inference::{PredictionGateway, PredictionResult, ScoringService};
