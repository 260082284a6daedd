//! Inference Module
//!
//! Request-time scoring over the installed artifact pair:
//! - Fixed decision policy (0.3 / 0.5 / 0.7 thresholds)
//! - Prediction gateway with per-item batch error markers
//! - Scoring service with health, retraining and reload

pub mod gateway;
pub mod policy;
pub mod service;

pub use gateway::{PredictionGateway, PredictionResult};
pub use policy::{
    decide, Decision, LoanStatus, RiskCategory, DENIAL_THRESHOLD, HIGH_RISK_THRESHOLD, LOW_RISK_THRESHOLD,
};
pub use service::{HealthStatus, ScoringService, ServiceState};
