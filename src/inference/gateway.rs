//! Risk decisions from the deployed model.

use crate::artifacts::ArtifactRegistry;
use crate::core::{now, BatchItemError, Error, Result, Timestamp};
use crate::features::{FeatureEngineer, FeatureVector, RawApplication};
use crate::inference::policy::{decide, LoanStatus, RiskCategory};
use crate::monitoring::ScoringMetrics;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Decision for one application.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub loan_status: LoanStatus,
    /// Probability of default
    pub risk_probability: f64,
    /// `None` on an error marker
    pub risk_category: Option<RiskCategory>,
    pub confidence: f64,
    pub timestamp: Timestamp,
    pub model_version: String,
    /// Set only on an error marker
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<BatchItemError>,
}

impl PredictionResult {
    /// Result for a computed probability.
    pub fn from_probability(p: f64, model_version: &str) -> Self {
        let decision = decide(p);
        Self {
            loan_status: decision.loan_status,
            risk_probability: p,
            risk_category: Some(decision.risk_category),
            confidence: decision.confidence,
            timestamp: now(),
            model_version: model_version.to_string(),
            error: None,
        }
    }

    /// Marker standing in for a failed batch item.
    pub fn error_marker(index: usize, error: &Error, model_version: &str) -> Self {
        Self {
            loan_status: LoanStatus::Error,
            risk_probability: 0.0,
            risk_category: None,
            confidence: 0.0,
            timestamp: now(),
            model_version: model_version.to_string(),
            error: Some(BatchItemError::new(index, error)),
        }
    }

    pub fn is_error(&self) -> bool {
        self.loan_status == LoanStatus::Error
    }
}

/// Applies the current model and the decision policy.
#[derive(Clone, Debug)]
pub struct PredictionGateway {
    registry: Arc<ArtifactRegistry>,
    engineer: FeatureEngineer,
    metrics: Arc<ScoringMetrics>,
}

impl PredictionGateway {
    pub fn new(registry: Arc<ArtifactRegistry>) -> Self {
        Self::with_metrics(registry, Arc::new(ScoringMetrics::new()))
    }

    /// Gateway recording into shared metrics.
    pub fn with_metrics(registry: Arc<ArtifactRegistry>, metrics: Arc<ScoringMetrics>) -> Self {
        Self {
            registry,
            engineer: FeatureEngineer::new(),
            metrics,
        }
    }

    /// Score one vector.
    pub fn predict(&self, x: &FeatureVector) -> Result<PredictionResult> {
        let started = Instant::now();
        let model = self.registry.model().ok_or(Error::ModelNotLoaded)?;
        let p = model.predict_proba(x)?;
        let result = PredictionResult::from_probability(p, &model.version);

        self.metrics.predictions.inc();
        self.metrics.prediction_latency.observe(started.elapsed());
        debug!(
            risk_probability = p,
            status = ?result.loan_status,
            model_version = %result.model_version,
            "prediction"
        );
        Ok(result)
    }

    /// Derive features from a raw application and score them.
    pub fn predict_application(&self, raw: &RawApplication) -> Result<PredictionResult> {
        self.predict(&self.engineer.derive(raw))
    }

    /// Score every vector; a failed item becomes an error marker in its slot.
    pub fn predict_batch(&self, xs: &[FeatureVector]) -> Vec<PredictionResult> {
        let version = self
            .registry
            .model()
            .map(|m| m.version.clone())
            .unwrap_or_default();

        xs.iter()
            .enumerate()
            .map(|(index, x)| {
                self.predict(x).unwrap_or_else(|e| {
                    self.metrics.batch_failures.inc();
                    warn!(index, error = %e, "batch prediction failed");
                    PredictionResult::error_marker(index, &e, &version)
                })
            })
            .collect()
    }

    pub fn metrics(&self) -> &Arc<ScoringMetrics> {
        &self.metrics
    }
}
