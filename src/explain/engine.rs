//! Per-request explanations.
//!
//! Attributions come from the explainer in the registry snapshot taken at
//! the start of each call; contributions are ranked by magnitude and worded
//! for the applicant.

use crate::artifacts::ArtifactRegistry;
use crate::core::{BatchItemError, Error, Result};
use crate::explain::recommendations::{self, Recommendation};
use crate::explain::text::{describe, feature_advice, readable_line};
use crate::features::{Feature, FeatureEngineer, FeatureVector, RawApplication};
use crate::monitoring::ScoringMetrics;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Direction of a contribution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Impact {
    IncreasesRisk,
    DecreasesRisk,
}

impl Impact {
    /// `IncreasesRisk` iff the attribution is positive.
    pub fn from_attribution(value: f64) -> Self {
        if value > 0.0 {
            Impact::IncreasesRisk
        } else {
            Impact::DecreasesRisk
        }
    }
}

/// One reported feature.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureContribution {
    pub feature: Feature,
    pub attribution_value: f64,
    pub feature_value: f64,
    pub impact: Impact,
    pub description: Option<String>,
    /// Absent below the noise floor and for risk-decreasing features
    pub recommendation: Option<String>,
}

/// Explanation of one risk score. Values are in log-odds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub base_value: f64,
    pub prediction_value: f64,
    pub risk_probability: f64,
    /// Sum over every feature, not only the reported ones
    pub total_contribution: f64,
    /// Top features by attribution magnitude
    pub contributions: Vec<FeatureContribution>,
    pub readable_explanation: Vec<String>,
    pub model_version: String,
}

impl Explanation {
    /// `base_value + total_contribution`; equals `prediction_value` up to
    /// rounding.
    pub fn reconstructed_value(&self) -> f64 {
        self.base_value + self.total_contribution
    }

    /// Reported contributions that raise risk.
    pub fn risk_drivers(&self) -> impl Iterator<Item = &FeatureContribution> {
        self.contributions
            .iter()
            .filter(|c| c.impact == Impact::IncreasesRisk)
    }
}

/// Explanation plus recommendations for a raw application.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExplainedApplication {
    pub explanation: Explanation,
    pub recommendations: Vec<Recommendation>,
}

/// One slot of a batch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExplanationOutcome {
    Explained(Explanation),
    Failed(BatchItemError),
}

impl ExplanationOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, ExplanationOutcome::Explained(_))
    }

    pub fn explanation(&self) -> Option<&Explanation> {
        match self {
            ExplanationOutcome::Explained(e) => Some(e),
            ExplanationOutcome::Failed(_) => None,
        }
    }
}

/// Explains scores with the registry's current explainer.
#[derive(Clone, Debug)]
pub struct ExplanationEngine {
    registry: Arc<ArtifactRegistry>,
    engineer: FeatureEngineer,
    metrics: Arc<ScoringMetrics>,
}

impl ExplanationEngine {
    pub fn new(registry: Arc<ArtifactRegistry>) -> Self {
        Self::with_metrics(registry, Arc::new(ScoringMetrics::new()))
    }

    /// Engine recording into shared metrics.
    pub fn with_metrics(registry: Arc<ArtifactRegistry>, metrics: Arc<ScoringMetrics>) -> Self {
        Self {
            registry,
            engineer: FeatureEngineer::new(),
            metrics,
        }
    }

    /// Explain one vector, reporting the `top_n` strongest features.
    ///
    /// Ties in magnitude keep schema order.
    pub fn explain(&self, x: &FeatureVector, top_n: usize) -> Result<Explanation> {
        let started = Instant::now();
        let set = self.registry.current().ok_or(Error::ExplainerNotLoaded)?;
        let attribution = set.explainer().attribute(x)?;

        let mut ranked: Vec<Feature> = Feature::ALL.to_vec();
        ranked.sort_by(|a, b| {
            let (a, b) = (attribution.values[a.index()], attribution.values[b.index()]);
            b.abs().total_cmp(&a.abs())
        });
        ranked.truncate(top_n);

        let contributions: Vec<FeatureContribution> = ranked
            .into_iter()
            .map(|feature| {
                let value = x.get(feature);
                let attr = attribution.values[feature.index()];
                FeatureContribution {
                    feature,
                    attribution_value: attr,
                    feature_value: value,
                    impact: Impact::from_attribution(attr),
                    description: Some(describe(feature, value, attr)),
                    recommendation: feature_advice(feature, attr).map(str::to_string),
                }
            })
            .collect();

        let readable_explanation = contributions
            .iter()
            .map(|c| readable_line(c.feature, c.feature_value, c.attribution_value))
            .collect();

        let explanation = Explanation {
            base_value: attribution.base_value,
            prediction_value: attribution.prediction_value,
            risk_probability: attribution.risk_probability(),
            total_contribution: attribution.total(),
            contributions,
            readable_explanation,
            model_version: set.model().version.clone(),
        };

        self.metrics.explanations.inc();
        self.metrics.explanation_latency.observe(started.elapsed());
        debug!(
            model_version = %explanation.model_version,
            prediction_value = explanation.prediction_value,
            reported = explanation.contributions.len(),
            "explanation produced"
        );
        Ok(explanation)
    }

    /// Ranked recommendations for an explanation.
    pub fn recommend(&self, explanation: &Explanation, raw: Option<&RawApplication>) -> Vec<Recommendation> {
        recommendations::recommend(explanation, raw)
    }

    /// Explain every vector; failures become markers in their slot.
    pub fn explain_batch(&self, xs: &[FeatureVector], top_n: usize) -> Vec<ExplanationOutcome> {
        xs.iter()
            .enumerate()
            .map(|(index, x)| match self.explain(x, top_n) {
                Ok(e) => ExplanationOutcome::Explained(e),
                Err(e) => {
                    self.metrics.batch_failures.inc();
                    warn!(index, error = %e, "batch explanation failed");
                    ExplanationOutcome::Failed(BatchItemError::new(index, &e))
                }
            })
            .collect()
    }

    /// Derive features from a raw application, then explain and recommend.
    pub fn explain_application(&self, raw: &RawApplication, top_n: usize) -> Result<ExplainedApplication> {
        let x = self.engineer.derive(raw);
        let explanation = self.explain(&x, top_n)?;
        let recommendations = self.recommend(&explanation, Some(raw));
        Ok(ExplainedApplication {
            explanation,
            recommendations,
        })
    }

    pub fn metrics(&self) -> &Arc<ScoringMetrics> {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::ArtifactSet;
    use crate::dataset::synthetic;
    use crate::explain::Explainer;
    use crate::federated::TrainedModel;
    use crate::model::{EvaluationMetrics, GbdtConfig, GradientBoostedClassifier};

    fn loaded() -> (Arc<ArtifactRegistry>, Vec<FeatureVector>) {
        let data = synthetic::dataset(300, 11);
        let config = GbdtConfig {
            n_estimators: 30,
            min_samples_leaf: 5,
            ..GbdtConfig::default()
        };
        let classifier = GradientBoostedClassifier::fit(&data, &config).unwrap();
        let model = TrainedModel::new(classifier, EvaluationMetrics::default());
        let explainer = Explainer::calibrate(&model, &data.rows()[..100]).unwrap();
        let registry = Arc::new(ArtifactRegistry::with_set(ArtifactSet::new(model, explainer).unwrap()));
        (registry, data.rows()[100..120].to_vec())
    }

    #[test]
    fn test_additive_over_full_vector() {
        let (registry, rows) = loaded();
        let engine = ExplanationEngine::new(registry);
        for x in &rows {
            let e = engine.explain(x, 3).unwrap();
            assert_eq!(e.contributions.len(), 3);
            assert!((e.reconstructed_value() - e.prediction_value).abs() < 1e-6);
        }
        assert_eq!(engine.metrics().explanations.get(), rows.len() as u64);
    }

    #[test]
    fn test_ranked_by_magnitude() {
        let (registry, rows) = loaded();
        let engine = ExplanationEngine::new(registry);
        let e = engine.explain(&rows[0], 27).unwrap();
        assert_eq!(e.contributions.len(), 27);
        assert_eq!(e.readable_explanation.len(), 27);
        for pair in e.contributions.windows(2) {
            assert!(pair[0].attribution_value.abs() >= pair[1].attribution_value.abs());
        }
        for c in &e.contributions {
            assert_eq!(c.impact == Impact::IncreasesRisk, c.attribution_value > 0.0);
            if c.attribution_value.abs() < 0.01 {
                assert!(c.recommendation.is_none());
            }
        }
    }

    #[test]
    fn test_zero_attributions_keep_schema_order() {
        let (registry, _) = loaded();
        let engine = ExplanationEngine::new(registry);
        let e = engine.explain(&FeatureVector::zeros(), 27).unwrap();
        let zero_features: Vec<usize> = e
            .contributions
            .iter()
            .filter(|c| c.attribution_value == 0.0)
            .map(|c| c.feature.index())
            .collect();
        assert!(zero_features.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_not_loaded() {
        let engine = ExplanationEngine::new(Arc::new(ArtifactRegistry::new()));
        assert!(matches!(
            engine.explain(&FeatureVector::zeros(), 5),
            Err(Error::ExplainerNotLoaded)
        ));
    }

    #[test]
    fn test_batch_isolates_failures() {
        let (registry, rows) = loaded();
        let engine = ExplanationEngine::new(registry);
        let mut batch = rows[..4].to_vec();
        batch.insert(2, FeatureVector::zeros().with(Feature::Age, f64::NAN));

        let outcomes = engine.explain_batch(&batch, 5);
        assert_eq!(outcomes.len(), 5);
        assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 4);
        match &outcomes[2] {
            ExplanationOutcome::Failed(marker) => assert_eq!(marker.index, 2),
            other => panic!("expected failure marker, got {:?}", other),
        }
        assert_eq!(engine.metrics().batch_failures.get(), 1);
    }

    #[test]
    fn test_explain_application() {
        let (registry, _) = loaded();
        let engine = ExplanationEngine::new(registry);
        let raw = synthetic::records(1, 99).remove(0).raw;
        let out = engine.explain_application(&raw, 10).unwrap();
        assert_eq!(out.explanation.contributions.len(), 10);
        assert!(!out.recommendations.is_empty());
        assert!(out.recommendations.len() <= 5);
    }

    #[test]
    fn test_impact_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&Impact::IncreasesRisk).unwrap(),
            "\"increases_risk\""
        );
    }
}
