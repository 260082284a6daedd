//! Scoring service: the gateway and the explanation engine over one shared
//! registry, plus health, retraining and reload.

use crate::artifacts::{load_artifacts, save_artifacts, ArtifactRegistry, ArtifactSet, ArtifactStore};
use crate::config::KredaiConfig;
use crate::core::{now, Error, Result, Timestamp};
use crate::dataset::{LabeledDataset, LabeledRecord};
use crate::explain::{ExplainedApplication, Explanation, ExplanationEngine, ExplanationOutcome, Recommendation};
use crate::features::{FeatureVector, RawApplication};
use crate::inference::gateway::{PredictionGateway, PredictionResult};
use crate::model::{FeatureImportance, ModelInfo};
use crate::monitoring::{MetricsSnapshot, ScoringMetrics};
use crate::pipeline::{TrainingOutput, TrainingPipeline, TrainingReport};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

/// Overall service state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Healthy,
    Degraded,
}

/// Health report.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: ServiceState,
    pub model_loaded: bool,
    pub explainer_loaded: bool,
    pub model_version: Option<String>,
    /// Artifact installs since start
    pub generation: u64,
    pub timestamp: Timestamp,
}

/// Serves predictions and explanations from the installed artifact pair.
pub struct ScoringService {
    config: KredaiConfig,
    store: Arc<dyn ArtifactStore>,
    registry: Arc<ArtifactRegistry>,
    gateway: PredictionGateway,
    engine: ExplanationEngine,
    metrics: Arc<ScoringMetrics>,
    /// Serializes retrain and reload
    swap_lock: Mutex<()>,
}

impl ScoringService {
    /// Service with nothing installed; it reports `degraded` until a pair
    /// is installed.
    pub fn new(store: Arc<dyn ArtifactStore>, config: KredaiConfig) -> Self {
        let registry = Arc::new(ArtifactRegistry::new());
        let metrics = Arc::new(ScoringMetrics::new());
        Self {
            gateway: PredictionGateway::with_metrics(registry.clone(), metrics.clone()),
            engine: ExplanationEngine::with_metrics(registry.clone(), metrics.clone()),
            config,
            store,
            registry,
            metrics,
            swap_lock: Mutex::new(()),
        }
    }

    /// Load the persisted pair and start serving. Fails if either artifact
    /// is absent, unreadable or mismatched.
    pub async fn load(store: Arc<dyn ArtifactStore>, config: KredaiConfig) -> Result<Self> {
        config.validate()?;
        let set = load_artifacts(store.as_ref(), &config.artifacts).await.map_err(|e| {
            error!(error = %e, "cannot start scoring service");
            e
        })?;
        let service = Self::new(store, config);
        service.registry.install(set);
        Ok(service)
    }

    /// Install an in-memory pair.
    pub fn install(&self, set: ArtifactSet) -> u64 {
        self.registry.install(set)
    }

    pub fn health(&self) -> HealthStatus {
        let current = self.registry.current();
        let loaded = current.is_some();
        HealthStatus {
            status: if loaded {
                ServiceState::Healthy
            } else {
                ServiceState::Degraded
            },
            model_loaded: loaded,
            explainer_loaded: loaded,
            model_version: current.map(|set| set.model().version.clone()),
            generation: self.registry.generation(),
            timestamp: now(),
        }
    }

    pub fn predict(&self, x: &FeatureVector) -> Result<PredictionResult> {
        self.gateway.predict(x)
    }

    pub fn predict_application(&self, raw: &RawApplication) -> Result<PredictionResult> {
        self.gateway.predict_application(raw)
    }

    pub fn predict_batch(&self, xs: &[FeatureVector]) -> Vec<PredictionResult> {
        self.gateway.predict_batch(xs)
    }

    /// Explain one vector; `top_n` defaults to the configured value.
    pub fn explain(&self, x: &FeatureVector, top_n: Option<usize>) -> Result<Explanation> {
        self.engine.explain(x, self.top_n(top_n))
    }

    pub fn explain_batch(&self, xs: &[FeatureVector], top_n: Option<usize>) -> Vec<ExplanationOutcome> {
        self.engine.explain_batch(xs, self.top_n(top_n))
    }

    pub fn explain_application(&self, raw: &RawApplication, top_n: Option<usize>) -> Result<ExplainedApplication> {
        self.engine.explain_application(raw, self.top_n(top_n))
    }

    pub fn recommend(&self, explanation: &Explanation, raw: Option<&RawApplication>) -> Vec<Recommendation> {
        self.engine.recommend(explanation, raw)
    }

    fn top_n(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.config.inference.default_top_n)
    }

    /// Description of the installed model.
    pub fn model_info(&self) -> Result<ModelInfo> {
        Ok(self.registry.model().ok_or(Error::ModelNotLoaded)?.info())
    }

    /// Gain-based importance of the installed model, descending.
    pub fn feature_importance(&self) -> Result<Vec<FeatureImportance>> {
        Ok(self
            .registry
            .model()
            .ok_or(Error::ModelNotLoaded)?
            .feature_importance())
    }

    /// Train a new pair, persist it and swap it in. On any failure the
    /// installed pair stays in place.
    pub async fn retrain(&self, data: &LabeledDataset) -> Result<TrainingReport> {
        let _guard = self.swap_lock.lock().await;
        let pipeline = TrainingPipeline::new(self.config.training.clone());
        let trained = pipeline
            .train_and_save(data, self.store.as_ref(), &self.config.artifacts)
            .await;
        self.finish_retrain(trained)
    }

    /// Like [`retrain`](Self::retrain), starting from raw records.
    pub async fn retrain_from_records(&self, records: Vec<LabeledRecord>) -> Result<TrainingReport> {
        let _guard = self.swap_lock.lock().await;
        let pipeline = TrainingPipeline::new(self.config.training.clone());
        let trained = async {
            let mut output = pipeline.run_from_records(records).await?;
            let paths = save_artifacts(self.store.as_ref(), &self.config.artifacts, &output.artifacts).await?;
            output.report.artifact_paths = Some(paths);
            Ok::<_, Error>(output)
        }
        .await;
        self.finish_retrain(trained)
    }

    fn finish_retrain(&self, trained: Result<TrainingOutput>) -> Result<TrainingReport> {
        match trained {
            Ok(output) => {
                let generation = self.registry.install(output.artifacts);
                info!(
                    generation,
                    model_version = %output.report.model_version,
                    "retrained model installed"
                );
                Ok(output.report)
            }
            Err(e) => {
                error!(error = %e, "retraining failed; keeping installed model");
                Err(e)
            }
        }
    }

    /// Re-read the persisted pair and swap it in. On failure the installed
    /// pair stays in place.
    pub async fn reload(&self) -> Result<u64> {
        let _guard = self.swap_lock.lock().await;
        let set = load_artifacts(self.store.as_ref(), &self.config.artifacts).await?;
        Ok(self.registry.install(set))
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn registry(&self) -> &Arc<ArtifactRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &KredaiConfig {
        &self.config
    }
}
