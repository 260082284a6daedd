//! The live model/explainer pair.
//!
//! Readers take an `Arc` snapshot of the whole set, so a request sees one
//! consistent pair even while a retrain installs its replacement.

use crate::core::{now, Result, Timestamp};
use crate::explain::Explainer;
use crate::federated::TrainedModel;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::info;

/// A validated model with its explainer.
#[derive(Clone, Debug)]
pub struct ArtifactSet {
    model: Arc<TrainedModel>,
    explainer: Arc<Explainer>,
    installed_at: Timestamp,
}

impl ArtifactSet {
    /// Pair a model with its explainer, rejecting mismatches.
    pub fn new(model: TrainedModel, explainer: Explainer) -> Result<Self> {
        model.ensure_schema()?;
        explainer.ensure_pairs_with(&model)?;
        Ok(Self {
            model: Arc::new(model),
            explainer: Arc::new(explainer),
            installed_at: now(),
        })
    }

    pub fn model(&self) -> &Arc<TrainedModel> {
        &self.model
    }

    pub fn explainer(&self) -> &Arc<Explainer> {
        &self.explainer
    }

    pub fn installed_at(&self) -> Timestamp {
        self.installed_at
    }
}

/// Holder of the current artifact set.
#[derive(Debug, Default)]
pub struct ArtifactRegistry {
    current: RwLock<Option<Arc<ArtifactSet>>>,
    generation: AtomicU64,
}

impl ArtifactRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry that starts with `set` installed.
    pub fn with_set(set: ArtifactSet) -> Self {
        let registry = Self::new();
        registry.install(set);
        registry
    }

    /// Replace the current set. Returns the new generation.
    pub fn install(&self, set: ArtifactSet) -> u64 {
        let version = set.model.version.clone();
        let set = Arc::new(set);
        {
            let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
            *current = Some(set);
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        info!(generation, model_version = %version, "artifact set installed");
        generation
    }

    /// Snapshot of the current set. The read guard is dropped as soon as
    /// the `Arc` is cloned; no caller holds it while scoring.
    pub fn current(&self) -> Option<Arc<ArtifactSet>> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Current model, if any.
    pub fn model(&self) -> Option<Arc<TrainedModel>> {
        self.current().map(|set| set.model.clone())
    }

    /// Current explainer, if any.
    pub fn explainer(&self) -> Option<Arc<Explainer>> {
        self.current().map(|set| set.explainer.clone())
    }

    pub fn is_loaded(&self) -> bool {
        self.current().is_some()
    }

    /// Number of installs so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Error;
    use crate::dataset::synthetic;
    use crate::model::{EvaluationMetrics, GbdtConfig, GradientBoostedClassifier};

    fn trained() -> (TrainedModel, Explainer) {
        let data = synthetic::dataset(120, 3);
        let config = GbdtConfig {
            n_estimators: 10,
            ..GbdtConfig::default()
        };
        let classifier = GradientBoostedClassifier::fit(&data, &config).unwrap();
        let model = TrainedModel::new(classifier, EvaluationMetrics::default());
        let explainer = Explainer::calibrate(&model, &data.rows()[..20]).unwrap();
        (model, explainer)
    }

    #[test]
    fn test_install_and_snapshot() {
        let registry = ArtifactRegistry::new();
        assert!(!registry.is_loaded());
        assert!(registry.model().is_none());

        let (model, explainer) = trained();
        let id = model.model_id.clone();
        assert_eq!(registry.install(ArtifactSet::new(model, explainer).unwrap()), 1);

        let snapshot = registry.current().unwrap();
        assert_eq!(snapshot.model().model_id, id);
        assert_eq!(snapshot.explainer().model_id(), id);

        let (model, explainer) = trained();
        registry.install(ArtifactSet::new(model, explainer).unwrap());
        assert_eq!(registry.generation(), 2);
        // earlier snapshot still sees the old pair
        assert_eq!(snapshot.model().model_id, id);
        assert_ne!(registry.model().unwrap().model_id, id);
    }

    #[test]
    fn test_mismatched_pair_rejected() {
        let (model, _) = trained();
        let (_, other_explainer) = trained();
        assert!(matches!(
            ArtifactSet::new(model, other_explainer),
            Err(Error::SchemaMismatch { .. })
        ));
    }
}
