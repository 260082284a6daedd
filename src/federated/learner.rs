//! Local trainer for per-shard diagnostics.
//!
//! Each shard fits its own classifier on a stratified local split and
//! reports held-out metrics. These models only measure how performance
//! varies across clients; none of them is ever deployed.

use crate::core::{Error, Result};
use crate::dataset::stratified_split;
use crate::federated::partition::ClientShard;
use crate::model::{EvaluationMetrics, GbdtConfig, GradientBoostedClassifier};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

/// Result of training on one shard.
#[derive(Clone, Debug)]
pub struct LocalTrainingResult {
    /// Shard the model was fit on
    pub shard_id: usize,
    /// Diagnostic model
    pub model: GradientBoostedClassifier,
    /// Held-out metrics on the shard's validation rows
    pub metrics: EvaluationMetrics,
}

/// Aggregate view of the per-shard diagnostics.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalSummary {
    /// Shards that produced metrics
    pub shards: usize,
    pub mean_accuracy: f64,
    /// Mean over shards whose validation rows held both classes
    pub mean_auc: Option<f64>,
    /// Standard deviation of shard accuracy
    pub accuracy_std: f64,
}

impl LocalSummary {
    /// Summarize a set of shard metrics.
    pub fn from_metrics(metrics: &[EvaluationMetrics]) -> Self {
        if metrics.is_empty() {
            return Self::default();
        }
        let n = metrics.len() as f64;
        let mean_accuracy = metrics.iter().map(|m| m.accuracy).sum::<f64>() / n;
        let variance = metrics
            .iter()
            .map(|m| (m.accuracy - mean_accuracy).powi(2))
            .sum::<f64>()
            / n;

        let aucs: Vec<f64> = metrics.iter().filter_map(|m| m.auc).collect();
        let mean_auc = if aucs.is_empty() {
            None
        } else {
            Some(aucs.iter().sum::<f64>() / aucs.len() as f64)
        };

        Self {
            shards: metrics.len(),
            mean_accuracy,
            mean_auc,
            accuracy_std: variance.sqrt(),
        }
    }
}

/// Fits one diagnostic classifier per shard.
#[derive(Clone, Debug)]
pub struct LocalTrainer {
    gbdt: GbdtConfig,
    validation_ratio: f64,
    seed: u64,
}

impl LocalTrainer {
    /// Create a trainer.
    pub fn new(gbdt: GbdtConfig, validation_ratio: f64, seed: u64) -> Self {
        Self {
            gbdt,
            validation_ratio,
            seed,
        }
    }

    /// Train on a single shard.
    #[instrument(skip(self, shard), fields(client = shard.id, rows = shard.len()))]
    pub fn train_local(&self, shard: &ClientShard) -> Result<LocalTrainingResult> {
        if shard.is_empty() {
            return Err(Error::Training(format!("client {} has no rows", shard.id)));
        }

        let split = stratified_split(shard.data.labels(), self.validation_ratio, self.seed)?;
        let train = shard.data.subset(&split.train);
        let val = shard.data.subset(&split.test);

        let model = GradientBoostedClassifier::fit(&train, &self.gbdt)?;
        let probabilities = model.predict_proba_all(val.rows());
        let metrics = EvaluationMetrics::from_probabilities(val.labels(), &probabilities, train.len());

        info!(
            client = shard.id,
            accuracy = metrics.accuracy,
            auc = ?metrics.auc,
            train_samples = metrics.train_samples,
            val_samples = metrics.val_samples,
            "local training complete"
        );
        Ok(LocalTrainingResult {
            shard_id: shard.id,
            model,
            metrics,
        })
    }

    /// Train every shard, on blocking worker threads when `parallel` is set.
    /// Results keep the shard order.
    pub async fn train_all(
        &self,
        shards: Vec<ClientShard>,
        parallel: bool,
    ) -> Result<Vec<LocalTrainingResult>> {
        if !parallel {
            return shards.iter().map(|s| self.train_local(s)).collect();
        }

        let handles = shards.into_iter().map(|shard| {
            let trainer = self.clone();
            tokio::task::spawn_blocking(move || trainer.train_local(&shard))
        });

        let mut results = Vec::new();
        for joined in join_all(handles).await {
            match joined? {
                Ok(result) => results.push(result),
                Err(e) => {
                    warn!(error = %e, "local training failed");
                    return Err(e);
                }
            }
        }
        Ok(results)
    }
}
