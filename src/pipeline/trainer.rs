//! Offline training run.
//!
//! partition -> per-shard diagnostics -> pooled global fit -> background
//! sample -> explainer calibration. The run either yields a validated
//! model/explainer pair or fails without side effects; persisting is a
//! separate step.

use crate::artifacts::{save_artifacts, ArtifactPaths, ArtifactSet, ArtifactStore};
use crate::config::{ArtifactConfig, TrainingConfig};
use crate::core::{now, Error, Result, Timestamp};
use crate::dataset::{
    deterministic_sample, load_jsonl, CleaningReport, DatasetCleaner, LabeledDataset, LabeledRecord,
};
use crate::explain::Explainer;
use crate::features::{FeatureEngineer, FeatureVector};
use crate::federated::{
    AggregationMethod, DataDistribution, DataPartitioner, GlobalAggregator, HeterogeneityReport,
    LocalSummary, LocalTrainer, NonIIDAnalyzer,
};
use crate::model::{ClassificationReport, EvaluationMetrics};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, instrument};

/// Diagnostics for one client shard.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShardReport {
    pub client_id: usize,
    pub distribution: DataDistribution,
    pub metrics: EvaluationMetrics,
}

/// Everything a training run measured.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub run_id: String,
    pub started_at: Timestamp,
    pub finished_at: Timestamp,
    /// How the deployed model relates to the shard models
    pub aggregation: AggregationMethod,
    pub total_samples: usize,
    pub shards: Vec<ShardReport>,
    pub local_summary: LocalSummary,
    pub heterogeneity: HeterogeneityReport,
    /// Held-out metrics of the deployed model
    pub global_metrics: EvaluationMetrics,
    pub classification_report: ClassificationReport,
    pub background_size: usize,
    pub model_id: String,
    pub model_version: String,
    pub cleaning: Option<CleaningReport>,
    /// Set once the pair has been persisted
    pub artifact_paths: Option<ArtifactPaths>,
}

/// A finished run.
#[derive(Clone, Debug)]
pub struct TrainingOutput {
    pub artifacts: ArtifactSet,
    pub report: TrainingReport,
}

/// Runs the offline training pipeline.
#[derive(Clone, Debug)]
pub struct TrainingPipeline {
    config: TrainingConfig,
    engineer: FeatureEngineer,
    cleaner: DatasetCleaner,
}

impl TrainingPipeline {
    pub fn new(config: TrainingConfig) -> Self {
        Self {
            config,
            engineer: FeatureEngineer::new(),
            cleaner: DatasetCleaner::new(),
        }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Train on an already-derived dataset.
    #[instrument(skip(self, data), fields(rows = data.len(), clients = self.config.n_clients))]
    pub async fn run(&self, data: &LabeledDataset) -> Result<TrainingOutput> {
        let started_at = now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let cfg = &self.config;
        cfg.gbdt.validate()?;
        if cfg.background_sample_cap == 0 {
            return Err(Error::InvalidConfig("background_sample_cap must be at least 1".into()));
        }

        info!(run_id = %run_id, rows = data.len(), "training run started");

        // Client simulation, diagnostics only.
        let shards = DataPartitioner::new(cfg.n_clients, cfg.seed).partition(data)?;
        let distributions: Vec<DataDistribution> = shards.iter().map(|s| s.distribution.clone()).collect();
        let heterogeneity = NonIIDAnalyzer::summarize(&distributions);

        let local = LocalTrainer::new(cfg.gbdt.clone(), cfg.local_validation_ratio, cfg.seed)
            .train_all(shards, cfg.parallel_shards)
            .await?;
        let local_metrics: Vec<EvaluationMetrics> = local.iter().map(|r| r.metrics.clone()).collect();
        let local_summary = LocalSummary::from_metrics(&local_metrics);
        info!(
            shards = local_summary.shards,
            mean_accuracy = local_summary.mean_accuracy,
            mean_auc = ?local_summary.mean_auc,
            positive_rate_spread = heterogeneity.positive_rate_spread,
            "local diagnostics complete"
        );

        let shard_reports = local
            .into_iter()
            .zip(distributions)
            .map(|(result, distribution)| ShardReport {
                client_id: result.shard_id,
                distribution,
                metrics: result.metrics,
            })
            .collect();

        // Deployable model on pooled rows.
        let aggregator = GlobalAggregator::new(cfg.gbdt.clone(), cfg.test_ratio, cfg.seed);
        let aggregation = aggregator.method();
        let pooled = data.clone();
        let fit = tokio::task::spawn_blocking(move || aggregator.fit_global(&pooled)).await??;

        let picks = deterministic_sample(fit.train_indices.len(), cfg.background_sample_cap, cfg.seed);
        let background: Vec<FeatureVector> = picks
            .iter()
            .map(|&i| data.rows()[fit.train_indices[i]].clone())
            .collect();
        let explainer = Explainer::calibrate(&fit.model, &background)?;

        let report = TrainingReport {
            run_id,
            started_at,
            finished_at: now(),
            aggregation,
            total_samples: data.len(),
            shards: shard_reports,
            local_summary,
            heterogeneity,
            global_metrics: fit.model.metrics.clone(),
            classification_report: fit.report,
            background_size: background.len(),
            model_id: fit.model.model_id.clone(),
            model_version: fit.model.version.clone(),
            cleaning: None,
            artifact_paths: None,
        };
        let artifacts = ArtifactSet::new(fit.model, explainer)?;

        info!(
            run_id = %report.run_id,
            model_version = %report.model_version,
            accuracy = report.global_metrics.accuracy,
            auc = ?report.global_metrics.auc,
            background = report.background_size,
            "training run complete"
        );
        Ok(TrainingOutput { artifacts, report })
    }

    /// Clean raw records, derive features, then train.
    pub async fn run_from_records(&self, records: Vec<LabeledRecord>) -> Result<TrainingOutput> {
        let (cleaned, cleaning) = self.cleaner.clean(records);
        info!(
            rows_in = cleaning.rows_in,
            rows_out = cleaning.rows_out,
            duplicates = cleaning.duplicates_removed,
            "training corpus cleaned"
        );
        let data = LabeledDataset::from_records(&cleaned, &self.engineer)?;
        let mut output = self.run(&data).await?;
        output.report.cleaning = Some(cleaning);
        Ok(output)
    }

    /// Load a JSON-lines corpus and train on it.
    pub async fn run_from_jsonl(&self, path: impl AsRef<Path>) -> Result<TrainingOutput> {
        let corpus = load_jsonl(path, &self.config.target_column).await?;
        if corpus.records.is_empty() {
            return Err(Error::InvalidDataset("no labeled rows in corpus".into()));
        }
        self.run_from_records(corpus.records).await
    }

    /// Train, then persist the pair.
    pub async fn train_and_save(
        &self,
        data: &LabeledDataset,
        store: &dyn ArtifactStore,
        artifacts: &ArtifactConfig,
    ) -> Result<TrainingOutput> {
        let mut output = self.run(data).await?;
        output.report.artifact_paths = Some(save_artifacts(store, artifacts, &output.artifacts).await?);
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{load_artifacts, MemoryArtifactStore};
    use crate::dataset::synthetic;
    use crate::model::GbdtConfig;

    fn config() -> TrainingConfig {
        TrainingConfig {
            n_clients: 3,
            background_sample_cap: 40,
            gbdt: GbdtConfig {
                n_estimators: 20,
                min_samples_leaf: 5,
                ..GbdtConfig::default()
            },
            ..TrainingConfig::default()
        }
    }

    #[tokio::test]
    async fn test_run_produces_paired_artifacts() {
        let data = synthetic::dataset(300, 21);
        let out = TrainingPipeline::new(config()).run(&data).await.unwrap();

        let r = &out.report;
        assert_eq!(r.aggregation, AggregationMethod::PooledRefit);
        assert_eq!(r.shards.len(), 3);
        assert_eq!(r.local_summary.shards, 3);
        assert_eq!(r.shards.iter().map(|s| s.distribution.sample_count).sum::<usize>(), 300);
        assert_eq!(r.background_size, 40);
        assert_eq!(r.global_metrics.train_samples + r.global_metrics.val_samples, 300);
        assert_eq!(out.artifacts.model().model_id, r.model_id);
        assert_eq!(out.artifacts.explainer().background_size(), 40);
    }

    #[tokio::test]
    async fn test_sequential_and_parallel_agree() {
        let data = synthetic::dataset(240, 4);
        let mut sequential = config();
        sequential.parallel_shards = false;

        let a = TrainingPipeline::new(config()).run(&data).await.unwrap();
        let b = TrainingPipeline::new(sequential).run(&data).await.unwrap();
        let acc = |o: &TrainingOutput| o.report.shards.iter().map(|s| s.metrics.accuracy).collect::<Vec<_>>();
        assert_eq!(acc(&a), acc(&b));
        assert_eq!(
            a.artifacts.explainer().base_value(),
            b.artifacts.explainer().base_value()
        );
    }

    #[tokio::test]
    async fn test_run_from_records_reports_cleaning() {
        let records = synthetic::records(200, 17);
        let out = TrainingPipeline::new(config()).run_from_records(records).await.unwrap();
        let cleaning = out.report.cleaning.unwrap();
        assert_eq!(cleaning.rows_in, 200);
        assert_eq!(out.report.total_samples, cleaning.rows_out);
    }

    #[tokio::test]
    async fn test_single_class_fails() {
        let data = synthetic::dataset(100, 2);
        let rows = data.rows().to_vec();
        let one_class = LabeledDataset::new(rows, vec![0; 100]).unwrap();
        assert!(TrainingPipeline::new(config()).run(&one_class).await.is_err());
    }

    #[tokio::test]
    async fn test_train_and_save() {
        let data = synthetic::dataset(150, 6);
        let store = MemoryArtifactStore::new();
        let artifacts = ArtifactConfig::default();
        let out = TrainingPipeline::new(config())
            .train_and_save(&data, &store, &artifacts)
            .await
            .unwrap();
        assert!(out.report.artifact_paths.is_some());

        let loaded = load_artifacts(&store, &artifacts).await.unwrap();
        assert_eq!(loaded.model().model_id, out.report.model_id);
    }

    #[tokio::test]
    async fn test_missing_corpus() {
        let pipeline = TrainingPipeline::new(config());
        assert!(matches!(
            pipeline.run_from_jsonl("/nonexistent/credit.jsonl").await,
            Err(Error::InvalidDataset(_))
        ));
    }
}
