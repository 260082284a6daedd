//! End-to-end: train, persist, load, score, explain, retrain.

use kredai::artifacts::{load_artifacts, ArtifactManifest, ArtifactStore, FsArtifactStore, MemoryArtifactStore};
use kredai::config::KredaiConfig;
use kredai::dataset::{parse_jsonl, synthetic};
use kredai::explain::{Explanation, FeatureContribution, Impact, RecommendationCategory};
use kredai::features::{Feature, FeatureEngineer, FeatureVector, RawApplication, FEATURE_COUNT};
use kredai::federated::partition;
use kredai::inference::{LoanStatus, RiskCategory, ScoringService, ServiceState};
use kredai::model::GbdtConfig;
use kredai::pipeline::TrainingPipeline;
use kredai::Error;
use std::sync::Arc;

fn config() -> KredaiConfig {
    let mut config = KredaiConfig::default();
    config.training.n_clients = 4;
    config.training.background_sample_cap = 60;
    config.training.gbdt = GbdtConfig {
        n_estimators: 40,
        learning_rate: 0.1,
        max_depth: 4,
        min_samples_leaf: 8,
        ..GbdtConfig::default()
    };
    config
}

async fn trained_service(store: Arc<dyn ArtifactStore>, config: KredaiConfig) -> ScoringService {
    let data = synthetic::dataset(500, 42);
    TrainingPipeline::new(config.training.clone())
        .train_and_save(&data, store.as_ref(), &config.artifacts)
        .await
        .unwrap();
    ScoringService::load(store, config).await.unwrap()
}

#[tokio::test]
async fn test_explanations_are_additive() {
    let service = trained_service(Arc::new(MemoryArtifactStore::new()), config()).await;
    let rows = synthetic::dataset(100, 9).rows().to_vec();

    for x in &rows {
        let e = service.explain(x, Some(5)).unwrap();
        assert!((e.base_value + e.total_contribution - e.prediction_value).abs() < 1e-6);
        let p = service.predict(x).unwrap().risk_probability;
        assert!((e.risk_probability - p).abs() < 1e-9);
    }
}

#[tokio::test]
async fn test_decisions_follow_thresholds() {
    let service = trained_service(Arc::new(MemoryArtifactStore::new()), config()).await;
    let rows = synthetic::dataset(200, 10).rows().to_vec();

    for r in service.predict_batch(&rows) {
        let p = r.risk_probability;
        assert_eq!(r.loan_status == LoanStatus::Denied, p > 0.5);
        let expected = if p <= 0.3 {
            RiskCategory::Low
        } else if p <= 0.7 {
            RiskCategory::Medium
        } else {
            RiskCategory::High
        };
        assert_eq!(r.risk_category, Some(expected));
        assert!((r.confidence - p.max(1.0 - p)).abs() < 1e-12);
    }
}

#[tokio::test]
async fn test_batch_with_one_malformed_item() {
    let service = trained_service(Arc::new(MemoryArtifactStore::new()), config()).await;
    let mut rows = synthetic::dataset(8, 12).rows().to_vec();
    rows.insert(5, FeatureVector::zeros().with(Feature::PersonIncome, f64::NAN));

    let predictions = service.predict_batch(&rows);
    assert_eq!(predictions.len(), 9);
    assert_eq!(predictions.iter().filter(|r| r.loan_status == LoanStatus::Error).count(), 1);
    assert_eq!(predictions[5].risk_probability, 0.0);

    let explanations = service.explain_batch(&rows, None);
    assert_eq!(explanations.len(), 9);
    assert_eq!(explanations.iter().filter(|o| !o.is_ok()).count(), 1);
    assert!(!explanations[5].is_ok());

    assert_eq!(service.metrics().batch_failures, 2);
}

#[test]
fn test_feature_derivation_examples() {
    let engineer = FeatureEngineer::new();

    let raw = RawApplication::new()
        .with("person_income", 50000.0)
        .with("loan_amnt", 15000.0);
    let x = engineer.derive(&raw);
    assert!((x.get(Feature::LoanPercentIncome) - 0.3).abs() < 1e-12);
    assert_eq!(engineer.derive(&raw), x);
    assert_eq!(x.to_named_map().len(), FEATURE_COUNT);

    let raw = RawApplication::new()
        .with("electricity_bill_avg", 80.0)
        .with("water_bill_avg", 40.0)
        .with("gas_bill_avg", 50.0)
        .with("estimated_monthly_income", 4166.67);
    let x = engineer.derive(&raw);
    assert_eq!(x.get(Feature::TotalUtilityExpense), 170.0);
    assert!((x.get(Feature::UtilityToIncomeRatio) - 0.0408).abs() < 1e-4);
}

#[test]
fn test_partition_is_deterministic() {
    let data = synthetic::dataset(100, 5);
    let a = partition(&data, 5, 42).unwrap();
    let b = partition(&data, 5, 42).unwrap();

    assert_eq!(a.len(), 5);
    assert!(a.iter().all(|s| s.len() == 20));
    assert_eq!(a.iter().map(|s| s.len()).sum::<usize>(), 100);
    for (x, y) in a.iter().zip(&b) {
        assert_eq!(x.data, y.data);
    }
}

#[tokio::test]
async fn test_late_payments_drive_payment_recommendation() {
    let service = trained_service(Arc::new(MemoryArtifactStore::new()), config()).await;
    let contribution = |feature, attribution_value: f64| FeatureContribution {
        feature,
        attribution_value,
        feature_value: 2.0,
        impact: Impact::from_attribution(attribution_value),
        description: None,
        recommendation: None,
    };
    let explanation = Explanation {
        base_value: -1.0,
        prediction_value: -0.6,
        risk_probability: 0.354,
        total_contribution: 0.4,
        contributions: vec![
            contribution(Feature::OnTimePayments12m, -0.2),
            contribution(Feature::LatePayments12m, 0.55),
            contribution(Feature::LoanIntRate, 0.004),
        ],
        readable_explanation: Vec::new(),
        model_version: "test".to_string(),
    };

    let recs = service.recommend(&explanation, None);
    assert_eq!(recs[0].category, RecommendationCategory::Payment);
    assert!(recs.len() <= 5);
}

#[tokio::test]
async fn test_fs_persistence_and_fail_fast() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config();
    config.artifacts.dir = dir.path().join("models");
    let store: Arc<dyn ArtifactStore> = Arc::new(FsArtifactStore::new(&config.artifacts.dir));

    assert!(matches!(
        ScoringService::load(store.clone(), config.clone()).await,
        Err(Error::ArtifactMissing(_))
    ));

    let service = trained_service(store.clone(), config.clone()).await;
    assert_eq!(service.health().status, ServiceState::Healthy);
    let committed = ArtifactManifest::read(store.as_ref(), &config.artifacts)
        .await
        .unwrap()
        .current;
    assert!(config.artifacts.dir.join(&config.artifacts.manifest_file).exists());
    assert!(config.artifacts.dir.join(&committed.model).exists());
    assert!(config.artifacts.dir.join(&committed.explainer).exists());

    // a second instance reads the same pair
    let other = ScoringService::load(store, config).await.unwrap();
    assert_eq!(other.health().model_version, service.health().model_version);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_retrain_swaps_atomically() {
    let config = config();
    let store: Arc<dyn ArtifactStore> = Arc::new(MemoryArtifactStore::new());
    let service = Arc::new(trained_service(store.clone(), config.clone()).await);
    let old_version = service.health().model_version.unwrap();
    let x = synthetic::dataset(1, 3).rows()[0].clone();

    let reader = {
        let service = service.clone();
        let x = x.clone();
        tokio::spawn(async move {
            let mut versions = Vec::new();
            for _ in 0..200 {
                let e = service.explain(&x, Some(3)).unwrap();
                assert!((e.base_value + e.total_contribution - e.prediction_value).abs() < 1e-6);
                versions.push(e.model_version);
                tokio::task::yield_now().await;
            }
            versions
        })
    };

    let report = service.retrain(&synthetic::dataset(500, 43)).await.unwrap();
    let versions = reader.await.unwrap();
    assert!(versions
        .iter()
        .all(|v| *v == old_version || *v == report.model_version));

    assert_eq!(service.health().model_version, Some(report.model_version.clone()));
    let persisted = load_artifacts(store.as_ref(), &config.artifacts).await.unwrap();
    assert_eq!(persisted.model().version, report.model_version);
}

#[tokio::test]
async fn test_jsonl_corpus_to_scores() {
    let mut lines = String::new();
    for (i, record) in synthetic::records(300, 77).into_iter().enumerate() {
        let mut row = serde_json::to_value(&record.raw.numeric).unwrap();
        let target = if record.label == 1 { 1.0 } else if i % 2 == 0 { 0.21 } else { 0.0 };
        row["target"] = serde_json::json!(target);
        lines.push_str(&row.to_string());
        lines.push('\n');
    }
    lines.push_str("{\"person_income\": 1000, \"target\": 0.5}\n");

    let corpus = parse_jsonl(&lines, "target").unwrap();
    assert_eq!(corpus.records.len(), 300);
    assert_eq!(corpus.dropped_rows, 1);

    let out = TrainingPipeline::new(config().training)
        .run_from_records(corpus.records)
        .await
        .unwrap();
    assert!(out.report.cleaning.is_some());
    assert!(out.report.global_metrics.auc.is_some());
}
