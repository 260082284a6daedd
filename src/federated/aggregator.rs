//! Global model fitting.
//!
//! The deployable model is fit on the pooled dataset. Shard models from the
//! local trainer are diagnostics only and are not merged into it.

use crate::core::{now, Error, Result, Timestamp};
use crate::dataset::{stratified_split, LabeledDataset};
use crate::features::{FeatureSchema, FeatureVector, SchemaBinding};
use crate::model::{
    ClassificationReport, EvaluationMetrics, FeatureImportance, GbdtConfig,
    GradientBoostedClassifier, ModelInfo,
};
use crate::model::metrics::threshold_labels;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// Release tag of the scoring model format.
pub const MODEL_VERSION: &str = "1.0.0";

/// How the deployed model relates to the shard models.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregationMethod {
    /// Refit on the pooled rows; shard models are not combined.
    #[default]
    PooledRefit,
}

/// The deployable classifier, bound to the schema it was trained on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    /// Unique id of this training output
    pub model_id: String,
    /// Reported model version
    pub version: String,
    /// Schema the model expects
    pub schema: SchemaBinding,
    pub trained_at: Timestamp,
    /// Held-out metrics at training time
    pub metrics: EvaluationMetrics,
    classifier: GradientBoostedClassifier,
}

impl TrainedModel {
    /// Wrap a fitted classifier.
    pub fn new(classifier: GradientBoostedClassifier, metrics: EvaluationMetrics) -> Self {
        let model_id = uuid::Uuid::new_v4().to_string();
        let short = model_id.split('-').next().unwrap_or_default().to_string();
        Self {
            version: format!("{}+{}", MODEL_VERSION, short),
            model_id,
            schema: FeatureSchema::binding(),
            trained_at: now(),
            metrics,
            classifier,
        }
    }

    /// The underlying ensemble.
    pub fn classifier(&self) -> &GradientBoostedClassifier {
        &self.classifier
    }

    /// Log-odds of default. Rejects non-finite inputs.
    pub fn margin(&self, x: &FeatureVector) -> Result<f64> {
        x.ensure_finite()?;
        Ok(self.classifier.margin(x))
    }

    /// Probability of default. Rejects non-finite inputs.
    pub fn predict_proba(&self, x: &FeatureVector) -> Result<f64> {
        x.ensure_finite()?;
        Ok(self.classifier.predict_proba(x))
    }

    /// Gain-based feature importance, descending.
    pub fn feature_importance(&self) -> Vec<FeatureImportance> {
        self.classifier.feature_importance()
    }

    /// Model description.
    pub fn info(&self) -> ModelInfo {
        self.classifier.info()
    }

    /// Ensure the model was trained against the running schema.
    pub fn ensure_schema(&self) -> Result<()> {
        FeatureSchema::binding().ensure_matches(&self.schema)
    }
}

/// Output of fitting the global model.
#[derive(Clone, Debug)]
pub struct GlobalFit {
    pub model: TrainedModel,
    /// Per-class report on the held-out split
    pub report: ClassificationReport,
    /// Row indices the model was fit on
    pub train_indices: Vec<usize>,
}

/// Fits the single deployable model on pooled data.
#[derive(Clone, Debug)]
pub struct GlobalAggregator {
    gbdt: GbdtConfig,
    test_ratio: f64,
    seed: u64,
    method: AggregationMethod,
}

impl GlobalAggregator {
    /// Create an aggregator.
    pub fn new(gbdt: GbdtConfig, test_ratio: f64, seed: u64) -> Self {
        Self {
            gbdt,
            test_ratio,
            seed,
            method: AggregationMethod::PooledRefit,
        }
    }

    /// The aggregation strategy in use.
    pub fn method(&self) -> AggregationMethod {
        self.method
    }

    /// Fit on a stratified train split of the pooled dataset and evaluate
    /// on the held-out rows.
    #[instrument(skip(self, data), fields(rows = data.len()))]
    pub fn fit_global(&self, data: &LabeledDataset) -> Result<GlobalFit> {
        if !data.label_counts().has_both_classes() {
            return Err(Error::Training(
                "pooled dataset must contain both default and non-default rows".into(),
            ));
        }

        let split = stratified_split(data.labels(), self.test_ratio, self.seed)?;
        let train = data.subset(&split.train);
        let test = data.subset(&split.test);

        info!(train = train.len(), test = test.len(), "fitting global model");
        let classifier = GradientBoostedClassifier::fit(&train, &self.gbdt)?;

        let probabilities = classifier.predict_proba_all(test.rows());
        let metrics = EvaluationMetrics::from_probabilities(test.labels(), &probabilities, train.len());
        let report = ClassificationReport::new(test.labels(), &threshold_labels(&probabilities));

        info!(
            accuracy = metrics.accuracy,
            auc = ?metrics.auc,
            "global model evaluated"
        );

        Ok(GlobalFit {
            model: TrainedModel::new(classifier, metrics),
            report,
            train_indices: split.train,
        })
    }
}
