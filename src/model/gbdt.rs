//! Gradient-boosted tree ensemble for binary default risk.
//!
//! Log-loss boosting: each round fits a regression tree to the residuals
//! `y - p` on a row subsample, restricted to a column subsample, and adds the
//! tree's Newton-step leaves scaled by the learning rate to the margin.
//! `probability = sigmoid(base_score + learning_rate * Σ tree(x))`.

use crate::core::{sigmoid, Error, Result};
use crate::dataset::LabeledDataset;
use crate::features::{Feature, FeatureVector, FEATURE_COUNT};
use crate::model::tree::{RegressionTree, TreeParams};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Probability clamp used for the initial log-odds.
const PROBABILITY_EPSILON: f64 = 1e-6;

/// Boosting hyperparameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GbdtConfig {
    /// Number of boosting rounds
    pub n_estimators: usize,
    /// Shrinkage applied to each tree
    pub learning_rate: f64,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Minimum rows in each leaf
    pub min_samples_leaf: usize,
    /// Fraction of rows sampled per round
    pub subsample: f64,
    /// Fraction of features sampled per tree
    pub colsample: f64,
    /// RNG seed
    pub seed: u64,
}

impl Default for GbdtConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.05,
            max_depth: 5,
            min_samples_leaf: 20,
            subsample: 0.8,
            colsample: 0.9,
            seed: 42,
        }
    }
}

impl GbdtConfig {
    /// Reject parameters the booster cannot train with.
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(Error::InvalidConfig("n_estimators must be at least 1".into()));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "learning_rate must be in (0, 1], got {}",
                self.learning_rate
            )));
        }
        if self.max_depth == 0 {
            return Err(Error::InvalidConfig("max_depth must be at least 1".into()));
        }
        for (name, value) in [("subsample", self.subsample), ("colsample", self.colsample)] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(Error::InvalidConfig(format!(
                    "{} must be in (0, 1], got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Relative importance of one feature.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: Feature,
    pub importance: f64,
}

/// Summary of a fitted classifier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_type: String,
    pub objective: String,
    pub n_estimators: usize,
    pub n_features: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub feature_names: Vec<String>,
    /// Ten most important features, descending
    pub top_features: Vec<FeatureImportance>,
}

/// A fitted boosted ensemble.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostedClassifier {
    config: GbdtConfig,
    base_score: f64,
    trees: Vec<RegressionTree>,
    gains: Vec<f64>,
}

impl GradientBoostedClassifier {
    /// Fit on a labeled dataset.
    pub fn fit(data: &LabeledDataset, config: &GbdtConfig) -> Result<Self> {
        config.validate()?;
        if data.is_empty() {
            return Err(Error::Training("cannot fit on an empty dataset".into()));
        }
        for row in data.rows() {
            row.ensure_finite()?;
        }

        let rows = data.rows();
        let y: Vec<f64> = data.labels().iter().map(|&l| l as f64).collect();
        let n = rows.len();

        let prior = (y.iter().sum::<f64>() / n as f64)
            .clamp(PROBABILITY_EPSILON, 1.0 - PROBABILITY_EPSILON);
        let base_score = (prior / (1.0 - prior)).ln();

        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut margins = vec![base_score; n];
        let mut trees = Vec::with_capacity(config.n_estimators);
        let mut gains = vec![0.0; FEATURE_COUNT];

        let n_rows = ((n as f64 * config.subsample).round() as usize).clamp(1, n);
        let n_cols = ((FEATURE_COUNT as f64 * config.colsample).round() as usize).clamp(1, FEATURE_COUNT);
        let params = TreeParams {
            max_depth: config.max_depth,
            min_samples_leaf: config.min_samples_leaf,
        };

        for round in 0..config.n_estimators {
            let probs: Vec<f64> = margins.iter().map(|&m| sigmoid(m)).collect();
            let residuals: Vec<f64> = y.iter().zip(&probs).map(|(y, p)| y - p).collect();
            let hessians: Vec<f64> = probs.iter().map(|p| p * (1.0 - p)).collect();

            let mut row_idx = sample(&mut rng, n, n_rows).into_vec();
            row_idx.sort_unstable();
            let mut col_idx = sample(&mut rng, FEATURE_COUNT, n_cols).into_vec();
            col_idx.sort_unstable();

            let tree = RegressionTree::fit(rows, &residuals, &hessians, &row_idx, &col_idx, params);
            tree.add_gains(&mut gains);

            for (margin, row) in margins.iter_mut().zip(rows) {
                *margin += config.learning_rate * tree.predict(row.as_slice());
            }
            trees.push(tree);

            if round % 25 == 0 {
                debug!(round, loss = log_loss(&y, &margins), "boosting round");
            }
        }

        Ok(Self {
            config: config.clone(),
            base_score,
            trees,
            gains,
        })
    }

    /// Raw log-odds score.
    pub fn margin(&self, x: &FeatureVector) -> f64 {
        let sum: f64 = self.trees.iter().map(|t| t.predict(x.as_slice())).sum();
        self.base_score + self.config.learning_rate * sum
    }

    /// Probability of default.
    pub fn predict_proba(&self, x: &FeatureVector) -> f64 {
        sigmoid(self.margin(x))
    }

    /// Probabilities for many rows.
    pub fn predict_proba_all(&self, rows: &[FeatureVector]) -> Vec<f64> {
        rows.iter().map(|r| self.predict_proba(r)).collect()
    }

    /// Initial log-odds before any tree.
    pub fn base_score(&self) -> f64 {
        self.base_score
    }

    /// Shrinkage applied to tree outputs.
    pub fn learning_rate(&self) -> f64 {
        self.config.learning_rate
    }

    /// The fitted trees.
    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    /// Training configuration.
    pub fn config(&self) -> &GbdtConfig {
        &self.config
    }

    /// Gain-based importance per feature, normalised to sum to 1, descending.
    pub fn feature_importance(&self) -> Vec<FeatureImportance> {
        let total: f64 = self.gains.iter().sum();
        let mut importances: Vec<FeatureImportance> = Feature::ALL
            .iter()
            .map(|&feature| FeatureImportance {
                feature,
                importance: if total > 0.0 {
                    self.gains[feature.index()] / total
                } else {
                    0.0
                },
            })
            .collect();
        importances.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        importances
    }

    /// Describe the fitted model.
    pub fn info(&self) -> ModelInfo {
        ModelInfo {
            model_type: "GradientBoostedClassifier".to_string(),
            objective: "binary:logistic".to_string(),
            n_estimators: self.trees.len(),
            n_features: FEATURE_COUNT,
            learning_rate: self.config.learning_rate,
            max_depth: self.config.max_depth,
            feature_names: Feature::ALL.iter().map(|f| f.name().to_string()).collect(),
            top_features: self.feature_importance().into_iter().take(10).collect(),
        }
    }
}

fn log_loss(y: &[f64], margins: &[f64]) -> f64 {
    let total: f64 = y
        .iter()
        .zip(margins)
        .map(|(&y, &m)| {
            let p = sigmoid(m).clamp(PROBABILITY_EPSILON, 1.0 - PROBABILITY_EPSILON);
            -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
        })
        .sum();
    total / y.len().max(1) as f64
}
