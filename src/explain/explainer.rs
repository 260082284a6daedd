//! Additive attribution over the boosted trees.
//!
//! Calibration assigns every tree node an expected output: a leaf's value,
//! or the background-weighted mean of its children. A prediction's margin is
//! then decomposed along each tree's decision path: each split hands the
//! change in expectation between parent and child to the split feature. The
//! parts telescope, so `base_value + Σ attributions == margin` exactly.
//!
//! All values are in log-odds space. `risk_probability` is the sigmoid of
//! the prediction value.

use crate::core::{sigmoid, Error, Result};
use crate::features::{FeatureSchema, FeatureVector, SchemaBinding, FEATURE_COUNT};
use crate::federated::TrainedModel;
use crate::model::{RegressionTree, TreeNode};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Per-feature decomposition of one prediction, always for the default class.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Attribution {
    /// Expected margin over the background sample
    pub base_value: f64,
    /// Margin of this input
    pub prediction_value: f64,
    /// One value per canonical feature, in schema order
    pub values: Vec<f64>,
}

impl Attribution {
    /// Sum over every feature.
    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Probability of default implied by the prediction value.
    pub fn risk_probability(&self) -> f64 {
        sigmoid(self.prediction_value)
    }
}

/// A calibrated attribution function bound to one trained model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Explainer {
    model_id: String,
    schema: SchemaBinding,
    base_score: f64,
    learning_rate: f64,
    trees: Vec<RegressionTree>,
    /// Expected output per node, per tree
    expectations: Vec<Vec<f64>>,
    base_value: f64,
    background_size: usize,
}

impl Explainer {
    /// Calibrate against a background sample drawn from the training data.
    pub fn calibrate(model: &TrainedModel, background: &[FeatureVector]) -> Result<Self> {
        if background.is_empty() {
            return Err(Error::Training("background sample is empty".into()));
        }
        for row in background {
            row.ensure_finite()?;
        }

        let classifier = model.classifier();
        let trees = classifier.trees().to_vec();
        let expectations: Vec<Vec<f64>> = trees
            .iter()
            .map(|tree| node_expectations(tree, background))
            .collect();

        let root_sum: f64 = expectations.iter().map(|e| e[0]).sum();
        let base_value = classifier.base_score() + classifier.learning_rate() * root_sum;

        info!(
            model_id = %model.model_id,
            background = background.len(),
            base_value,
            "explainer calibrated"
        );

        Ok(Self {
            model_id: model.model_id.clone(),
            schema: model.schema.clone(),
            base_score: classifier.base_score(),
            learning_rate: classifier.learning_rate(),
            trees,
            expectations,
            base_value,
            background_size: background.len(),
        })
    }

    /// Decompose one input.
    pub fn attribute(&self, x: &FeatureVector) -> Result<Attribution> {
        x.ensure_finite()?;
        let sample = x.as_slice();
        let mut values = vec![0.0; FEATURE_COUNT];
        let mut leaf_sum = 0.0;

        for (tree, expected) in self.trees.iter().zip(&self.expectations) {
            let path = tree.decision_path(sample);
            for pair in path.windows(2) {
                let (parent, child) = (pair[0], pair[1]);
                if let TreeNode::Split { feature, .. } = &tree.nodes()[parent] {
                    values[*feature] += self.learning_rate * (expected[child] - expected[parent]);
                }
            }
            leaf_sum += tree.predict(sample);
        }

        Ok(Attribution {
            base_value: self.base_value,
            prediction_value: self.base_score + self.learning_rate * leaf_sum,
            values,
        })
    }

    /// Expected margin over the background sample.
    pub fn base_value(&self) -> f64 {
        self.base_value
    }

    /// Id of the model this explainer was calibrated from.
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Schema binding carried from the model.
    pub fn schema(&self) -> &SchemaBinding {
        &self.schema
    }

    /// Rows in the calibration sample.
    pub fn background_size(&self) -> usize {
        self.background_size
    }

    /// Fail unless this explainer was calibrated from `model` under the
    /// running schema.
    pub fn ensure_pairs_with(&self, model: &TrainedModel) -> Result<()> {
        FeatureSchema::binding().ensure_matches(&self.schema)?;
        model.schema.ensure_matches(&self.schema)?;
        if self.model_id != model.model_id {
            return Err(Error::SchemaMismatch {
                expected: format!("explainer for model {}", model.model_id),
                found: format!("explainer for model {}", self.model_id),
            });
        }
        Ok(())
    }
}

/// Expected output of every node, weighting children by how many background
/// rows reach them. A split no background row reaches falls back to the
/// training row counts.
fn node_expectations(tree: &RegressionTree, background: &[FeatureVector]) -> Vec<f64> {
    let nodes = tree.nodes();
    let mut reached = vec![0usize; nodes.len()];
    for row in background {
        for idx in tree.decision_path(row.as_slice()) {
            reached[idx] += 1;
        }
    }

    let mut expected = vec![0.0; nodes.len()];
    fill_expectation(nodes, &reached, 0, &mut expected);
    expected
}

fn fill_expectation(nodes: &[TreeNode], reached: &[usize], idx: usize, expected: &mut [f64]) -> f64 {
    let value = match &nodes[idx] {
        TreeNode::Leaf { value, .. } => *value,
        TreeNode::Split { left, right, .. } => {
            let left_e = fill_expectation(nodes, reached, *left, expected);
            let right_e = fill_expectation(nodes, reached, *right, expected);

            let (mut wl, mut wr) = (reached[*left] as f64, reached[*right] as f64);
            if wl + wr == 0.0 {
                wl = nodes[*left].n_samples() as f64;
                wr = nodes[*right].n_samples() as f64;
            }
            if wl + wr == 0.0 {
                (left_e + right_e) / 2.0
            } else {
                (wl * left_e + wr * right_e) / (wl + wr)
            }
        }
    };
    expected[idx] = value;
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::synthetic;
    use crate::features::Feature;
    use crate::federated::GlobalAggregator;
    use crate::model::GbdtConfig;

    fn fitted() -> (TrainedModel, Vec<FeatureVector>) {
        let data = synthetic::dataset(400, 42);
        let gbdt = GbdtConfig {
            n_estimators: 30,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 10,
            ..Default::default()
        };
        let model = GlobalAggregator::new(gbdt, 0.2, 42).fit_global(&data).unwrap().model;
        (model, data.rows().to_vec())
    }

    #[test]
    fn test_additivity() {
        let (model, rows) = fitted();
        let explainer = Explainer::calibrate(&model, &rows[..100]).unwrap();

        for x in rows.iter().take(50) {
            let a = explainer.attribute(x).unwrap();
            assert!((a.base_value + a.total() - a.prediction_value).abs() < 1e-6);
            assert!((a.prediction_value - model.margin(x).unwrap()).abs() < 1e-9);
            assert!((a.risk_probability() - model.predict_proba(x).unwrap()).abs() < 1e-9);
        }
    }

    #[test]
    fn test_additivity_off_distribution() {
        let (model, rows) = fitted();
        let explainer = Explainer::calibrate(&model, &rows[..5]).unwrap();
        let x = FeatureVector::zeros()
            .with(Feature::LatePayments12m, 40.0)
            .with(Feature::PersonIncome, 1e9);
        let a = explainer.attribute(&x).unwrap();
        assert!((a.base_value + a.total() - a.prediction_value).abs() < 1e-6);
    }

    #[test]
    fn test_base_value_is_mean_background_margin() {
        let (model, rows) = fitted();
        let background = &rows[..100];
        let explainer = Explainer::calibrate(&model, background).unwrap();
        let mean: f64 = background.iter().map(|x| model.margin(x).unwrap()).sum::<f64>() / 100.0;
        assert!((explainer.base_value() - mean).abs() < 1e-9);
        assert_eq!(explainer.background_size(), 100);
    }

    #[test]
    fn test_unused_features_get_zero() {
        let (model, rows) = fitted();
        let explainer = Explainer::calibrate(&model, &rows[..50]).unwrap();
        let importance = model.feature_importance();
        let unused: Vec<Feature> = importance
            .iter()
            .filter(|f| f.importance == 0.0)
            .map(|f| f.feature)
            .collect();
        let a = explainer.attribute(&rows[0]).unwrap();
        for feature in unused {
            assert_eq!(a.values[feature.index()], 0.0);
        }
    }

    #[test]
    fn test_pairing() {
        let (model, rows) = fitted();
        let (other, _) = fitted();
        let explainer = Explainer::calibrate(&model, &rows[..20]).unwrap();
        assert!(explainer.ensure_pairs_with(&model).is_ok());
        assert!(matches!(
            explainer.ensure_pairs_with(&other),
            Err(Error::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_rejects_bad_input() {
        let (model, rows) = fitted();
        assert!(Explainer::calibrate(&model, &[]).is_err());
        let explainer = Explainer::calibrate(&model, &rows[..20]).unwrap();
        let bad = FeatureVector::zeros().with(Feature::Age, f64::NAN);
        assert!(matches!(
            explainer.attribute(&bad),
            Err(Error::InvalidFeatureValue { .. })
        ));
    }
}
