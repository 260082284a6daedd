//! Non-IID analysis of client shards.
//!
//! Reports how far each shard's label mix drifts from the pooled dataset.

use crate::dataset::LabeledDataset;
use crate::features::FEATURE_COUNT;
use serde::{Deserialize, Serialize};

/// Drift below which a shard counts as IID-like.
pub const IID_DRIFT_THRESHOLD: f64 = 0.1;

/// Label and feature statistics of one shard.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DataDistribution {
    /// Number of samples
    pub sample_count: usize,
    /// Default rows
    pub positives: usize,
    /// Non-default rows
    pub negatives: usize,
    /// Share of default rows
    pub positive_rate: f64,
    /// Class imbalance: (majority - minority) / majority, 0 = balanced
    pub skewness: f64,
    /// Absolute gap between this shard's and the pooled positive rate
    pub drift: f64,
    /// Per-feature means in schema order
    pub feature_means: Vec<f64>,
}

impl DataDistribution {
    /// Whether the shard's label mix stays close to the pooled one.
    pub fn is_iid_like(&self) -> bool {
        self.drift < IID_DRIFT_THRESHOLD
    }
}

/// Heterogeneity across all shards of a run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HeterogeneityReport {
    /// Largest minus smallest shard positive rate
    pub positive_rate_spread: f64,
    /// Mean class imbalance
    pub mean_skewness: f64,
    /// Largest drift from the pooled rate
    pub max_drift: f64,
    /// Shards whose drift stays under the threshold
    pub iid_like_shards: usize,
}

/// Computes shard distributions against a pooled reference rate.
#[derive(Clone, Debug)]
pub struct NonIIDAnalyzer {
    reference_rate: f64,
}

impl NonIIDAnalyzer {
    /// Create an analyzer for a pooled positive rate.
    pub fn new(reference_rate: f64) -> Self {
        Self { reference_rate }
    }

    /// Analyze one shard's rows.
    pub fn analyze(&self, data: &LabeledDataset) -> DataDistribution {
        if data.is_empty() {
            return DataDistribution {
                feature_means: vec![0.0; FEATURE_COUNT],
                ..Default::default()
            };
        }

        let counts = data.label_counts();
        let majority = counts.positives.max(counts.negatives) as f64;
        let minority = counts.positives.min(counts.negatives) as f64;

        let n = data.len() as f64;
        let mut feature_means = vec![0.0; FEATURE_COUNT];
        for row in data.rows() {
            for (mean, v) in feature_means.iter_mut().zip(row.as_slice()) {
                *mean += v / n;
            }
        }

        DataDistribution {
            sample_count: data.len(),
            positives: counts.positives,
            negatives: counts.negatives,
            positive_rate: counts.positive_rate(),
            skewness: (majority - minority) / majority,
            drift: (counts.positive_rate() - self.reference_rate).abs(),
            feature_means,
        }
    }

    /// Summarize heterogeneity across shards.
    pub fn summarize(distributions: &[DataDistribution]) -> HeterogeneityReport {
        if distributions.is_empty() {
            return HeterogeneityReport::default();
        }
        let rates = distributions.iter().map(|d| d.positive_rate);
        let max_rate = rates.clone().fold(f64::MIN, f64::max);
        let min_rate = rates.fold(f64::MAX, f64::min);

        HeterogeneityReport {
            positive_rate_spread: max_rate - min_rate,
            mean_skewness: distributions.iter().map(|d| d.skewness).sum::<f64>()
                / distributions.len() as f64,
            max_drift: distributions.iter().map(|d| d.drift).fold(0.0, f64::max),
            iid_like_shards: distributions.iter().filter(|d| d.is_iid_like()).count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{Feature, FeatureVector};

    fn dataset(labels: Vec<u8>) -> LabeledDataset {
        let rows = labels
            .iter()
            .map(|&l| FeatureVector::zeros().with(Feature::LatePayments12m, l as f64 * 4.0))
            .collect();
        LabeledDataset::new(rows, labels).unwrap()
    }

    #[test]
    fn test_analyze_counts_and_skew() {
        let analyzer = NonIIDAnalyzer::new(0.5);
        let dist = analyzer.analyze(&dataset(vec![1, 0, 0, 0]));
        assert_eq!(dist.sample_count, 4);
        assert_eq!(dist.positives, 1);
        assert_eq!(dist.negatives, 3);
        assert!((dist.skewness - 2.0 / 3.0).abs() < 1e-12);
        assert!((dist.drift - 0.25).abs() < 1e-12);
        assert!(!dist.is_iid_like());
        assert_eq!(dist.feature_means[Feature::LatePayments12m.index()], 1.0);
    }

    #[test]
    fn test_balanced_shard_is_iid_like() {
        let dist = NonIIDAnalyzer::new(0.5).analyze(&dataset(vec![1, 0, 1, 0]));
        assert_eq!(dist.skewness, 0.0);
        assert!(dist.is_iid_like());
    }

    #[test]
    fn test_empty_shard() {
        let dist = NonIIDAnalyzer::new(0.2).analyze(&LabeledDataset::default());
        assert_eq!(dist.sample_count, 0);
        assert_eq!(dist.feature_means.len(), FEATURE_COUNT);
    }

    #[test]
    fn test_summarize() {
        let analyzer = NonIIDAnalyzer::new(0.5);
        let dists = vec![
            analyzer.analyze(&dataset(vec![1, 0, 1, 0])),
            analyzer.analyze(&dataset(vec![1, 1, 1, 0])),
        ];
        let report = NonIIDAnalyzer::summarize(&dists);
        assert!((report.positive_rate_spread - 0.25).abs() < 1e-12);
        assert!((report.max_drift - 0.25).abs() < 1e-12);
        assert_eq!(report.iid_like_shards, 1);
    }
}
