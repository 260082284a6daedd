//! Binary classification metrics.

use serde::{Deserialize, Serialize};

/// Decision threshold used when turning probabilities into labels.
pub const CLASSIFICATION_THRESHOLD: f64 = 0.5;

/// Fraction of matching labels.
pub fn accuracy(labels: &[u8], predicted: &[u8]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let hits = labels.iter().zip(predicted).filter(|(a, b)| a == b).count();
    hits as f64 / labels.len() as f64
}

/// Area under the ROC curve via the rank-sum statistic.
///
/// Tied scores share their average rank. Returns `None` when only one class
/// is present.
pub fn roc_auc(labels: &[u8], scores: &[f64]) -> Option<f64> {
    let n_pos = labels.iter().filter(|&&l| l == 1).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut ranks = vec![0.0; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // ranks are 1-based
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for &k in &order[i..=j] {
            ranks[k] = avg;
        }
        i = j + 1;
    }

    let pos_rank_sum: f64 = labels
        .iter()
        .zip(&ranks)
        .filter(|&(&l, _)| l == 1)
        .map(|(_, r)| r)
        .sum();
    let u = pos_rank_sum - (n_pos * (n_pos + 1)) as f64 / 2.0;
    Some(u / (n_pos * n_neg) as f64)
}

/// Precision, recall and F1 for one class.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Per-class report for a binary classifier.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    /// Non-default class
    pub negative: ClassMetrics,
    /// Default class
    pub positive: ClassMetrics,
    pub accuracy: f64,
}

impl ClassificationReport {
    /// Build from true and predicted labels.
    pub fn new(labels: &[u8], predicted: &[u8]) -> Self {
        Self {
            negative: class_metrics(labels, predicted, 0),
            positive: class_metrics(labels, predicted, 1),
            accuracy: accuracy(labels, predicted),
        }
    }
}

fn class_metrics(labels: &[u8], predicted: &[u8], class: u8) -> ClassMetrics {
    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut fn_ = 0usize;
    for (&y, &p) in labels.iter().zip(predicted) {
        match (y == class, p == class) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
            _ => {}
        }
    }
    let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    let f1 = if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    };
    ClassMetrics {
        precision,
        recall,
        f1,
        support: tp + fn_,
    }
}

/// Held-out evaluation of a fitted classifier.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub accuracy: f64,
    /// `None` when the evaluation rows hold a single class
    pub auc: Option<f64>,
    pub train_samples: usize,
    pub val_samples: usize,
}

impl EvaluationMetrics {
    /// Compute from labels and predicted positive-class probabilities.
    pub fn from_probabilities(
        labels: &[u8],
        probabilities: &[f64],
        train_samples: usize,
    ) -> Self {
        let predicted = threshold_labels(probabilities);
        Self {
            accuracy: accuracy(labels, &predicted),
            auc: roc_auc(labels, probabilities),
            train_samples,
            val_samples: labels.len(),
        }
    }
}

/// Label each probability with the default threshold.
pub fn threshold_labels(probabilities: &[f64]) -> Vec<u8> {
    probabilities
        .iter()
        .map(|&p| u8::from(p > CLASSIFICATION_THRESHOLD))
        .collect()
}
