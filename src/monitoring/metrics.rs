//! In-process scoring metrics.
//!
//! Lock-free counters and a latency histogram shared by the gateway and the
//! explanation engine.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// A counter metric (monotonically increasing).
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment by 1.
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment by amount.
    pub fn add(&self, amount: u64) {
        self.value.fetch_add(amount, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Latency distribution in seconds, cumulative buckets.
#[derive(Debug)]
pub struct Histogram {
    buckets: Vec<f64>,
    bucket_counts: Vec<AtomicU64>,
    /// Sum in microseconds, so it can live in an integer atomic
    sum_micros: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    /// Buckets from 100µs to 1s.
    pub fn new() -> Self {
        Self::with_buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0])
    }

    pub fn with_buckets(buckets: Vec<f64>) -> Self {
        let bucket_counts = buckets.iter().map(|_| AtomicU64::new(0)).collect();
        Self {
            buckets,
            bucket_counts,
            sum_micros: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Record one duration.
    pub fn observe(&self, elapsed: Duration) {
        let secs = elapsed.as_secs_f64();
        for (bound, count) in self.buckets.iter().zip(&self.bucket_counts) {
            if secs <= *bound {
                count.fetch_add(1, Ordering::Relaxed);
            }
        }
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.sum_micros.fetch_add(micros, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Sum of observations in seconds.
    pub fn sum(&self) -> f64 {
        self.sum_micros.load(Ordering::Relaxed) as f64 / 1e6
    }

    pub fn mean(&self) -> f64 {
        match self.count() {
            0 => 0.0,
            n => self.sum() / n as f64,
        }
    }

    /// `(upper bound, cumulative count)` pairs.
    pub fn buckets(&self) -> Vec<(f64, u64)> {
        self.buckets
            .iter()
            .zip(&self.bucket_counts)
            .map(|(b, c)| (*b, c.load(Ordering::Relaxed)))
            .collect()
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

/// Counters for the serving path.
#[derive(Debug, Default)]
pub struct ScoringMetrics {
    pub predictions: Counter,
    pub explanations: Counter,
    /// Batch items replaced by an error marker
    pub batch_failures: Counter,
    pub prediction_latency: Histogram,
    pub explanation_latency: Histogram,
}

/// Point-in-time copy of [`ScoringMetrics`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub predictions: u64,
    pub explanations: u64,
    pub batch_failures: u64,
    pub mean_prediction_latency_secs: f64,
    pub mean_explanation_latency_secs: f64,
}

impl ScoringMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            predictions: self.predictions.get(),
            explanations: self.explanations.get(),
            batch_failures: self.batch_failures.get(),
            mean_prediction_latency_secs: self.prediction_latency.mean(),
            mean_explanation_latency_secs: self.explanation_latency.mean(),
        }
    }

    /// Prometheus text exposition.
    pub fn export_prometheus(&self) -> String {
        let mut out = String::new();
        for (name, help, value) in [
            ("kredai_predictions_total", "Predictions served", self.predictions.get()),
            ("kredai_explanations_total", "Explanations served", self.explanations.get()),
            (
                "kredai_batch_item_failures_total",
                "Batch items replaced by an error marker",
                self.batch_failures.get(),
            ),
        ] {
            out.push_str(&format!("# HELP {} {}\n# TYPE {} counter\n{} {}\n", name, help, name, name, value));
        }
        for (name, hist) in [
            ("kredai_prediction_latency_seconds", &self.prediction_latency),
            ("kredai_explanation_latency_seconds", &self.explanation_latency),
        ] {
            out.push_str(&format!("# TYPE {} histogram\n", name));
            for (bound, count) in hist.buckets() {
                out.push_str(&format!("{}_bucket{{le=\"{}\"}} {}\n", name, bound, count));
            }
            out.push_str(&format!("{}_bucket{{le=\"+Inf\"}} {}\n", name, hist.count()));
            out.push_str(&format!("{}_sum {}\n{}_count {}\n", name, hist.sum(), name, hist.count()));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter() {
        let c = Counter::new();
        c.inc();
        c.add(4);
        assert_eq!(c.get(), 5);
    }

    #[test]
    fn test_histogram() {
        let h = Histogram::with_buckets(vec![0.001, 0.01]);
        h.observe(Duration::from_micros(500));
        h.observe(Duration::from_millis(5));
        h.observe(Duration::from_millis(50));
        assert_eq!(h.count(), 3);
        assert_eq!(h.buckets(), vec![(0.001, 1), (0.01, 2)]);
        assert!((h.sum() - 0.0555).abs() < 1e-9);
    }

    #[test]
    fn test_snapshot_and_export() {
        let m = ScoringMetrics::new();
        m.predictions.add(3);
        m.batch_failures.inc();
        m.prediction_latency.observe(Duration::from_millis(2));

        let snap = m.snapshot();
        assert_eq!(snap.predictions, 3);
        assert_eq!(snap.batch_failures, 1);
        assert!((snap.mean_prediction_latency_secs - 0.002).abs() < 1e-9);

        let text = m.export_prometheus();
        assert!(text.contains("kredai_predictions_total 3"));
        assert!(text.contains("kredai_prediction_latency_seconds_count 1"));
    }
}
