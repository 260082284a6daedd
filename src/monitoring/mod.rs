//! Monitoring Module
//!
//! Observability for the scoring service:
//! - Tracing subscriber setup
//! - Scoring counters and latency histograms

pub mod logging;
pub mod metrics;

pub use logging::{env_filter, init_logging};
pub use metrics::{Counter, Histogram, MetricsSnapshot, ScoringMetrics};
