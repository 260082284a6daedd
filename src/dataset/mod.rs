//! Dataset Module
//!
//! Training-side data handling:
//! - Labeled feature datasets and JSON-lines corpus loading
//! - Offline cleaning (imputation, de-duplication, outlier capping)
//! - Stratified splitting and deterministic sampling
//! - Synthetic applicant data for tests and benchmarks

pub mod cleaning;
pub mod labeled;
pub mod split;
pub mod synthetic;

pub use cleaning::{CleaningReport, DatasetCleaner};
pub use labeled::{load_jsonl, map_target, parse_jsonl, LabelCounts, LabeledDataset, LabeledRecord, LoadedCorpus};
pub use split::{deterministic_sample, stratified_split, SplitIndices};
