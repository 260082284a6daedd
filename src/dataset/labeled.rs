//! Labeled training data and the JSON-lines corpus loader.

use crate::core::{Error, Result};
use crate::features::{FeatureEngineer, FeatureVector, RawApplication};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// A raw record with its (possibly unmapped) target.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LabeledRecord {
    /// Raw applicant fields
    pub raw: RawApplication,
    /// Binary default label (1 = default)
    pub label: u8,
}

/// Positive/negative label counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCounts {
    /// Non-default rows
    pub negatives: usize,
    /// Default rows
    pub positives: usize,
}

impl LabelCounts {
    /// Count labels.
    pub fn from_labels(labels: &[u8]) -> Self {
        let positives = labels.iter().filter(|&&l| l == 1).count();
        Self {
            negatives: labels.len() - positives,
            positives,
        }
    }

    /// Total rows.
    pub fn total(&self) -> usize {
        self.negatives + self.positives
    }

    /// Fraction of positive rows.
    pub fn positive_rate(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            self.positives as f64 / self.total() as f64
        }
    }

    /// Whether both classes are present.
    pub fn has_both_classes(&self) -> bool {
        self.negatives > 0 && self.positives > 0
    }
}

/// Schema-conformant feature rows with binary labels.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LabeledDataset {
    rows: Vec<FeatureVector>,
    labels: Vec<u8>,
}

impl LabeledDataset {
    /// Create a dataset; rows and labels must align and labels must be 0/1.
    pub fn new(rows: Vec<FeatureVector>, labels: Vec<u8>) -> Result<Self> {
        if rows.len() != labels.len() {
            return Err(Error::InvalidDataset(format!(
                "{} rows but {} labels",
                rows.len(),
                labels.len()
            )));
        }
        if let Some(bad) = labels.iter().find(|&&l| l > 1) {
            return Err(Error::InvalidDataset(format!("label {} is not binary", bad)));
        }
        Ok(Self { rows, labels })
    }

    /// Derive features for every record.
    pub fn from_records(records: &[LabeledRecord], engineer: &FeatureEngineer) -> Result<Self> {
        let rows = records.iter().map(|r| engineer.derive(&r.raw)).collect();
        let labels = records.iter().map(|r| r.label).collect();
        Self::new(rows, labels)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Feature rows.
    pub fn rows(&self) -> &[FeatureVector] {
        &self.rows
    }

    /// Labels.
    pub fn labels(&self) -> &[u8] {
        &self.labels
    }

    /// Label counts.
    pub fn label_counts(&self) -> LabelCounts {
        LabelCounts::from_labels(&self.labels)
    }

    /// Rows at the given indices, in that order.
    pub fn subset(&self, indices: &[usize]) -> Self {
        Self {
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }
}

/// Map the corpus target encoding onto a binary label.
///
/// The corpus stores non-defaults as `0.0` or `0.21` and defaults as `1.0`.
pub fn map_target(value: f64) -> Option<u8> {
    const TOLERANCE: f64 = 1e-9;
    if (value - 0.0).abs() < TOLERANCE || (value - 0.21).abs() < TOLERANCE {
        Some(0)
    } else if (value - 1.0).abs() < TOLERANCE {
        Some(1)
    } else {
        None
    }
}

/// Outcome of reading a corpus.
#[derive(Clone, Debug, Default)]
pub struct LoadedCorpus {
    /// Usable records
    pub records: Vec<LabeledRecord>,
    /// Rows dropped because the target was absent or unmapped
    pub dropped_rows: usize,
}

/// Parse JSON-lines text into labeled records.
pub fn parse_jsonl(text: &str, target_column: &str) -> Result<LoadedCorpus> {
    let mut corpus = LoadedCorpus::default();

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: serde_json::Value = serde_json::from_str(line).map_err(|e| {
            Error::InvalidDataset(format!("line {}: {}", line_no + 1, e))
        })?;
        let mut raw = RawApplication::from_json(&value)?;

        match raw.take(target_column).and_then(map_target) {
            Some(label) => corpus.records.push(LabeledRecord { raw, label }),
            None => corpus.dropped_rows += 1,
        }
    }

    if corpus.dropped_rows > 0 {
        warn!(
            dropped = corpus.dropped_rows,
            target = target_column,
            "dropped rows with missing or unmapped target"
        );
    }
    Ok(corpus)
}

/// Load a JSON-lines corpus from disk.
pub async fn load_jsonl(path: impl AsRef<Path>, target_column: &str) -> Result<LoadedCorpus> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::InvalidDataset(format!(
            "data file not found: {}",
            path.display()
        )));
    }
    let text = tokio::fs::read_to_string(path).await?;
    let corpus = parse_jsonl(&text, target_column)?;
    info!(
        path = %path.display(),
        rows = corpus.records.len(),
        "loaded training corpus"
    );
    Ok(corpus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::Feature;

    #[test]
    fn test_map_target() {
        assert_eq!(map_target(0.0), Some(0));
        assert_eq!(map_target(0.21), Some(0));
        assert_eq!(map_target(1.0), Some(1));
        assert_eq!(map_target(0.5), None);
    }

    #[test]
    fn test_parse_jsonl() {
        let text = r#"
{"person_income": 50000, "loan_amnt": 15000, "target": 1.0}
{"person_income": 42000, "loan_amnt": 5000, "target": 0.21}
{"person_income": 30000, "loan_amnt": 9000, "target": 0.7}
{"person_income": 30000, "loan_amnt": 9000}
"#;
        let corpus = parse_jsonl(text, "target").unwrap();
        assert_eq!(corpus.records.len(), 2);
        assert_eq!(corpus.dropped_rows, 2);
        assert_eq!(corpus.records[0].label, 1);
        assert_eq!(corpus.records[1].label, 0);
        assert!(!corpus.records[0].raw.has("target"));
    }

    #[test]
    fn test_parse_jsonl_reports_bad_line() {
        let err = parse_jsonl("{\"a\": 1, \"target\": 0}\n{oops", "target").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_dataset_rejects_misaligned() {
        assert!(LabeledDataset::new(vec![FeatureVector::zeros()], vec![]).is_err());
        assert!(LabeledDataset::new(vec![FeatureVector::zeros()], vec![2]).is_err());
    }

    #[test]
    fn test_from_records_and_subset() {
        let records = vec![
            LabeledRecord {
                raw: RawApplication::new().with("person_income", 50000.0).with("loan_amnt", 15000.0),
                label: 1,
            },
            LabeledRecord {
                raw: RawApplication::new().with("age", 40.0),
                label: 0,
            },
        ];
        let ds = LabeledDataset::from_records(&records, &FeatureEngineer::new()).unwrap();
        assert_eq!(ds.len(), 2);
        assert!((ds.rows()[0].get(Feature::LoanPercentIncome) - 0.3).abs() < 1e-12);

        let sub = ds.subset(&[1]);
        assert_eq!(sub.labels(), &[0]);
        assert_eq!(sub.rows()[0].get(Feature::Age), 40.0);

        let counts = ds.label_counts();
        assert_eq!(counts.positives, 1);
        assert!(counts.has_both_classes());
        assert!((counts.positive_rate() - 0.5).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let result = load_jsonl("/nonexistent/corpus.jsonl", "target").await;
        assert!(matches!(result, Err(Error::InvalidDataset(_))));
    }
}
