//! Offline cleaning of the training corpus.
//!
//! Median/mode imputation, duplicate removal and IQR outlier capping run once
//! over the whole corpus before training. They are never applied to a single
//! inference request, which uses direct default-filling instead.

use crate::dataset::labeled::LabeledRecord;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::info;

/// Columns whose outliers are capped.
pub const OUTLIER_COLUMNS: [&str; 3] = ["person_income", "loan_amnt", "loan_int_rate"];

/// IQR multiplier for the capping fences.
pub const IQR_MULTIPLIER: f64 = 1.5;

/// Summary of what cleaning changed.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CleaningReport {
    /// Rows received
    pub rows_in: usize,
    /// Rows kept
    pub rows_out: usize,
    /// Numeric cells filled per column, with the median used
    pub numeric_imputed: BTreeMap<String, (usize, f64)>,
    /// Categorical cells filled per column, with the mode used
    pub categorical_imputed: BTreeMap<String, (usize, String)>,
    /// Exact duplicates removed
    pub duplicates_removed: usize,
    /// Values capped per column
    pub outliers_capped: BTreeMap<String, usize>,
}

/// Offline dataset cleaner.
#[derive(Clone, Debug)]
pub struct DatasetCleaner {
    outlier_columns: Vec<String>,
}

impl DatasetCleaner {
    /// Create a cleaner with the default outlier columns.
    pub fn new() -> Self {
        Self {
            outlier_columns: OUTLIER_COLUMNS.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Override the columns whose outliers are capped.
    pub fn with_outlier_columns(mut self, columns: &[&str]) -> Self {
        self.outlier_columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Clean a corpus.
    pub fn clean(&self, records: Vec<LabeledRecord>) -> (Vec<LabeledRecord>, CleaningReport) {
        let mut report = CleaningReport {
            rows_in: records.len(),
            ..Default::default()
        };
        let mut records = records;

        self.impute_numeric(&mut records, &mut report);
        self.impute_categorical(&mut records, &mut report);
        records = self.drop_duplicates(records, &mut report);
        self.cap_outliers(&mut records, &mut report);

        report.rows_out = records.len();
        info!(
            rows_in = report.rows_in,
            rows_out = report.rows_out,
            duplicates = report.duplicates_removed,
            "data cleaning completed"
        );
        (records, report)
    }

    fn impute_numeric(&self, records: &mut [LabeledRecord], report: &mut CleaningReport) {
        let columns: BTreeSet<String> = records
            .iter()
            .flat_map(|r| r.raw.numeric.keys().cloned())
            .collect();

        for column in columns {
            let mut present: Vec<f64> = records.iter().filter_map(|r| r.raw.get(&column)).collect();
            if present.len() == records.len() || present.is_empty() {
                continue;
            }
            present.sort_by(|a, b| a.total_cmp(b));
            let median = quantile(&present, 0.5);

            let mut filled = 0;
            for record in records.iter_mut() {
                if !record.raw.has(&column) {
                    record.raw.numeric.insert(column.clone(), median);
                    filled += 1;
                }
            }
            info!(column = %column, filled, median, "filled missing numeric values with median");
            report.numeric_imputed.insert(column, (filled, median));
        }
    }

    fn impute_categorical(&self, records: &mut [LabeledRecord], report: &mut CleaningReport) {
        let columns: BTreeSet<String> = records
            .iter()
            .flat_map(|r| r.raw.categorical.keys().cloned())
            .collect();

        for column in columns {
            let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
            for record in records.iter() {
                if let Some(v) = record.raw.categorical.get(&column) {
                    *counts.entry(v.as_str()).or_insert(0) += 1;
                }
            }
            let total: usize = counts.values().sum();
            if total == records.len() {
                continue;
            }
            // BTreeMap iteration makes ties resolve to the smallest value.
            let mode = counts
                .iter()
                .fold(None::<(&str, usize)>, |best, (&v, &c)| match best {
                    Some((_, bc)) if bc >= c => best,
                    _ => Some((v, c)),
                })
                .map(|(v, _)| v.to_string())
                .unwrap_or_else(|| "Unknown".to_string());

            let mut filled = 0;
            for record in records.iter_mut() {
                if !record.raw.categorical.contains_key(&column) {
                    record.raw.categorical.insert(column.clone(), mode.clone());
                    filled += 1;
                }
            }
            info!(column = %column, filled, mode = %mode, "filled missing categorical values with mode");
            report.categorical_imputed.insert(column, (filled, mode));
        }
    }

    fn drop_duplicates(
        &self,
        records: Vec<LabeledRecord>,
        report: &mut CleaningReport,
    ) -> Vec<LabeledRecord> {
        let mut seen = HashSet::new();
        let before = records.len();
        let kept: Vec<LabeledRecord> = records
            .into_iter()
            .filter(|r| seen.insert(serde_json::to_string(r).unwrap_or_default()))
            .collect();
        report.duplicates_removed = before - kept.len();
        if report.duplicates_removed > 0 {
            info!(removed = report.duplicates_removed, "removed duplicate rows");
        }
        kept
    }

    fn cap_outliers(&self, records: &mut [LabeledRecord], report: &mut CleaningReport) {
        for column in &self.outlier_columns {
            let mut values: Vec<f64> = records.iter().filter_map(|r| r.raw.get(column)).collect();
            if values.len() < 4 {
                continue;
            }
            values.sort_by(|a, b| a.total_cmp(b));
            let (lower, upper) = iqr_fences(&values);

            let mut capped = 0;
            for record in records.iter_mut() {
                if let Some(v) = record.raw.get(column) {
                    let clipped = v.clamp(lower, upper);
                    if clipped != v {
                        record.raw.numeric.insert(column.clone(), clipped);
                        capped += 1;
                    }
                }
            }
            if capped > 0 {
                info!(column = %column, capped, lower, upper, "capped outliers");
                report.outliers_capped.insert(column.clone(), capped);
            }
        }
    }
}

impl Default for DatasetCleaner {
    fn default() -> Self {
        Self::new()
    }
}

/// Linear-interpolated quantile of sorted values.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Lower and upper IQR capping fences of sorted values.
pub fn iqr_fences(sorted: &[f64]) -> (f64, f64) {
    let q1 = quantile(sorted, 0.25);
    let q3 = quantile(sorted, 0.75);
    let iqr = q3 - q1;
    (q1 - IQR_MULTIPLIER * iqr, q3 + IQR_MULTIPLIER * iqr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::RawApplication;

    fn record(raw: RawApplication, label: u8) -> LabeledRecord {
        LabeledRecord { raw, label }
    }

    #[test]
    fn test_quantile() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&v, 0.5), 2.5);
        assert_eq!(quantile(&v, 0.0), 1.0);
        assert_eq!(quantile(&v, 1.0), 4.0);
        assert_eq!(quantile(&[], 0.5), 0.0);
    }

    #[test]
    fn test_median_imputation() {
        let records = vec![
            record(RawApplication::new().with("age", 20.0), 0),
            record(RawApplication::new().with("age", 40.0), 1),
            record(RawApplication::new().with("age", 30.0), 0),
            record(RawApplication::new().with("loan_amnt", 100.0), 0),
        ];
        let (cleaned, report) = DatasetCleaner::new().with_outlier_columns(&[]).clean(records);
        assert_eq!(cleaned[3].raw.get("age"), Some(30.0));
        assert_eq!(report.numeric_imputed.get("age"), Some(&(1, 30.0)));
        // loan_amnt present in one row: the three others get its median
        assert_eq!(report.numeric_imputed.get("loan_amnt"), Some(&(3, 100.0)));
    }

    #[test]
    fn test_mode_imputation() {
        let records = vec![
            record(RawApplication::new().with_category("loan_intent", "medical"), 0),
            record(RawApplication::new().with_category("loan_intent", "education"), 0),
            record(RawApplication::new().with_category("loan_intent", "medical"), 1),
            record(RawApplication::new().with("age", 1.0), 1),
        ];
        let (cleaned, report) = DatasetCleaner::new().clean(records);
        assert_eq!(
            cleaned[3].raw.categorical.get("loan_intent").map(String::as_str),
            Some("medical")
        );
        assert_eq!(report.categorical_imputed["loan_intent"].0, 1);
    }

    #[test]
    fn test_duplicates_removed() {
        let r = record(RawApplication::new().with("age", 30.0), 0);
        let (cleaned, report) = DatasetCleaner::new().clean(vec![r.clone(), r.clone(), r]);
        assert_eq!(cleaned.len(), 1);
        assert_eq!(report.duplicates_removed, 2);
        assert_eq!(report.rows_in, 3);
        assert_eq!(report.rows_out, 1);
    }

    #[test]
    fn test_outliers_capped() {
        let mut records: Vec<LabeledRecord> = (0..9)
            .map(|i| record(RawApplication::new().with("person_income", 40000.0 + i as f64 * 1000.0), 0))
            .collect();
        records.push(record(RawApplication::new().with("person_income", 10_000_000.0), 1));

        let (cleaned, report) = DatasetCleaner::new().clean(records);
        assert_eq!(report.outliers_capped.get("person_income"), Some(&1));
        let capped = cleaned[9].raw.get("person_income").unwrap();
        assert!(capped < 10_000_000.0);
        assert!(capped > 48000.0);
    }
}
