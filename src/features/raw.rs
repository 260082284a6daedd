//! Raw applicant records as they arrive from collaborators or the training corpus.

use crate::core::{Error, Result};
use crate::features::schema::Feature;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A raw applicant record: declared and alternative-data fields.
///
/// Numeric and boolean JSON values land in `numeric` (booleans as 0/1),
/// strings land in `categorical`, and `null` means the field is absent.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawApplication {
    /// Numeric fields
    pub numeric: BTreeMap<String, f64>,
    /// Categorical fields (e.g. loan intent)
    pub categorical: BTreeMap<String, String>,
}

impl RawApplication {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style numeric field.
    pub fn with(mut self, key: &str, value: f64) -> Self {
        self.numeric.insert(key.to_string(), value);
        self
    }

    /// Builder-style categorical field.
    pub fn with_category(mut self, key: &str, value: &str) -> Self {
        self.categorical.insert(key.to_string(), value.to_string());
        self
    }

    /// Parse a JSON object.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| Error::InvalidDataset("application record must be a JSON object".into()))?;

        let mut record = Self::new();
        for (key, field) in object {
            match field {
                serde_json::Value::Number(n) => {
                    if let Some(v) = n.as_f64() {
                        record.numeric.insert(key.clone(), v);
                    }
                }
                serde_json::Value::Bool(b) => {
                    record.numeric.insert(key.clone(), if *b { 1.0 } else { 0.0 });
                }
                serde_json::Value::String(s) => {
                    record.categorical.insert(key.clone(), s.clone());
                }
                _ => {}
            }
        }
        Ok(record)
    }

    /// Parse a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_json(&value)
    }

    /// Finite numeric value of a field, if present.
    pub fn get(&self, key: &str) -> Option<f64> {
        self.numeric.get(key).copied().filter(|v| v.is_finite())
    }

    /// Finite numeric value of a canonical feature, if present.
    pub fn feature(&self, feature: Feature) -> Option<f64> {
        self.get(feature.name())
    }

    /// Value of a field, defaulting to 0 when absent.
    pub fn get_or_zero(&self, key: &str) -> f64 {
        self.get(key).unwrap_or(0.0)
    }

    /// Whether the field is present with a finite value.
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Remove a numeric field, returning it.
    pub fn take(&mut self, key: &str) -> Option<f64> {
        self.numeric.remove(key)
    }
}
