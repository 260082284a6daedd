//! Canonical feature schema and the fixed-size feature vector.
//!
//! The model is trained and queried on exactly these 27 features in exactly
//! this order. Any artifact produced from the schema carries a
//! [`SchemaBinding`] so that a mismatched pairing is caught at load time.

use crate::core::{Error, Hash256, Result};
use serde::{Deserialize, Serialize};

/// Number of canonical features.
pub const FEATURE_COUNT: usize = 27;

/// Version tag of the canonical schema.
pub const SCHEMA_VERSION: &str = "kredai-features/1";

/// A canonical model feature.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    PersonIncome,
    PersonEmpLength,
    LoanAmnt,
    LoanIntRate,
    LoanPercentIncome,
    CbPersonCredHistLength,
    Age,
    EstimatedMonthlyIncome,
    MonthlyAirtimeSpend,
    MonthlyDataUsageGb,
    AvgCallsPerDay,
    AvgSmsPerDay,
    DigitalWalletUsage,
    MonthlyDigitalTransactions,
    AvgTransactionAmount,
    SocialMediaActivityScore,
    MobileBankingUser,
    DigitalEngagementScore,
    FinancialInclusionScore,
    ElectricityBillAvg,
    WaterBillAvg,
    GasBillAvg,
    TotalUtilityExpense,
    UtilityToIncomeRatio,
    #[serde(rename = "on_time_payments_12m")]
    OnTimePayments12m,
    #[serde(rename = "late_payments_12m")]
    LatePayments12m,
    CreditRiskScore,
}

impl Feature {
    /// All features in model order.
    pub const ALL: [Feature; FEATURE_COUNT] = [
        Feature::PersonIncome,
        Feature::PersonEmpLength,
        Feature::LoanAmnt,
        Feature::LoanIntRate,
        Feature::LoanPercentIncome,
        Feature::CbPersonCredHistLength,
        Feature::Age,
        Feature::EstimatedMonthlyIncome,
        Feature::MonthlyAirtimeSpend,
        Feature::MonthlyDataUsageGb,
        Feature::AvgCallsPerDay,
        Feature::AvgSmsPerDay,
        Feature::DigitalWalletUsage,
        Feature::MonthlyDigitalTransactions,
        Feature::AvgTransactionAmount,
        Feature::SocialMediaActivityScore,
        Feature::MobileBankingUser,
        Feature::DigitalEngagementScore,
        Feature::FinancialInclusionScore,
        Feature::ElectricityBillAvg,
        Feature::WaterBillAvg,
        Feature::GasBillAvg,
        Feature::TotalUtilityExpense,
        Feature::UtilityToIncomeRatio,
        Feature::OnTimePayments12m,
        Feature::LatePayments12m,
        Feature::CreditRiskScore,
    ];

    /// Column name used in raw records and reports.
    pub fn name(self) -> &'static str {
        match self {
            Feature::PersonIncome => "person_income",
            Feature::PersonEmpLength => "person_emp_length",
            Feature::LoanAmnt => "loan_amnt",
            Feature::LoanIntRate => "loan_int_rate",
            Feature::LoanPercentIncome => "loan_percent_income",
            Feature::CbPersonCredHistLength => "cb_person_cred_hist_length",
            Feature::Age => "age",
            Feature::EstimatedMonthlyIncome => "estimated_monthly_income",
            Feature::MonthlyAirtimeSpend => "monthly_airtime_spend",
            Feature::MonthlyDataUsageGb => "monthly_data_usage_gb",
            Feature::AvgCallsPerDay => "avg_calls_per_day",
            Feature::AvgSmsPerDay => "avg_sms_per_day",
            Feature::DigitalWalletUsage => "digital_wallet_usage",
            Feature::MonthlyDigitalTransactions => "monthly_digital_transactions",
            Feature::AvgTransactionAmount => "avg_transaction_amount",
            Feature::SocialMediaActivityScore => "social_media_activity_score",
            Feature::MobileBankingUser => "mobile_banking_user",
            Feature::DigitalEngagementScore => "digital_engagement_score",
            Feature::FinancialInclusionScore => "financial_inclusion_score",
            Feature::ElectricityBillAvg => "electricity_bill_avg",
            Feature::WaterBillAvg => "water_bill_avg",
            Feature::GasBillAvg => "gas_bill_avg",
            Feature::TotalUtilityExpense => "total_utility_expense",
            Feature::UtilityToIncomeRatio => "utility_to_income_ratio",
            Feature::OnTimePayments12m => "on_time_payments_12m",
            Feature::LatePayments12m => "late_payments_12m",
            Feature::CreditRiskScore => "credit_risk_score",
        }
    }

    /// Position of the feature in the model's input.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Look a feature up by its column name.
    #[cfg(test)]
    pub fn from_name(name: &str) -> Option<Feature> {
        Feature::ALL.iter().copied().find(|f| f.name() == name)
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Identifies the schema an artifact was produced against.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaBinding {
    /// Schema version tag
    pub version: String,
    /// Hash over the ordered feature names
    pub fingerprint: Hash256,
}

impl SchemaBinding {
    /// Check that another binding refers to the same schema.
    pub fn ensure_matches(&self, other: &SchemaBinding) -> Result<()> {
        if self != other {
            return Err(Error::SchemaMismatch {
                expected: self.to_string(),
                found: other.to_string(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for SchemaBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.version, self.fingerprint.short())
    }
}

/// The process-wide, read-only feature schema.
#[derive(Clone, Copy, Debug, Default)]
pub struct FeatureSchema;

impl FeatureSchema {
    /// Ordered feature names.
    pub fn names() -> Vec<&'static str> {
        Feature::ALL.iter().map(|f| f.name()).collect()
    }

    /// Binding for the schema compiled into this build.
    pub fn binding() -> SchemaBinding {
        SchemaBinding {
            version: SCHEMA_VERSION.to_string(),
            fingerprint: Hash256::digest(Self::names().join(",").as_bytes()),
        }
    }
}

/// Fixed-size, schema-ordered feature values. Every feature defaults to 0.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    values: [f64; FEATURE_COUNT],
}

impl FeatureVector {
    /// A vector with every feature at its default of 0.
    pub fn zeros() -> Self {
        Self {
            values: [0.0; FEATURE_COUNT],
        }
    }

    /// Build from values already in schema order.
    pub fn from_values(values: [f64; FEATURE_COUNT]) -> Self {
        Self { values }
    }

    /// Build from a slice in schema order.
    pub fn from_slice(values: &[f64]) -> Result<Self> {
        let values: [f64; FEATURE_COUNT] = values.try_into().map_err(|_| Error::SchemaMismatch {
            expected: format!("{} features", FEATURE_COUNT),
            found: format!("{} features", values.len()),
        })?;
        Ok(Self { values })
    }

    /// Get a feature value.
    pub fn get(&self, feature: Feature) -> f64 {
        self.values[feature.index()]
    }

    /// Set a feature value.
    pub fn set(&mut self, feature: Feature, value: f64) {
        self.values[feature.index()] = value;
    }

    /// Builder-style setter.
    pub fn with(mut self, feature: Feature, value: f64) -> Self {
        self.set(feature, value);
        self
    }

    /// Values in schema order.
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// (feature, value) pairs in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (Feature, f64)> + '_ {
        Feature::ALL.iter().map(move |&f| (f, self.values[f.index()]))
    }

    /// Reject vectors the model cannot score.
    pub fn ensure_finite(&self) -> Result<()> {
        match self.iter().find(|(_, v)| !v.is_finite()) {
            Some((feature, value)) => Err(Error::InvalidFeatureValue {
                feature: feature.name().to_string(),
                value,
            }),
            None => Ok(()),
        }
    }

    /// Render as a JSON object keyed by feature name.
    pub fn to_named_map(&self) -> serde_json::Map<String, serde_json::Value> {
        self.iter()
            .map(|(f, v)| (f.name().to_string(), serde_json::json!(v)))
            .collect()
    }
}

impl Default for FeatureVector {
    fn default() -> Self {
        Self::zeros()
    }
}
