//! Fixed decision policy over the default probability.

use serde::{Deserialize, Serialize};

/// At or below: low risk.
pub const LOW_RISK_THRESHOLD: f64 = 0.3;

/// Above: denied.
pub const DENIAL_THRESHOLD: f64 = 0.5;

/// At or below (and above low): medium risk; above: high risk.
pub const HIGH_RISK_THRESHOLD: f64 = 0.7;

/// Discrete risk band.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskCategory {
    #[serde(rename = "Low Risk")]
    Low,
    #[serde(rename = "Medium Risk")]
    Medium,
    #[serde(rename = "High Risk")]
    High,
}

impl RiskCategory {
    pub fn from_probability(p: f64) -> Self {
        if p <= LOW_RISK_THRESHOLD {
            RiskCategory::Low
        } else if p <= HIGH_RISK_THRESHOLD {
            RiskCategory::Medium
        } else {
            RiskCategory::High
        }
    }
}

impl std::fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskCategory::Low => write!(f, "Low Risk"),
            RiskCategory::Medium => write!(f, "Medium Risk"),
            RiskCategory::High => write!(f, "High Risk"),
        }
    }
}

/// Loan decision. `Error` marks a failed batch item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanStatus {
    Approved,
    Denied,
    Error,
}

impl LoanStatus {
    /// Denied iff `p` exceeds the denial threshold.
    pub fn from_probability(p: f64) -> Self {
        if p > DENIAL_THRESHOLD {
            LoanStatus::Denied
        } else {
            LoanStatus::Approved
        }
    }
}

/// Policy outcome for one probability.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Decision {
    pub loan_status: LoanStatus,
    pub risk_category: RiskCategory,
    /// Probability of the more likely class
    pub confidence: f64,
}

/// Apply the policy.
pub fn decide(p: f64) -> Decision {
    Decision {
        loan_status: LoanStatus::from_probability(p),
        risk_category: RiskCategory::from_probability(p),
        confidence: p.max(1.0 - p),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_boundaries() {
        assert_eq!(RiskCategory::from_probability(0.0), RiskCategory::Low);
        assert_eq!(RiskCategory::from_probability(0.3), RiskCategory::Low);
        assert_eq!(RiskCategory::from_probability(0.30001), RiskCategory::Medium);
        assert_eq!(RiskCategory::from_probability(0.7), RiskCategory::Medium);
        assert_eq!(RiskCategory::from_probability(0.70001), RiskCategory::High);
        assert_eq!(RiskCategory::from_probability(1.0), RiskCategory::High);
    }

    #[test]
    fn test_denial_boundary() {
        assert_eq!(LoanStatus::from_probability(0.5), LoanStatus::Approved);
        assert_eq!(LoanStatus::from_probability(0.50001), LoanStatus::Denied);
    }

    #[test]
    fn test_policy_sweep() {
        for i in 0..=1000 {
            let p = i as f64 / 1000.0;
            let d = decide(p);
            assert_eq!(d.loan_status == LoanStatus::Denied, p > 0.5);
            assert!(d.confidence >= 0.5 && d.confidence <= 1.0);
        }
    }

    #[test]
    fn test_serialized_labels() {
        assert_eq!(serde_json::to_string(&RiskCategory::Medium).unwrap(), "\"Medium Risk\"");
        assert_eq!(serde_json::to_string(&LoanStatus::Denied).unwrap(), "\"Denied\"");
        assert_eq!(RiskCategory::High.to_string(), "High Risk");
    }
}
