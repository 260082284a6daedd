//! Deterministic feature derivation from raw applicant fields.
//!
//! `derive` is pure: the same raw record always yields the same vector. It
//! never fails; unknown fields are dropped and absent canonical fields are 0.

use crate::features::raw::RawApplication;
use crate::features::schema::{Feature, FeatureVector};

/// Transaction count at which the digital activity indicator saturates.
pub const DIGITAL_TRANSACTIONS_CAP: f64 = 20.0;

/// Social activity score at which the indicator saturates.
pub const SOCIAL_ACTIVITY_CAP: f64 = 100.0;

/// Weight applied to each of the four digital indicators (sum scales to 0-100).
pub const DIGITAL_INDICATOR_WEIGHT: f64 = 25.0;

/// Upper bound of the utility-to-income ratio.
pub const MAX_UTILITY_TO_INCOME_RATIO: f64 = 1.0;

/// Stateless transformer from raw records to schema-conformant vectors.
#[derive(Clone, Copy, Debug, Default)]
pub struct FeatureEngineer;

impl FeatureEngineer {
    /// Create a new feature engineer.
    pub fn new() -> Self {
        Self
    }

    /// Derive the complete feature vector for a raw record.
    pub fn derive(&self, raw: &RawApplication) -> FeatureVector {
        let mut vector = FeatureVector::zeros();
        for feature in Feature::ALL {
            vector.set(feature, raw.feature(feature).unwrap_or(0.0));
        }

        vector.set(Feature::LoanPercentIncome, loan_to_income_ratio(raw));

        let total_utility = total_utility_expense(raw);
        vector.set(Feature::TotalUtilityExpense, total_utility);
        vector.set(
            Feature::UtilityToIncomeRatio,
            utility_to_income_ratio(total_utility, monthly_income(raw)),
        );
        vector.set(Feature::DigitalEngagementScore, digital_engagement_score(raw));

        vector
    }
}

/// Loan amount over annual income, 0 when either is absent or income ≤ 0.
pub fn loan_to_income_ratio(raw: &RawApplication) -> f64 {
    match (raw.feature(Feature::LoanAmnt), raw.feature(Feature::PersonIncome)) {
        (Some(loan), Some(income)) if income > 0.0 => loan / income,
        _ => 0.0,
    }
}

/// Sum of the three utility bills.
pub fn total_utility_expense(raw: &RawApplication) -> f64 {
    [
        Feature::ElectricityBillAvg,
        Feature::WaterBillAvg,
        Feature::GasBillAvg,
    ]
    .iter()
    .map(|&f| raw.feature(f).unwrap_or(0.0))
    .sum()
}

/// Explicit monthly estimate when present, otherwise annual income / 12.
pub fn monthly_income(raw: &RawApplication) -> f64 {
    raw.feature(Feature::EstimatedMonthlyIncome)
        .unwrap_or_else(|| raw.feature(Feature::PersonIncome).unwrap_or(0.0) / 12.0)
}

/// Utility expense over monthly income, clamped to [0, 1].
pub fn utility_to_income_ratio(total_utility: f64, monthly_income: f64) -> f64 {
    if monthly_income <= 0.0 {
        return 0.0;
    }
    (total_utility / monthly_income).clamp(0.0, MAX_UTILITY_TO_INCOME_RATIO)
}

/// Weighted sum of four normalized digital indicators, scaled to 0-100.
pub fn digital_engagement_score(raw: &RawApplication) -> f64 {
    let flag = |f: Feature| raw.feature(f).unwrap_or(0.0).clamp(0.0, 1.0);
    let capped = |f: Feature, cap: f64| (raw.feature(f).unwrap_or(0.0) / cap).clamp(0.0, 1.0);

    let indicators = [
        flag(Feature::DigitalWalletUsage),
        flag(Feature::MobileBankingUser),
        capped(Feature::MonthlyDigitalTransactions, DIGITAL_TRANSACTIONS_CAP),
        capped(Feature::SocialMediaActivityScore, SOCIAL_ACTIVITY_CAP),
    ];
    indicators.iter().sum::<f64>() * DIGITAL_INDICATOR_WEIGHT
}
