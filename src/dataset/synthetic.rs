//! Deterministic synthetic applicant data.
//!
//! Used by tests and benchmarks. Default risk rises with late payments, loan
//! burden, interest rate and utility burden, and falls with on-time payments,
//! credit history and digital engagement, so a fitted model has real signal
//! to find.

use crate::core::sigmoid;
use crate::dataset::labeled::{LabeledDataset, LabeledRecord};
use crate::features::{FeatureEngineer, RawApplication};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const LOAN_INTENTS: [&str; 6] = [
    "education",
    "medical",
    "venture",
    "personal",
    "debtconsolidation",
    "homeimprovement",
];

/// Generate one raw applicant.
fn applicant(rng: &mut StdRng) -> RawApplication {
    let income: f64 = rng.gen_range(12_000.0..150_000.0);
    let loan: f64 = rng.gen_range(1_000.0..35_000.0);
    let monthly = income / 12.0;
    let intent = LOAN_INTENTS[rng.gen_range(0..LOAN_INTENTS.len())];

    RawApplication::new()
        .with("person_income", income.round())
        .with("person_emp_length", rng.gen_range(0..25) as f64)
        .with("loan_amnt", loan.round())
        .with("loan_int_rate", rng.gen_range(5.0..23.0))
        .with("cb_person_cred_hist_length", rng.gen_range(2..30) as f64)
        .with("age", rng.gen_range(20..70) as f64)
        .with("estimated_monthly_income", monthly)
        .with("monthly_airtime_spend", rng.gen_range(5.0..120.0))
        .with("monthly_data_usage_gb", rng.gen_range(0.5..40.0))
        .with("avg_calls_per_day", rng.gen_range(0.0..30.0))
        .with("avg_sms_per_day", rng.gen_range(0.0..20.0))
        .with("digital_wallet_usage", rng.gen_range(0..2) as f64)
        .with("monthly_digital_transactions", rng.gen_range(0..40) as f64)
        .with("avg_transaction_amount", rng.gen_range(5.0..400.0))
        .with("social_media_activity_score", rng.gen_range(0.0..100.0))
        .with("mobile_banking_user", rng.gen_range(0..2) as f64)
        .with("financial_inclusion_score", rng.gen_range(0.0..100.0))
        .with("electricity_bill_avg", rng.gen_range(20.0..250.0))
        .with("water_bill_avg", rng.gen_range(10.0..90.0))
        .with("gas_bill_avg", rng.gen_range(0.0..120.0))
        .with("on_time_payments_12m", rng.gen_range(0..13) as f64)
        .with("late_payments_12m", rng.gen_range(0..7) as f64)
        .with("credit_risk_score", rng.gen_range(300.0..850.0))
        .with_category("loan_intent", intent)
}

/// Default label drawn from a logistic model of the applicant's risk factors.
fn default_label(raw: &RawApplication, engineer: &FeatureEngineer, rng: &mut StdRng) -> u8 {
    use crate::features::Feature::*;
    let v = engineer.derive(raw);

    let margin = -3.0 + 0.9 * v.get(LatePayments12m) - 0.12 * v.get(OnTimePayments12m)
        + 4.0 * v.get(LoanPercentIncome)
        + 0.12 * (v.get(LoanIntRate) - 12.0)
        + 3.0 * v.get(UtilityToIncomeRatio)
        - 0.015 * (v.get(DigitalEngagementScore) - 50.0)
        - 0.03 * v.get(CbPersonCredHistLength);

    u8::from(rng.gen::<f64>() < sigmoid(margin))
}

/// Generate `n` labeled raw records.
pub fn records(n: usize, seed: u64) -> Vec<LabeledRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    let engineer = FeatureEngineer::new();
    (0..n)
        .map(|_| {
            let raw = applicant(&mut rng);
            let label = default_label(&raw, &engineer, &mut rng);
            LabeledRecord { raw, label }
        })
        .collect()
}

/// Generate a labeled, feature-engineered dataset of `n` rows.
pub fn dataset(n: usize, seed: u64) -> LabeledDataset {
    let rows: Vec<LabeledRecord> = records(n, seed);
    let engineer = FeatureEngineer::new();
    LabeledDataset::from_records(&rows, &engineer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_is_deterministic() {
        assert_eq!(records(50, 7), records(50, 7));
        assert_ne!(records(50, 7), records(50, 8));
    }

    #[test]
    fn test_dataset_has_both_classes() {
        let ds = dataset(400, 42);
        assert_eq!(ds.len(), 400);
        let counts = ds.label_counts();
        assert!(counts.has_both_classes());
        assert!(counts.positive_rate() > 0.05 && counts.positive_rate() < 0.95);
    }
}
