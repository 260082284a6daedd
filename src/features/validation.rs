//! Input validation for raw applications.
//!
//! Validation never fails: it returns human-readable violations and callers
//! decide whether to reject the application.

use crate::features::engineer::{monthly_income, total_utility_expense, MAX_UTILITY_TO_INCOME_RATIO};
use crate::features::raw::RawApplication;

/// Fields every application must carry.
pub const REQUIRED_FIELDS: [&str; 4] = ["person_income", "loan_amnt", "person_emp_length", "age"];

/// Inclusive applicant age bounds.
pub const MIN_AGE: f64 = 18.0;
pub const MAX_AGE: f64 = 100.0;

/// Check a raw application and list every violation found.
pub fn validate(raw: &RawApplication) -> Vec<String> {
    let mut errors = Vec::new();

    for field in REQUIRED_FIELDS {
        if !raw.has(field) {
            errors.push(format!("Missing required field: {}", field));
        }
    }

    if let Some(age) = raw.get("age") {
        if !(MIN_AGE..=MAX_AGE).contains(&age) {
            errors.push(format!("Age must be between {} and {}", MIN_AGE, MAX_AGE));
        }
    }

    if let Some(income) = raw.get("person_income") {
        if income <= 0.0 {
            errors.push("Income must be greater than 0".to_string());
        }
    }

    if let Some(loan) = raw.get("loan_amnt") {
        if loan <= 0.0 {
            errors.push("Loan amount must be greater than 0".to_string());
        }
    }

    let monthly = monthly_income(raw);
    let declared_ratio = raw.get("utility_to_income_ratio").unwrap_or(0.0);
    let derived_ratio = if monthly > 0.0 {
        total_utility_expense(raw) / monthly
    } else {
        0.0
    };
    if declared_ratio > MAX_UTILITY_TO_INCOME_RATIO || derived_ratio > MAX_UTILITY_TO_INCOME_RATIO {
        errors.push("Utility to income ratio should not exceed 1.0 (100%)".to_string());
    }

    errors
}

/// Whether the application passes validation.
pub fn is_valid(raw: &RawApplication) -> bool {
    validate(raw).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> RawApplication {
        RawApplication::new()
            .with("person_income", 50000.0)
            .with("loan_amnt", 15000.0)
            .with("person_emp_length", 5.0)
            .with("age", 30.0)
    }

    #[test]
    fn test_valid_input() {
        assert!(validate(&valid()).is_empty());
        assert!(is_valid(&valid()));
    }

    #[test]
    fn test_empty_input_reports_all_required() {
        let errors = validate(&RawApplication::new());
        assert_eq!(errors.len(), REQUIRED_FIELDS.len());
        assert!(errors.iter().all(|e| e.starts_with("Missing required field")));
    }

    #[test]
    fn test_invalid_age() {
        let errors = validate(&valid().with("age", 10.0));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_lowercase().contains("age"));

        assert!(!validate(&valid().with("age", 150.0)).is_empty());
        assert!(validate(&valid().with("age", 18.0)).is_empty());
        assert!(validate(&valid().with("age", 100.0)).is_empty());
    }

    #[test]
    fn test_extreme_values() {
        let raw = valid()
            .with("person_income", -50000.0)
            .with("loan_amnt", 0.0)
            .with("age", 150.0);
        let errors = validate(&raw);
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_missing_field_via_null_json() {
        let raw = RawApplication::from_json(&serde_json::json!({
            "person_income": null,
            "loan_amnt": 15000,
            "age": null
        }))
        .unwrap();
        let errors = validate(&raw);
        assert!(errors.contains(&"Missing required field: person_income".to_string()));
        assert!(errors.contains(&"Missing required field: age".to_string()));
    }

    #[test]
    fn test_utility_ratio_violation() {
        let raw = valid()
            .with("estimated_monthly_income", 100.0)
            .with("electricity_bill_avg", 250.0);
        let errors = validate(&raw);
        assert!(errors.iter().any(|e| e.contains("Utility to income ratio")));
    }
}
