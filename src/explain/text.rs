//! Human-readable wording for attributions.

use crate::features::Feature;

/// Attributions smaller than this carry no recommendation.
pub const NOISE_FLOOR: f64 = 0.01;

/// Display name used in readable explanations.
pub fn display_name(feature: Feature) -> String {
    let fixed = match feature {
        Feature::PersonIncome => "Annual Income",
        Feature::LoanAmnt => "Loan Amount",
        Feature::LoanIntRate => "Interest Rate",
        Feature::LoanPercentIncome => "Loan-to-Income Ratio",
        Feature::CbPersonCredHistLength => "Credit History Length",
        Feature::Age => "Age",
        Feature::UtilityToIncomeRatio => "Utility-to-Income Ratio",
        Feature::OnTimePayments12m => "On-time Payments (12m)",
        Feature::LatePayments12m => "Late Payments (12m)",
        Feature::DigitalEngagementScore => "Digital Engagement Score",
        Feature::CreditRiskScore => "Credit Risk Score",
        Feature::MonthlyDigitalTransactions => "Monthly Digital Transactions",
        Feature::SocialMediaActivityScore => "Social Media Activity",
        Feature::MobileBankingUser => "Mobile Banking Usage",
        other => return title_case(other.name()),
    };
    fixed.to_string()
}

/// `monthly_data_usage_gb` -> `Monthly Data Usage Gb`
fn title_case(name: &str) -> String {
    name.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// One-sentence summary of a reported feature.
pub fn readable_line(feature: Feature, value: f64, attribution: f64) -> String {
    let verb = if attribution > 0.0 { "increases" } else { "decreases" };
    format!(
        "{} (value: {:.2}) {} risk by {:.3}",
        display_name(feature),
        value,
        verb,
        attribution.abs()
    )
}

/// Applicant-facing description of how a feature affected the score.
pub fn describe(feature: Feature, value: f64, attribution: f64) -> String {
    let raises = attribution > 0.0;
    match feature {
        Feature::PersonIncome => format!(
            "Your annual income of ₹{} {} affects your risk profile",
            group_thousands(value),
            if raises { "positively" } else { "negatively" }
        ),
        Feature::LoanAmnt => format!(
            "The requested loan amount of ₹{} {} the assessed risk",
            group_thousands(value),
            if raises { "increases" } else { "decreases" }
        ),
        Feature::LoanIntRate => format!(
            "The interest rate of {:.1}% {} risk assessment",
            value,
            if raises { "contributes to higher" } else { "helps lower" }
        ),
        Feature::LatePayments12m => format!(
            "Having {:.0} late payments in the last 12 months {} your risk",
            value,
            if raises { "significantly increases" } else { "does not increase" }
        ),
        Feature::OnTimePayments12m => format!(
            "Your {:.0} on-time payments {} in the assessment",
            value,
            if attribution < 0.0 { "demonstrate reliability" } else { "are noted" }
        ),
        Feature::DigitalEngagementScore => format!(
            "Your digital engagement score of {:.0} {} digital financial behavior",
            value,
            if attribution < 0.0 { "shows good" } else { "indicates limited" }
        ),
        Feature::UtilityToIncomeRatio => format!(
            "Your utility-to-income ratio of {:.3} {}",
            value,
            if raises { "is considered high" } else { "is within acceptable range" }
        ),
        Feature::Age => format!(
            "Your age of {:.0} years {} the risk calculation",
            value,
            if attribution != 0.0 { "is factored into" } else { "neutrally affects" }
        ),
        Feature::CbPersonCredHistLength => format!(
            "Your credit history of {:.1} years {} evidence of creditworthiness",
            value,
            if attribution < 0.0 { "provides" } else { "shows limited" }
        ),
        _ => format!(
            "This feature with value {:.2} {} your risk assessment",
            value,
            if raises { "increases" } else { "decreases" }
        ),
    }
}

/// One-line advice for a risk-increasing feature above the noise floor.
pub fn feature_advice(feature: Feature, attribution: f64) -> Option<&'static str> {
    if attribution.abs() < NOISE_FLOOR || attribution <= 0.0 {
        return None;
    }
    Some(match feature {
        Feature::LatePayments12m => {
            "Set up automatic payments and payment reminders to avoid future late payments"
        }
        Feature::OnTimePayments12m => {
            "Continue your excellent payment history - it's your strongest asset"
        }
        Feature::UtilityToIncomeRatio => {
            "Consider reducing utility costs through energy-efficient appliances or budget management"
        }
        Feature::LoanIntRate => {
            "Shop around for better interest rates or consider improving your credit score first"
        }
        Feature::DigitalEngagementScore => {
            "Increase your digital financial activities like mobile banking and digital payments"
        }
        Feature::PersonIncome => {
            "Consider documenting additional income sources or pursuing income growth opportunities"
        }
        Feature::LoanAmnt => "Consider requesting a smaller loan amount to improve approval chances",
        Feature::CbPersonCredHistLength => {
            "Maintain your existing credit accounts to build a longer credit history"
        }
        Feature::Age => {
            "Age is a natural factor - focus on other controllable aspects of your financial profile"
        }
        _ => "Consider improving this aspect of your financial profile",
    })
}

/// Whole-number rendering with comma thousands separators.
pub fn group_thousands(value: f64) -> String {
    let rounded = value.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if rounded < 0.0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}
