//! Ranked recommendations derived from risk-increasing attributions.

use crate::explain::engine::Explanation;
use crate::explain::text::NOISE_FLOOR;
use crate::features::{Feature, RawApplication};
use serde::{Deserialize, Serialize};

/// Maximum recommendations returned.
pub const MAX_RECOMMENDATIONS: usize = 5;

/// Below this many feature-specific entries, generic ones are appended.
pub const MIN_SPECIFIC_RECOMMENDATIONS: usize = 3;

/// Area of the applicant's profile a recommendation targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationCategory {
    Payment,
    Utility,
    Credit,
    Digital,
    Income,
}

/// An actionable recommendation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub title: String,
    pub description: String,
    pub action_item: String,
    pub category: RecommendationCategory,
    /// Urgency in [0, cap]; attribution-derived for feature-specific entries
    pub priority: f64,
}

/// Fixed wording and priority scaling for one feature.
struct Template {
    feature: Feature,
    title: &'static str,
    description: &'static str,
    action_item: &'static str,
    category: RecommendationCategory,
    cap: f64,
    scale: f64,
}

static TEMPLATES: [Template; 5] = [
    Template {
        feature: Feature::LatePayments12m,
        title: "Improve Payment History",
        description: "Your recent late payments are significantly impacting your credit risk assessment.",
        action_item: "Set up automatic payments and payment reminders to ensure timely payments going forward.",
        category: RecommendationCategory::Payment,
        cap: 0.9,
        scale: 10.0,
    },
    Template {
        feature: Feature::UtilityToIncomeRatio,
        title: "Optimize Utility Expenses",
        description: "Your utility expenses relative to income are higher than optimal for credit assessment.",
        action_item: "Review and reduce utility costs through energy-saving measures or budget optimization.",
        category: RecommendationCategory::Utility,
        cap: 0.8,
        scale: 8.0,
    },
    Template {
        feature: Feature::LoanIntRate,
        title: "Explore Better Interest Rates",
        description: "The current interest rate is affecting your loan approval chances.",
        action_item: "Shop around with different lenders or work on improving your credit score for better rates.",
        category: RecommendationCategory::Credit,
        cap: 0.7,
        scale: 6.0,
    },
    Template {
        feature: Feature::DigitalEngagementScore,
        title: "Increase Digital Financial Activity",
        description: "Low digital engagement may be limiting your credit profile strength.",
        action_item: "Use mobile banking, digital payments, and financial apps more regularly to build digital footprint.",
        category: RecommendationCategory::Digital,
        cap: 0.6,
        scale: 5.0,
    },
    Template {
        feature: Feature::LoanAmnt,
        title: "Consider Loan Amount Adjustment",
        description: "The requested loan amount might be too high relative to your current financial profile.",
        action_item: "Consider requesting a smaller amount or work on improving income/credit before applying.",
        category: RecommendationCategory::Credit,
        cap: 0.8,
        scale: 7.0,
    },
];

fn template_for(feature: Feature) -> Option<&'static Template> {
    TEMPLATES.iter().find(|t| t.feature == feature)
}

/// Build the recommendation list for an explanation.
///
/// Only reported, risk-increasing contributions above the noise floor with a
/// template produce feature-specific entries, strongest first. Generic
/// entries fill in when fewer than three were produced. `raw` personalises
/// the generic wording when the applicant's fields are available.
pub fn recommend(explanation: &Explanation, raw: Option<&RawApplication>) -> Vec<Recommendation> {
    let mut drivers: Vec<_> = explanation
        .contributions
        .iter()
        .filter(|c| c.attribution_value > 0.0 && c.attribution_value.abs() >= NOISE_FLOOR)
        .collect();
    drivers.sort_by(|a, b| b.attribution_value.abs().total_cmp(&a.attribution_value.abs()));

    let mut recommendations: Vec<Recommendation> = drivers
        .iter()
        .filter_map(|c| {
            let t = template_for(c.feature)?;
            Some(Recommendation {
                title: t.title.to_string(),
                description: t.description.to_string(),
                action_item: t.action_item.to_string(),
                category: t.category,
                priority: (c.attribution_value.abs() * t.scale).min(t.cap),
            })
        })
        .collect();

    if recommendations.len() < MIN_SPECIFIC_RECOMMENDATIONS {
        recommendations.extend(general_recommendations(raw));
    }
    recommendations.truncate(MAX_RECOMMENDATIONS);
    recommendations
}

/// Profile-improvement advice with fixed priorities.
pub fn general_recommendations(raw: Option<&RawApplication>) -> Vec<Recommendation> {
    let mut credit = String::from("A longer, consistent credit history strengthens your financial profile.");
    let mut income = String::from("Consistent income documentation helps in credit assessments.");

    if let Some(years) = raw.and_then(|r| r.feature(Feature::CbPersonCredHistLength)) {
        credit.push_str(&format!(" Your credit history currently spans {:.0} years.", years));
    }
    if let Some(years) = raw.and_then(|r| r.feature(Feature::PersonEmpLength)) {
        income.push_str(&format!(" You have {:.0} years of employment on record.", years));
    }

    vec![
        Recommendation {
            title: "Build Credit History".to_string(),
            description: credit,
            action_item: "Maintain existing credit accounts and use credit responsibly over time.".to_string(),
            category: RecommendationCategory::Credit,
            priority: 0.5,
        },
        Recommendation {
            title: "Maintain Stable Income".to_string(),
            description: income,
            action_item: "Keep detailed records of all income sources and maintain stable employment.".to_string(),
            category: RecommendationCategory::Income,
            priority: 0.4,
        },
    ]
}
