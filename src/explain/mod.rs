//! Explain Module
//!
//! Additive attribution of risk scores:
//! - Explainer calibration over the boosted trees
//! - Ranked per-request explanations
//! - Readable wording and ranked recommendations

pub mod engine;
pub mod explainer;
pub mod recommendations;
pub mod text;

pub use engine::{
    ExplainedApplication, Explanation, ExplanationEngine, ExplanationOutcome, FeatureContribution, Impact,
};
pub use explainer::{Attribution, Explainer};
pub use recommendations::{
    general_recommendations, recommend, Recommendation, RecommendationCategory, MAX_RECOMMENDATIONS,
    MIN_SPECIFIC_RECOMMENDATIONS,
};
pub use text::{display_name, NOISE_FLOOR};
