//! Features Module
//!
//! Schema-conformant feature vectors shared by training and inference:
//! - Canonical 27-feature schema with a versioned binding
//! - Raw applicant records
//! - Pure feature derivation (ratios, utility totals, digital engagement)
//! - Non-raising input validation

pub mod engineer;
pub mod raw;
pub mod schema;
pub mod validation;

pub use engineer::FeatureEngineer;
pub use raw::RawApplication;
pub use schema::{Feature, FeatureSchema, FeatureVector, SchemaBinding, FEATURE_COUNT, SCHEMA_VERSION};
pub use validation::validate;
