//! Core utilities and common types for kredai.

pub mod error;
pub mod types;

pub use error::{BatchItemError, Error, Result};
pub use types::*;
