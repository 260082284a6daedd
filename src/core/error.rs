//! Error types for kredai.

use thiserror::Error;

/// Result type alias for kredai operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while training, persisting or serving risk models.
#[derive(Error, Debug)]
pub enum Error {
    // Inference errors
    #[error("Model not loaded")]
    ModelNotLoaded,

    #[error("Explainer not loaded")]
    ExplainerNotLoaded,

    #[error("Invalid value for feature {feature}: {value}")]
    InvalidFeatureValue { feature: String, value: f64 },

    // Artifact errors
    #[error("Artifact missing: {0}")]
    ArtifactMissing(String),

    #[error("Schema mismatch: expected {expected}, found {found}")]
    SchemaMismatch { expected: String, found: String },

    // Training errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("Training failed: {0}")]
    Training(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the error must keep the service from serving.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::ArtifactMissing(_) | Error::SchemaMismatch { .. })
    }
}

/// Failure of one item in a batch. Stored in the item's slot instead of
/// aborting the batch.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BatchItemError {
    /// Position of the item in the batch
    pub index: usize,
    /// Error message
    pub error: String,
}

impl BatchItemError {
    /// Record the error for the item at `index`.
    pub fn new(index: usize, error: &Error) -> Self {
        Self {
            index,
            error: error.to_string(),
        }
    }
}

impl From<::config::ConfigError> for Error {
    fn from(err: ::config::ConfigError) -> Self {
        Error::InvalidConfig(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Internal(format!("background task failed: {}", err))
    }
}
