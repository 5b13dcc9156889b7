//! Error types for tfts_models.

use thiserror::Error;

/// Result type alias using [`ModelError`].
pub type Result<T> = std::result::Result<T, ModelError>;

/// Errors raised while configuring, building or persisting models.
#[derive(Error, Debug)]
pub enum ModelError {
    /// Model name is not one of the supported architectures.
    #[error("Unknown model '{name}'. Supported models: {supported}")]
    UnknownModel {
        /// Requested name.
        name: String,
        /// Comma separated list of supported names.
        supported: String,
    },

    /// Hyperparameters that cannot produce a working model.
    #[error("Invalid configuration for {model}: {reason}")]
    InvalidConfig {
        /// Model name.
        model: String,
        /// What is wrong.
        reason: String,
    },

    /// JSON (de)serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Saving or loading a checkpoint failed.
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ModelError {
    pub(crate) fn invalid(model: &str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            model: model.to_string(),
            reason: reason.into(),
        }
    }
}
