//! Error types for training.

use thiserror::Error;

/// Result type alias for training operations.
pub type Result<T> = std::result::Result<T, TrainError>;

/// Errors that can occur during training, prediction and generation.
#[derive(Error, Debug)]
pub enum TrainError {
    /// Loss became NaN or infinite before any finite epoch completed.
    #[error("Non-finite loss {loss} at epoch {epoch}, batch {batch}")]
    NonFiniteLoss {
        /// Epoch (0-indexed).
        epoch: usize,
        /// Batch within the epoch.
        batch: usize,
        /// Offending loss value.
        loss: f32,
    },

    /// A training batch had no targets.
    #[error("Training requires targets, dataset has none")]
    MissingTargets,

    /// Prediction or saving was requested before the model was built.
    #[error("Model has not been built; call train() or load() first")]
    ModelNotBuilt,

    /// Trainer or generation settings that cannot work.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Tensor data could not be read back into host memory.
    #[error("Tensor data error: {0}")]
    TensorData(String),

    /// Callback error.
    #[error("Callback error: {0}")]
    CallbackError(String),

    /// Data error.
    #[error("Data error: {0}")]
    Data(#[from] tfts_data::DataError),

    /// Model error.
    #[error("Model error: {0}")]
    Model(#[from] tfts_models::ModelError),

    /// Core error.
    #[error("Core error: {0}")]
    Core(#[from] tfts_core::CoreError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Array shape error.
    #[error("Shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}
