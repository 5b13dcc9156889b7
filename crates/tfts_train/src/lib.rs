//! # tfts_train
//!
//! Training loop, callbacks, metrics and generation for tfts-rs.
//!
//! This crate provides:
//! - [`Trainer`] to fit, predict, evaluate, plot, save and load a forecaster
//! - Callback system with lifecycle hooks (progress, early stopping, NaN guard, loss graph)
//! - Learning rate schedulers (constant, one-cycle, cosine, step)
//! - Losses (MSE, MAE, Huber) and metrics (MSE, MAE, RMSE, MAPE)
//! - [`generate`] for auto-regressive forecasts past the model's horizon
//!
//! ## Example
//!
//! ```rust,ignore
//! use tfts_data::get_data;
//! use tfts_models::AutoModel;
//! use tfts_train::{Trainer, TrainerConfig};
//!
//! let (train, valid) = get_data("sine", 24, 12, 0.2)?.into_pair();
//! let mut trainer = Trainer::<Autodiff<NdArray>>::new(AutoModel::for_model("seq2seq", 12)?, device);
//!
//! trainer.train(&train, valid.as_ref(), &TrainerConfig::default().with_epochs(10))?;
//! let preds = trainer.predict(&train)?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod callback;
pub mod error;
pub mod generate;
pub mod losses;
pub mod metrics;
pub mod plot;
pub mod scheduler;
pub mod trainer;

pub use callback::{
    Callback, CallbackContext, CallbackList, EarlyStoppingCallback, ProgressCallback,
    ShowGraphCallback, TerminateOnNanCallback,
};
pub use error::{Result, TrainError};
pub use generate::{generate, FeatureFn, GenerationConfig};
pub use losses::LossKind;
pub use metrics::{default_metrics, Metric, MAE, MAPE, MSE, RMSE};
pub use plot::{plot_forecast, plot_losses, render_chart, Series};
pub use scheduler::{ConstantLR, CosineAnnealingLR, OneCycleLR, OneCycleLRConfig, Scheduler, SchedulerKind, StepLR};
// Re-export the model trait from tfts_core for convenience
pub use tfts_core::TSForecastingModel;
pub use trainer::{OptimizerKind, Trainer, TrainerConfig, TrainingHistory};
