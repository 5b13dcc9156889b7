//! # tfts_core
//!
//! Core types and traits for tfts-rs time series forecasting.
//!
//! This crate provides:
//! - [`Seed`] for deterministic random number generation
//! - [`ForecastShape`] and [`InputSpec`] shape metadata
//! - [`ModelInputs`] and [`ForecastBatch`], the tensors a forecasting model consumes
//! - [`TSForecastingModel`], the trait every model in the zoo implements
//! - Error types and common utilities
//!
//! ## Shape Convention
//!
//! Forecasting data follows the convention `(B, T, F)`:
//! - `B`: Batch size (number of samples)
//! - `T`: Time steps (history length for inputs, horizon for targets)
//! - `F`: Features; column 0 of `x` is the target series
//!
//! Every model output is `(B, H, 1)` where `H` is the predict sequence length.
//!
//! ## Example
//!
//! ```rust,ignore
//! use tfts_core::{ModelInputs, Seed};
//!
//! let seed = Seed::new(315);
//! let inputs = ModelInputs::array(x); // x: Tensor<B, 3> of shape (B, T, F)
//! let prepared = inputs.prepare(12);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod inputs;
mod model_trait;
mod seed;
mod shape;

pub use error::{CoreError, Result};
pub use inputs::{time_index_feature, ForecastBatch, ModelInputs, PreparedInputs};
pub use model_trait::TSForecastingModel;
pub use seed::Seed;
pub use shape::{ForecastShape, InputSpec};

/// Backend type aliases for convenience
pub mod backend {
    #[cfg(feature = "backend-ndarray")]
    pub use burn_ndarray::NdArray;

    #[cfg(feature = "backend-wgpu")]
    pub use burn_wgpu::Wgpu;

    #[cfg(feature = "backend-tch")]
    pub use burn_tch::LibTorch;
}
