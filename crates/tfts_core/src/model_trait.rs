//! Model trait for training and inference.

use burn::prelude::*;

use crate::inputs::ModelInputs;

/// Trait for time series forecasting models.
///
/// Implemented for every backend so the same module can be trained on an
/// autodiff backend and evaluated on its inner backend.
pub trait TSForecastingModel<B: Backend>: Module<B> {
    /// Forward pass returning forecasts.
    ///
    /// # Arguments
    ///
    /// * `inputs` - History and optional covariates
    /// * `teacher` - Ground truth `(batch, horizon, 1)` used for teacher
    ///   forcing by auto-regressive decoders during training
    ///
    /// # Returns
    ///
    /// Forecasts tensor of shape `(batch, horizon, 1)`
    fn forward(&self, inputs: ModelInputs<B>, teacher: Option<Tensor<B, 3>>) -> Tensor<B, 3>;

    /// Number of steps produced by [`Self::forward`].
    fn predict_sequence_length(&self) -> usize;
}
