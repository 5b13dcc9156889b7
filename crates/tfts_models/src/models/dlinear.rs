//! DLinear: moving-average decomposition with two linear maps.
//!
//! Reference: "Are Transformers Effective for Time Series Forecasting?"
//! by Zeng et al. (2023)

use burn::nn::pool::{AvgPool1d, AvgPool1dConfig};
use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use tfts_core::{InputSpec, ModelInputs, TSForecastingModel};

/// Configuration for [`DLinear`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DLinearConfig {
    /// Moving-average window for the trend; must be odd.
    pub moving_avg: usize,
}

impl Default for DLinearConfig {
    fn default() -> Self {
        Self { moving_avg: 25 }
    }
}

impl DLinearConfig {
    /// Set the moving-average window.
    #[must_use]
    pub fn with_moving_avg(mut self, moving_avg: usize) -> Self {
        self.moving_avg = moving_avg;
        self
    }

    /// Check the hyperparameters.
    pub fn validate(&self, _spec: &InputSpec, _predict_sequence_length: usize) -> Result<()> {
        if self.moving_avg == 0 || self.moving_avg % 2 == 0 {
            return Err(ModelError::invalid(
                "dlinear",
                format!("moving_avg must be a positive odd number, got {}", self.moving_avg),
            ));
        }
        Ok(())
    }

    /// Initialize the model.
    pub fn init<B: Backend>(&self, spec: &InputSpec, predict_sequence_length: usize, device: &B::Device) -> DLinear<B> {
        DLinear {
            moving_average: AvgPool1dConfig::new(self.moving_avg).with_stride(1).init(),
            seasonal: LinearConfig::new(spec.train_length, predict_sequence_length).init(device),
            trend: LinearConfig::new(spec.train_length, predict_sequence_length).init(device),
            half_window: self.moving_avg / 2,
            predict_sequence_length,
        }
    }
}

/// Decomposition-linear forecaster on the target channel.
#[derive(Module, Debug)]
pub struct DLinear<B: Backend> {
    moving_average: AvgPool1d,
    seasonal: Linear<B>,
    trend: Linear<B>,
    half_window: usize,
    predict_sequence_length: usize,
}

impl<B: Backend> DLinear<B> {
    /// Split `(B, T)` into `(seasonal, trend)`.
    ///
    /// Both ends are padded by repeating the edge values so the trend keeps
    /// length `T`.
    pub fn decompose(&self, x: Tensor<B, 2>) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let [batch, len] = x.dims();
        let pad = self.half_window;

        let padded = if pad == 0 {
            x.clone()
        } else {
            let front = x.clone().slice([0..batch, 0..1]).repeat_dim(1, pad);
            let back = x.clone().slice([0..batch, len - 1..len]).repeat_dim(1, pad);
            Tensor::cat(vec![front, x.clone(), back], 1)
        };

        let trend = self
            .moving_average
            .forward(padded.unsqueeze_dim::<3>(1))
            .reshape([batch, len]);
        (x - trend.clone(), trend)
    }

    /// Forward pass returning `(B, H, 1)`.
    pub fn forward(&self, inputs: ModelInputs<B>) -> Tensor<B, 3> {
        let [batch, train_length, _] = inputs.x.dims();
        let target = inputs
            .x
            .slice([0..batch, 0..train_length, 0..1])
            .reshape([batch, train_length]);

        let (seasonal, trend) = self.decompose(target);
        let out = self.seasonal.forward(seasonal) + self.trend.forward(trend);
        out.reshape([batch, self.predict_sequence_length, 1])
    }
}

impl<B: Backend> TSForecastingModel<B> for DLinear<B> {
    fn forward(&self, inputs: ModelInputs<B>, _teacher: Option<Tensor<B, 3>>) -> Tensor<B, 3> {
        DLinear::forward(self, inputs)
    }

    fn predict_sequence_length(&self) -> usize {
        self.predict_sequence_length
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::Distribution;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_dlinear_output_shape() {
        let device = Default::default();
        let spec = InputSpec::univariate(48, 2);
        let config = DLinearConfig::default();
        config.validate(&spec, 12).unwrap();
        let model = config.init::<TestBackend>(&spec, 12, &device);
        let x = Tensor::random([3, 48, 2], Distribution::Normal(0.0, 1.0), &device);
        assert_eq!(model.forward(ModelInputs::array(x)).dims(), [3, 12, 1]);
    }

    #[test]
    fn test_decompose_constant_series() {
        let device = Default::default();
        let spec = InputSpec::univariate(10, 1);
        let model = DLinearConfig::default()
            .with_moving_avg(5)
            .init::<TestBackend>(&spec, 2, &device);
        let x = Tensor::<TestBackend, 2>::ones([1, 10], &device) * 3.0;

        let (seasonal, trend) = model.decompose(x);
        let trend: Vec<f32> = trend.into_data().to_vec().unwrap();
        let seasonal: Vec<f32> = seasonal.into_data().to_vec().unwrap();
        assert!(trend.iter().all(|v| (v - 3.0).abs() < 1e-6));
        assert!(seasonal.iter().all(|v| v.abs() < 1e-6));
    }

    #[test]
    fn test_even_window_rejected() {
        let spec = InputSpec::univariate(10, 1);
        assert!(DLinearConfig::default().with_moving_avg(4).validate(&spec, 2).is_err());
    }
}
