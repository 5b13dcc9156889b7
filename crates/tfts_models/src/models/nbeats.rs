//! N-BEATS: stacks of fully connected blocks with backcast residuals.
//!
//! Reference: "N-BEATS: Neural basis expansion analysis for interpretable
//! time series forecasting" by Oreshkin et al. (2020)

use std::f32::consts::PI;

use burn::nn::{Linear, LinearConfig, Relu};
use burn::prelude::*;
use serde::{Deserialize, Serialize};

use super::check_positive;
use crate::error::{ModelError, Result};
use tfts_core::{InputSpec, ModelInputs, TSForecastingModel};

/// Basis used by the blocks of a stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StackType {
    /// Learned linear basis.
    Generic,
    /// Polynomial basis of degree `thetas_dim - 1`.
    Trend,
    /// Fourier basis with `thetas_dim` terms.
    Seasonality,
}

/// Configuration for [`NBeats`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NBeatsConfig {
    /// Basis of each stack.
    pub stack_types: Vec<StackType>,
    /// Blocks per stack.
    pub nb_blocks_per_stack: usize,
    /// Fully connected layers per block.
    pub n_block_layers: usize,
    /// Width of the fully connected layers.
    pub hidden_size: usize,
    /// Expansion coefficients per stack.
    pub thetas_dim: Vec<usize>,
    /// Reuse a single block for the whole stack.
    pub share_weights_in_stack: bool,
}

impl Default for NBeatsConfig {
    fn default() -> Self {
        Self {
            stack_types: vec![StackType::Trend, StackType::Seasonality],
            nb_blocks_per_stack: 3,
            n_block_layers: 4,
            hidden_size: 64,
            thetas_dim: vec![4, 8],
            share_weights_in_stack: false,
        }
    }
}

impl NBeatsConfig {
    /// Set stack types and their expansion sizes.
    #[must_use]
    pub fn with_stacks(mut self, stack_types: Vec<StackType>, thetas_dim: Vec<usize>) -> Self {
        self.stack_types = stack_types;
        self.thetas_dim = thetas_dim;
        self
    }

    /// Set the width of the fully connected layers.
    #[must_use]
    pub fn with_hidden_size(mut self, hidden_size: usize) -> Self {
        self.hidden_size = hidden_size;
        self
    }

    /// Share block weights within each stack.
    #[must_use]
    pub fn with_share_weights_in_stack(mut self, share: bool) -> Self {
        self.share_weights_in_stack = share;
        self
    }

    /// Check the hyperparameters.
    pub fn validate(&self, _spec: &InputSpec, _predict_sequence_length: usize) -> Result<()> {
        check_positive("nbeats", "nb_blocks_per_stack", self.nb_blocks_per_stack)?;
        check_positive("nbeats", "n_block_layers", self.n_block_layers)?;
        check_positive("nbeats", "hidden_size", self.hidden_size)?;
        if self.stack_types.is_empty() {
            return Err(ModelError::invalid("nbeats", "stack_types must not be empty"));
        }
        if self.stack_types.len() != self.thetas_dim.len() {
            return Err(ModelError::invalid(
                "nbeats",
                format!(
                    "{} stacks but {} thetas_dim entries",
                    self.stack_types.len(),
                    self.thetas_dim.len()
                ),
            ));
        }
        if self.thetas_dim.contains(&0) {
            return Err(ModelError::invalid("nbeats", "thetas_dim entries must be > 0"));
        }
        Ok(())
    }

    /// Initialize the model.
    pub fn init<B: Backend>(&self, spec: &InputSpec, predict_sequence_length: usize, device: &B::Device) -> NBeats<B> {
        let blocks_per_stack = if self.share_weights_in_stack {
            1
        } else {
            self.nb_blocks_per_stack
        };

        let blocks = self
            .stack_types
            .iter()
            .zip(&self.thetas_dim)
            .flat_map(|(&stack_type, &theta_dim)| {
                (0..blocks_per_stack).map(move |_| (stack_type, theta_dim))
            })
            .map(|(stack_type, theta_dim)| {
                NBeatsBlock::new(
                    stack_type,
                    spec.train_length,
                    predict_sequence_length,
                    self.hidden_size,
                    self.n_block_layers,
                    theta_dim,
                    device,
                )
            })
            .collect();

        NBeats {
            blocks,
            repeats: if self.share_weights_in_stack {
                self.nb_blocks_per_stack
            } else {
                1
            },
            activation: Relu::new(),
            predict_sequence_length,
        }
    }
}

/// One N-BEATS block: an MLP producing backcast and forecast coefficients.
///
/// Generic blocks carry learned basis layers; trend and seasonality blocks
/// project through fixed polynomial or Fourier bases.
#[derive(Module, Debug)]
pub struct NBeatsBlock<B: Backend> {
    layers: Vec<Linear<B>>,
    theta_backcast: Linear<B>,
    theta_forecast: Linear<B>,
    backcast_basis: Option<Linear<B>>,
    forecast_basis: Option<Linear<B>>,
    polynomial: bool,
    theta_dim: usize,
}

impl<B: Backend> NBeatsBlock<B> {
    fn new(
        stack_type: StackType,
        backcast_length: usize,
        forecast_length: usize,
        hidden_size: usize,
        n_layers: usize,
        theta_dim: usize,
        device: &B::Device,
    ) -> Self {
        let layers = (0..n_layers)
            .map(|i| {
                let d_input = if i == 0 { backcast_length } else { hidden_size };
                LinearConfig::new(d_input, hidden_size).init(device)
            })
            .collect();
        let theta = || LinearConfig::new(hidden_size, theta_dim).with_bias(false).init(device);
        let generic = stack_type == StackType::Generic;

        Self {
            layers,
            theta_backcast: theta(),
            theta_forecast: theta(),
            backcast_basis: generic.then(|| LinearConfig::new(theta_dim, backcast_length).init(device)),
            forecast_basis: generic.then(|| LinearConfig::new(theta_dim, forecast_length).init(device)),
            polynomial: stack_type == StackType::Trend,
            theta_dim,
        }
    }

    fn expand(&self, theta: Tensor<B, 2>, learned: &Option<Linear<B>>, len: usize) -> Tensor<B, 2> {
        match learned {
            Some(linear) => linear.forward(theta),
            None => {
                let basis = if self.polynomial {
                    trend_basis::<B>(self.theta_dim, len, &theta.device())
                } else {
                    seasonality_basis::<B>(self.theta_dim, len, &theta.device())
                };
                theta.matmul(basis)
            }
        }
    }

    /// Map the residual history `(B, T)` to `(backcast (B, T), forecast (B, H))`.
    pub fn forward(&self, x: Tensor<B, 2>, activation: &Relu, horizon: usize) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let backcast_length = x.dims()[1];
        let hidden = self
            .layers
            .iter()
            .fold(x, |h, layer| activation.forward(layer.forward(h)));

        let backcast = self.expand(
            self.theta_backcast.forward(hidden.clone()),
            &self.backcast_basis,
            backcast_length,
        );
        let forecast = self.expand(self.theta_forecast.forward(hidden), &self.forecast_basis, horizon);
        (backcast, forecast)
    }
}

/// Rows `(t / len)^i` for `i < dim`, shape `(dim, len)`.
fn trend_basis<B: Backend>(dim: usize, len: usize, device: &B::Device) -> Tensor<B, 2> {
    let values: Vec<f32> = (0..dim)
        .flat_map(|i| (0..len).map(move |t| (t as f32 / len as f32).powi(i as i32)))
        .collect();
    Tensor::<B, 1>::from_floats(values.as_slice(), device).reshape([dim, len])
}

/// Alternating cosine and sine rows of increasing frequency, shape `(dim, len)`.
fn seasonality_basis<B: Backend>(dim: usize, len: usize, device: &B::Device) -> Tensor<B, 2> {
    let values: Vec<f32> = (0..dim)
        .flat_map(|i| {
            let frequency = ((i + 1) / 2) as f32;
            (0..len).map(move |t| {
                let angle = 2.0 * PI * frequency * t as f32 / len as f32;
                if i % 2 == 0 {
                    angle.cos()
                } else {
                    angle.sin()
                }
            })
        })
        .collect();
    Tensor::<B, 1>::from_floats(values.as_slice(), device).reshape([dim, len])
}

/// N-BEATS forecaster on the target channel.
///
/// Covariate columns and decoder features are ignored.
#[derive(Module, Debug)]
pub struct NBeats<B: Backend> {
    blocks: Vec<NBeatsBlock<B>>,
    repeats: usize,
    activation: Relu,
    predict_sequence_length: usize,
}

impl<B: Backend> NBeats<B> {
    /// Forward pass returning `(B, H, 1)`.
    pub fn forward(&self, inputs: ModelInputs<B>) -> Tensor<B, 3> {
        let [batch, train_length, _] = inputs.x.dims();
        let horizon = self.predict_sequence_length;
        let mut residual = inputs
            .x
            .slice([0..batch, 0..train_length, 0..1])
            .reshape([batch, train_length]);
        let mut forecast = Tensor::<B, 2>::zeros([batch, horizon], &residual.device());

        for block in &self.blocks {
            for _ in 0..self.repeats {
                let (backcast, block_forecast) = block.forward(residual.clone(), &self.activation, horizon);
                residual = residual - backcast;
                forecast = forecast + block_forecast;
            }
        }

        forecast.reshape([batch, horizon, 1])
    }
}

impl<B: Backend> TSForecastingModel<B> for NBeats<B> {
    fn forward(&self, inputs: ModelInputs<B>, _teacher: Option<Tensor<B, 3>>) -> Tensor<B, 3> {
        NBeats::forward(self, inputs)
    }

    fn predict_sequence_length(&self) -> usize {
        self.predict_sequence_length
    }
}
