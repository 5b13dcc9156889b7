//! Temporal Convolutional Network forecaster.
//!
//! Residual blocks of causal dilated convolutions followed by a dense head on
//! the last time step.
//!
//! Reference: "An Empirical Evaluation of Generic Convolutional and Recurrent
//! Networks for Sequence Modeling" by Bai et al. (2018)

use burn::nn::conv::{Conv1d, Conv1dConfig};
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig, Relu};
use burn::prelude::*;
use serde::{Deserialize, Serialize};

use super::{check_positive, check_probability, time_step};
use crate::error::{ModelError, Result};
use crate::layers::{CausalConv1d, CausalConv1dConfig};
use tfts_core::{InputSpec, ModelInputs, TSForecastingModel};

/// Configuration for a TCN residual block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TcnBlockConfig {
    /// Input channels.
    pub in_channels: usize,
    /// Output channels.
    pub out_channels: usize,
    /// Kernel size for convolutions.
    pub kernel_size: usize,
    /// Dilation factor.
    pub dilation: usize,
    /// Dropout rate.
    pub dropout: f64,
}

impl TcnBlockConfig {
    /// Create a new block config.
    pub fn new(in_channels: usize, out_channels: usize, kernel_size: usize, dilation: usize) -> Self {
        Self {
            in_channels,
            out_channels,
            kernel_size,
            dilation,
            dropout: 0.0,
        }
    }

    /// Set dropout rate.
    #[must_use]
    pub fn with_dropout(mut self, dropout: f64) -> Self {
        self.dropout = dropout;
        self
    }

    /// Initialize the block.
    pub fn init<B: Backend>(&self, device: &B::Device) -> TcnBlock<B> {
        let conv = |in_channels| {
            CausalConv1dConfig::new(in_channels, self.out_channels, self.kernel_size)
                .with_dilation(self.dilation)
                .init(device)
        };
        let residual = (self.in_channels != self.out_channels)
            .then(|| Conv1dConfig::new(self.in_channels, self.out_channels, 1).init(device));

        TcnBlock {
            conv1: conv(self.in_channels),
            conv2: conv(self.out_channels),
            dropout: DropoutConfig::new(self.dropout).init(),
            residual,
            activation: Relu::new(),
        }
    }
}

/// TCN residual block.
///
/// ```text
/// Input -> Conv1 -> ReLU -> Dropout -> Conv2 -> ReLU -> Dropout -> Add -> ReLU
///   |                                                               ^
///   +-------------------- (1x1 conv if needed) ---------------------+
/// ```
#[derive(Module, Debug)]
pub struct TcnBlock<B: Backend> {
    conv1: CausalConv1d<B>,
    conv2: CausalConv1d<B>,
    dropout: Dropout,
    residual: Option<Conv1d<B>>,
    activation: Relu,
}

impl<B: Backend> TcnBlock<B> {
    /// Forward pass over `(B, C, L)`.
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let out = self.dropout.forward(self.activation.forward(self.conv1.forward(x.clone())));
        let out = self.dropout.forward(self.activation.forward(self.conv2.forward(out)));

        let residual = match &self.residual {
            Some(conv) => conv.forward(x),
            None => x,
        };
        self.activation.forward(out + residual)
    }
}

/// Configuration for [`Tcn`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TcnConfig {
    /// Dilation of each residual block.
    pub dilation_rates: Vec<usize>,
    /// Kernel size of each residual block.
    pub kernel_sizes: Vec<usize>,
    /// Channels of every block.
    pub filters: usize,
    /// Width of the dense layer in the output head.
    pub dense_hidden_size: usize,
    /// Dropout inside the blocks.
    pub dropout: f64,
}

impl Default for TcnConfig {
    fn default() -> Self {
        Self {
            dilation_rates: vec![1, 2, 4, 8],
            kernel_sizes: vec![2; 4],
            filters: 64,
            dense_hidden_size: 64,
            dropout: 0.0,
        }
    }
}

impl TcnConfig {
    /// Set dilations and kernel sizes together.
    #[must_use]
    pub fn with_layers(mut self, dilation_rates: Vec<usize>, kernel_sizes: Vec<usize>) -> Self {
        self.dilation_rates = dilation_rates;
        self.kernel_sizes = kernel_sizes;
        self
    }

    /// Set the number of filters.
    #[must_use]
    pub fn with_filters(mut self, filters: usize) -> Self {
        self.filters = filters;
        self
    }

    /// Receptive field of the block stack in time steps.
    pub fn receptive_field(&self) -> usize {
        1 + self
            .dilation_rates
            .iter()
            .zip(&self.kernel_sizes)
            .map(|(&d, &k)| 2 * (k.saturating_sub(1)) * d)
            .sum::<usize>()
    }

    /// Check the hyperparameters.
    pub fn validate(&self, _spec: &InputSpec, _predict_sequence_length: usize) -> Result<()> {
        check_positive("tcn", "filters", self.filters)?;
        check_positive("tcn", "dense_hidden_size", self.dense_hidden_size)?;
        check_probability("tcn", "dropout", self.dropout)?;
        if self.dilation_rates.is_empty() || self.dilation_rates.len() != self.kernel_sizes.len() {
            return Err(ModelError::invalid(
                "tcn",
                "dilation_rates and kernel_sizes must be non-empty and of equal length",
            ));
        }
        if self.dilation_rates.contains(&0) || self.kernel_sizes.contains(&0) {
            return Err(ModelError::invalid("tcn", "dilations and kernel sizes must be > 0"));
        }
        Ok(())
    }

    /// Initialize the model.
    pub fn init<B: Backend>(&self, spec: &InputSpec, predict_sequence_length: usize, device: &B::Device) -> Tcn<B> {
        let blocks = self
            .dilation_rates
            .iter()
            .zip(&self.kernel_sizes)
            .enumerate()
            .map(|(i, (&dilation, &kernel))| {
                let in_channels = if i == 0 { spec.encoder_features } else { self.filters };
                TcnBlockConfig::new(in_channels, self.filters, kernel, dilation)
                    .with_dropout(self.dropout)
                    .init(device)
            })
            .collect();

        Tcn {
            blocks,
            dense: LinearConfig::new(self.filters, self.dense_hidden_size).init(device),
            project: LinearConfig::new(self.dense_hidden_size, predict_sequence_length).init(device),
            activation: Relu::new(),
            predict_sequence_length,
        }
    }
}

/// Temporal Convolutional Network.
#[derive(Module, Debug)]
pub struct Tcn<B: Backend> {
    blocks: Vec<TcnBlock<B>>,
    dense: Linear<B>,
    project: Linear<B>,
    activation: Relu,
    predict_sequence_length: usize,
}

impl<B: Backend> Tcn<B> {
    /// Forward pass returning `(B, H, 1)`.
    pub fn forward(&self, inputs: ModelInputs<B>) -> Tensor<B, 3> {
        let prepared = inputs.prepare(self.predict_sequence_length);

        // (B, T, F) -> (B, F, T)
        let mut x = prepared.encoder_feature.swap_dims(1, 2);
        for block in &self.blocks {
            x = block.forward(x);
        }
        let x = x.swap_dims(1, 2);
        let last = time_step(&x, x.dims()[1] - 1);

        let hidden = self.activation.forward(self.dense.forward(last));
        let [batch, _] = hidden.dims();
        self.project
            .forward(hidden)
            .reshape([batch, self.predict_sequence_length, 1])
    }
}

impl<B: Backend> TSForecastingModel<B> for Tcn<B> {
    fn forward(&self, inputs: ModelInputs<B>, _teacher: Option<Tensor<B, 3>>) -> Tensor<B, 3> {
        Tcn::forward(self, inputs)
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
    fn test_tcn_block() {
        let device = Default::default();
        let block = TcnBlockConfig::new(3, 8, 2, 2).init::<TestBackend>(&device);
        let x = Tensor::random([2, 3, 20], Distribution::Normal(0.0, 1.0), &device);
        assert_eq!(block.forward(x).dims(), [2, 8, 20]);
    }

    #[test]
    fn test_tcn_output_shape() {
        let device = Default::default();
        let spec = InputSpec::univariate(30, 3);
        let config = TcnConfig::default().with_filters(16);
        config.validate(&spec, 7).unwrap();
        let model = config.init::<TestBackend>(&spec, 7, &device);
        let x = Tensor::random([4, 30, 3], Distribution::Normal(0.0, 1.0), &device);
        assert_eq!(model.forward(ModelInputs::array(x)).dims(), [4, 7, 1]);
    }

    #[test]
    fn test_receptive_field() {
        let config = TcnConfig::default();
        assert_eq!(config.receptive_field(), 1 + 2 * (1 + 2 + 4 + 8));
    }

    #[test]
    fn test_tcn_validation() {
        let spec = InputSpec::univariate(30, 1);
        assert!(TcnConfig::default()
            .with_layers(vec![1, 2], vec![2])
            .validate(&spec, 2)
            .is_err());
    }
}
