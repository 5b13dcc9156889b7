//! Convolutions over `(B, C, L)` sequences.

use burn::nn::conv::{Conv1d, Conv1dConfig};
use burn::nn::pool::{MaxPool1d, MaxPool1dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, PaddingConfig1d};
use burn::prelude::*;
use serde::{Deserialize, Serialize};

/// Configuration for [`CausalConv1d`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CausalConv1dConfig {
    /// Input channels.
    pub in_channels: usize,
    /// Output channels.
    pub out_channels: usize,
    /// Kernel size.
    pub kernel_size: usize,
    /// Dilation factor.
    pub dilation: usize,
}

impl CausalConv1dConfig {
    /// Create a new config with dilation 1.
    pub fn new(in_channels: usize, out_channels: usize, kernel_size: usize) -> Self {
        Self {
            in_channels,
            out_channels,
            kernel_size,
            dilation: 1,
        }
    }

    /// Set the dilation.
    #[must_use]
    pub fn with_dilation(mut self, dilation: usize) -> Self {
        self.dilation = dilation;
        self
    }

    /// Initialize the convolution.
    pub fn init<B: Backend>(&self, device: &B::Device) -> CausalConv1d<B> {
        // Causal padding: (kernel_size - 1) * dilation, trimmed on the right after the conv
        let padding = (self.kernel_size - 1) * self.dilation;
        CausalConv1d {
            conv: Conv1dConfig::new(self.in_channels, self.out_channels, self.kernel_size)
                .with_dilation(self.dilation)
                .with_padding(PaddingConfig1d::Explicit(padding))
                .init(device),
        }
    }
}

/// Dilated convolution whose output at `t` only sees inputs at `<= t`.
#[derive(Module, Debug)]
pub struct CausalConv1d<B: Backend> {
    conv: Conv1d<B>,
}

impl<B: Backend> CausalConv1d<B> {
    /// Forward pass over `(B, C_in, L)` returning `(B, C_out, L)`.
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let seq_len = x.dims()[2];
        let out = self.conv.forward(x);
        let [batch, channels, _] = out.dims();
        out.slice([0..batch, 0..channels, 0..seq_len])
    }
}

/// Configuration for [`DistilConv`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistilConvConfig {
    /// Channels in and out.
    pub channels: usize,
}

impl DistilConvConfig {
    /// Create a new config.
    pub fn new(channels: usize) -> Self {
        Self { channels }
    }

    /// Initialize the layer.
    pub fn init<B: Backend>(&self, device: &B::Device) -> DistilConv<B> {
        DistilConv {
            conv: CausalConv1dConfig::new(self.channels, self.channels, 3).init(device),
            norm: BatchNormConfig::new(self.channels).init(device),
            pool: MaxPool1dConfig::new(3)
                .with_stride(2)
                .with_padding(PaddingConfig1d::Explicit(1))
                .init(),
        }
    }
}

/// Informer distilling step: conv, batch norm, ELU, and a stride-2 max pool
/// that halves the sequence length (rounding up).
#[derive(Module, Debug)]
pub struct DistilConv<B: Backend> {
    conv: CausalConv1d<B>,
    norm: BatchNorm<B, 1>,
    pool: MaxPool1d,
}

impl<B: Backend> DistilConv<B> {
    /// Forward pass over `(B, L, C)` returning `(B, ceil(L/2), C)`.
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let x = self.norm.forward(self.conv.forward(x.swap_dims(1, 2)));
        // ELU with alpha = 1
        let x = x.clone().clamp_min(0.0) + (x.clamp_max(0.0).exp() - 1.0);
        self.pool.forward(x).swap_dims(1, 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::Distribution;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_causal_conv_shape() {
        let device = Default::default();
        let conv = CausalConv1dConfig::new(4, 8, 2)
            .with_dilation(4)
            .init::<TestBackend>(&device);
        let x = Tensor::random([2, 4, 20], Distribution::Normal(0.0, 1.0), &device);
        assert_eq!(conv.forward(x).dims(), [2, 8, 20]);
    }

    #[test]
    fn test_causal_conv_no_future_leak() {
        let device = Default::default();
        let conv = CausalConv1dConfig::new(1, 1, 3)
            .with_dilation(2)
            .init::<TestBackend>(&device);

        let x = Tensor::<TestBackend, 3>::random([1, 1, 12], Distribution::Normal(0.0, 1.0), &device);
        let changed = x
            .clone()
            .slice_assign([0..1, 0..1, 11..12], Tensor::from_floats([[[100.0]]], &device));

        let a: Vec<f32> = conv.forward(x).slice([0..1, 0..1, 0..11]).into_data().to_vec().unwrap();
        let b: Vec<f32> = conv.forward(changed).slice([0..1, 0..1, 0..11]).into_data().to_vec().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_distil_conv_halves_length() {
        let device = Default::default();
        let distil = DistilConvConfig::new(8).init::<TestBackend>(&device);
        let x = Tensor::random([2, 9, 8], Distribution::Normal(0.0, 1.0), &device);
        assert_eq!(distil.forward(x).dims(), [2, 5, 8]);
    }
}
