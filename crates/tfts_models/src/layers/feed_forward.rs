//! Position-wise feed-forward network.

use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig, Relu};
use burn::prelude::*;
use serde::{Deserialize, Serialize};

/// Configuration for [`FeedForwardNetwork`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedForwardNetworkConfig {
    /// Input and output width.
    pub hidden_size: usize,
    /// Width of the inner layer.
    pub intermediate_size: usize,
    /// Dropout after the activation.
    pub dropout: f64,
}

impl FeedForwardNetworkConfig {
    /// Create a new config.
    pub fn new(hidden_size: usize, intermediate_size: usize) -> Self {
        Self {
            hidden_size,
            intermediate_size,
            dropout: 0.0,
        }
    }

    /// Set dropout rate.
    #[must_use]
    pub fn with_dropout(mut self, dropout: f64) -> Self {
        self.dropout = dropout;
        self
    }

    /// Initialize the network.
    pub fn init<B: Backend>(&self, device: &B::Device) -> FeedForwardNetwork<B> {
        FeedForwardNetwork {
            inner: LinearConfig::new(self.hidden_size, self.intermediate_size).init(device),
            outer: LinearConfig::new(self.intermediate_size, self.hidden_size).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
            activation: Relu::new(),
        }
    }
}

/// `Dense(intermediate, relu) -> Dropout -> Dense(hidden)` applied per time step.
#[derive(Module, Debug)]
pub struct FeedForwardNetwork<B: Backend> {
    inner: Linear<B>,
    outer: Linear<B>,
    dropout: Dropout,
    activation: Relu,
}

impl<B: Backend> FeedForwardNetwork<B> {
    /// Forward pass over `(B, L, hidden)`.
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let x = self.activation.forward(self.inner.forward(x));
        self.outer.forward(self.dropout.forward(x))
    }
}
