//! Post-norm transformer encoder and decoder layers.

use burn::nn::{Dropout, DropoutConfig, LayerNorm, LayerNormConfig};
use burn::prelude::*;
use serde::{Deserialize, Serialize};

use super::attention::{causal_mask, Attention, AttentionConfig};
use super::feed_forward::{FeedForwardNetwork, FeedForwardNetworkConfig};
use super::prob_attention::{ProbAttention, ProbAttentionConfig};

/// Full or ProbSparse self-attention.
#[derive(Module, Debug)]
pub struct AttentionKind<B: Backend> {
    full: Option<Attention<B>>,
    prob: Option<ProbAttention<B>>,
}

impl<B: Backend> AttentionKind<B> {
    fn new(
        hidden_size: usize,
        num_heads: usize,
        dropout: f64,
        prob: Option<(usize, bool)>,
        device: &B::Device,
    ) -> Self {
        match prob {
            Some((factor, causal)) => Self {
                full: None,
                prob: Some(
                    ProbAttentionConfig::new(hidden_size, num_heads)
                        .with_factor(factor)
                        .with_causal(causal)
                        .with_dropout(dropout)
                        .init(device),
                ),
            },
            None => Self {
                full: Some(
                    AttentionConfig::new(hidden_size, num_heads)
                        .with_dropout(dropout)
                        .init(device),
                ),
                prob: None,
            },
        }
    }

    /// Self-attention over `x`, causal when `causal` is set.
    pub fn forward(&self, x: Tensor<B, 3>, causal: bool) -> Tensor<B, 3> {
        if let Some(prob) = &self.prob {
            return prob.forward(x.clone(), x.clone(), x);
        }
        let mask = causal.then(|| causal_mask::<B>(x.dims()[1], &x.device()));
        match &self.full {
            Some(full) => full.forward(x.clone(), x.clone(), x, mask),
            None => x,
        }
    }
}

/// Configuration for [`EncoderLayer`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderLayerConfig {
    /// Model width.
    pub hidden_size: usize,
    /// Number of attention heads.
    pub num_heads: usize,
    /// Inner width of the feed-forward network.
    pub ffn_intermediate_size: usize,
    /// Dropout on attention probabilities.
    pub attention_dropout: f64,
    /// Dropout on residual branches.
    pub hidden_dropout: f64,
    /// Use ProbSparse attention with this sampling factor.
    pub prob_attention_factor: Option<usize>,
}

impl EncoderLayerConfig {
    /// Create a new config.
    pub fn new(hidden_size: usize, num_heads: usize, ffn_intermediate_size: usize) -> Self {
        Self {
            hidden_size,
            num_heads,
            ffn_intermediate_size,
            attention_dropout: 0.0,
            hidden_dropout: 0.0,
            prob_attention_factor: None,
        }
    }

    /// Set the attention and hidden dropout.
    #[must_use]
    pub fn with_dropout(mut self, attention_dropout: f64, hidden_dropout: f64) -> Self {
        self.attention_dropout = attention_dropout;
        self.hidden_dropout = hidden_dropout;
        self
    }

    /// Switch to ProbSparse attention.
    #[must_use]
    pub fn with_prob_attention(mut self, factor: Option<usize>) -> Self {
        self.prob_attention_factor = factor;
        self
    }

    /// Initialize the layer.
    pub fn init<B: Backend>(&self, device: &B::Device) -> EncoderLayer<B> {
        EncoderLayer {
            attention: AttentionKind::new(
                self.hidden_size,
                self.num_heads,
                self.attention_dropout,
                self.prob_attention_factor.map(|f| (f, false)),
                device,
            ),
            norm1: LayerNormConfig::new(self.hidden_size).init(device),
            ffn: FeedForwardNetworkConfig::new(self.hidden_size, self.ffn_intermediate_size)
                .with_dropout(self.hidden_dropout)
                .init(device),
            norm2: LayerNormConfig::new(self.hidden_size).init(device),
            dropout: DropoutConfig::new(self.hidden_dropout).init(),
        }
    }
}

/// Self-attention and feed-forward sublayers, each followed by add & norm.
#[derive(Module, Debug)]
pub struct EncoderLayer<B: Backend> {
    attention: AttentionKind<B>,
    norm1: LayerNorm<B>,
    ffn: FeedForwardNetwork<B>,
    norm2: LayerNorm<B>,
    dropout: Dropout,
}

impl<B: Backend> EncoderLayer<B> {
    /// Forward pass over `(B, L, hidden)`.
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let attn = self.attention.forward(x.clone(), false);
        let x = self.norm1.forward(x + self.dropout.forward(attn));

        let ff = self.ffn.forward(x.clone());
        self.norm2.forward(x + self.dropout.forward(ff))
    }
}

/// Configuration for [`DecoderLayer`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecoderLayerConfig {
    /// Model width.
    pub hidden_size: usize,
    /// Number of attention heads.
    pub num_heads: usize,
    /// Inner width of the feed-forward network.
    pub ffn_intermediate_size: usize,
    /// Dropout on attention probabilities.
    pub attention_dropout: f64,
    /// Dropout on residual branches.
    pub hidden_dropout: f64,
    /// Use causal ProbSparse self-attention with this sampling factor.
    pub prob_attention_factor: Option<usize>,
}

impl DecoderLayerConfig {
    /// Create a new config.
    pub fn new(hidden_size: usize, num_heads: usize, ffn_intermediate_size: usize) -> Self {
        Self {
            hidden_size,
            num_heads,
            ffn_intermediate_size,
            attention_dropout: 0.0,
            hidden_dropout: 0.0,
            prob_attention_factor: None,
        }
    }

    /// Set the attention and hidden dropout.
    #[must_use]
    pub fn with_dropout(mut self, attention_dropout: f64, hidden_dropout: f64) -> Self {
        self.attention_dropout = attention_dropout;
        self.hidden_dropout = hidden_dropout;
        self
    }

    /// Switch the self-attention to ProbSparse.
    #[must_use]
    pub fn with_prob_attention(mut self, factor: Option<usize>) -> Self {
        self.prob_attention_factor = factor;
        self
    }

    /// Initialize the layer.
    pub fn init<B: Backend>(&self, device: &B::Device) -> DecoderLayer<B> {
        let norm = || LayerNormConfig::new(self.hidden_size).init(device);
        DecoderLayer {
            self_attention: AttentionKind::new(
                self.hidden_size,
                self.num_heads,
                self.attention_dropout,
                self.prob_attention_factor.map(|f| (f, true)),
                device,
            ),
            cross_attention: AttentionConfig::new(self.hidden_size, self.num_heads)
                .with_dropout(self.attention_dropout)
                .init(device),
            ffn: FeedForwardNetworkConfig::new(self.hidden_size, self.ffn_intermediate_size)
                .with_dropout(self.hidden_dropout)
                .init(device),
            norm1: norm(),
            norm2: norm(),
            norm3: norm(),
            dropout: DropoutConfig::new(self.hidden_dropout).init(),
        }
    }
}

/// Causal self-attention, cross-attention over encoder memory, and a
/// feed-forward sublayer, each followed by add & norm.
#[derive(Module, Debug)]
pub struct DecoderLayer<B: Backend> {
    self_attention: AttentionKind<B>,
    cross_attention: Attention<B>,
    ffn: FeedForwardNetwork<B>,
    norm1: LayerNorm<B>,
    norm2: LayerNorm<B>,
    norm3: LayerNorm<B>,
    dropout: Dropout,
}

impl<B: Backend> DecoderLayer<B> {
    /// Forward pass of `x` `(B, Lq, hidden)` against `memory` `(B, Lk, hidden)`.
    pub fn forward(&self, x: Tensor<B, 3>, memory: Tensor<B, 3>) -> Tensor<B, 3> {
        let attn = self.self_attention.forward(x.clone(), true);
        let x = self.norm1.forward(x + self.dropout.forward(attn));

        let cross = self
            .cross_attention
            .forward(x.clone(), memory.clone(), memory, None);
        let x = self.norm2.forward(x + self.dropout.forward(cross));

        let ff = self.ffn.forward(x.clone());
        self.norm3.forward(x + self.dropout.forward(ff))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::Distribution;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_encoder_layer_shapes() {
        let device = Default::default();
        for prob in [None, Some(5)] {
            let layer = EncoderLayerConfig::new(16, 4, 32)
                .with_prob_attention(prob)
                .init::<TestBackend>(&device);
            let x = Tensor::random([2, 12, 16], Distribution::Normal(0.0, 1.0), &device);
            assert_eq!(layer.forward(x).dims(), [2, 12, 16]);
        }
    }

    #[test]
    fn test_decoder_layer_is_causal() {
        let device = Default::default();
        let layer = DecoderLayerConfig::new(8, 2, 16).init::<TestBackend>(&device);
        let memory = Tensor::<TestBackend, 3>::random([1, 10, 8], Distribution::Normal(0.0, 1.0), &device);
        let x = Tensor::<TestBackend, 3>::random([1, 5, 8], Distribution::Normal(0.0, 1.0), &device);

        let full = layer.forward(x.clone(), memory.clone());
        let prefix = layer.forward(x.slice([0..1, 0..3, 0..8]), memory);
        let a: Vec<f32> = full.slice([0..1, 0..3, 0..8]).into_data().to_vec().unwrap();
        let b: Vec<f32> = prefix.into_data().to_vec().unwrap();
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-4);
        }
    }
}
