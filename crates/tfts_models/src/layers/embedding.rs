//! Input embeddings for attention models.

use burn::nn::conv::{Conv1d, Conv1dConfig};
use burn::nn::{Dropout, DropoutConfig, PaddingConfig1d};
use burn::prelude::*;
use serde::{Deserialize, Serialize};

use super::conv::{CausalConv1d, CausalConv1dConfig};

/// Configuration for [`DataEmbedding`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataEmbeddingConfig {
    /// Number of input features.
    pub n_features: usize,
    /// Embedding width.
    pub hidden_size: usize,
    /// Dropout after the sum of token and position embeddings.
    pub dropout: f64,
    /// Left-pad the token convolution so position `t` only sees inputs `<= t`.
    pub causal: bool,
}

impl DataEmbeddingConfig {
    /// Create a new config.
    pub fn new(n_features: usize, hidden_size: usize) -> Self {
        Self {
            n_features,
            hidden_size,
            dropout: 0.0,
            causal: false,
        }
    }

    /// Set dropout rate.
    #[must_use]
    pub fn with_dropout(mut self, dropout: f64) -> Self {
        self.dropout = dropout;
        self
    }

    /// Use a causal token convolution.
    #[must_use]
    pub fn with_causal(mut self, causal: bool) -> Self {
        self.causal = causal;
        self
    }

    /// Initialize the embedding.
    pub fn init<B: Backend>(&self, device: &B::Device) -> DataEmbedding<B> {
        let (token, causal_token) = if self.causal {
            (None, Some(CausalConv1dConfig::new(self.n_features, self.hidden_size, 3).init(device)))
        } else {
            let conv = Conv1dConfig::new(self.n_features, self.hidden_size, 3)
                .with_padding(PaddingConfig1d::Explicit(1))
                .init(device);
            (Some(conv), None)
        };
        DataEmbedding {
            token,
            causal_token,
            dropout: DropoutConfig::new(self.dropout).init(),
        }
    }
}

/// Token convolution (kernel 3) plus sinusoidal positions.
#[derive(Module, Debug)]
pub struct DataEmbedding<B: Backend> {
    token: Option<Conv1d<B>>,
    causal_token: Option<CausalConv1d<B>>,
    dropout: Dropout,
}

impl<B: Backend> DataEmbedding<B> {
    /// Embed `(B, L, F)` into `(B, L, hidden)`.
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let x = x.swap_dims(1, 2);
        let x = match (&self.token, &self.causal_token) {
            (Some(conv), _) => conv.forward(x),
            (None, Some(conv)) => conv.forward(x),
            (None, None) => x,
        }
        .swap_dims(1, 2);
        let [_, len, hidden] = x.dims();
        let positions = positional_encoding::<B>(len, hidden, &x.device()).unsqueeze::<3>();
        self.dropout.forward(x + positions)
    }
}

/// Sinusoidal positional encoding of shape `(len, d_model)`.
pub fn positional_encoding<B: Backend>(len: usize, d_model: usize, device: &B::Device) -> Tensor<B, 2> {
    let mut pe = vec![0.0f32; len * d_model];

    for pos in 0..len {
        for i in 0..d_model {
            let angle = pos as f32 / 10000.0f32.powf((2 * (i / 2)) as f32 / d_model as f32);
            pe[pos * d_model + i] = if i % 2 == 0 { angle.sin() } else { angle.cos() };
        }
    }

    Tensor::<B, 1>::from_floats(pe.as_slice(), device).reshape([len, d_model])
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::Distribution;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_positional_encoding_values() {
        let device = Default::default();
        let pe: Vec<f32> = positional_encoding::<TestBackend>(3, 4, &device)
            .into_data()
            .to_vec()
            .unwrap();
        // position 0: sin(0), cos(0), sin(0), cos(0)
        assert_eq!(&pe[..4], &[0.0, 1.0, 0.0, 1.0]);
        assert!((pe[4] - 1.0f32.sin()).abs() < 1e-6);
    }

    #[test]
    fn test_data_embedding_shape() {
        let device = Default::default();
        let emb = DataEmbeddingConfig::new(3, 16).init::<TestBackend>(&device);
        let x = Tensor::random([2, 9, 3], Distribution::Normal(0.0, 1.0), &device);
        assert_eq!(emb.forward(x).dims(), [2, 9, 16]);
    }

    #[test]
    fn test_causal_embedding_ignores_future() {
        let device = Default::default();
        let emb = DataEmbeddingConfig::new(1, 8).with_causal(true).init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 3>::random([1, 6, 1], Distribution::Normal(0.0, 1.0), &device);
        let changed = x.clone().slice_assign([0..1, 4..6, 0..1], Tensor::full([1, 2, 1], 50.0, &device));

        let a = emb.forward(x).slice([0..1, 0..4, 0..8]);
        let b = emb.forward(changed).slice([0..1, 0..4, 0..8]);
        let diff: f32 = (a - b).abs().sum().into_scalar();
        assert!(diff < 1e-6);
    }
}
