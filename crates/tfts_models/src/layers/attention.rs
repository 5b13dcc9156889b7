//! Multi-head scaled dot-product attention.

use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation::softmax;
use serde::{Deserialize, Serialize};

/// Value written into masked attention scores before the softmax.
pub(crate) const MASK_VALUE: f32 = -1.0e9;

/// Configuration for [`Attention`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttentionConfig {
    /// Width of the query input.
    pub d_query: usize,
    /// Width of the key and value inputs.
    pub d_key: usize,
    /// Width of the projected queries, keys and values.
    pub hidden_size: usize,
    /// Number of heads; must divide `hidden_size`.
    pub num_heads: usize,
    /// Dropout on attention probabilities.
    pub dropout: f64,
}

impl AttentionConfig {
    /// Attention with inputs already of width `hidden_size`.
    pub fn new(hidden_size: usize, num_heads: usize) -> Self {
        Self {
            d_query: hidden_size,
            d_key: hidden_size,
            hidden_size,
            num_heads,
            dropout: 0.0,
        }
    }

    /// Set the query input width.
    #[must_use]
    pub fn with_d_query(mut self, d_query: usize) -> Self {
        self.d_query = d_query;
        self
    }

    /// Set the key/value input width.
    #[must_use]
    pub fn with_d_key(mut self, d_key: usize) -> Self {
        self.d_key = d_key;
        self
    }

    /// Set the attention dropout.
    #[must_use]
    pub fn with_dropout(mut self, dropout: f64) -> Self {
        self.dropout = dropout;
        self
    }

    /// Initialize the layer.
    ///
    /// Callers validate that `num_heads` divides `hidden_size` first.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Attention<B> {
        let proj = |d_in: usize| {
            LinearConfig::new(d_in, self.hidden_size)
                .with_bias(false)
                .init(device)
        };
        Attention {
            query: proj(self.d_query),
            key: proj(self.d_key),
            value: proj(self.d_key),
            dropout: DropoutConfig::new(self.dropout).init(),
            num_heads: self.num_heads,
            head_dim: self.hidden_size / self.num_heads.max(1),
        }
    }
}

/// Multi-head attention with bias-free projections.
///
/// Heads are split from the hidden dimension, scores are scaled by
/// `1/sqrt(head_dim)`, and the heads are concatenated back without an output
/// projection.
#[derive(Module, Debug)]
pub struct Attention<B: Backend> {
    query: Linear<B>,
    key: Linear<B>,
    value: Linear<B>,
    dropout: Dropout,
    num_heads: usize,
    head_dim: usize,
}

impl<B: Backend> Attention<B> {
    /// Attend from `q` `(B, Lq, Dq)` over `k`, `v` `(B, Lk, Dk)`.
    ///
    /// `mask` is `(Lq, Lk)` with `true` at positions that must not be attended.
    pub fn forward(
        &self,
        q: Tensor<B, 3>,
        k: Tensor<B, 3>,
        v: Tensor<B, 3>,
        mask: Option<Tensor<B, 2, Bool>>,
    ) -> Tensor<B, 3> {
        self.forward_with_weights(q, k, v, mask).0
    }

    /// Like [`Self::forward`] but also returns the `(B, heads, Lq, Lk)` weights.
    pub fn forward_with_weights(
        &self,
        q: Tensor<B, 3>,
        k: Tensor<B, 3>,
        v: Tensor<B, 3>,
        mask: Option<Tensor<B, 2, Bool>>,
    ) -> (Tensor<B, 3>, Tensor<B, 4>) {
        let [batch, len_q, _] = q.dims();
        let len_k = k.dims()[1];

        let q = self.split_heads(self.query.forward(q));
        let k = self.split_heads(self.key.forward(k));
        let v = self.split_heads(self.value.forward(v));

        let scale = (self.head_dim as f32).sqrt();
        let mut scores = q.matmul(k.swap_dims(2, 3)) / scale;

        if let Some(mask) = mask {
            let mask = mask
                .reshape([1, 1, len_q, len_k])
                .expand([batch, self.num_heads, len_q, len_k]);
            scores = scores.mask_fill(mask, MASK_VALUE);
        }

        let weights = softmax(scores, 3);
        let context = self.dropout.forward(weights.clone()).matmul(v);
        (self.merge_heads(context), weights)
    }

    /// `(B, L, H*E)` to `(B, H, L, E)`.
    pub(crate) fn split_heads(&self, x: Tensor<B, 3>) -> Tensor<B, 4> {
        let [batch, len, _] = x.dims();
        x.reshape([batch, len, self.num_heads, self.head_dim])
            .swap_dims(1, 2)
    }

    /// `(B, H, L, E)` to `(B, L, H*E)`.
    pub(crate) fn merge_heads(&self, x: Tensor<B, 4>) -> Tensor<B, 3> {
        let [batch, heads, len, head_dim] = x.dims();
        x.swap_dims(1, 2).reshape([batch, len, heads * head_dim])
    }
}

/// Attention of a sequence over itself.
#[derive(Module, Debug)]
pub struct SelfAttention<B: Backend> {
    attention: Attention<B>,
}

impl<B: Backend> SelfAttention<B> {
    /// Wrap an attention layer whose query and key widths agree.
    pub fn new(attention: Attention<B>) -> Self {
        Self { attention }
    }

    /// Self-attention over `x` `(B, L, D)`.
    pub fn forward(&self, x: Tensor<B, 3>, mask: Option<Tensor<B, 2, Bool>>) -> Tensor<B, 3> {
        self.attention.forward(x.clone(), x.clone(), x, mask)
    }
}

/// Boolean `(len, len)` mask, `true` strictly above the diagonal.
pub fn causal_mask<B: Backend>(len: usize, device: &B::Device) -> Tensor<B, 2, Bool> {
    let data: Vec<f32> = (0..len * len)
        .map(|i| if i % len > i / len { 1.0 } else { 0.0 })
        .collect();
    Tensor::<B, 1>::from_floats(data.as_slice(), device)
        .reshape([len, len])
        .greater_elem(0.5)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::Distribution;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_attention_shapes() {
        let device = Default::default();
        let attn = AttentionConfig::new(16, 4).with_d_query(3).with_d_key(5).init::<TestBackend>(&device);

        let q = Tensor::random([2, 7, 3], Distribution::Normal(0.0, 1.0), &device);
        let kv = Tensor::random([2, 11, 5], Distribution::Normal(0.0, 1.0), &device);
        let (out, weights) = attn.forward_with_weights(q, kv.clone(), kv, None);

        assert_eq!(out.dims(), [2, 7, 16]);
        assert_eq!(weights.dims(), [2, 4, 7, 11]);
    }

    #[test]
    fn test_attention_weights_sum_to_one() {
        let device = Default::default();
        let attn = AttentionConfig::new(8, 2).init::<TestBackend>(&device);
        let x = Tensor::random([3, 6, 8], Distribution::Normal(0.0, 1.0), &device);

        let (_, weights) = attn.forward_with_weights(x.clone(), x.clone(), x, None);
        let sums: Vec<f32> = weights.sum_dim(3).into_data().to_vec().unwrap();
        assert!(sums.iter().all(|s| (s - 1.0).abs() < 1e-4));
    }

    #[test]
    fn test_causal_mask_blocks_future() {
        let device = Default::default();
        let mask = causal_mask::<TestBackend>(4, &device);
        let values: Vec<bool> = mask.clone().into_data().to_vec().unwrap();
        assert_eq!(values[1], true);
        assert_eq!(values[4], false);
        assert_eq!(values[4 * 3 + 3], false);

        let attn = AttentionConfig::new(8, 2).init::<TestBackend>(&device);
        let x = Tensor::random([1, 4, 8], Distribution::Normal(0.0, 1.0), &device);
        let (_, weights) = attn.forward_with_weights(x.clone(), x.clone(), x, Some(mask));
        let w: Vec<f32> = weights.into_data().to_vec().unwrap();
        for head in 0..2 {
            for i in 0..4 {
                for j in (i + 1)..4 {
                    assert!(w[head * 16 + i * 4 + j] < 1e-6);
                }
            }
        }
    }

    #[test]
    fn test_self_attention() {
        let device = Default::default();
        let layer = SelfAttention::new(AttentionConfig::new(12, 3).init::<TestBackend>(&device));
        let x = Tensor::random([2, 5, 12], Distribution::Normal(0.0, 1.0), &device);
        assert_eq!(layer.forward(x, None).dims(), [2, 5, 12]);
    }
}
