//! ProbSparse self-attention from Informer.
//!
//! Only the `u = factor * ceil(ln L)` queries with the most peaked attention
//! distribution, estimated on a random sample of keys, attend over all keys.
//! The remaining rows keep a cheap initial context: the mean of the values,
//! or their running sum when the attention is causal.

use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation::softmax;
use burn::tensor::Distribution;
use serde::{Deserialize, Serialize};

use super::attention::MASK_VALUE;

/// Configuration for [`ProbAttention`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbAttentionConfig {
    /// Width of inputs and projections.
    pub hidden_size: usize,
    /// Number of heads; must divide `hidden_size`.
    pub num_heads: usize,
    /// Sampling factor `c` in `u = c * ceil(ln L)`.
    pub factor: usize,
    /// Mask future keys of the selected queries.
    pub causal: bool,
    /// Dropout on attention probabilities.
    pub dropout: f64,
}

impl ProbAttentionConfig {
    /// Create a config with factor 5.
    pub fn new(hidden_size: usize, num_heads: usize) -> Self {
        Self {
            hidden_size,
            num_heads,
            factor: 5,
            causal: false,
            dropout: 0.0,
        }
    }

    /// Set the sampling factor.
    #[must_use]
    pub fn with_factor(mut self, factor: usize) -> Self {
        self.factor = factor;
        self
    }

    /// Enable causal masking.
    #[must_use]
    pub fn with_causal(mut self, causal: bool) -> Self {
        self.causal = causal;
        self
    }

    /// Set the attention dropout.
    #[must_use]
    pub fn with_dropout(mut self, dropout: f64) -> Self {
        self.dropout = dropout;
        self
    }

    /// Initialize the layer.
    pub fn init<B: Backend>(&self, device: &B::Device) -> ProbAttention<B> {
        let proj = || {
            LinearConfig::new(self.hidden_size, self.hidden_size)
                .with_bias(false)
                .init(device)
        };
        ProbAttention {
            query: proj(),
            key: proj(),
            value: proj(),
            dropout: DropoutConfig::new(self.dropout).init(),
            num_heads: self.num_heads,
            head_dim: self.hidden_size / self.num_heads.max(1),
            factor: self.factor,
            causal: self.causal,
        }
    }
}

/// ProbSparse multi-head attention.
#[derive(Module, Debug)]
pub struct ProbAttention<B: Backend> {
    query: Linear<B>,
    key: Linear<B>,
    value: Linear<B>,
    dropout: Dropout,
    num_heads: usize,
    head_dim: usize,
    factor: usize,
    causal: bool,
}

/// `min(factor * ceil(ln len), len)`, at least 1.
pub(crate) fn sample_count(factor: usize, len: usize) -> usize {
    let log = (len.max(1) as f64).ln().ceil() as usize;
    (factor * log).clamp(1, len.max(1))
}

impl<B: Backend> ProbAttention<B> {
    /// Attend from `q` `(B, Lq, D)` over `k`, `v` `(B, Lk, D)`.
    ///
    /// Causal attention requires `Lq == Lk`.
    pub fn forward(&self, q: Tensor<B, 3>, k: Tensor<B, 3>, v: Tensor<B, 3>) -> Tensor<B, 3> {
        let device = q.device();
        let [batch, len_q, _] = q.dims();
        let len_k = k.dims()[1];
        let heads = self.num_heads;
        let head_dim = self.head_dim;

        let q = self.split_heads(self.query.forward(q));
        let k = self.split_heads(self.key.forward(k));
        let v = self.split_heads(self.value.forward(v));

        // Sparsity measure M = max(qk) - mean(qk) on sampled keys
        let n_sample = sample_count(self.factor, len_k);
        let sampled = Tensor::<B, 1>::random([n_sample], Distribution::Uniform(0.0, len_k as f64), &device)
            .int()
            .clamp(0, len_k as i64 - 1);
        let k_sample = k.clone().select(2, sampled);
        let qk_sample = q.clone().matmul(k_sample.swap_dims(2, 3));
        let sparsity = qk_sample.clone().max_dim(3) - qk_sample.sum_dim(3) / len_k as f32;

        let n_top = sample_count(self.factor, len_q);
        let (_, order) = sparsity
            .reshape([batch, heads, len_q])
            .sort_descending_with_indices(2);
        let top = order.narrow(2, 0, n_top);
        let top_rows = top
            .clone()
            .unsqueeze_dim::<4>(3)
            .repeat_dim(3, head_dim);

        let q_reduce = q.gather(2, top_rows.clone());
        let scale = (head_dim as f32).sqrt();
        let mut scores = q_reduce.matmul(k.swap_dims(2, 3)) / scale;

        if self.causal {
            let future = causal_rows::<B>(len_q, len_k, &device)
                .reshape([1, 1, len_q, len_k])
                .expand([batch, heads, len_q, len_k]);
            let mask_rows = top.unsqueeze_dim::<4>(3).repeat_dim(3, len_k);
            let mask = future.gather(2, mask_rows).greater_elem(0.5);
            scores = scores.mask_fill(mask, MASK_VALUE);
        }

        let weights = self.dropout.forward(softmax(scores, 3));
        let updated = weights.matmul(v.clone());

        let initial = if self.causal {
            // Running sum of the values through a lower-triangular matmul
            let future = causal_rows::<B>(len_q, len_k, &device);
            (future.ones_like() - future)
                .reshape([1, 1, len_q, len_k])
                .expand([batch, heads, len_q, len_k])
                .matmul(v)
        } else {
            v.mean_dim(2).expand([batch, heads, len_q, head_dim])
        };

        let current = initial.clone().gather(2, top_rows.clone());
        let context = initial.scatter(2, top_rows, updated - current);
        self.merge_heads(context)
    }

    fn split_heads(&self, x: Tensor<B, 3>) -> Tensor<B, 4> {
        let [batch, len, _] = x.dims();
        x.reshape([batch, len, self.num_heads, self.head_dim])
            .swap_dims(1, 2)
    }

    fn merge_heads(&self, x: Tensor<B, 4>) -> Tensor<B, 3> {
        let [batch, heads, len, head_dim] = x.dims();
        x.swap_dims(1, 2).reshape([batch, len, heads * head_dim])
    }
}

/// `(Lq, Lk)` float matrix with 1.0 strictly above the diagonal.
fn causal_rows<B: Backend>(len_q: usize, len_k: usize, device: &B::Device) -> Tensor<B, 2> {
    let data: Vec<f32> = (0..len_q * len_k)
        .map(|i| if i % len_k > i / len_k { 1.0 } else { 0.0 })
        .collect();
    Tensor::<B, 1>::from_floats(data.as_slice(), device).reshape([len_q, len_k])
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::Distribution;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_sample_count() {
        assert_eq!(sample_count(5, 1), 1);
        assert_eq!(sample_count(5, 10), 10);
        assert_eq!(sample_count(5, 96), 25);
        assert_eq!(sample_count(1, 96), 5);
    }

    #[test]
    fn test_prob_attention_shapes() {
        let device = Default::default();
        let layer = ProbAttentionConfig::new(16, 2)
            .with_factor(1)
            .init::<TestBackend>(&device);
        let q = Tensor::random([2, 40, 16], Distribution::Normal(0.0, 1.0), &device);
        let kv = Tensor::random([2, 30, 16], Distribution::Normal(0.0, 1.0), &device);

        assert_eq!(layer.forward(q, kv.clone(), kv).dims(), [2, 40, 16]);
    }

    #[test]
    fn test_causal_prob_attention_ignores_future() {
        let device = Default::default();
        let layer = ProbAttentionConfig::new(8, 1)
            .with_causal(true)
            .init::<TestBackend>(&device);

        let x = Tensor::<TestBackend, 3>::random([1, 6, 8], Distribution::Normal(0.0, 1.0), &device);
        let mut perturbed = x.clone();
        perturbed = perturbed.slice_assign(
            [0..1, 5..6, 0..8],
            Tensor::random([1, 1, 8], Distribution::Normal(5.0, 1.0), &device),
        );

        // With factor 5 every query is selected for L = 6, so the result is exact.
        let a = layer.forward(x.clone(), x.clone(), x);
        let b = layer.forward(perturbed.clone(), perturbed.clone(), perturbed);
        let a: Vec<f32> = a.slice([0..1, 0..5, 0..8]).into_data().to_vec().unwrap();
        let b: Vec<f32> = b.slice([0..1, 0..5, 0..8]).into_data().to_vec().unwrap();
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-4);
        }
    }
}
