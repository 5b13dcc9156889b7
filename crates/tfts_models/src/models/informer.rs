//! Informer: ProbSparse attention and distilling for long sequences.
//!
//! Reference: "Informer: Beyond Efficient Transformer for Long Sequence
//! Time-Series Forecasting" by Zhou et al. (2021)

use burn::nn::{LayerNorm, LayerNormConfig, Linear, LinearConfig};
use burn::prelude::*;
use serde::{Deserialize, Serialize};

use super::{check_heads, check_positive, check_probability};
use crate::error::Result;
use crate::layers::{
    DataEmbedding, DataEmbeddingConfig, DecoderLayer, DecoderLayerConfig, DistilConv, DistilConvConfig, EncoderLayer,
    EncoderLayerConfig,
};
use tfts_core::{InputSpec, ModelInputs, TSForecastingModel};

/// Configuration for [`Informer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InformerConfig {
    /// Model width.
    pub hidden_size: usize,
    /// Encoder layers.
    pub num_layers: usize,
    /// Decoder layers, defaults to `num_layers`.
    pub num_decoder_layers: Option<usize>,
    /// Attention heads.
    pub num_attention_heads: usize,
    /// Dropout on attention probabilities.
    pub attention_probs_dropout_prob: f64,
    /// Inner width of the feed-forward networks.
    pub ffn_intermediate_size: usize,
    /// Dropout on embeddings and residual branches.
    pub hidden_dropout_prob: f64,
    /// Use ProbSparse self-attention.
    pub prob_attention: bool,
    /// Halve the sequence between encoder layers.
    pub distil_conv: bool,
    /// ProbSparse sampling factor.
    pub factor: usize,
}

impl Default for InformerConfig {
    fn default() -> Self {
        Self {
            hidden_size: 64,
            num_layers: 1,
            num_decoder_layers: None,
            num_attention_heads: 1,
            attention_probs_dropout_prob: 0.0,
            ffn_intermediate_size: 128,
            hidden_dropout_prob: 0.0,
            prob_attention: false,
            distil_conv: false,
            factor: 5,
        }
    }
}

impl InformerConfig {
    /// Enable ProbSparse self-attention.
    #[must_use]
    pub fn with_prob_attention(mut self, prob_attention: bool) -> Self {
        self.prob_attention = prob_attention;
        self
    }

    /// Enable distilling between encoder layers.
    #[must_use]
    pub fn with_distil_conv(mut self, distil_conv: bool) -> Self {
        self.distil_conv = distil_conv;
        self
    }

    /// Set the number of encoder layers.
    #[must_use]
    pub fn with_num_layers(mut self, num_layers: usize) -> Self {
        self.num_layers = num_layers;
        self
    }

    fn decoder_layers(&self) -> usize {
        self.num_decoder_layers.unwrap_or(self.num_layers)
    }

    /// Check the hyperparameters.
    pub fn validate(&self, _spec: &InputSpec, _predict_sequence_length: usize) -> Result<()> {
        check_heads("informer", self.hidden_size, self.num_attention_heads)?;
        check_positive("informer", "num_layers", self.num_layers)?;
        check_positive("informer", "num_decoder_layers", self.decoder_layers())?;
        check_positive("informer", "ffn_intermediate_size", self.ffn_intermediate_size)?;
        check_positive("informer", "factor", self.factor)?;
        check_probability("informer", "attention_probs_dropout_prob", self.attention_probs_dropout_prob)?;
        check_probability("informer", "hidden_dropout_prob", self.hidden_dropout_prob)
    }

    /// Initialize the model.
    pub fn init<B: Backend>(
        &self,
        spec: &InputSpec,
        predict_sequence_length: usize,
        device: &B::Device,
    ) -> Informer<B> {
        let factor = self.prob_attention.then_some(self.factor);
        let encoder_layer = EncoderLayerConfig::new(self.hidden_size, self.num_attention_heads, self.ffn_intermediate_size)
            .with_dropout(self.attention_probs_dropout_prob, self.hidden_dropout_prob)
            .with_prob_attention(factor);
        let decoder_layer = DecoderLayerConfig::new(self.hidden_size, self.num_attention_heads, self.ffn_intermediate_size)
            .with_dropout(self.attention_probs_dropout_prob, self.hidden_dropout_prob)
            .with_prob_attention(factor);

        let distil_layers = if self.distil_conv {
            self.num_layers - 1
        } else {
            0
        };

        Informer {
            encoder_embedding: DataEmbeddingConfig::new(spec.encoder_features, self.hidden_size)
                .with_dropout(self.hidden_dropout_prob)
                .init(device),
            encoder_layers: (0..self.num_layers).map(|_| encoder_layer.init(device)).collect(),
            distil_layers: (0..distil_layers)
                .map(|_| DistilConvConfig::new(self.hidden_size).init(device))
                .collect(),
            encoder_norm: LayerNormConfig::new(self.hidden_size).init(device),
            decoder_embedding: DataEmbeddingConfig::new(spec.decoder_features, self.hidden_size)
                .with_dropout(self.hidden_dropout_prob)
                .init(device),
            decoder_layers: (0..self.decoder_layers()).map(|_| decoder_layer.init(device)).collect(),
            decoder_norm: LayerNormConfig::new(self.hidden_size).init(device),
            project: LinearConfig::new(self.hidden_size, 1).init(device),
            predict_sequence_length,
        }
    }
}

/// Informer forecaster.
///
/// The decoder runs once over the embedded decoder features with causal
/// self-attention and cross-attention to the encoder memory.
#[derive(Module, Debug)]
pub struct Informer<B: Backend> {
    encoder_embedding: DataEmbedding<B>,
    encoder_layers: Vec<EncoderLayer<B>>,
    distil_layers: Vec<DistilConv<B>>,
    encoder_norm: LayerNorm<B>,
    decoder_embedding: DataEmbedding<B>,
    decoder_layers: Vec<DecoderLayer<B>>,
    decoder_norm: LayerNorm<B>,
    project: Linear<B>,
    predict_sequence_length: usize,
}

impl<B: Backend> Informer<B> {
    fn encode(&self, encoder_feature: Tensor<B, 3>) -> Tensor<B, 3> {
        let mut x = self.encoder_embedding.forward(encoder_feature);
        for (i, layer) in self.encoder_layers.iter().enumerate() {
            x = layer.forward(x);
            if let Some(distil) = self.distil_layers.get(i) {
                x = distil.forward(x);
            }
        }
        self.encoder_norm.forward(x)
    }

    /// Forward pass returning `(B, H, 1)`.
    pub fn forward(&self, inputs: ModelInputs<B>) -> Tensor<B, 3> {
        let prepared = inputs.prepare(self.predict_sequence_length);
        let memory = self.encode(prepared.encoder_feature);

        let x = self.decoder_embedding.forward(prepared.decoder_feature);
        let x = self
            .decoder_layers
            .iter()
            .fold(x, |x, layer| layer.forward(x, memory.clone()));
        self.project.forward(self.decoder_norm.forward(x))
    }
}

impl<B: Backend> TSForecastingModel<B> for Informer<B> {
    fn forward(&self, inputs: ModelInputs<B>, _teacher: Option<Tensor<B, 3>>) -> Tensor<B, 3> {
        Informer::forward(self, inputs)
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
    fn test_informer_output_shape() {
        let device = Default::default();
        let spec = InputSpec::univariate(24, 1);
        let config = InformerConfig::default();
        config.validate(&spec, 6).unwrap();
        let model = config.init::<TestBackend>(&spec, 6, &device);
        let x = Tensor::random([2, 24, 1], Distribution::Normal(0.0, 1.0), &device);
        assert_eq!(model.forward(ModelInputs::array(x)).dims(), [2, 6, 1]);
    }

    #[test]
    fn test_informer_prob_attention_and_distil() {
        let device = Default::default();
        let spec = InputSpec::new(32, 3, 2);
        let config = InformerConfig::default()
            .with_num_layers(3)
            .with_prob_attention(true)
            .with_distil_conv(true);
        let model = config.init::<TestBackend>(&spec, 8, &device);
        assert_eq!(model.distil_layers.len(), 2);

        let x = Tensor::random([2, 32, 1], Distribution::Normal(0.0, 1.0), &device);
        let enc = Tensor::random([2, 32, 2], Distribution::Normal(0.0, 1.0), &device);
        let dec = Tensor::random([2, 8, 2], Distribution::Normal(0.0, 1.0), &device);
        let out = model.forward(ModelInputs::with_features(x, enc, dec));
        assert_eq!(out.dims(), [2, 8, 1]);
    }

    #[test]
    fn test_informer_serde_defaults() {
        let config: InformerConfig = serde_json::from_str(r#"{"prob_attention": true}"#).unwrap();
        assert!(config.prob_attention);
        assert_eq!(config.factor, 5);
        assert_eq!(config.hidden_size, 64);
    }
}
