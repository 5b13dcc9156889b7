//! Encoder-decoder transformer with an auto-regressive decoder.

use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;
use serde::{Deserialize, Serialize};

use super::{check_heads, check_positive, check_probability, last_target, prefix, shifted_targets, use_teacher};
use crate::error::Result;
use crate::layers::{
    DataEmbedding, DataEmbeddingConfig, DecoderLayer, DecoderLayerConfig, EncoderLayer, EncoderLayerConfig,
};
use tfts_core::{InputSpec, ModelInputs, TSForecastingModel};

/// Configuration for [`Transformer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformerConfig {
    /// Model width.
    pub hidden_size: usize,
    /// Encoder layers.
    pub num_layers: usize,
    /// Decoder layers, defaults to `num_layers`.
    pub num_decoder_layers: Option<usize>,
    /// Attention heads.
    pub num_attention_heads: usize,
    /// Inner width of the feed-forward networks.
    pub ffn_intermediate_size: usize,
    /// Dropout on attention probabilities.
    pub attention_probs_dropout_prob: f64,
    /// Dropout on embeddings and residual branches.
    pub hidden_dropout_prob: f64,
    /// Probability of decoding from the model's own predictions while training.
    pub scheduled_sampling: f64,
}

impl Default for TransformerConfig {
    fn default() -> Self {
        Self {
            hidden_size: 64,
            num_layers: 2,
            num_decoder_layers: None,
            num_attention_heads: 4,
            ffn_intermediate_size: 256,
            attention_probs_dropout_prob: 0.0,
            hidden_dropout_prob: 0.0,
            scheduled_sampling: 0.0,
        }
    }
}

impl TransformerConfig {
    /// Set width and heads.
    #[must_use]
    pub fn with_hidden_size(mut self, hidden_size: usize, num_attention_heads: usize) -> Self {
        self.hidden_size = hidden_size;
        self.num_attention_heads = num_attention_heads;
        self
    }

    /// Set the number of encoder layers.
    #[must_use]
    pub fn with_num_layers(mut self, num_layers: usize) -> Self {
        self.num_layers = num_layers;
        self
    }

    /// Set the scheduled sampling probability.
    #[must_use]
    pub fn with_scheduled_sampling(mut self, scheduled_sampling: f64) -> Self {
        self.scheduled_sampling = scheduled_sampling;
        self
    }

    fn decoder_layers(&self) -> usize {
        self.num_decoder_layers.unwrap_or(self.num_layers)
    }

    /// Check the hyperparameters.
    pub fn validate(&self, _spec: &InputSpec, _predict_sequence_length: usize) -> Result<()> {
        check_heads("transformer", self.hidden_size, self.num_attention_heads)?;
        check_positive("transformer", "num_layers", self.num_layers)?;
        check_positive("transformer", "num_decoder_layers", self.decoder_layers())?;
        check_positive("transformer", "ffn_intermediate_size", self.ffn_intermediate_size)?;
        check_probability("transformer", "attention_probs_dropout_prob", self.attention_probs_dropout_prob)?;
        check_probability("transformer", "hidden_dropout_prob", self.hidden_dropout_prob)?;
        check_probability("transformer", "scheduled_sampling", self.scheduled_sampling)
    }

    /// Initialize the model.
    pub fn init<B: Backend>(
        &self,
        spec: &InputSpec,
        predict_sequence_length: usize,
        device: &B::Device,
    ) -> Transformer<B> {
        let encoder_layer = EncoderLayerConfig::new(self.hidden_size, self.num_attention_heads, self.ffn_intermediate_size)
            .with_dropout(self.attention_probs_dropout_prob, self.hidden_dropout_prob);
        let decoder_layer = DecoderLayerConfig::new(self.hidden_size, self.num_attention_heads, self.ffn_intermediate_size)
            .with_dropout(self.attention_probs_dropout_prob, self.hidden_dropout_prob);

        Transformer {
            encoder_embedding: DataEmbeddingConfig::new(spec.encoder_features, self.hidden_size)
                .with_dropout(self.hidden_dropout_prob)
                .init(device),
            encoder_layers: (0..self.num_layers).map(|_| encoder_layer.init(device)).collect(),
            decoder_embedding: DataEmbeddingConfig::new(spec.decoder_features + 1, self.hidden_size)
                .with_dropout(self.hidden_dropout_prob)
                .with_causal(true)
                .init(device),
            decoder_layers: (0..self.decoder_layers()).map(|_| decoder_layer.init(device)).collect(),
            project: LinearConfig::new(self.hidden_size, 1).init(device),
            predict_sequence_length,
            scheduled_sampling: self.scheduled_sampling,
        }
    }
}

/// Encoder-decoder transformer.
///
/// The decoder consumes `[x_last, y_0, ..., y_{H-2}]` joined with the decoder
/// features. With a teacher the whole horizon is decoded in one pass.
/// Otherwise the decoder runs `H` times, each pass appending its newest
/// prediction to the input of the next.
#[derive(Module, Debug)]
pub struct Transformer<B: Backend> {
    encoder_embedding: DataEmbedding<B>,
    encoder_layers: Vec<EncoderLayer<B>>,
    decoder_embedding: DataEmbedding<B>,
    decoder_layers: Vec<DecoderLayer<B>>,
    project: Linear<B>,
    predict_sequence_length: usize,
    scheduled_sampling: f64,
}

impl<B: Backend> Transformer<B> {
    fn encode(&self, encoder_feature: Tensor<B, 3>) -> Tensor<B, 3> {
        self.encoder_layers
            .iter()
            .fold(self.encoder_embedding.forward(encoder_feature), |x, layer| layer.forward(x))
    }

    fn decode(&self, targets: Tensor<B, 3>, decoder_feature: Tensor<B, 3>, memory: &Tensor<B, 3>) -> Tensor<B, 3> {
        let x = self
            .decoder_embedding
            .forward(Tensor::cat(vec![targets, decoder_feature], 2));
        let x = self
            .decoder_layers
            .iter()
            .fold(x, |x, layer| layer.forward(x, memory.clone()));
        self.project.forward(x)
    }

    /// Forward pass returning `(B, H, 1)`.
    pub fn forward(&self, inputs: ModelInputs<B>, teacher: Option<Tensor<B, 3>>) -> Tensor<B, 3> {
        let prepared = inputs.prepare(self.predict_sequence_length);
        let memory = self.encode(prepared.encoder_feature);
        let horizon = self.predict_sequence_length;

        if let Some(y) = teacher.filter(|y| use_teacher::<B>(self.scheduled_sampling, &y.device())) {
            let targets = shifted_targets(&prepared.x, y);
            return self.decode(targets, prepared.decoder_feature, &memory);
        }

        let [batch, _, _] = prepared.x.dims();
        let mut targets = last_target(&prepared.x).unsqueeze_dim::<3>(2);
        let mut predictions = Vec::with_capacity(horizon);

        for t in 0..horizon {
            let outputs = self.decode(targets.clone(), prefix(&prepared.decoder_feature, t + 1), &memory);
            let prediction = outputs.slice([0..batch, t..t + 1, 0..1]);
            predictions.push(prediction.clone());
            targets = Tensor::cat(vec![targets, prediction], 1);
        }

        Tensor::cat(predictions, 1)
    }
}

impl<B: Backend> TSForecastingModel<B> for Transformer<B> {
    fn forward(&self, inputs: ModelInputs<B>, teacher: Option<Tensor<B, 3>>) -> Tensor<B, 3> {
        Transformer::forward(self, inputs, teacher)
    }

    fn predict_sequence_length(&self) -> usize {
        self.predict_sequence_length
    }
}
