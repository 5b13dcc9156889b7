//! Encoder-only transformer with a dense forecast head.

use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig, Relu};
use burn::prelude::*;
use serde::{Deserialize, Serialize};

use super::{check_heads, check_positive, check_probability, skip_connections, time_step};
use crate::error::{ModelError, Result};
use crate::layers::{DataEmbedding, DataEmbeddingConfig, EncoderLayer, EncoderLayerConfig};
use tfts_core::{InputSpec, ModelInputs, TSForecastingModel};

/// Configuration for [`Bert`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BertConfig {
    /// Model width.
    pub hidden_size: usize,
    /// Encoder layers.
    pub num_layers: usize,
    /// Attention heads.
    pub num_attention_heads: usize,
    /// Inner width of the feed-forward networks.
    pub ffn_intermediate_size: usize,
    /// Dropout on attention probabilities.
    pub attention_probs_dropout_prob: f64,
    /// Dropout on embeddings, residual branches and the head input.
    pub hidden_dropout_prob: f64,
    /// Width of the dense layer in the output head.
    pub dense_hidden_size: usize,
    /// Add the last `H` history values of the target to the output.
    pub skip_connect_circle: bool,
    /// Add the history mean of the target to the output.
    pub skip_connect_mean: bool,
}

impl Default for BertConfig {
    fn default() -> Self {
        Self {
            hidden_size: 64,
            num_layers: 2,
            num_attention_heads: 4,
            ffn_intermediate_size: 256,
            attention_probs_dropout_prob: 0.0,
            hidden_dropout_prob: 0.0,
            dense_hidden_size: 128,
            skip_connect_circle: false,
            skip_connect_mean: false,
        }
    }
}

impl BertConfig {
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

    /// Check the hyperparameters against the inputs.
    pub fn validate(&self, spec: &InputSpec, predict_sequence_length: usize) -> Result<()> {
        check_heads("bert", self.hidden_size, self.num_attention_heads)?;
        check_positive("bert", "num_layers", self.num_layers)?;
        check_positive("bert", "dense_hidden_size", self.dense_hidden_size)?;
        check_probability("bert", "attention_probs_dropout_prob", self.attention_probs_dropout_prob)?;
        check_probability("bert", "hidden_dropout_prob", self.hidden_dropout_prob)?;
        if self.skip_connect_circle && spec.train_length < predict_sequence_length {
            return Err(ModelError::invalid(
                "bert",
                "skip_connect_circle needs train_length >= predict_sequence_length",
            ));
        }
        Ok(())
    }

    /// Initialize the model.
    pub fn init<B: Backend>(&self, spec: &InputSpec, predict_sequence_length: usize, device: &B::Device) -> Bert<B> {
        let layer = EncoderLayerConfig::new(self.hidden_size, self.num_attention_heads, self.ffn_intermediate_size)
            .with_dropout(self.attention_probs_dropout_prob, self.hidden_dropout_prob);

        Bert {
            embedding: DataEmbeddingConfig::new(spec.encoder_features, self.hidden_size)
                .with_dropout(self.hidden_dropout_prob)
                .init(device),
            layers: (0..self.num_layers).map(|_| layer.init(device)).collect(),
            dropout: DropoutConfig::new(self.hidden_dropout_prob).init(),
            dense: LinearConfig::new(self.hidden_size, self.dense_hidden_size).init(device),
            project: LinearConfig::new(self.dense_hidden_size, predict_sequence_length).init(device),
            activation: Relu::new(),
            predict_sequence_length,
            skip_connect_circle: self.skip_connect_circle,
            skip_connect_mean: self.skip_connect_mean,
        }
    }
}

/// BERT-style encoder; the last position is projected to all `H` steps.
#[derive(Module, Debug)]
pub struct Bert<B: Backend> {
    embedding: DataEmbedding<B>,
    layers: Vec<EncoderLayer<B>>,
    dropout: Dropout,
    dense: Linear<B>,
    project: Linear<B>,
    activation: Relu,
    predict_sequence_length: usize,
    skip_connect_circle: bool,
    skip_connect_mean: bool,
}

impl<B: Backend> Bert<B> {
    /// Forward pass returning `(B, H, 1)`.
    pub fn forward(&self, inputs: ModelInputs<B>) -> Tensor<B, 3> {
        let prepared = inputs.prepare(self.predict_sequence_length);
        let encoded = self
            .layers
            .iter()
            .fold(self.embedding.forward(prepared.encoder_feature), |x, layer| layer.forward(x));

        let last = time_step(&encoded, encoded.dims()[1] - 1);
        let hidden = self
            .activation
            .forward(self.dense.forward(self.dropout.forward(last)));
        let [batch, _] = hidden.dims();
        let outputs = self
            .project
            .forward(hidden)
            .reshape([batch, self.predict_sequence_length, 1]);

        skip_connections(outputs, &prepared.x, self.skip_connect_circle, self.skip_connect_mean)
    }
}

impl<B: Backend> TSForecastingModel<B> for Bert<B> {
    fn forward(&self, inputs: ModelInputs<B>, _teacher: Option<Tensor<B, 3>>) -> Tensor<B, 3> {
        Bert::forward(self, inputs)
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
    fn test_bert_output_shape() {
        let device = Default::default();
        let spec = InputSpec::univariate(16, 1);
        let config = BertConfig {
            skip_connect_circle: true,
            skip_connect_mean: true,
            ..BertConfig::default().with_hidden_size(16, 2).with_num_layers(1)
        };
        config.validate(&spec, 8).unwrap();
        let model = config.init::<TestBackend>(&spec, 8, &device);
        let x = Tensor::random([4, 16, 1], Distribution::Normal(0.0, 1.0), &device);
        assert_eq!(model.forward(ModelInputs::array(x)).dims(), [4, 8, 1]);
    }

    #[test]
    fn test_bert_with_encoder_feature() {
        let device = Default::default();
        let spec = InputSpec::new(16, 4, 1);
        let model = BertConfig::default()
            .with_hidden_size(16, 4)
            .init::<TestBackend>(&spec, 3, &device);
        let x = Tensor::random([2, 16, 1], Distribution::Normal(0.0, 1.0), &device);
        let enc = Tensor::random([2, 16, 3], Distribution::Normal(0.0, 1.0), &device);
        let dec = Tensor::random([2, 3, 1], Distribution::Normal(0.0, 1.0), &device);
        let out = model.forward(ModelInputs::with_features(x, enc, dec));
        assert_eq!(out.dims(), [2, 3, 1]);
    }

    #[test]
    fn test_bert_circle_needs_history() {
        let spec = InputSpec::univariate(4, 1);
        let config = BertConfig {
            skip_connect_circle: true,
            ..Default::default()
        };
        assert!(config.validate(&spec, 8).is_err());
    }
}
