//! Recurrent encoder with a dense forecast head.

use burn::nn::{Linear, LinearConfig, Relu};
use burn::prelude::*;
use serde::{Deserialize, Serialize};

use super::{check_heads, check_positive, skip_connections};
use crate::error::{ModelError, Result};
use crate::layers::{AttentionConfig, RnnEncoder, RnnEncoderConfig, RnnType, SelfAttention};
use tfts_core::{InputSpec, ModelInputs, TSForecastingModel};

/// Configuration for [`Rnn`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RnnConfig {
    /// Hidden width per direction.
    pub rnn_hidden_size: usize,
    /// Cell type.
    pub rnn_type: RnnType,
    /// Run a reverse pass as well.
    pub bi_direction: bool,
    /// Width of the dense layer before the projection.
    pub dense_hidden_size: usize,
    /// Number of stacked recurrent layers.
    pub num_stacked_layers: usize,
    /// Self-attention over the encoder outputs before the head.
    pub use_attention: bool,
    /// Heads of that self-attention.
    pub num_attention_heads: usize,
    /// Add the last `H` history values of the target to the output.
    pub skip_connect_circle: bool,
    /// Add the history mean of the target to the output.
    pub skip_connect_mean: bool,
}

impl Default for RnnConfig {
    fn default() -> Self {
        Self {
            rnn_hidden_size: 64,
            rnn_type: RnnType::Gru,
            bi_direction: false,
            dense_hidden_size: 32,
            num_stacked_layers: 1,
            use_attention: false,
            num_attention_heads: 2,
            skip_connect_circle: false,
            skip_connect_mean: false,
        }
    }
}

impl RnnConfig {
    /// Set the cell type.
    #[must_use]
    pub fn with_rnn_type(mut self, rnn_type: RnnType) -> Self {
        self.rnn_type = rnn_type;
        self
    }

    /// Set the hidden width.
    #[must_use]
    pub fn with_rnn_hidden_size(mut self, size: usize) -> Self {
        self.rnn_hidden_size = size;
        self
    }

    /// Enable the reverse direction.
    #[must_use]
    pub fn with_bi_direction(mut self, bi_direction: bool) -> Self {
        self.bi_direction = bi_direction;
        self
    }

    fn encoder(&self, d_input: usize) -> RnnEncoderConfig {
        RnnEncoderConfig::new(self.rnn_type, d_input, self.rnn_hidden_size)
            .with_num_layers(self.num_stacked_layers)
            .with_bidirectional(self.bi_direction)
    }

    /// Check the hyperparameters against the inputs.
    pub fn validate(&self, spec: &InputSpec, predict_sequence_length: usize) -> Result<()> {
        check_positive("rnn", "rnn_hidden_size", self.rnn_hidden_size)?;
        check_positive("rnn", "dense_hidden_size", self.dense_hidden_size)?;
        check_positive("rnn", "num_stacked_layers", self.num_stacked_layers)?;
        if self.use_attention {
            check_heads("rnn", self.encoder(spec.encoder_features).output_size(), self.num_attention_heads)?;
        }
        if self.skip_connect_circle && spec.train_length < predict_sequence_length {
            return Err(ModelError::invalid(
                "rnn",
                "skip_connect_circle needs train_length >= predict_sequence_length",
            ));
        }
        Ok(())
    }

    /// Initialize the model.
    pub fn init<B: Backend>(&self, spec: &InputSpec, predict_sequence_length: usize, device: &B::Device) -> Rnn<B> {
        let encoder = self.encoder(spec.encoder_features);
        let width = encoder.output_size();
        let attention = self.use_attention.then(|| {
            SelfAttention::new(AttentionConfig::new(width, self.num_attention_heads).init(device))
        });

        Rnn {
            encoder: encoder.init(device),
            attention,
            dense: LinearConfig::new(width, self.dense_hidden_size).init(device),
            project: LinearConfig::new(self.dense_hidden_size, predict_sequence_length).init(device),
            activation: Relu::new(),
            predict_sequence_length,
            skip_connect_circle: self.skip_connect_circle,
            skip_connect_mean: self.skip_connect_mean,
        }
    }
}

/// Recurrent encoder whose final state is projected to all `H` steps at once.
#[derive(Module, Debug)]
pub struct Rnn<B: Backend> {
    encoder: RnnEncoder<B>,
    attention: Option<SelfAttention<B>>,
    dense: Linear<B>,
    project: Linear<B>,
    activation: Relu,
    predict_sequence_length: usize,
    skip_connect_circle: bool,
    skip_connect_mean: bool,
}

impl<B: Backend> Rnn<B> {
    /// Forward pass returning `(B, H, 1)`.
    pub fn forward(&self, inputs: ModelInputs<B>) -> Tensor<B, 3> {
        let prepared = inputs.prepare(self.predict_sequence_length);
        let (outputs, state) = self.encoder.forward(prepared.encoder_feature);

        let summary = match &self.attention {
            Some(attention) => {
                let attended = attention.forward(outputs, None);
                super::time_step(&attended, attended.dims()[1] - 1)
            }
            None => state.hidden,
        };

        let hidden = self.activation.forward(self.dense.forward(summary));
        let [batch, _] = hidden.dims();
        let outputs = self
            .project
            .forward(hidden)
            .reshape([batch, self.predict_sequence_length, 1]);

        skip_connections(outputs, &prepared.x, self.skip_connect_circle, self.skip_connect_mean)
    }
}

impl<B: Backend> TSForecastingModel<B> for Rnn<B> {
    fn forward(&self, inputs: ModelInputs<B>, _teacher: Option<Tensor<B, 3>>) -> Tensor<B, 3> {
        Rnn::forward(self, inputs)
    }

    fn predict_sequence_length(&self) -> usize {
        self.predict_sequence_length
    }
}
