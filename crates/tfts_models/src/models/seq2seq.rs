//! Recurrent encoder-decoder with step-wise auto-regressive decoding.

use burn::nn::{Linear, LinearConfig, Relu};
use burn::prelude::*;
use serde::{Deserialize, Serialize};

use super::{check_heads, check_positive, check_probability, last_target, time_step, use_teacher};
use crate::error::Result;
use crate::layers::{Attention, AttentionConfig, RecurrentCell, RnnEncoder, RnnEncoderConfig, RnnType};
use tfts_core::{InputSpec, ModelInputs, TSForecastingModel};

/// Configuration for [`Seq2seq`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Seq2seqConfig {
    /// Hidden width of encoder and decoder cells.
    pub rnn_hidden_size: usize,
    /// Cell type.
    pub rnn_type: RnnType,
    /// Stacked encoder layers.
    pub num_stacked_layers: usize,
    /// Width of the dense layer in the output head.
    pub dense_hidden_size: usize,
    /// Probability of feeding back the model's own prediction while training.
    pub scheduled_sampling: f64,
    /// Attend over encoder outputs at each decoder step.
    pub use_attention: bool,
    /// Heads of the decoder attention.
    pub num_attention_heads: usize,
    /// Dropout on attention weights.
    pub attention_probs_dropout_prob: f64,
}

impl Default for Seq2seqConfig {
    fn default() -> Self {
        Self {
            rnn_hidden_size: 64,
            rnn_type: RnnType::Gru,
            num_stacked_layers: 1,
            dense_hidden_size: 64,
            scheduled_sampling: 0.0,
            use_attention: false,
            num_attention_heads: 2,
            attention_probs_dropout_prob: 0.0,
        }
    }
}

impl Seq2seqConfig {
    /// Set the cell type.
    #[must_use]
    pub fn with_rnn_type(mut self, rnn_type: RnnType) -> Self {
        self.rnn_type = rnn_type;
        self
    }

    /// Enable decoder attention.
    #[must_use]
    pub fn with_attention(mut self, use_attention: bool) -> Self {
        self.use_attention = use_attention;
        self
    }

    /// Set the scheduled sampling probability.
    #[must_use]
    pub fn with_scheduled_sampling(mut self, scheduled_sampling: f64) -> Self {
        self.scheduled_sampling = scheduled_sampling;
        self
    }

    /// Check the hyperparameters.
    pub fn validate(&self, _spec: &InputSpec, _predict_sequence_length: usize) -> Result<()> {
        check_positive("seq2seq", "rnn_hidden_size", self.rnn_hidden_size)?;
        check_positive("seq2seq", "dense_hidden_size", self.dense_hidden_size)?;
        check_positive("seq2seq", "num_stacked_layers", self.num_stacked_layers)?;
        check_probability("seq2seq", "scheduled_sampling", self.scheduled_sampling)?;
        check_probability("seq2seq", "attention_probs_dropout_prob", self.attention_probs_dropout_prob)?;
        if self.use_attention {
            check_heads("seq2seq", self.rnn_hidden_size, self.num_attention_heads)?;
        }
        Ok(())
    }

    /// Initialize the model.
    pub fn init<B: Backend>(
        &self,
        spec: &InputSpec,
        predict_sequence_length: usize,
        device: &B::Device,
    ) -> Seq2seq<B> {
        let hidden = self.rnn_hidden_size;
        let attention = self.use_attention.then(|| {
            AttentionConfig::new(hidden, self.num_attention_heads)
                .with_dropout(self.attention_probs_dropout_prob)
                .init(device)
        });
        let head_input = if self.use_attention { 2 * hidden } else { hidden };

        Seq2seq {
            encoder: RnnEncoderConfig::new(self.rnn_type, spec.encoder_features, hidden)
                .with_num_layers(self.num_stacked_layers)
                .init(device),
            decoder: RecurrentCell::new(self.rnn_type, spec.decoder_features + 1, hidden, device),
            attention,
            dense: LinearConfig::new(head_input, self.dense_hidden_size).init(device),
            project: LinearConfig::new(self.dense_hidden_size, 1).init(device),
            activation: Relu::new(),
            predict_sequence_length,
            scheduled_sampling: self.scheduled_sampling,
        }
    }
}

/// Encoder-decoder RNN.
///
/// The decoder runs one cell step per horizon step. Its input is the previous
/// target value followed by the decoder feature of that step. The previous
/// value is the ground truth when a teacher is given and sampling allows it,
/// the previous prediction otherwise.
#[derive(Module, Debug)]
pub struct Seq2seq<B: Backend> {
    encoder: RnnEncoder<B>,
    decoder: RecurrentCell<B>,
    attention: Option<Attention<B>>,
    dense: Linear<B>,
    project: Linear<B>,
    activation: Relu,
    predict_sequence_length: usize,
    scheduled_sampling: f64,
}

impl<B: Backend> Seq2seq<B> {
    /// Forward pass returning `(B, H, 1)`.
    pub fn forward(&self, inputs: ModelInputs<B>, teacher: Option<Tensor<B, 3>>) -> Tensor<B, 3> {
        let prepared = inputs.prepare(self.predict_sequence_length);
        let (memory, state) = self.encoder.forward(prepared.encoder_feature);
        let [batch, _, _] = memory.dims();

        let mut state = Some(state);
        let mut previous = last_target(&prepared.x);
        let mut predictions = Vec::with_capacity(self.predict_sequence_length);

        for t in 0..self.predict_sequence_length {
            let step_input = Tensor::cat(vec![previous.clone(), time_step(&prepared.decoder_feature, t)], 1);
            let next = self.decoder.step(step_input, state.take());
            let hidden = next.hidden.clone();
            state = Some(next);

            let features = match &self.attention {
                Some(attention) => {
                    let query = hidden.clone().unsqueeze_dim::<3>(1);
                    let context = attention.forward(query, memory.clone(), memory.clone(), None);
                    let [_, _, width] = context.dims();
                    Tensor::cat(vec![hidden, context.reshape([batch, width])], 1)
                }
                None => hidden,
            };

            let prediction = self
                .project
                .forward(self.activation.forward(self.dense.forward(features)));
            predictions.push(prediction.clone());

            previous = match &teacher {
                Some(y) if use_teacher::<B>(self.scheduled_sampling, &y.device()) => time_step(y, t),
                _ => prediction,
            };
        }

        Tensor::stack(predictions, 1)
    }
}

impl<B: Backend> TSForecastingModel<B> for Seq2seq<B> {
    fn forward(&self, inputs: ModelInputs<B>, teacher: Option<Tensor<B, 3>>) -> Tensor<B, 3> {
        Seq2seq::forward(self, inputs, teacher)
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
    fn test_seq2seq_output_shape() {
        let device = Default::default();
        let spec = InputSpec::univariate(24, 1);
        for config in [
            Seq2seqConfig::default(),
            Seq2seqConfig::default().with_rnn_type(RnnType::Lstm).with_attention(true),
        ] {
            config.validate(&spec, 6).unwrap();
            let model = config.init::<TestBackend>(&spec, 6, &device);
            let x = Tensor::random([3, 24, 1], Distribution::Normal(0.0, 1.0), &device);
            assert_eq!(model.forward(ModelInputs::array(x), None).dims(), [3, 6, 1]);
        }
    }

    #[test]
    fn test_seq2seq_with_features_and_teacher() {
        let device = Default::default();
        let spec = InputSpec::new(16, 3, 2);
        let model = Seq2seqConfig::default().init::<TestBackend>(&spec, 4, &device);

        let x = Tensor::random([2, 16, 1], Distribution::Normal(0.0, 1.0), &device);
        let enc = Tensor::random([2, 16, 2], Distribution::Normal(0.0, 1.0), &device);
        let dec = Tensor::random([2, 4, 2], Distribution::Normal(0.0, 1.0), &device);
        let y = Tensor::random([2, 4, 1], Distribution::Normal(0.0, 1.0), &device);

        let out = model.forward(ModelInputs::with_features(x, enc, dec), Some(y));
        assert_eq!(out.dims(), [2, 4, 1]);
    }

    #[test]
    fn test_seq2seq_teacher_changes_later_steps() {
        let device = Default::default();
        let spec = InputSpec::univariate(8, 1);
        let model = Seq2seqConfig::default().init::<TestBackend>(&spec, 3, &device);
        let x = Tensor::<TestBackend, 3>::random([1, 8, 1], Distribution::Normal(0.0, 1.0), &device);
        let y = Tensor::<TestBackend, 3>::ones([1, 3, 1], &device) * 100.0;

        let free: Vec<f32> = model
            .forward(ModelInputs::array(x.clone()), None)
            .into_data()
            .to_vec()
            .unwrap();
        let forced: Vec<f32> = model
            .forward(ModelInputs::array(x), Some(y))
            .into_data()
            .to_vec()
            .unwrap();

        assert!((free[0] - forced[0]).abs() < 1e-5);
        assert!((free[1] - forced[1]).abs() > 1e-6);
    }

    #[test]
    fn test_seq2seq_invalid_sampling() {
        let spec = InputSpec::univariate(8, 1);
        assert!(Seq2seqConfig::default()
            .with_scheduled_sampling(2.0)
            .validate(&spec, 2)
            .is_err());
    }
}
