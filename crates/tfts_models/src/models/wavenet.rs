//! WaveNet with gated dilated convolutions and a cached step-wise decoder.

use burn::nn::{Linear, LinearConfig, Relu};
use burn::prelude::*;
use burn::tensor::activation::sigmoid;
use serde::{Deserialize, Serialize};

use super::{check_positive, check_probability, last_target, time_step, use_teacher};
use crate::error::{ModelError, Result};
use crate::layers::{CausalConv1d, CausalConv1dConfig};
use tfts_core::{InputSpec, ModelInputs, TSForecastingModel};

/// Configuration for [`WaveNet`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveNetConfig {
    /// Dilation of each convolution layer.
    pub dilation_rates: Vec<usize>,
    /// Kernel size of each encoder convolution.
    pub kernel_sizes: Vec<usize>,
    /// Channels of the residual stream.
    pub filters: usize,
    /// Width of the dense layer in the output head.
    pub dense_hidden_size: usize,
    /// Probability of feeding back the model's own prediction while training.
    pub scheduled_sampling: f64,
}

impl Default for WaveNetConfig {
    fn default() -> Self {
        Self {
            dilation_rates: vec![1, 2, 4, 8],
            kernel_sizes: vec![2; 4],
            filters: 128,
            dense_hidden_size: 64,
            scheduled_sampling: 1.0,
        }
    }
}

impl WaveNetConfig {
    /// Set dilations and kernel sizes together.
    #[must_use]
    pub fn with_layers(mut self, dilation_rates: Vec<usize>, kernel_sizes: Vec<usize>) -> Self {
        self.dilation_rates = dilation_rates;
        self.kernel_sizes = kernel_sizes;
        self
    }

    /// Set the number of filters.
    #[must_use]
    pub fn with_filters(mut self, filters: usize) -> Self {
        self.filters = filters;
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
        check_positive("wavenet", "filters", self.filters)?;
        check_positive("wavenet", "dense_hidden_size", self.dense_hidden_size)?;
        check_probability("wavenet", "scheduled_sampling", self.scheduled_sampling)?;
        if self.dilation_rates.is_empty() {
            return Err(ModelError::invalid("wavenet", "dilation_rates must not be empty"));
        }
        if self.dilation_rates.len() != self.kernel_sizes.len() {
            return Err(ModelError::invalid(
                "wavenet",
                format!(
                    "{} dilation rates but {} kernel sizes",
                    self.dilation_rates.len(),
                    self.kernel_sizes.len()
                ),
            ));
        }
        if self.dilation_rates.contains(&0) || self.kernel_sizes.contains(&0) {
            return Err(ModelError::invalid("wavenet", "dilations and kernel sizes must be > 0"));
        }
        Ok(())
    }

    /// Initialize the model.
    ///
    /// Dilations longer than the cached decoder states are clamped at each step.
    pub fn init<B: Backend>(
        &self,
        spec: &InputSpec,
        predict_sequence_length: usize,
        device: &B::Device,
    ) -> WaveNet<B> {
        let filters = self.filters;
        let convs = self
            .dilation_rates
            .iter()
            .zip(&self.kernel_sizes)
            .map(|(&dilation, &kernel)| {
                CausalConv1dConfig::new(filters, 2 * filters, kernel)
                    .with_dilation(dilation)
                    .init(device)
            })
            .collect();

        for &dilation in &self.dilation_rates {
            if dilation > spec.train_length {
                tracing::warn!(
                    dilation,
                    context = spec.train_length,
                    "Dilation exceeds context length, clamping to the cached steps"
                );
            }
        }

        WaveNet {
            encoder_input: LinearConfig::new(spec.encoder_features, filters).init(device),
            encoder_convs: convs,
            encoder_output: LinearConfig::new(filters, 2 * filters).init(device),
            decoder_input: LinearConfig::new(spec.decoder_features + 1, filters).init(device),
            decoder_state: LinearConfig::new(filters, 2 * filters).init(device),
            decoder_current: LinearConfig::new(filters, 2 * filters)
                .with_bias(false)
                .init(device),
            decoder_output: LinearConfig::new(filters, 2 * filters).init(device),
            dense: LinearConfig::new(filters * self.dilation_rates.len(), self.dense_hidden_size).init(device),
            project: LinearConfig::new(self.dense_hidden_size, 1).init(device),
            activation: Relu::new(),
            dilations: self.dilation_rates.clone(),
            filters,
            predict_sequence_length,
            scheduled_sampling: self.scheduled_sampling,
        }
    }
}

/// WaveNet forecaster.
///
/// The encoder keeps the input of every dilated layer. Each decoder step
/// replaces the kernel-2 convolution with two dense maps: one over the cached
/// state `dilation` steps back and one over the current input. Each layer's
/// residual output is appended to its cache, so later steps can look back
/// further than the history alone allows.
#[derive(Module, Debug)]
pub struct WaveNet<B: Backend> {
    encoder_input: Linear<B>,
    encoder_convs: Vec<CausalConv1d<B>>,
    encoder_output: Linear<B>,
    decoder_input: Linear<B>,
    decoder_state: Linear<B>,
    decoder_current: Linear<B>,
    decoder_output: Linear<B>,
    dense: Linear<B>,
    project: Linear<B>,
    activation: Relu,
    dilations: Vec<usize>,
    filters: usize,
    predict_sequence_length: usize,
    scheduled_sampling: f64,
}

impl<B: Backend> WaveNet<B> {
    fn gate<const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        let [filter, gate] = split_last(x, self.filters);
        filter.tanh() * sigmoid(gate)
    }

    /// Run the encoder and return the cached per-layer inputs `(B, T, filters)`.
    fn encode(&self, encoder_feature: Tensor<B, 3>) -> Vec<Tensor<B, 3>> {
        let mut inputs = self.encoder_input.forward(encoder_feature).tanh();
        let mut caches = Vec::with_capacity(self.encoder_convs.len());

        for conv in &self.encoder_convs {
            caches.push(inputs.clone());
            let dilated = conv.forward(inputs.clone().swap_dims(1, 2)).swap_dims(1, 2);
            let outputs = self.encoder_output.forward(self.gate(dilated));
            let [_, residuals] = split_last(outputs, self.filters);
            inputs = inputs + residuals;
        }
        caches
    }

    /// One dilated layer of a decoder step: returns the residual output, which
    /// is also appended to `cache`, and the skip output.
    fn decode_layer(
        &self,
        cache: &mut Tensor<B, 3>,
        dilation: usize,
        x: Tensor<B, 2>,
    ) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let cached = cache.dims()[1];
        let state = time_step(cache, cached - lookback(dilation, cached));
        let dilated = self.decoder_state.forward(state) + self.decoder_current.forward(x.clone());
        let outputs = self.decoder_output.forward(self.gate(dilated));
        let [skip, residual] = split_last(outputs, self.filters);

        let x = x + residual;
        *cache = Tensor::cat(vec![cache.clone(), x.clone().unsqueeze_dim(1)], 1);
        (x, skip)
    }

    /// Forward pass returning `(B, H, 1)`.
    pub fn forward(&self, inputs: ModelInputs<B>, teacher: Option<Tensor<B, 3>>) -> Tensor<B, 3> {
        let prepared = inputs.prepare(self.predict_sequence_length);
        let mut caches = self.encode(prepared.encoder_feature);

        let mut previous = last_target(&prepared.x);
        let mut predictions = Vec::with_capacity(self.predict_sequence_length);

        for t in 0..self.predict_sequence_length {
            let step_input = Tensor::cat(vec![previous.clone(), time_step(&prepared.decoder_feature, t)], 1);
            let mut x = self.decoder_input.forward(step_input).tanh();
            let mut skips = Vec::with_capacity(caches.len());

            for (cache, &dilation) in caches.iter_mut().zip(&self.dilations) {
                let (next, skip) = self.decode_layer(cache, dilation, x);
                x = next;
                skips.push(skip);
            }

            let hidden = self
                .activation
                .forward(self.dense.forward(self.activation.forward(Tensor::cat(skips, 1))));
            let prediction = self.project.forward(hidden);
            predictions.push(prediction.clone());

            previous = match &teacher {
                Some(y) if use_teacher::<B>(self.scheduled_sampling, &y.device()) => time_step(y, t),
                _ => prediction,
            };
        }

        Tensor::stack(predictions, 1)
    }
}

/// Steps back into a cache of `cached` steps, `dilation` clamped to what exists.
fn lookback(dilation: usize, cached: usize) -> usize {
    dilation.min(cached).max(1)
}

/// Split the last dimension into `[0, at)` and `[at, end)`.
fn split_last<B: Backend, const D: usize>(x: Tensor<B, D>, at: usize) -> [Tensor<B, D>; 2] {
    let width = x.dims()[D - 1];
    [x.clone().narrow(D - 1, 0, at), x.narrow(D - 1, at, width - at)]
}

impl<B: Backend> TSForecastingModel<B> for WaveNet<B> {
    fn forward(&self, inputs: ModelInputs<B>, teacher: Option<Tensor<B, 3>>) -> Tensor<B, 3> {
        WaveNet::forward(self, inputs, teacher)
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

    fn small() -> WaveNetConfig {
        WaveNetConfig::default().with_filters(16)
    }

    #[test]
    fn test_wavenet_output_shape() {
        let device = Default::default();
        let spec = InputSpec::univariate(20, 2);
        let config = small();
        config.validate(&spec, 5).unwrap();
        let model = config.init::<TestBackend>(&spec, 5, &device);
        let x = Tensor::random([2, 20, 2], Distribution::Normal(0.0, 1.0), &device);
        assert_eq!(model.forward(ModelInputs::array(x), None).dims(), [2, 5, 1]);
    }

    #[test]
    fn test_wavenet_clamps_long_dilation() {
        let device = Default::default();
        let spec = InputSpec::univariate(3, 1);
        let config = small().with_layers(vec![1, 8], vec![2, 2]);
        let model = config.init::<TestBackend>(&spec, 4, &device);
        assert_eq!(model.dilations, vec![1, 8]);

        // The clamp follows the growing cache, not the history length.
        assert_eq!(lookback(8, 3), 3);
        assert_eq!(lookback(8, 5), 5);
        assert_eq!(lookback(8, 12), 8);
        assert_eq!(lookback(2, 12), 2);

        let x = Tensor::random([1, 3, 1], Distribution::Normal(0.0, 1.0), &device);
        assert_eq!(model.forward(ModelInputs::array(x), None).dims(), [1, 4, 1]);
    }

    #[test]
    fn test_decode_layer_caches_residual_output() {
        let device = Default::default();
        let spec = InputSpec::univariate(6, 1);
        let model = small().init::<TestBackend>(&spec, 2, &device);
        let mut cache = Tensor::<TestBackend, 3>::random([2, 6, 16], Distribution::Normal(0.0, 1.0), &device);
        let x = Tensor::<TestBackend, 2>::random([2, 16], Distribution::Normal(0.0, 1.0), &device);

        let (next, skip) = model.decode_layer(&mut cache, 2, x.clone());
        assert_eq!(cache.dims(), [2, 7, 16]);
        assert_eq!(skip.dims(), [2, 16]);

        let appended = time_step(&cache, 6);
        let stored: f32 = (appended - next.clone()).abs().max().into_scalar();
        assert!(stored < 1e-6);
        let moved: f32 = (next - x).abs().sum().into_scalar();
        assert!(moved > 1e-6);
    }

    #[test]
    fn test_wavenet_teacher_forcing() {
        let device = Default::default();
        let spec = InputSpec::univariate(10, 1);
        let model = small()
            .with_scheduled_sampling(0.0)
            .init::<TestBackend>(&spec, 3, &device);
        let x = Tensor::random([2, 10, 1], Distribution::Normal(0.0, 1.0), &device);
        let y = Tensor::random([2, 3, 1], Distribution::Normal(0.0, 1.0), &device);
        assert_eq!(model.forward(ModelInputs::array(x), Some(y)).dims(), [2, 3, 1]);
    }

    #[test]
    fn test_wavenet_validation() {
        let spec = InputSpec::univariate(10, 1);
        assert!(small().with_layers(vec![1, 2], vec![2]).validate(&spec, 2).is_err());
        assert!(small().with_layers(vec![], vec![]).validate(&spec, 2).is_err());
    }
}
