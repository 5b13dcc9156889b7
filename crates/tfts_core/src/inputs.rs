//! Model input tensors.
//!
//! A forecasting model receives the history `x` and, optionally, covariates
//! observed alongside it (`encoder_feature`) and covariates known over the
//! forecast horizon (`decoder_feature`).

use burn::prelude::*;

use crate::error::{CoreError, Result};
use crate::shape::{ForecastShape, InputSpec};

/// Raw inputs for one forward pass.
///
/// # Example
///
/// ```rust,ignore
/// use tfts_core::ModelInputs;
///
/// // Plain array input: x of shape (B, T, F)
/// let inputs = ModelInputs::array(x);
///
/// // Array plus covariates
/// let inputs = ModelInputs::with_features(x, encoder_feature, decoder_feature);
/// ```
#[derive(Debug, Clone)]
pub struct ModelInputs<B: Backend> {
    /// History `(B, T, Fx)`; column 0 is the target series.
    pub x: Tensor<B, 3>,
    /// Covariates over the history `(B, T, Fe)`.
    pub encoder_feature: Option<Tensor<B, 3>>,
    /// Covariates over the horizon `(B, H, Fd)`.
    pub decoder_feature: Option<Tensor<B, 3>>,
}

/// Inputs after the encoder/decoder features have been resolved.
#[derive(Debug, Clone)]
pub struct PreparedInputs<B: Backend> {
    /// History `(B, T, Fx)`.
    pub x: Tensor<B, 3>,
    /// Encoder input `(B, T, Fe')`.
    pub encoder_feature: Tensor<B, 3>,
    /// Decoder input `(B, H, Fd')`.
    pub decoder_feature: Tensor<B, 3>,
}

impl<B: Backend> ModelInputs<B> {
    /// Inputs made of the history array only.
    pub fn array(x: Tensor<B, 3>) -> Self {
        Self {
            x,
            encoder_feature: None,
            decoder_feature: None,
        }
    }

    /// Inputs with covariates over the history and the horizon.
    pub fn with_features(
        x: Tensor<B, 3>,
        encoder_feature: Tensor<B, 3>,
        decoder_feature: Tensor<B, 3>,
    ) -> Self {
        Self {
            x,
            encoder_feature: Some(encoder_feature),
            decoder_feature: Some(decoder_feature),
        }
    }

    /// Batch size.
    pub fn batch_size(&self) -> usize {
        self.x.dims()[0]
    }

    /// Device the history lives on.
    pub fn device(&self) -> B::Device {
        self.x.device()
    }

    /// Feature widths these inputs produce once prepared.
    pub fn spec(&self) -> Result<InputSpec> {
        InputSpec::from_shapes(
            ForecastShape::from(self.x.dims()),
            self.encoder_feature.as_ref().map(|t| ForecastShape::from(t.dims())),
            self.decoder_feature.as_ref().map(|t| ForecastShape::from(t.dims())),
        )
    }

    /// Resolve the encoder and decoder features.
    ///
    /// The encoder feature is `x` concatenated with the given encoder
    /// feature along the feature axis, or `x` alone. The decoder feature is
    /// used as given, or replaced by the time index `0..H`.
    pub fn prepare(self, predict_sequence_length: usize) -> PreparedInputs<B> {
        let [batch, _, _] = self.x.dims();
        let device = self.x.device();

        let encoder_feature = match self.encoder_feature {
            Some(feature) => Tensor::cat(vec![self.x.clone(), feature], 2),
            None => self.x.clone(),
        };
        let decoder_feature = self.decoder_feature.unwrap_or_else(|| {
            time_index_feature(batch, predict_sequence_length, &device)
        });

        PreparedInputs {
            x: self.x,
            encoder_feature,
            decoder_feature,
        }
    }

    /// Move all tensors to a device.
    pub fn to_device(self, device: &B::Device) -> Self {
        Self {
            x: self.x.to_device(device),
            encoder_feature: self.encoder_feature.map(|t| t.to_device(device)),
            decoder_feature: self.decoder_feature.map(|t| t.to_device(device)),
        }
    }
}

/// The time-index decoder feature `[0, 1, .., H-1]` tiled to `(B, H, 1)`.
pub fn time_index_feature<B: Backend>(
    batch: usize,
    predict_sequence_length: usize,
    device: &B::Device,
) -> Tensor<B, 3> {
    let steps: Vec<f32> = (0..predict_sequence_length).map(|i| i as f32).collect();
    Tensor::<B, 1>::from_floats(steps.as_slice(), device)
        .reshape([1, predict_sequence_length, 1])
        .repeat_dim(0, batch)
}

/// A batch of model inputs with an optional target.
#[derive(Debug, Clone)]
pub struct ForecastBatch<B: Backend> {
    /// Model inputs.
    pub inputs: ModelInputs<B>,
    /// Target `(B, H, 1)`.
    pub y: Option<Tensor<B, 3>>,
}

impl<B: Backend> ForecastBatch<B> {
    /// Create a batch without target.
    pub fn new(inputs: ModelInputs<B>) -> Self {
        Self { inputs, y: None }
    }

    /// Create a batch with a target.
    ///
    /// # Errors
    ///
    /// Returns an error if the target batch size differs from the inputs or
    /// the target has more than one feature.
    pub fn with_target(inputs: ModelInputs<B>, y: Tensor<B, 3>) -> Result<Self> {
        let x_batch = inputs.batch_size();
        let [y_batch, _, y_features] = y.dims();

        if x_batch != y_batch {
            return Err(CoreError::ShapeMismatch(format!(
                "x batch size {} != y batch size {}",
                x_batch, y_batch
            )));
        }
        if y_features != 1 {
            return Err(CoreError::InvalidShape {
                expected: "(B, H, 1)".to_string(),
                got: format!("{:?}", y.dims()),
            });
        }

        Ok(Self {
            inputs,
            y: Some(y),
        })
    }

    /// Get the batch size.
    pub fn batch_size(&self) -> usize {
        self.inputs.batch_size()
    }

    /// Move the batch to a device.
    pub fn to_device(self, device: &B::Device) -> Self {
        Self {
            inputs: self.inputs.to_device(device),
            y: self.y.map(|y| y.to_device(device)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_prepare_array_only() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 3>::zeros([2, 32, 2], &device);
        let prepared = ModelInputs::array(x).prepare(9);

        assert_eq!(prepared.encoder_feature.dims(), [2, 32, 2]);
        assert_eq!(prepared.decoder_feature.dims(), [2, 9, 1]);

        let steps: Vec<f32> = prepared
            .decoder_feature
            .slice([1..2, 0..9, 0..1])
            .into_data()
            .to_vec()
            .unwrap();
        assert_eq!(steps, (0..9).map(|i| i as f32).collect::<Vec<_>>());
    }

    #[test]
    fn test_prepare_with_features() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 3>::zeros([1, 32, 1], &device);
        let enc = Tensor::<TestBackend, 3>::ones([1, 32, 2], &device);
        let dec = Tensor::<TestBackend, 3>::ones([1, 9, 3], &device);

        let inputs = ModelInputs::with_features(x, enc, dec);
        assert_eq!(inputs.spec().unwrap(), InputSpec::new(32, 3, 3));

        let prepared = inputs.prepare(9);
        assert_eq!(prepared.encoder_feature.dims(), [1, 32, 3]);
        assert_eq!(prepared.decoder_feature.dims(), [1, 9, 3]);
    }

    #[test]
    fn test_batch_target_validation() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 3>::zeros([4, 16, 1], &device);

        let ok = ForecastBatch::with_target(
            ModelInputs::array(x.clone()),
            Tensor::zeros([4, 8, 1], &device),
        );
        assert_eq!(ok.unwrap().batch_size(), 4);

        let wrong_batch = ForecastBatch::with_target(
            ModelInputs::array(x.clone()),
            Tensor::zeros([3, 8, 1], &device),
        );
        assert!(wrong_batch.is_err());

        let wrong_width =
            ForecastBatch::with_target(ModelInputs::array(x), Tensor::zeros([4, 8, 2], &device));
        assert!(wrong_width.is_err());
    }
}
