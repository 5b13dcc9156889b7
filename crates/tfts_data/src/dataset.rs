//! Forecasting dataset type.

use burn::prelude::*;
use ndarray::{Array3, Axis};

use crate::error::{DataError, Result};
use tfts_core::{ForecastBatch, ForecastShape, InputSpec, ModelInputs};

/// A dataset of forecasting samples.
///
/// Stores arrays in the `(N, T, F)` format:
/// - `x`: history `(N, T, Fx)`, column 0 is the target series
/// - `encoder_feature`: optional covariates over the history `(N, T, Fe)`
/// - `decoder_feature`: optional covariates over the horizon `(N, H, Fd)`
/// - `y`: optional targets `(N, H, 1)`
///
/// # Example
///
/// ```rust,ignore
/// use tfts_data::ForecastDataset;
/// use ndarray::Array3;
///
/// let x = Array3::<f32>::zeros((100, 24, 1));
/// let y = Array3::<f32>::zeros((100, 12, 1));
/// let dataset = ForecastDataset::from_arrays(x, Some(y))?;
/// ```
#[derive(Debug, Clone)]
pub struct ForecastDataset {
    x: Array3<f32>,
    encoder_feature: Option<Array3<f32>>,
    decoder_feature: Option<Array3<f32>>,
    y: Option<Array3<f32>>,
}

impl ForecastDataset {
    /// Create a new dataset from history and optional targets.
    ///
    /// # Errors
    ///
    /// Returns an error if the sample counts differ or `y` has more than one
    /// feature.
    pub fn from_arrays(x: Array3<f32>, y: Option<Array3<f32>>) -> Result<Self> {
        let n_samples = x.shape()[0];

        if let Some(ref targets) = y {
            if targets.shape()[0] != n_samples {
                return Err(DataError::InvalidShape(format!(
                    "x has {} samples but y has {} samples",
                    n_samples,
                    targets.shape()[0]
                )));
            }
            if targets.shape()[2] != 1 {
                return Err(DataError::InvalidShape(format!(
                    "y must be (N, H, 1), got {:?}",
                    targets.shape()
                )));
            }
        }

        Ok(Self {
            x,
            encoder_feature: None,
            decoder_feature: None,
            y,
        })
    }

    /// Attach covariates to the dataset.
    ///
    /// # Errors
    ///
    /// Returns an error if the encoder feature does not share `(N, T)` with
    /// `x`, the decoder feature has a different sample count, or the decoder
    /// horizon disagrees with `y`.
    pub fn with_features(
        mut self,
        encoder_feature: Option<Array3<f32>>,
        decoder_feature: Option<Array3<f32>>,
    ) -> Result<Self> {
        if let Some(ref enc) = encoder_feature {
            if enc.shape()[..2] != self.x.shape()[..2] {
                return Err(DataError::InvalidShape(format!(
                    "encoder_feature {:?} must share (N, T) with x {:?}",
                    enc.shape(),
                    self.x.shape()
                )));
            }
        }
        if let Some(ref dec) = decoder_feature {
            if dec.shape()[0] != self.len() {
                return Err(DataError::InvalidShape(format!(
                    "decoder_feature has {} samples but x has {}",
                    dec.shape()[0],
                    self.len()
                )));
            }
            if let Some(ref y) = self.y {
                if y.shape()[1] != dec.shape()[1] {
                    return Err(DataError::InvalidShape(format!(
                        "decoder_feature horizon {} != target horizon {}",
                        dec.shape()[1],
                        y.shape()[1]
                    )));
                }
            }
        }
        self.encoder_feature = encoder_feature;
        self.decoder_feature = decoder_feature;
        Ok(self)
    }

    /// Get the number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.x.shape()[0]
    }

    /// Check if the dataset is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// History length `T`.
    #[must_use]
    pub fn train_length(&self) -> usize {
        self.x.shape()[1]
    }

    /// Number of history features `Fx`.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.x.shape()[2]
    }

    /// Horizon `H` taken from the targets or, failing that, the decoder feature.
    #[must_use]
    pub fn predict_sequence_length(&self) -> Option<usize> {
        self.y
            .as_ref()
            .or(self.decoder_feature.as_ref())
            .map(|a| a.shape()[1])
    }

    /// History array.
    #[must_use]
    pub fn x(&self) -> &Array3<f32> {
        &self.x
    }

    /// Target array.
    #[must_use]
    pub fn y(&self) -> Option<&Array3<f32>> {
        self.y.as_ref()
    }

    /// Encoder covariates.
    #[must_use]
    pub fn encoder_feature(&self) -> Option<&Array3<f32>> {
        self.encoder_feature.as_ref()
    }

    /// Decoder covariates.
    #[must_use]
    pub fn decoder_feature(&self) -> Option<&Array3<f32>> {
        self.decoder_feature.as_ref()
    }

    /// Check if the dataset has targets.
    #[must_use]
    pub fn has_targets(&self) -> bool {
        self.y.is_some()
    }

    /// Feature widths a model trained on this dataset needs.
    pub fn input_spec(&self) -> Result<InputSpec> {
        let shape = |a: &Array3<f32>| ForecastShape::new(a.shape()[0], a.shape()[1], a.shape()[2]);
        Ok(InputSpec::from_shapes(
            shape(&self.x),
            self.encoder_feature.as_ref().map(shape),
            self.decoder_feature.as_ref().map(shape),
        )?)
    }

    /// Get a subset of samples by indices.
    pub fn subset(&self, indices: &[usize]) -> Result<Self> {
        if let Some(&index) = indices.iter().find(|&&i| i >= self.len()) {
            return Err(DataError::IndexOutOfBounds {
                index,
                length: self.len(),
            });
        }

        let select = |a: &Array3<f32>| a.select(Axis(0), indices);
        Ok(Self {
            x: select(&self.x),
            encoder_feature: self.encoder_feature.as_ref().map(select),
            decoder_feature: self.decoder_feature.as_ref().map(select),
            y: self.y.as_ref().map(select),
        })
    }

    /// Sample `index` as a dataset of length one.
    pub fn get(&self, index: usize) -> Result<Self> {
        self.subset(&[index])
    }

    /// Build a tensor batch from the samples at `indices`.
    pub fn batch<B: Backend>(&self, indices: &[usize], device: &B::Device) -> Result<ForecastBatch<B>> {
        let subset = self.subset(indices)?;

        let x = array_to_tensor::<B>(&subset.x, device);
        let inputs = ModelInputs {
            x,
            encoder_feature: subset
                .encoder_feature
                .as_ref()
                .map(|a| array_to_tensor::<B>(a, device)),
            decoder_feature: subset
                .decoder_feature
                .as_ref()
                .map(|a| array_to_tensor::<B>(a, device)),
        };

        match subset.y {
            Some(ref y) => Ok(ForecastBatch::with_target(inputs, array_to_tensor::<B>(y, device))?),
            None => Ok(ForecastBatch::new(inputs)),
        }
    }
}

/// Copy a 3D array into a Burn tensor of the same shape.
pub(crate) fn array_to_tensor<B: Backend>(array: &Array3<f32>, device: &B::Device) -> Tensor<B, 3> {
    let [n, t, f] = [array.shape()[0], array.shape()[1], array.shape()[2]];
    let flat: Vec<f32> = array.iter().copied().collect();
    Tensor::<B, 1>::from_floats(flat.as_slice(), device).reshape([n, t, f])
}
