//! Forecasting shape metadata.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Shape metadata for forecasting tensors.
///
/// Follows the convention `(B, T, F)`:
/// - `B`: Batch size (number of samples)
/// - `T`: Time steps
/// - `F`: Features
///
/// # Example
///
/// ```rust
/// use tfts_core::ForecastShape;
///
/// let shape = ForecastShape::new(16, 24, 1);
/// assert_eq!(shape.batch(), 16);
/// assert_eq!(shape.time(), 24);
/// assert_eq!(shape.features(), 1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForecastShape {
    batch: usize,
    time: usize,
    features: usize,
}

impl ForecastShape {
    /// Create a new shape with the specified dimensions.
    #[must_use]
    pub const fn new(batch: usize, time: usize, features: usize) -> Self {
        Self {
            batch,
            time,
            features,
        }
    }

    /// Create a shape from a slice of dimensions.
    ///
    /// # Errors
    ///
    /// Returns an error if the slice doesn't contain exactly 3 elements.
    pub fn from_dims(dims: &[usize]) -> Result<Self> {
        if dims.len() != 3 {
            return Err(CoreError::DimensionError {
                expected: 3,
                got: dims.len(),
            });
        }
        Ok(Self::new(dims[0], dims[1], dims[2]))
    }

    /// Get the batch size.
    #[must_use]
    pub const fn batch(&self) -> usize {
        self.batch
    }

    /// Get the number of time steps.
    #[must_use]
    pub const fn time(&self) -> usize {
        self.time
    }

    /// Get the number of features.
    #[must_use]
    pub const fn features(&self) -> usize {
        self.features
    }

    /// Check if any dimension is zero.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.batch == 0 || self.time == 0 || self.features == 0
    }

    /// Convert to an array.
    #[must_use]
    pub const fn as_array(&self) -> [usize; 3] {
        [self.batch, self.time, self.features]
    }

    /// The `(B, H, 1)` shape a model produces for this batch.
    #[must_use]
    pub const fn forecast(&self, predict_sequence_length: usize) -> Self {
        Self::new(self.batch, predict_sequence_length, 1)
    }
}

impl std::fmt::Display for ForecastShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(B={}, T={}, F={})", self.batch, self.time, self.features)
    }
}

impl From<[usize; 3]> for ForecastShape {
    fn from([batch, time, features]: [usize; 3]) -> Self {
        Self::new(batch, time, features)
    }
}

/// Feature widths a model needs before its layers can be created.
///
/// Derived from input shapes with the same rules [`crate::ModelInputs::prepare`]
/// applies to tensors: the encoder sees `x` concatenated with the optional
/// encoder feature, and the decoder sees either the given decoder feature or a
/// single time-index column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InputSpec {
    /// History length `T`.
    pub train_length: usize,
    /// Width of the prepared encoder feature.
    pub encoder_features: usize,
    /// Width of the prepared decoder feature.
    pub decoder_features: usize,
}

impl InputSpec {
    /// Create a spec directly.
    #[must_use]
    pub const fn new(train_length: usize, encoder_features: usize, decoder_features: usize) -> Self {
        Self {
            train_length,
            encoder_features,
            decoder_features,
        }
    }

    /// Spec for plain array input `x` of shape `(B, T, F)`.
    #[must_use]
    pub const fn univariate(train_length: usize, features: usize) -> Self {
        Self::new(train_length, features, 1)
    }

    /// Derive the spec from the shapes of `x` and the optional features.
    ///
    /// # Errors
    ///
    /// Returns an error if the encoder feature does not share batch and time
    /// with `x`, or the decoder feature has a different batch size.
    pub fn from_shapes(
        x: ForecastShape,
        encoder_feature: Option<ForecastShape>,
        decoder_feature: Option<ForecastShape>,
    ) -> Result<Self> {
        let mut encoder_features = x.features();
        if let Some(enc) = encoder_feature {
            if enc.batch() != x.batch() || enc.time() != x.time() {
                return Err(CoreError::ShapeMismatch(format!(
                    "encoder_feature {enc} must share batch and time with x {x}"
                )));
            }
            encoder_features += enc.features();
        }
        let decoder_features = match decoder_feature {
            Some(dec) if dec.batch() != x.batch() => {
                return Err(CoreError::ShapeMismatch(format!(
                    "decoder_feature {dec} must share batch with x {x}"
                )));
            }
            Some(dec) => dec.features(),
            None => 1,
        };
        Ok(Self::new(x.time(), encoder_features, decoder_features))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_from_dims() {
        let shape = ForecastShape::from_dims(&[16, 24, 2]).unwrap();
        assert_eq!(shape.as_array(), [16, 24, 2]);
        assert!(ForecastShape::from_dims(&[16, 24]).is_err());
    }

    #[test]
    fn test_forecast_shape() {
        let shape = ForecastShape::new(8, 32, 3);
        assert_eq!(shape.forecast(12).as_array(), [8, 12, 1]);
        assert!(!shape.is_empty());
        assert!(ForecastShape::new(0, 32, 3).is_empty());
    }

    #[test]
    fn test_input_spec_array_only() {
        let spec = InputSpec::from_shapes(ForecastShape::new(1, 32, 2), None, None).unwrap();
        assert_eq!(spec, InputSpec::new(32, 2, 1));
        assert_eq!(spec, InputSpec::univariate(32, 2));
    }

    #[test]
    fn test_input_spec_with_features() {
        let spec = InputSpec::from_shapes(
            ForecastShape::new(1, 32, 1),
            Some(ForecastShape::new(1, 32, 2)),
            Some(ForecastShape::new(1, 9, 3)),
        )
        .unwrap();
        assert_eq!(spec, InputSpec::new(32, 3, 3));
    }

    #[test]
    fn test_input_spec_mismatch() {
        let res = InputSpec::from_shapes(
            ForecastShape::new(1, 32, 1),
            Some(ForecastShape::new(1, 30, 2)),
            None,
        );
        assert!(res.is_err());
    }

    #[test]
    fn test_spec_serialization() {
        let spec = InputSpec::new(24, 3, 2);
        let json = serde_json::to_string(&spec).unwrap();
        let restored: InputSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(spec, restored);
    }
}
