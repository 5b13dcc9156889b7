//! Sliding windows over a long series.

use ndarray::{s, Array2, Array3, Axis};
use serde::{Deserialize, Serialize};

use crate::dataset::ForecastDataset;
use crate::error::{DataError, Result};

/// Configuration for [`sliding_windows`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlidingWindowConfig {
    /// History length `T` of each sample.
    pub train_length: usize,
    /// Horizon `H` of each sample.
    pub predict_sequence_length: usize,
    /// Stride between consecutive windows.
    pub stride: usize,
    /// Column holding the target series.
    pub target_column: usize,
    /// Move the non-target columns into encoder and decoder features.
    ///
    /// When false every column stays in `x` and no covariates are produced.
    pub split_covariates: bool,
}

impl Default for SlidingWindowConfig {
    fn default() -> Self {
        Self {
            train_length: 24,
            predict_sequence_length: 12,
            stride: 1,
            target_column: 0,
            split_covariates: false,
        }
    }
}

impl SlidingWindowConfig {
    /// Create a configuration for the given history and horizon.
    #[must_use]
    pub fn new(train_length: usize, predict_sequence_length: usize) -> Self {
        Self {
            train_length,
            predict_sequence_length,
            ..Default::default()
        }
    }

    /// Set the stride.
    #[must_use]
    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    /// Set the target column.
    #[must_use]
    pub fn with_target_column(mut self, column: usize) -> Self {
        self.target_column = column;
        self
    }

    /// Move the remaining columns into covariates.
    #[must_use]
    pub fn with_split_covariates(mut self, split: bool) -> Self {
        self.split_covariates = split;
        self
    }

    /// Number of windows a series of `len` steps yields.
    #[must_use]
    pub fn n_windows(&self, len: usize) -> usize {
        let total = self.train_length + self.predict_sequence_length;
        if len < total || self.stride == 0 {
            0
        } else {
            (len - total) / self.stride + 1
        }
    }
}

/// Cut a `(time, features)` series into forecasting samples.
///
/// Each window yields `x = series[start..start+T]` and
/// `y = series[start+T..start+T+H, target_column]`. Only complete windows are
/// produced.
///
/// # Errors
///
/// Returns an error if the series is shorter than one window, the stride or
/// history length is zero, or the target column does not exist.
pub fn sliding_windows(series: &Array2<f32>, config: &SlidingWindowConfig) -> Result<ForecastDataset> {
    let (len, n_features) = series.dim();
    let t = config.train_length;
    let h = config.predict_sequence_length;

    if t == 0 || h == 0 || config.stride == 0 {
        return Err(DataError::WindowError(
            "train_length, predict_sequence_length and stride must be > 0".to_string(),
        ));
    }
    if config.target_column >= n_features {
        return Err(DataError::WindowError(format!(
            "target column {} out of range for {} features",
            config.target_column, n_features
        )));
    }
    let n = config.n_windows(len);
    if n == 0 {
        return Err(DataError::WindowError(format!(
            "series of length {} is shorter than train_length + predict_sequence_length = {}",
            len,
            t + h
        )));
    }

    let target = series.index_axis(Axis(1), config.target_column);
    let covariate_columns: Vec<usize> = (0..n_features)
        .filter(|&c| c != config.target_column)
        .collect();
    let split = config.split_covariates && !covariate_columns.is_empty();

    let x_width = if split { 1 } else { n_features };
    let mut x = Array3::<f32>::zeros((n, t, x_width));
    let mut y = Array3::<f32>::zeros((n, h, 1));
    let mut enc = split.then(|| Array3::<f32>::zeros((n, t, covariate_columns.len())));
    let mut dec = split.then(|| Array3::<f32>::zeros((n, h, covariate_columns.len())));
    let covariates = series.select(Axis(1), &covariate_columns);

    for i in 0..n {
        let start = i * config.stride;
        if split {
            x.slice_mut(s![i, .., 0])
                .assign(&target.slice(s![start..start + t]));
        } else {
            x.slice_mut(s![i, .., ..])
                .assign(&series.slice(s![start..start + t, ..]));
        }
        y.slice_mut(s![i, .., 0])
            .assign(&target.slice(s![start + t..start + t + h]));

        if let (Some(enc), Some(dec)) = (enc.as_mut(), dec.as_mut()) {
            enc.slice_mut(s![i, .., ..])
                .assign(&covariates.slice(s![start..start + t, ..]));
            dec.slice_mut(s![i, .., ..])
                .assign(&covariates.slice(s![start + t..start + t + h, ..]));
        }
    }

    ForecastDataset::from_arrays(x, Some(y))?.with_features(enc, dec)
}

/// [`sliding_windows`] over a univariate series.
pub fn series_windows(series: &[f32], config: &SlidingWindowConfig) -> Result<ForecastDataset> {
    let column = Array2::from_shape_vec((series.len(), 1), series.to_vec())
        .map_err(|e| DataError::InvalidShape(e.to_string()))?;
    sliding_windows(&column, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize, features: usize) -> Array2<f32> {
        Array2::from_shape_fn((len, features), |(t, f)| (t + 1000 * f) as f32)
    }

    #[test]
    fn test_window_count() {
        let config = SlidingWindowConfig::new(24, 12);
        assert_eq!(config.n_windows(144), 109);
        assert_eq!(config.clone().with_stride(12).n_windows(144), 10);
        assert_eq!(config.n_windows(35), 0);
    }

    #[test]
    fn test_windows_values() {
        let ds = sliding_windows(&ramp(20, 1), &SlidingWindowConfig::new(5, 3)).unwrap();
        assert_eq!(ds.len(), 13);
        assert_eq!(ds.x()[[2, 0, 0]], 2.0);
        assert_eq!(ds.x()[[2, 4, 0]], 6.0);
        assert_eq!(ds.y().unwrap()[[2, 0, 0]], 7.0);
        assert_eq!(ds.y().unwrap()[[2, 2, 0]], 9.0);
    }

    #[test]
    fn test_series_windows() {
        let series: Vec<f32> = (0..30).map(|t| t as f32).collect();
        let ds = series_windows(&series, &SlidingWindowConfig::new(10, 5).with_stride(5)).unwrap();
        assert_eq!(ds.len(), 4);
        assert_eq!(ds.x()[[1, 0, 0]], 5.0);
        assert_eq!(ds.y().unwrap()[[3, 4, 0]], 29.0);
    }

    #[test]
    fn test_windows_split_covariates() {
        let config = SlidingWindowConfig::new(6, 2).with_split_covariates(true);
        let ds = sliding_windows(&ramp(12, 3), &config).unwrap();
        assert_eq!(ds.n_features(), 1);
        assert_eq!(ds.encoder_feature().unwrap().shape(), &[5, 6, 2]);
        assert_eq!(ds.decoder_feature().unwrap().shape(), &[5, 2, 2]);
        assert_eq!(ds.decoder_feature().unwrap()[[0, 0, 1]], 2006.0);
    }

    #[test]
    fn test_windows_errors() {
        assert!(sliding_windows(&ramp(10, 1), &SlidingWindowConfig::new(8, 4)).is_err());
        assert!(sliding_windows(&ramp(10, 1), &SlidingWindowConfig::new(2, 2).with_stride(0)).is_err());
        assert!(sliding_windows(&ramp(10, 1), &SlidingWindowConfig::new(2, 2).with_target_column(1)).is_err());
    }
}
