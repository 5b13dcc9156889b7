//! Dataset splitting utilities.

use crate::dataset::ForecastDataset;
use crate::error::{DataError, Result};
use tfts_core::Seed;

/// Split a dataset chronologically.
///
/// The first `floor(N * (1 - test_size))` samples form the train set and the
/// rest the test set, so no window from the future leaks into training.
///
/// # Errors
///
/// Returns an error if `test_size` is outside `[0, 1)`.
pub fn train_test_split_sequential(
    dataset: &ForecastDataset,
    test_size: f32,
) -> Result<(ForecastDataset, ForecastDataset)> {
    if !(0.0..1.0).contains(&test_size) {
        return Err(DataError::SplitError(format!(
            "test_size must be in [0, 1), got {}",
            test_size
        )));
    }

    let n = dataset.len();
    let n_train = (n as f32 * (1.0 - test_size)).floor() as usize;
    let train_indices: Vec<usize> = (0..n_train).collect();
    let test_indices: Vec<usize> = (n_train..n).collect();

    Ok((dataset.subset(&train_indices)?, dataset.subset(&test_indices)?))
}

/// Split a dataset into train and test sets at random.
///
/// # Arguments
///
/// * `dataset` - The dataset to split
/// * `test_ratio` - Ratio for the test set (e.g., 0.2 for 20%)
/// * `seed` - Random seed for reproducibility
pub fn train_test_split(
    dataset: &ForecastDataset,
    test_ratio: f32,
    seed: Seed,
) -> Result<(ForecastDataset, ForecastDataset)> {
    if test_ratio <= 0.0 || test_ratio >= 1.0 {
        return Err(DataError::SplitError(format!(
            "test_ratio must be between 0 and 1, got {}",
            test_ratio
        )));
    }

    let n = dataset.len();
    if n < 2 {
        return Err(DataError::SplitError(format!(
            "need at least 2 samples to split, got {}",
            n
        )));
    }
    let n_test = ((n as f32 * test_ratio).round() as usize).clamp(1, n - 1);

    let indices = seed.permutation(n);
    let train = dataset.subset(&indices[n_test..])?;
    let test = dataset.subset(&indices[..n_test])?;

    Ok((train, test))
}
