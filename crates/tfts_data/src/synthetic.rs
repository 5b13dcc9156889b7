//! Built-in datasets for examples, tests and benchmarks.
//!
//! - `sine`: 100 sine waves with random phase over `3π`
//! - `airpassengers`: monthly international airline passengers 1949-1960

use ndarray::{Array2, Array3};
use rand::Rng;
use std::f32::consts::PI;

use crate::dataset::ForecastDataset;
use crate::error::{DataError, Result};
use crate::splits::train_test_split_sequential;
use crate::windows::{sliding_windows, SlidingWindowConfig};
use tfts_core::Seed;

/// Names accepted by [`get_data`].
pub const AVAILABLE_DATASETS: &[&str] = &["sine", "airpassengers"];

/// Number of sine waves generated by the `sine` dataset.
pub const SINE_EXAMPLES: usize = 100;

/// Monthly totals of international airline passengers (thousands), 1949-1960.
pub const AIR_PASSENGERS: [f32; 144] = [
    112., 118., 132., 129., 121., 135., 148., 148., 136., 119., 104., 118., //
    115., 126., 141., 135., 125., 149., 170., 170., 158., 133., 114., 140., //
    145., 150., 178., 163., 172., 178., 199., 199., 184., 162., 146., 166., //
    171., 180., 193., 181., 183., 218., 230., 242., 209., 191., 172., 194., //
    196., 196., 236., 235., 229., 243., 264., 272., 237., 211., 180., 201., //
    204., 188., 235., 227., 234., 264., 302., 293., 259., 229., 203., 229., //
    242., 233., 267., 269., 270., 315., 364., 347., 312., 274., 237., 278., //
    284., 277., 317., 313., 318., 374., 413., 405., 355., 306., 271., 306., //
    315., 301., 356., 348., 355., 422., 465., 467., 404., 347., 305., 336., //
    340., 318., 362., 348., 363., 435., 491., 505., 404., 359., 310., 337., //
    360., 342., 406., 396., 420., 472., 548., 559., 463., 407., 362., 405., //
    417., 391., 419., 461., 472., 535., 622., 606., 508., 461., 390., 432.,
];

/// Result of [`get_data`].
#[derive(Debug, Clone)]
pub enum DataSplit {
    /// `test_size` was zero; every sample is in one dataset.
    Full(ForecastDataset),
    /// Chronological train/validation split.
    TrainValid {
        /// Earlier samples.
        train: ForecastDataset,
        /// Later samples.
        valid: ForecastDataset,
    },
}

impl DataSplit {
    /// Training data and, when split, validation data.
    #[must_use]
    pub fn into_pair(self) -> (ForecastDataset, Option<ForecastDataset>) {
        match self {
            Self::Full(ds) => (ds, None),
            Self::TrainValid { train, valid } => (train, Some(valid)),
        }
    }
}

/// Load a built-in dataset with a fixed seed.
///
/// See [`get_data_seeded`].
pub fn get_data(
    name: &str,
    train_length: usize,
    predict_sequence_length: usize,
    test_size: f32,
) -> Result<DataSplit> {
    get_data_seeded(name, train_length, predict_sequence_length, test_size, Seed::default())
}

/// Load a built-in dataset.
///
/// # Arguments
///
/// * `name` - One of [`AVAILABLE_DATASETS`]
/// * `train_length` - History length `T`
/// * `predict_sequence_length` - Horizon `H`
/// * `test_size` - Fraction of the latest samples held out for validation
/// * `seed` - Seed for the random phases of `sine`
///
/// # Errors
///
/// Returns [`DataError::UnknownDataset`] for unknown names and a split or
/// window error when the sizes do not fit.
pub fn get_data_seeded(
    name: &str,
    train_length: usize,
    predict_sequence_length: usize,
    test_size: f32,
    seed: Seed,
) -> Result<DataSplit> {
    let dataset = match name.to_lowercase().as_str() {
        "sine" => sine(train_length, predict_sequence_length, SINE_EXAMPLES, seed)?,
        "airpassengers" | "air_passengers" => air_passengers(train_length, predict_sequence_length)?,
        _ => {
            return Err(DataError::UnknownDataset {
                name: name.to_string(),
                available: AVAILABLE_DATASETS.join(", "),
            })
        }
    };
    tracing::debug!(name, samples = dataset.len(), "loaded built-in dataset");

    if test_size == 0.0 {
        return Ok(DataSplit::Full(dataset));
    }
    let (train, valid) = train_test_split_sequential(&dataset, test_size)?;
    Ok(DataSplit::TrainValid { train, valid })
}

/// Sine waves `sin(linspace(r, 3π + r, T + H))` with random phase `r`.
pub fn sine(
    train_length: usize,
    predict_sequence_length: usize,
    n_examples: usize,
    seed: Seed,
) -> Result<ForecastDataset> {
    let total = train_length + predict_sequence_length;
    if train_length == 0 || predict_sequence_length == 0 {
        return Err(DataError::WindowError(
            "train_length and predict_sequence_length must be > 0".to_string(),
        ));
    }

    let mut rng = seed.derive("sine").to_rng();
    let step = 3.0 * PI / (total - 1).max(1) as f32;
    let mut x = Array3::<f32>::zeros((n_examples, train_length, 1));
    let mut y = Array3::<f32>::zeros((n_examples, predict_sequence_length, 1));

    for n in 0..n_examples {
        let phase: f32 = rng.gen::<f32>() * 2.0 * PI;
        for t in 0..total {
            let value = (phase + t as f32 * step).sin();
            if t < train_length {
                x[[n, t, 0]] = value;
            } else {
                y[[n, t - train_length, 0]] = value;
            }
        }
    }

    ForecastDataset::from_arrays(x, Some(y))
}

/// Min-max scaled air passengers cut into sliding windows.
pub fn air_passengers(train_length: usize, predict_sequence_length: usize) -> Result<ForecastDataset> {
    let (min, max) = AIR_PASSENGERS
        .iter()
        .fold((f32::MAX, f32::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let scaled: Vec<f32> = AIR_PASSENGERS
        .iter()
        .map(|v| (v - min) / (max - min))
        .collect();

    let series = Array2::from_shape_vec((scaled.len(), 1), scaled)
        .map_err(|e| DataError::InvalidShape(e.to_string()))?;
    sliding_windows(
        &series,
        &SlidingWindowConfig::new(train_length, predict_sequence_length),
    )
}
