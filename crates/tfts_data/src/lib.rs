//! # tfts_data
//!
//! Datasets, windowing and dataloaders for tfts-rs forecasting.
//!
//! This crate provides:
//! - [`ForecastDataset`] holding history, covariates and targets as `ndarray` arrays
//! - [`sliding_windows`] to cut a long series into `(history, horizon)` samples
//! - [`train_test_split_sequential`] and [`train_test_split`] for splitting
//! - [`ForecastDataLoader`] / [`ForecastDataLoaders`] for batched iteration
//! - [`get_data`] with the built-in `sine` and `airpassengers` datasets
//! - I/O utilities for NPY and NPZ files
//!
//! ## Example
//!
//! ```rust,ignore
//! use tfts_data::{get_data, ForecastDataLoader};
//! use tfts_core::Seed;
//!
//! let (train, valid) = get_data("sine", 24, 12, 0.2)?.into_pair();
//!
//! let loader = ForecastDataLoader::builder(train)
//!     .batch_size(16)
//!     .shuffle(true)
//!     .seed(Seed::new(315))
//!     .build()?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod dataset;
mod error;
mod io;
mod loader;
mod splits;
pub mod synthetic;
mod windows;

pub use dataset::ForecastDataset;
pub use error::{DataError, Result};
pub use io::{read_npy, read_npz};
pub use loader::{
    ForecastDataLoader, ForecastDataLoaderBuilder, ForecastDataLoaderIter, ForecastDataLoaders,
};
pub use splits::{train_test_split, train_test_split_sequential};
pub use synthetic::{get_data, get_data_seeded, DataSplit, AVAILABLE_DATASETS};
pub use windows::{series_windows, sliding_windows, SlidingWindowConfig};
