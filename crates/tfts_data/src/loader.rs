//! Dataloader implementations for batched iteration.

use burn::prelude::*;

use crate::dataset::ForecastDataset;
use crate::error::{DataError, Result};
use tfts_core::{ForecastBatch, Seed};

/// A dataloader that produces batches from a forecasting dataset.
///
/// # Example
///
/// ```rust,ignore
/// use tfts_data::{ForecastDataset, ForecastDataLoader};
/// use tfts_core::Seed;
///
/// let loader = ForecastDataLoader::builder(dataset)
///     .batch_size(16)
///     .shuffle(true)
///     .seed(Seed::new(315))
///     .build()?;
///
/// for batch in loader.iter::<B>(&device, 0) {
///     let batch = batch?;
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ForecastDataLoader {
    dataset: ForecastDataset,
    batch_size: usize,
    shuffle: bool,
    drop_last: bool,
    seed: Seed,
}

impl ForecastDataLoader {
    /// Create a new dataloader builder.
    #[must_use]
    pub fn builder(dataset: ForecastDataset) -> ForecastDataLoaderBuilder {
        ForecastDataLoaderBuilder::new(dataset)
    }

    /// Get the dataset.
    #[must_use]
    pub fn dataset(&self) -> &ForecastDataset {
        &self.dataset
    }

    /// Get the batch size.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Get the number of batches.
    #[must_use]
    pub fn n_batches(&self) -> usize {
        let n = self.dataset.len();
        if self.drop_last {
            n / self.batch_size
        } else {
            n.div_ceil(self.batch_size)
        }
    }

    /// Get the total number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dataset.len()
    }

    /// Check if the loader is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    /// Create an iterator over batches for one epoch.
    ///
    /// Shuffled loaders draw a fresh permutation per epoch from the seed.
    #[must_use]
    pub fn iter<B: Backend>(&self, device: &B::Device, epoch: usize) -> ForecastDataLoaderIter<'_, B> {
        ForecastDataLoaderIter::new(self, device.clone(), epoch)
    }
}

/// Builder for [`ForecastDataLoader`].
pub struct ForecastDataLoaderBuilder {
    dataset: ForecastDataset,
    batch_size: usize,
    shuffle: bool,
    drop_last: bool,
    seed: Option<Seed>,
}

impl ForecastDataLoaderBuilder {
    /// Create a new builder.
    #[must_use]
    pub fn new(dataset: ForecastDataset) -> Self {
        Self {
            dataset,
            batch_size: 32,
            shuffle: false,
            drop_last: false,
            seed: None,
        }
    }

    /// Set the batch size.
    #[must_use]
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Enable or disable shuffling.
    #[must_use]
    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Enable or disable dropping the last incomplete batch.
    #[must_use]
    pub fn drop_last(mut self, drop_last: bool) -> Self {
        self.drop_last = drop_last;
        self
    }

    /// Set the random seed for shuffling.
    #[must_use]
    pub fn seed(mut self, seed: Seed) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Build the dataloader.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch size is zero or the dataset is empty.
    pub fn build(self) -> Result<ForecastDataLoader> {
        if self.batch_size == 0 {
            return Err(DataError::InvalidBatchSize(
                "Batch size must be greater than 0".to_string(),
            ));
        }

        if self.dataset.is_empty() {
            return Err(DataError::EmptyDataset);
        }

        Ok(ForecastDataLoader {
            dataset: self.dataset,
            batch_size: self.batch_size,
            shuffle: self.shuffle,
            drop_last: self.drop_last,
            seed: self.seed.unwrap_or_else(Seed::from_entropy),
        })
    }
}

/// Iterator over batches from a [`ForecastDataLoader`].
pub struct ForecastDataLoaderIter<'a, B: Backend> {
    loader: &'a ForecastDataLoader,
    device: B::Device,
    indices: Vec<usize>,
    current_batch: usize,
    n_batches: usize,
}

impl<'a, B: Backend> ForecastDataLoaderIter<'a, B> {
    fn new(loader: &'a ForecastDataLoader, device: B::Device, epoch: usize) -> Self {
        let n = loader.dataset.len();
        let indices = if loader.shuffle {
            loader.seed.for_epoch(epoch).permutation(n)
        } else {
            (0..n).collect()
        };

        Self {
            loader,
            device,
            indices,
            current_batch: 0,
            n_batches: loader.n_batches(),
        }
    }
}

impl<'a, B: Backend> Iterator for ForecastDataLoaderIter<'a, B> {
    type Item = Result<ForecastBatch<B>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_batch >= self.n_batches {
            return None;
        }

        let start = self.current_batch * self.loader.batch_size;
        let end = std::cmp::min(start + self.loader.batch_size, self.indices.len());
        self.current_batch += 1;

        Some(
            self.loader
                .dataset
                .batch::<B>(&self.indices[start..end], &self.device),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.n_batches - self.current_batch;
        (remaining, Some(remaining))
    }
}

impl<'a, B: Backend> ExactSizeIterator for ForecastDataLoaderIter<'a, B> {}

/// Paired dataloaders for training and validation.
///
/// The validation loader is never shuffled.
#[derive(Debug, Clone)]
pub struct ForecastDataLoaders {
    train: ForecastDataLoader,
    valid: Option<ForecastDataLoader>,
}

impl ForecastDataLoaders {
    /// Build train and optional validation loaders with a shared batch size.
    ///
    /// An empty validation dataset is treated as absent.
    pub fn new(
        train: ForecastDataset,
        valid: Option<ForecastDataset>,
        batch_size: usize,
        shuffle: bool,
        seed: Seed,
    ) -> Result<Self> {
        let train = ForecastDataLoader::builder(train)
            .batch_size(batch_size)
            .shuffle(shuffle)
            .seed(seed.derive("train"))
            .build()?;

        let valid = match valid {
            Some(ds) if !ds.is_empty() => Some(
                ForecastDataLoader::builder(ds)
                    .batch_size(batch_size)
                    .shuffle(false)
                    .seed(seed.derive("valid"))
                    .build()?,
            ),
            _ => None,
        };

        Ok(Self { train, valid })
    }

    /// Get the training dataloader.
    #[must_use]
    pub fn train(&self) -> &ForecastDataLoader {
        &self.train
    }

    /// Get the validation dataloader.
    #[must_use]
    pub fn valid(&self) -> Option<&ForecastDataLoader> {
        self.valid.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use ndarray::Array3;

    fn dataset(n: usize) -> ForecastDataset {
        let x = Array3::from_shape_fn((n, 8, 1), |(i, t, _)| (i * 10 + t) as f32);
        let y = Array3::<f32>::zeros((n, 4, 1));
        ForecastDataset::from_arrays(x, Some(y)).unwrap()
    }

    #[test]
    fn test_n_batches() {
        let loader = ForecastDataLoader::builder(dataset(10))
            .batch_size(4)
            .build()
            .unwrap();
        assert_eq!(loader.n_batches(), 3);

        let loader = ForecastDataLoader::builder(dataset(10))
            .batch_size(4)
            .drop_last(true)
            .build()
            .unwrap();
        assert_eq!(loader.n_batches(), 2);
    }

    #[test]
    fn test_invalid_loader() {
        assert!(ForecastDataLoader::builder(dataset(4)).batch_size(0).build().is_err());
        assert!(ForecastDataLoader::builder(dataset(0)).build().is_err());
    }

    #[test]
    fn test_iteration_covers_all_samples() {
        let device = Default::default();
        let loader = ForecastDataLoader::builder(dataset(10))
            .batch_size(3)
            .shuffle(true)
            .seed(Seed::new(315))
            .build()
            .unwrap();

        let mut firsts = Vec::new();
        for batch in loader.iter::<NdArray>(&device, 0) {
            let batch = batch.unwrap();
            let x: Vec<f32> = batch.inputs.x.into_data().to_vec().unwrap();
            firsts.extend(x.chunks(8).map(|c| c[0] as usize / 10));
        }
        firsts.sort_unstable();
        assert_eq!(firsts, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_epochs_reshuffle() {
        let device = Default::default();
        let loader = ForecastDataLoader::builder(dataset(32))
            .batch_size(32)
            .shuffle(true)
            .seed(Seed::new(1))
            .build()
            .unwrap();

        let first = |epoch| -> Vec<f32> {
            loader
                .iter::<NdArray>(&device, epoch)
                .next()
                .unwrap()
                .unwrap()
                .inputs
                .x
                .into_data()
                .to_vec()
                .unwrap()
        };
        assert_eq!(first(0), first(0));
        assert_ne!(first(0), first(1));
    }

    #[test]
    fn test_loaders_skip_empty_valid() {
        let empty = dataset(10).subset(&[]).unwrap();
        let dls = ForecastDataLoaders::new(dataset(10), Some(empty), 4, true, Seed::new(0)).unwrap();
        assert!(dls.valid().is_none());
        assert_eq!(dls.train().batch_size(), 4);
    }
}
