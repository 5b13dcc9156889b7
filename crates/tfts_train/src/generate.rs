//! Auto-regressive multi-horizon generation.

use burn::tensor::backend::AutodiffBackend;
use ndarray::{concatenate, s, Array3, Axis};
use serde::{Deserialize, Serialize};
use tfts_data::{DataError, ForecastDataset};

use crate::error::{Result, TrainError};
use crate::trainer::Trainer;

/// Settings for [`generate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Number of future steps to produce.
    pub steps: usize,
}

impl GenerationConfig {
    /// Generate `steps` future values.
    pub fn new(steps: usize) -> Self {
        Self { steps }
    }
}

/// Recomputes the non-target columns of an extended history.
pub type FeatureFn<'a> = &'a dyn Fn(&Array3<f32>) -> Array3<f32>;

/// Forecast `config.steps` values past the end of `history` by feeding
/// predictions back as inputs.
///
/// `history` is `(B, L, F)` with the target in column 0. Each round predicts
/// `H` steps from the last `T` rows and appends them to the target column.
/// The other columns of the new rows are copied from the last known row, or
/// recomputed by `feature_fn` from the whole extended history when given.
///
/// Returns `(B, steps, 1)`.
///
/// # Errors
///
/// [`TrainError::Data`] when `history` is shorter than the model's training
/// length, [`TrainError::InvalidConfig`] when the model was trained with
/// separate encoder or decoder features.
pub fn generate<B: AutodiffBackend>(
    trainer: &Trainer<B>,
    history: &Array3<f32>,
    config: GenerationConfig,
    feature_fn: Option<FeatureFn<'_>>,
) -> Result<Array3<f32>> {
    let spec = trainer.input_spec().ok_or(TrainError::ModelNotBuilt)?;
    let (batch, length, features) = history.dim();

    if config.steps == 0 {
        return Ok(Array3::zeros((batch, 0, 1)));
    }
    if length < spec.train_length {
        return Err(DataError::InvalidShape(format!(
            "history has {length} steps, the model needs at least {}",
            spec.train_length
        ))
        .into());
    }
    if features != spec.encoder_features || spec.decoder_features != 1 {
        return Err(TrainError::InvalidConfig(format!(
            "generation needs array inputs with {} features, got {features}",
            spec.encoder_features
        )));
    }

    let horizon = trainer.predict_sequence_length();
    let mut series = history.to_owned();

    while series.dim().1 - length < config.steps {
        let end = series.dim().1;
        let window = series.slice(s![.., end - spec.train_length.., ..]).to_owned();
        let preds = trainer.predict(&ForecastDataset::from_arrays(window, None)?)?;

        let mut rows = Array3::<f32>::zeros((batch, horizon, features));
        rows.slice_mut(s![.., .., 0]).assign(&preds.slice(s![.., .., 0]));
        if features > 1 {
            let last = series.slice(s![.., end - 1..end, 1..]);
            for step in 0..horizon {
                rows.slice_mut(s![.., step..step + 1, 1..]).assign(&last);
            }
        }
        series = concatenate(Axis(1), &[series.view(), rows.view()])?;

        if let Some(feature_fn) = feature_fn {
            let recomputed = feature_fn(&series);
            if recomputed.dim() != series.dim() {
                return Err(TrainError::InvalidConfig(format!(
                    "feature_fn returned {:?}, expected {:?}",
                    recomputed.dim(),
                    series.dim()
                )));
            }
            series.slice_mut(s![.., .., 1..]).assign(&recomputed.slice(s![.., .., 1..]));
        }
        tracing::debug!(generated = series.dim().1 - length, target = config.steps, "Generation round");
    }

    Ok(series.slice(s![.., length..length + config.steps, 0..1]).to_owned())
}
