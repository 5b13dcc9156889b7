//! Saving and loading forecasters.
//!
//! A checkpoint directory holds the weights as a named MessagePack record
//! (`model.mpk`) and a `metadata.json` sidecar with everything needed to
//! rebuild the module before the weights are loaded.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use serde::{Deserialize, Serialize};

use crate::auto::{AutoForecaster, AutoModel};
use crate::config::ModelConfig;
use crate::error::{ModelError, Result};
use tfts_core::InputSpec;

const WEIGHTS_FILE: &str = "model";
const METADATA_FILE: &str = "metadata.json";

/// Save a module's weights to `path` (the `.mpk` extension is added).
pub fn save_model<B, M>(model: &M, path: impl AsRef<Path>) -> Result<()>
where
    B: Backend,
    M: Module<B>,
{
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    model
        .clone()
        .save_file(path.as_ref().to_path_buf(), &recorder)
        .map_err(|e| ModelError::Checkpoint(format!("failed to save {}: {e}", path.as_ref().display())))
}

/// Load weights written by [`save_model`] into `model`.
pub fn load_record<B, M>(model: M, path: impl AsRef<Path>, device: &B::Device) -> Result<M>
where
    B: Backend,
    M: Module<B>,
{
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    model
        .load_file(path.as_ref().to_path_buf(), &recorder, device)
        .map_err(|e| ModelError::Checkpoint(format!("failed to load {}: {e}", path.as_ref().display())))
}

/// Checkpoint metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    /// Model name.
    pub model: String,
    /// Full model configuration.
    pub config: ModelConfig,
    /// Forecast horizon.
    pub predict_sequence_length: usize,
    /// Input widths the model was built for.
    pub input_spec: InputSpec,
    /// Training epoch (if applicable).
    pub epoch: Option<usize>,
    /// Validation loss (if applicable).
    pub val_loss: Option<f32>,
    /// Additional metadata.
    pub extra: HashMap<String, String>,
}

impl CheckpointMetadata {
    /// Metadata for a model described by `auto` and built for `spec`.
    pub fn new(auto: &AutoModel, input_spec: InputSpec) -> Self {
        Self {
            model: auto.name().to_string(),
            config: auto.config.clone(),
            predict_sequence_length: auto.predict_sequence_length,
            input_spec,
            epoch: None,
            val_loss: None,
            extra: HashMap::new(),
        }
    }

    /// Set the training epoch.
    #[must_use]
    pub fn with_epoch(mut self, epoch: usize) -> Self {
        self.epoch = Some(epoch);
        self
    }

    /// Set the validation loss.
    #[must_use]
    pub fn with_val_loss(mut self, loss: f32) -> Self {
        self.val_loss = Some(loss);
        self
    }

    /// Add extra metadata.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// The [`AutoModel`] that rebuilds this checkpoint's architecture.
    pub fn auto_model(&self) -> AutoModel {
        AutoModel::from_config(self.config.clone(), self.predict_sequence_length)
    }

    /// Save metadata to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Load metadata from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
    }
}

fn weights_path(dir: &Path) -> PathBuf {
    dir.join(WEIGHTS_FILE)
}

/// Write weights and metadata into `dir`, creating it if needed.
pub fn save_forecaster<B: Backend>(
    model: &AutoForecaster<B>,
    metadata: &CheckpointMetadata,
    dir: impl AsRef<Path>,
) -> Result<()> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;
    save_model(model, weights_path(dir))?;
    metadata.save(dir.join(METADATA_FILE))?;
    tracing::info!(model = %metadata.model, dir = %dir.display(), "Saved checkpoint");
    Ok(())
}

/// Rebuild the forecaster stored in `dir` and load its weights.
pub fn load_forecaster<B: Backend>(
    dir: impl AsRef<Path>,
    device: &B::Device,
) -> Result<(AutoForecaster<B>, CheckpointMetadata)> {
    let dir = dir.as_ref();
    let metadata = CheckpointMetadata::load(dir.join(METADATA_FILE))?;
    let model = metadata.auto_model().build::<B>(metadata.input_spec, device)?;
    let model = load_record(model, weights_path(dir), device)?;
    tracing::info!(model = %metadata.model, dir = %dir.display(), "Loaded checkpoint");
    Ok((model, metadata))
}
