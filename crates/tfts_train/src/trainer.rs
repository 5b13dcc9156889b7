//! The forecasting trainer: fit, predict, evaluate, plot, save and load.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use burn::grad_clipping::GradientClippingConfig;
use burn::module::AutodiffModule;
use burn::optim::decay::WeightDecayConfig;
use burn::optim::momentum::MomentumConfig;
use burn::optim::{AdamConfig, AdamWConfig, GradientsParams, Optimizer, SgdConfig};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use ndarray::{s, Array3};
use serde::{Deserialize, Serialize};
use tfts_core::{InputSpec, Seed, TSForecastingModel};
use tfts_data::{DataError, ForecastDataLoaders, ForecastDataset};
use tfts_models::{load_forecaster, save_forecaster, AutoForecaster, AutoModel, CheckpointMetadata};

use crate::callback::{
    Callback, CallbackContext, CallbackList, EarlyStoppingCallback, ProgressCallback,
    ShowGraphCallback, TerminateOnNanCallback,
};
use crate::error::{Result, TrainError};
use crate::losses::LossKind;
use crate::metrics::default_metrics;
use crate::plot::plot_forecast;
use crate::scheduler::SchedulerKind;

/// Samples per forward pass in [`Trainer::predict`] and validation.
const PREDICT_BATCH_SIZE: usize = 256;

/// Optimizer selection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum OptimizerKind {
    /// Adam, with L2 weight decay when `weight_decay > 0`.
    #[default]
    Adam,
    /// Adam with decoupled weight decay.
    AdamW,
    /// Stochastic gradient descent.
    Sgd {
        /// Momentum factor; 0 disables momentum.
        momentum: f64,
    },
}

/// Configuration for [`Trainer::train`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Number of epochs.
    pub epochs: usize,
    /// Mini-batch size.
    pub batch_size: usize,
    /// Base learning rate handed to the scheduler.
    pub learning_rate: f64,
    /// Optimizer.
    pub optimizer: OptimizerKind,
    /// Weight decay penalty (0 = disabled).
    pub weight_decay: f32,
    /// Training loss.
    pub loss: LossKind,
    /// Learning rate schedule.
    pub scheduler: SchedulerKind,
    /// Early stopping patience in epochs (0 = disabled).
    pub early_stopping_patience: usize,
    /// Minimum improvement that resets the patience counter.
    pub min_delta: f32,
    /// Return the weights of the best epoch instead of the last one.
    pub restore_best: bool,
    /// Clip gradients to this L2 norm.
    pub grad_clip: Option<f32>,
    /// Shuffle training batches every epoch.
    pub shuffle: bool,
    /// Seed for weight initialization and shuffling.
    pub seed: u64,
    /// Write a checkpoint here whenever the monitored loss improves.
    pub checkpoint_dir: Option<PathBuf>,
    /// Print ASCII loss curves when training ends.
    pub show_graph: bool,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            epochs: 100,
            batch_size: 64,
            learning_rate: 5e-4,
            optimizer: OptimizerKind::Adam,
            weight_decay: 0.0,
            loss: LossKind::Mse,
            scheduler: SchedulerKind::Constant,
            early_stopping_patience: 10,
            min_delta: 0.0,
            restore_best: true,
            grad_clip: None,
            shuffle: true,
            seed: 315,
            checkpoint_dir: None,
            show_graph: false,
        }
    }
}

impl TrainerConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of epochs.
    #[must_use]
    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    /// Set the batch size.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the learning rate.
    #[must_use]
    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Set the optimizer.
    #[must_use]
    pub fn with_optimizer(mut self, optimizer: OptimizerKind) -> Self {
        self.optimizer = optimizer;
        self
    }

    /// Set the weight decay penalty.
    #[must_use]
    pub fn with_weight_decay(mut self, weight_decay: f32) -> Self {
        self.weight_decay = weight_decay;
        self
    }

    /// Set the loss.
    #[must_use]
    pub fn with_loss(mut self, loss: LossKind) -> Self {
        self.loss = loss;
        self
    }

    /// Set the learning rate schedule.
    #[must_use]
    pub fn with_scheduler(mut self, scheduler: SchedulerKind) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Set early stopping patience and minimum improvement.
    #[must_use]
    pub fn with_early_stopping(mut self, patience: usize, min_delta: f32) -> Self {
        self.early_stopping_patience = patience;
        self.min_delta = min_delta;
        self
    }

    /// Set whether the best epoch's weights are restored.
    #[must_use]
    pub fn with_restore_best(mut self, restore_best: bool) -> Self {
        self.restore_best = restore_best;
        self
    }

    /// Set gradient clipping by norm.
    #[must_use]
    pub fn with_grad_clip(mut self, max_norm: Option<f32>) -> Self {
        self.grad_clip = max_norm;
        self
    }

    /// Set whether training batches are shuffled.
    #[must_use]
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Set the seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the checkpoint directory.
    #[must_use]
    pub fn with_checkpoint_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.checkpoint_dir = Some(dir.into());
        self
    }

    /// Set whether loss curves are printed after training.
    #[must_use]
    pub fn with_show_graph(mut self, show_graph: bool) -> Self {
        self.show_graph = show_graph;
        self
    }

    /// Parse a config from JSON; missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Check the settings before training.
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(TrainError::InvalidConfig("epochs must be positive".into()));
        }
        if self.batch_size == 0 {
            return Err(TrainError::InvalidConfig("batch_size must be positive".into()));
        }
        if !self.learning_rate.is_finite() || self.learning_rate < 0.0 {
            return Err(TrainError::InvalidConfig(format!(
                "learning_rate must be finite and non-negative, got {}",
                self.learning_rate
            )));
        }
        if self.weight_decay < 0.0 {
            return Err(TrainError::InvalidConfig("weight_decay must be non-negative".into()));
        }
        if let Some(clip) = self.grad_clip {
            if clip <= 0.0 {
                return Err(TrainError::InvalidConfig(format!(
                    "grad_clip must be positive, got {clip}"
                )));
            }
        }
        Ok(())
    }
}

/// Per-epoch record of a training run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    /// Mean training loss per epoch.
    pub train_losses: Vec<f32>,
    /// Validation loss per epoch (empty without a validation set).
    pub valid_losses: Vec<f32>,
    /// Learning rate at the end of each epoch.
    pub learning_rates: Vec<f64>,
    /// Epoch (0-indexed) with the lowest monitored loss.
    pub best_epoch: Option<usize>,
    /// Lowest monitored loss.
    pub best_loss: Option<f32>,
    /// Whether a callback ended training before the last epoch.
    pub stopped_early: bool,
    /// Whether training stopped on a non-finite loss.
    pub diverged: bool,
    /// Wall clock time in seconds.
    pub training_time_secs: f64,
}

impl TrainingHistory {
    /// Number of completed epochs.
    pub fn epochs_run(&self) -> usize {
        self.train_losses.len()
    }

    /// Training loss of the last completed epoch.
    pub fn final_train_loss(&self) -> Option<f32> {
        self.train_losses.last().copied()
    }
}

/// Trains an [`AutoModel`] and runs inference with it.
///
/// The model is built on the first call to [`Trainer::train`], once the
/// input widths of the training data are known.
///
/// # Example
///
/// ```rust,ignore
/// use tfts_models::AutoModel;
/// use tfts_train::{Trainer, TrainerConfig};
///
/// let mut trainer = Trainer::<MyBackend>::new(AutoModel::for_model("rnn", 12)?, device);
/// let history = trainer.train(&train, Some(&valid), &TrainerConfig::default())?;
/// let preds = trainer.predict(&valid)?;
/// ```
pub struct Trainer<B: AutodiffBackend> {
    auto_model: AutoModel,
    model: Option<AutoForecaster<B>>,
    input_spec: Option<InputSpec>,
    device: B::Device,
    loss: LossKind,
    callbacks: CallbackList,
    history: Option<TrainingHistory>,
}

impl<B: AutodiffBackend> Trainer<B> {
    /// Create a trainer for an unbuilt model.
    pub fn new(auto_model: AutoModel, device: B::Device) -> Self {
        Self {
            auto_model,
            model: None,
            input_spec: None,
            device,
            loss: LossKind::default(),
            callbacks: CallbackList::new(),
            history: None,
        }
    }

    /// Register a callback that runs after the built-in ones.
    pub fn add_callback<C: Callback + 'static>(&mut self, callback: C) {
        self.callbacks.add(callback);
    }

    /// The model description.
    pub fn auto_model(&self) -> &AutoModel {
        &self.auto_model
    }

    /// The built model, if any.
    pub fn model(&self) -> Option<&AutoForecaster<B>> {
        self.model.as_ref()
    }

    /// Input widths of the built model.
    pub fn input_spec(&self) -> Option<InputSpec> {
        self.input_spec
    }

    /// Forecast horizon `H`.
    pub fn predict_sequence_length(&self) -> usize {
        self.auto_model.predict_sequence_length
    }

    /// History of the last call to [`Trainer::train`].
    pub fn history(&self) -> Option<&TrainingHistory> {
        self.history.as_ref()
    }

    /// Device the model lives on.
    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// Fit the model on `train`, monitoring `valid` when given.
    ///
    /// Builds the model on the first call. Later calls continue training
    /// the same weights and require datasets with the same input widths.
    ///
    /// # Errors
    ///
    /// [`TrainError::NonFiniteLoss`] if the loss is NaN or infinite during the
    /// first epoch; later divergence stops training and keeps the best
    /// weights so far.
    pub fn train(
        &mut self,
        train: &ForecastDataset,
        valid: Option<&ForecastDataset>,
        config: &TrainerConfig,
    ) -> Result<TrainingHistory> {
        config.validate()?;
        if train.is_empty() {
            return Err(DataError::EmptyDataset.into());
        }
        if !train.has_targets() {
            return Err(TrainError::MissingTargets);
        }
        let spec = train.input_spec()?;
        self.check_horizon(train)?;

        let valid = valid.filter(|ds| !ds.is_empty());
        if let Some(ds) = valid {
            if !ds.has_targets() {
                return Err(TrainError::MissingTargets);
            }
            self.check_horizon(ds)?;
            let valid_spec = ds.input_spec()?;
            if valid_spec != spec {
                return Err(TrainError::InvalidConfig(format!(
                    "validation inputs {valid_spec:?} differ from training inputs {spec:?}"
                )));
            }
        }

        let model = match (self.model.take(), self.input_spec) {
            (Some(model), Some(existing)) if existing == spec => model,
            (Some(model), Some(existing)) => {
                self.model = Some(model);
                return Err(TrainError::InvalidConfig(format!(
                    "dataset inputs {spec:?} do not match the built model {existing:?}"
                )));
            }
            _ => {
                B::seed(config.seed);
                self.auto_model.build::<B>(spec, &self.device)?
            }
        };
        self.input_spec = Some(spec);
        self.loss = config.loss;

        let loaders = ForecastDataLoaders::new(
            train.clone(),
            valid.cloned(),
            config.batch_size,
            config.shuffle,
            Seed::new(config.seed),
        )?;

        tracing::info!(
            model = self.auto_model.name(),
            train_samples = train.len(),
            valid_samples = valid.map_or(0, ForecastDataset::len),
            "Training"
        );

        let mut callbacks = builtin_callbacks(config);
        let n_builtin = callbacks.len();
        callbacks.append(&mut self.callbacks);

        let weight_decay = (config.weight_decay > 0.0).then(|| WeightDecayConfig::new(config.weight_decay));
        let clipping = config.grad_clip.map(GradientClippingConfig::Norm);
        let result = match config.optimizer {
            OptimizerKind::Adam => {
                let optim = AdamConfig::new()
                    .with_weight_decay(weight_decay)
                    .with_grad_clipping(clipping)
                    .init::<B, AutoForecaster<B>>();
                self.fit(model, optim, &loaders, config, &mut callbacks, spec)
            }
            OptimizerKind::AdamW => {
                let optim = AdamWConfig::new()
                    .with_weight_decay(config.weight_decay)
                    .with_grad_clipping(clipping)
                    .init::<B, AutoForecaster<B>>();
                self.fit(model, optim, &loaders, config, &mut callbacks, spec)
            }
            OptimizerKind::Sgd { momentum } => {
                let momentum = (momentum > 0.0).then(|| MomentumConfig::new().with_momentum(momentum));
                let optim = SgdConfig::new()
                    .with_weight_decay(weight_decay)
                    .with_momentum(momentum)
                    .with_gradient_clipping(clipping)
                    .init::<B, AutoForecaster<B>>();
                self.fit(model, optim, &loaders, config, &mut callbacks, spec)
            }
        };
        self.callbacks = callbacks.split_off(n_builtin);

        let (model, history) = result?;
        self.model = Some(model);
        self.history = Some(history.clone());
        Ok(history)
    }

    fn fit<O>(
        &self,
        mut model: AutoForecaster<B>,
        mut optim: O,
        loaders: &ForecastDataLoaders,
        config: &TrainerConfig,
        callbacks: &mut CallbackList,
        spec: InputSpec,
    ) -> Result<(AutoForecaster<B>, TrainingHistory)>
    where
        O: Optimizer<AutoForecaster<B>, B>,
    {
        let start_time = Instant::now();
        let n_batches = loaders.train().n_batches();
        let scheduler = config.scheduler.build(config.learning_rate, config.epochs * n_batches);
        let inner_device: <B::InnerBackend as Backend>::Device = self.device.clone().into();

        let mut history = TrainingHistory::default();
        let mut best: Option<AutoForecaster<B>> = None;
        let mut ctx = CallbackContext::new(config.epochs, n_batches);
        let mut global_step = 0;

        callbacks.before_fit(&mut ctx)?;

        'epochs: for epoch in 0..config.epochs {
            ctx.epoch = epoch;
            ctx.train_loss = None;
            ctx.valid_loss = None;
            ctx.metrics.clear();
            callbacks.before_epoch(&mut ctx)?;

            let mut total_loss = 0.0f32;
            let mut n_steps = 0usize;

            for (batch_idx, batch) in loaders.train().iter::<B>(&self.device, epoch).enumerate() {
                let batch = batch?;
                let y = batch.y.ok_or(TrainError::MissingTargets)?;
                let lr = scheduler.get_lr(global_step);

                let preds = model.forward(batch.inputs, Some(y.clone()));
                let loss = config.loss.forward(preds, y);
                let loss_value = loss.clone().into_scalar().elem::<f32>();

                ctx.batch = batch_idx;
                ctx.lr = lr;
                ctx.train_loss = Some(loss_value);
                callbacks.after_batch(&mut ctx)?;

                if ctx.stop_training {
                    if !loss_value.is_finite() {
                        if epoch == 0 {
                            return Err(TrainError::NonFiniteLoss {
                                epoch,
                                batch: batch_idx,
                                loss: loss_value,
                            });
                        }
                        history.diverged = true;
                        break 'epochs;
                    }
                    break;
                }

                let grads = GradientsParams::from_grads(loss.backward(), &model);
                model = optim.step(lr, model, grads);

                total_loss += loss_value;
                n_steps += 1;
                global_step += 1;
            }

            if n_steps == 0 {
                break;
            }

            let train_loss = total_loss / n_steps as f32;
            ctx.train_loss = Some(train_loss);
            history.train_losses.push(train_loss);
            history.learning_rates.push(ctx.lr);

            if let Some(valid) = loaders.valid() {
                let scores = evaluate_dataset(&model.clone().valid(), valid.dataset(), config.loss, &inner_device)?;
                for (name, value) in scores {
                    if name == "loss" {
                        ctx.valid_loss = Some(value);
                        history.valid_losses.push(value);
                    } else {
                        ctx.metrics.insert(name, value);
                    }
                }
            }

            let monitored = ctx.monitored_loss().unwrap_or(f32::INFINITY);
            if monitored < history.best_loss.unwrap_or(f32::INFINITY) {
                history.best_loss = Some(monitored);
                history.best_epoch = Some(epoch);
                if config.restore_best {
                    best = Some(model.clone());
                }
                if let Some(dir) = &config.checkpoint_dir {
                    let metadata = CheckpointMetadata::new(&self.auto_model, spec)
                        .with_epoch(epoch)
                        .with_val_loss(monitored);
                    save_forecaster(&model, &metadata, dir)?;
                }
            }

            callbacks.after_epoch(&mut ctx)?;

            if ctx.stop_training {
                if epoch + 1 < config.epochs {
                    history.stopped_early = true;
                }
                break;
            }
        }

        callbacks.after_fit(&mut ctx)?;
        history.training_time_secs = start_time.elapsed().as_secs_f64();

        if let (Some(epoch), Some(loss)) = (history.best_epoch, history.best_loss) {
            tracing::info!(
                "Training complete in {:.1}s, best loss {:.6} at epoch {}",
                history.training_time_secs,
                loss,
                epoch + 1
            );
        }

        let model = match best {
            Some(best) if config.restore_best => best,
            _ => model,
        };
        Ok((model, history))
    }

    /// Forecast every sample of `dataset`, returning `(N, H, 1)`.
    pub fn predict(&self, dataset: &ForecastDataset) -> Result<Array3<f32>> {
        let model = self.model.as_ref().ok_or(TrainError::ModelNotBuilt)?;
        if dataset.is_empty() {
            return Ok(Array3::zeros((0, self.predict_sequence_length(), 1)));
        }
        self.check_spec(dataset)?;

        let device = self.inner_device();
        let (preds, _) = forward_dataset(&model.clone().valid(), dataset, &device)?;
        tensor_to_array(preds)
    }

    /// Loss (under the key `"loss"`) and metrics of the model on `dataset`.
    pub fn evaluate(&self, dataset: &ForecastDataset) -> Result<HashMap<String, f32>> {
        let model = self.model.as_ref().ok_or(TrainError::ModelNotBuilt)?;
        if dataset.is_empty() {
            return Err(DataError::EmptyDataset.into());
        }
        self.check_spec(dataset)?;

        let device = self.inner_device();
        evaluate_dataset(&model.clone().valid(), dataset, self.loss, &device)
    }

    /// ASCII chart of the first sample: history, then truth and prediction.
    pub fn plot(&self, history: &Array3<f32>, truth: &Array3<f32>, pred: &Array3<f32>) -> String {
        plot_forecast(&first_series(history), &first_series(truth), &first_series(pred))
    }

    /// Write weights and metadata into `dir`.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<()> {
        let model = self.model.as_ref().ok_or(TrainError::ModelNotBuilt)?;
        let spec = self.input_spec.ok_or(TrainError::ModelNotBuilt)?;

        let mut metadata = CheckpointMetadata::new(&self.auto_model, spec);
        if let Some(history) = &self.history {
            if let Some(epoch) = history.best_epoch {
                metadata = metadata.with_epoch(epoch);
            }
            if let Some(loss) = history.best_loss {
                metadata = metadata.with_val_loss(loss);
            }
        }
        save_forecaster(model, &metadata, dir)?;
        Ok(())
    }

    /// Restore a trainer saved with [`Trainer::save`].
    pub fn load(dir: impl AsRef<Path>, device: B::Device) -> Result<Self> {
        let (model, metadata) = load_forecaster::<B>(dir, &device)?;
        let mut trainer = Self::new(metadata.auto_model(), device);
        trainer.model = Some(model);
        trainer.input_spec = Some(metadata.input_spec);
        Ok(trainer)
    }

    fn inner_device(&self) -> <B::InnerBackend as Backend>::Device {
        self.device.clone().into()
    }

    fn check_horizon(&self, dataset: &ForecastDataset) -> Result<()> {
        let horizon = self.predict_sequence_length();
        match dataset.predict_sequence_length() {
            Some(h) if h != horizon => Err(TrainError::InvalidConfig(format!(
                "targets span {h} steps but the model predicts {horizon}"
            ))),
            _ => Ok(()),
        }
    }

    fn check_spec(&self, dataset: &ForecastDataset) -> Result<()> {
        let expected = self.input_spec.ok_or(TrainError::ModelNotBuilt)?;
        let actual = dataset.input_spec()?;
        if actual != expected {
            return Err(TrainError::InvalidConfig(format!(
                "inputs {actual:?} do not match the model {expected:?}"
            )));
        }
        Ok(())
    }
}

fn builtin_callbacks(config: &TrainerConfig) -> CallbackList {
    let mut callbacks = CallbackList::new();
    callbacks.add(ProgressCallback::new(false));
    callbacks.add(TerminateOnNanCallback::new());
    if config.early_stopping_patience > 0 {
        callbacks.add(EarlyStoppingCallback::new(config.early_stopping_patience, config.min_delta));
    }
    if config.show_graph {
        callbacks.add(ShowGraphCallback::new());
    }
    callbacks
}

/// Run the model over `dataset` in fixed-size chunks.
fn forward_dataset<IB: Backend>(
    model: &AutoForecaster<IB>,
    dataset: &ForecastDataset,
    device: &IB::Device,
) -> Result<(Tensor<IB, 3>, Option<Tensor<IB, 3>>)> {
    let indices: Vec<usize> = (0..dataset.len()).collect();
    let mut preds = Vec::new();
    let mut targets = Vec::new();

    for chunk in indices.chunks(PREDICT_BATCH_SIZE) {
        let batch = dataset.batch::<IB>(chunk, device)?;
        if let Some(y) = batch.y {
            targets.push(y);
        }
        preds.push(model.forward(batch.inputs, None));
    }

    let targets = (!targets.is_empty()).then(|| Tensor::cat(targets, 0));
    Ok((Tensor::cat(preds, 0), targets))
}

fn evaluate_dataset<IB: Backend>(
    model: &AutoForecaster<IB>,
    dataset: &ForecastDataset,
    loss: LossKind,
    device: &IB::Device,
) -> Result<HashMap<String, f32>> {
    let (preds, targets) = forward_dataset(model, dataset, device)?;
    let targets = targets.ok_or(TrainError::MissingTargets)?;

    let mut scores = HashMap::new();
    let loss_value = loss.forward(preds.clone(), targets.clone()).into_scalar().elem::<f32>();
    scores.insert("loss".to_string(), loss_value);
    for metric in default_metrics::<IB>() {
        scores.insert(metric.name().to_string(), metric.compute(&preds, &targets));
    }
    Ok(scores)
}

fn tensor_to_array<IB: Backend>(tensor: Tensor<IB, 3>) -> Result<Array3<f32>> {
    let [n, h, f] = tensor.dims();
    let values = tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| TrainError::TensorData(format!("{e:?}")))?;
    Ok(Array3::from_shape_vec((n, h, f), values)?)
}

/// Target column of the first sample, or nothing for an empty array.
fn first_series(array: &Array3<f32>) -> Vec<f32> {
    if array.shape()[0] == 0 || array.shape()[2] == 0 {
        return Vec::new();
    }
    array.slice(s![0, .., 0]).to_vec()
}
