//! Callback system for training hooks.

use std::collections::HashMap;

use crate::error::Result;
use crate::plot::{render_chart, Series};

/// Context passed to callbacks containing training state.
#[derive(Debug, Clone)]
pub struct CallbackContext {
    /// Current epoch (0-indexed).
    pub epoch: usize,
    /// Total number of epochs.
    pub n_epochs: usize,
    /// Current batch (0-indexed).
    pub batch: usize,
    /// Total number of batches in epoch.
    pub n_batches: usize,
    /// Current learning rate.
    pub lr: f64,
    /// Loss of the last batch inside an epoch, mean epoch loss after it.
    pub train_loss: Option<f32>,
    /// Current validation loss.
    pub valid_loss: Option<f32>,
    /// Current validation metrics.
    pub metrics: HashMap<String, f32>,
    /// Whether to stop training.
    pub stop_training: bool,
}

impl CallbackContext {
    /// Create a new callback context.
    pub fn new(n_epochs: usize, n_batches: usize) -> Self {
        Self {
            epoch: 0,
            n_epochs,
            batch: 0,
            n_batches,
            lr: 0.0,
            train_loss: None,
            valid_loss: None,
            metrics: HashMap::new(),
            stop_training: false,
        }
    }

    /// Get progress as a fraction (0.0 to 1.0).
    pub fn progress(&self) -> f32 {
        let total_batches = self.n_epochs * self.n_batches;
        if total_batches == 0 {
            return 0.0;
        }
        let current = self.epoch * self.n_batches + self.batch;
        current as f32 / total_batches as f32
    }

    /// The loss early stopping and best-model tracking look at:
    /// validation loss when available, training loss otherwise.
    pub fn monitored_loss(&self) -> Option<f32> {
        self.valid_loss.or(self.train_loss)
    }
}

/// Trait for training callbacks.
///
/// Callbacks allow customization of the training loop at various points.
pub trait Callback: Send + Sync {
    /// Called before training starts.
    fn before_fit(&mut self, _ctx: &mut CallbackContext) -> Result<()> {
        Ok(())
    }

    /// Called after training completes.
    fn after_fit(&mut self, _ctx: &mut CallbackContext) -> Result<()> {
        Ok(())
    }

    /// Called before each epoch.
    fn before_epoch(&mut self, _ctx: &mut CallbackContext) -> Result<()> {
        Ok(())
    }

    /// Called after each epoch, once validation has run.
    fn after_epoch(&mut self, _ctx: &mut CallbackContext) -> Result<()> {
        Ok(())
    }

    /// Called after each training batch.
    fn after_batch(&mut self, _ctx: &mut CallbackContext) -> Result<()> {
        Ok(())
    }

    /// Get the callback name.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// A list of callbacks.
#[derive(Default)]
pub struct CallbackList {
    callbacks: Vec<Box<dyn Callback>>,
}

impl std::fmt::Debug for CallbackList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.callbacks.iter().map(|cb| cb.name()))
            .finish()
    }
}

impl CallbackList {
    /// Create a new empty callback list.
    pub fn new() -> Self {
        Self {
            callbacks: Vec::new(),
        }
    }

    /// Add a callback.
    pub fn add<C: Callback + 'static>(&mut self, callback: C) {
        self.callbacks.push(Box::new(callback));
    }

    /// Add an already boxed callback.
    pub fn push(&mut self, callback: Box<dyn Callback>) {
        self.callbacks.push(callback);
    }

    /// Move every callback of `other` to the end of this list.
    pub fn append(&mut self, other: &mut CallbackList) {
        self.callbacks.append(&mut other.callbacks);
    }

    /// Split off the callbacks from index `at` onwards.
    pub fn split_off(&mut self, at: usize) -> CallbackList {
        let at = at.min(self.callbacks.len());
        CallbackList {
            callbacks: self.callbacks.split_off(at),
        }
    }

    /// Number of registered callbacks.
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    /// Whether no callbacks are registered.
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Names of the registered callbacks, in call order.
    pub fn names(&self) -> Vec<&str> {
        self.callbacks.iter().map(|cb| cb.name()).collect()
    }

    /// Call before_fit on all callbacks.
    pub fn before_fit(&mut self, ctx: &mut CallbackContext) -> Result<()> {
        for cb in &mut self.callbacks {
            cb.before_fit(ctx)?;
        }
        Ok(())
    }

    /// Call after_fit on all callbacks.
    pub fn after_fit(&mut self, ctx: &mut CallbackContext) -> Result<()> {
        for cb in &mut self.callbacks {
            cb.after_fit(ctx)?;
        }
        Ok(())
    }

    /// Call before_epoch on all callbacks.
    pub fn before_epoch(&mut self, ctx: &mut CallbackContext) -> Result<()> {
        for cb in &mut self.callbacks {
            cb.before_epoch(ctx)?;
        }
        Ok(())
    }

    /// Call after_epoch on all callbacks.
    pub fn after_epoch(&mut self, ctx: &mut CallbackContext) -> Result<()> {
        for cb in &mut self.callbacks {
            cb.after_epoch(ctx)?;
        }
        Ok(())
    }

    /// Call after_batch on all callbacks.
    pub fn after_batch(&mut self, ctx: &mut CallbackContext) -> Result<()> {
        for cb in &mut self.callbacks {
            cb.after_batch(ctx)?;
        }
        Ok(())
    }
}

/// Logs epoch progress through `tracing`.
#[derive(Debug, Default)]
pub struct ProgressCallback {
    show_batch: bool,
}

impl ProgressCallback {
    /// Create a new progress callback. `show_batch` also logs every batch at debug level.
    pub fn new(show_batch: bool) -> Self {
        Self { show_batch }
    }
}

impl Callback for ProgressCallback {
    fn before_fit(&mut self, ctx: &mut CallbackContext) -> Result<()> {
        tracing::info!(
            "Starting training for {} epochs ({} batches per epoch)",
            ctx.n_epochs,
            ctx.n_batches
        );
        Ok(())
    }

    fn after_batch(&mut self, ctx: &mut CallbackContext) -> Result<()> {
        if self.show_batch {
            tracing::debug!(
                epoch = ctx.epoch + 1,
                batch = ctx.batch + 1,
                loss = ctx.train_loss.unwrap_or(f32::NAN),
                "batch done"
            );
        }
        Ok(())
    }

    fn after_epoch(&mut self, ctx: &mut CallbackContext) -> Result<()> {
        let train_loss = ctx.train_loss.map(|l| format!("{:.4}", l)).unwrap_or_default();
        let valid_loss = ctx.valid_loss.map(|l| format!("{:.4}", l)).unwrap_or_else(|| "-".into());

        tracing::info!(
            "Epoch {}/{}: train_loss={}, valid_loss={}, lr={:.6}",
            ctx.epoch + 1,
            ctx.n_epochs,
            train_loss,
            valid_loss,
            ctx.lr
        );

        let mut names: Vec<_> = ctx.metrics.keys().collect();
        names.sort();
        for name in names {
            tracing::info!("  {}: {:.4}", name, ctx.metrics[name]);
        }

        Ok(())
    }

    fn after_fit(&mut self, _ctx: &mut CallbackContext) -> Result<()> {
        tracing::info!("Training completed");
        Ok(())
    }

    fn name(&self) -> &str {
        "ProgressCallback"
    }
}

/// Stops training once the monitored loss has not improved by more than
/// `min_delta` for `patience` consecutive epochs.
#[derive(Debug, Clone)]
pub struct EarlyStoppingCallback {
    patience: usize,
    min_delta: f32,
    best_loss: f32,
    counter: usize,
}

impl EarlyStoppingCallback {
    /// Create a new early stopping callback.
    pub fn new(patience: usize, min_delta: f32) -> Self {
        Self {
            patience,
            min_delta,
            best_loss: f32::INFINITY,
            counter: 0,
        }
    }

    /// Best monitored loss seen so far.
    pub fn best_loss(&self) -> f32 {
        self.best_loss
    }

    /// Epochs since the last improvement.
    pub fn wait(&self) -> usize {
        self.counter
    }
}

impl Callback for EarlyStoppingCallback {
    fn before_fit(&mut self, _ctx: &mut CallbackContext) -> Result<()> {
        self.best_loss = f32::INFINITY;
        self.counter = 0;
        Ok(())
    }

    fn after_epoch(&mut self, ctx: &mut CallbackContext) -> Result<()> {
        let current = ctx.monitored_loss().unwrap_or(f32::INFINITY);

        if current < self.best_loss - self.min_delta {
            self.best_loss = current;
            self.counter = 0;
        } else {
            self.counter += 1;
            if self.counter >= self.patience {
                tracing::info!(
                    "Early stopping triggered after {} epochs without improvement",
                    self.patience
                );
                ctx.stop_training = true;
            }
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "EarlyStoppingCallback"
    }
}

/// Stops training as soon as a batch loss is NaN or infinite.
#[derive(Debug, Default)]
pub struct TerminateOnNanCallback {
    nan_count: usize,
}

impl TerminateOnNanCallback {
    /// Create a new terminate on NaN callback.
    pub fn new() -> Self {
        Self { nan_count: 0 }
    }

    /// Number of non-finite losses seen.
    pub fn nan_count(&self) -> usize {
        self.nan_count
    }
}

impl Callback for TerminateOnNanCallback {
    fn after_batch(&mut self, ctx: &mut CallbackContext) -> Result<()> {
        if let Some(loss) = ctx.train_loss {
            if !loss.is_finite() {
                self.nan_count += 1;
                tracing::error!(
                    "NaN/Inf detected in training loss at epoch {} batch {}",
                    ctx.epoch + 1,
                    ctx.batch
                );
                ctx.stop_training = true;
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "TerminateOnNanCallback"
    }
}

/// Callback for displaying ASCII loss curves in the terminal.
#[derive(Debug)]
pub struct ShowGraphCallback {
    train_losses: Vec<f32>,
    valid_losses: Vec<f32>,
    width: usize,
    height: usize,
    show_per_epoch: bool,
}

impl Default for ShowGraphCallback {
    fn default() -> Self {
        Self {
            train_losses: Vec::new(),
            valid_losses: Vec::new(),
            width: 50,
            height: 10,
            show_per_epoch: false,
        }
    }
}

impl ShowGraphCallback {
    /// Create a new show graph callback that draws once training ends.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the graph width in characters.
    #[must_use]
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width.max(20);
        self
    }

    /// Set the graph height in characters.
    #[must_use]
    pub fn with_height(mut self, height: usize) -> Self {
        self.height = height.max(5);
        self
    }

    /// Set whether to show the graph after each epoch.
    #[must_use]
    pub fn show_per_epoch(mut self, show: bool) -> Self {
        self.show_per_epoch = show;
        self
    }

    /// Render the recorded loss curves.
    pub fn render(&self) -> String {
        let mut series = vec![Series {
            label: "train",
            values: &self.train_losses,
            offset: 0,
            glyph: '█',
        }];
        if !self.valid_losses.is_empty() {
            series.push(Series {
                label: "valid",
                values: &self.valid_losses,
                offset: 0,
                glyph: '▒',
            });
        }
        let mut output = render_chart("Loss", &series, self.width, self.height);
        output.push_str(&format!("        Epochs: 1 → {}\n", self.train_losses.len()));
        output
    }
}

impl Callback for ShowGraphCallback {
    fn before_fit(&mut self, _ctx: &mut CallbackContext) -> Result<()> {
        self.train_losses.clear();
        self.valid_losses.clear();
        Ok(())
    }

    fn after_epoch(&mut self, ctx: &mut CallbackContext) -> Result<()> {
        if let Some(loss) = ctx.train_loss {
            self.train_losses.push(loss);
        }
        if let Some(loss) = ctx.valid_loss {
            self.valid_losses.push(loss);
        }
        if self.show_per_epoch {
            print!("{}", self.render());
        }
        Ok(())
    }

    fn after_fit(&mut self, _ctx: &mut CallbackContext) -> Result<()> {
        if !self.show_per_epoch && !self.train_losses.is_empty() {
            print!("{}", self.render());
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "ShowGraphCallback"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_context() {
        let mut ctx = CallbackContext::new(10, 100);
        assert_eq!(ctx.epoch, 0);
        assert_eq!(ctx.n_epochs, 10);
        assert_eq!(ctx.progress(), 0.0);
        assert_eq!(ctx.monitored_loss(), None);

        ctx.train_loss = Some(0.5);
        assert_eq!(ctx.monitored_loss(), Some(0.5));
        ctx.valid_loss = Some(0.7);
        assert_eq!(ctx.monitored_loss(), Some(0.7));
    }

    #[test]
    fn test_callback_list() {
        let mut list = CallbackList::new();
        assert!(list.is_empty());
        list.add(ProgressCallback::new(false));
        list.add(TerminateOnNanCallback::new());
        assert_eq!(list.len(), 2);
        assert_eq!(list.names(), vec!["ProgressCallback", "TerminateOnNanCallback"]);

        let mut user = CallbackList::new();
        user.add(ShowGraphCallback::new());
        list.append(&mut user);
        assert!(user.is_empty());
        assert_eq!(list.len(), 3);
        let tail = list.split_off(2);
        assert_eq!(tail.names(), vec!["ShowGraphCallback"]);

        let mut ctx = CallbackContext::new(1, 1);
        list.before_fit(&mut ctx).unwrap();
        list.after_epoch(&mut ctx).unwrap();
        list.after_fit(&mut ctx).unwrap();
    }

    #[test]
    fn test_early_stopping_patience() {
        let mut cb = EarlyStoppingCallback::new(2, 0.0);
        let mut ctx = CallbackContext::new(10, 1);

        for loss in [1.0, 0.8, 0.9] {
            ctx.valid_loss = Some(loss);
            cb.after_epoch(&mut ctx).unwrap();
            assert!(!ctx.stop_training);
        }
        assert_eq!(cb.best_loss(), 0.8);

        ctx.valid_loss = Some(0.85);
        cb.after_epoch(&mut ctx).unwrap();
        assert!(ctx.stop_training);
        assert_eq!(cb.wait(), 2);
    }

    #[test]
    fn test_early_stopping_min_delta() {
        let mut cb = EarlyStoppingCallback::new(1, 0.1);
        let mut ctx = CallbackContext::new(10, 1);
        ctx.train_loss = Some(1.0);
        cb.after_epoch(&mut ctx).unwrap();
        // Improvement smaller than min_delta does not count.
        ctx.train_loss = Some(0.95);
        cb.after_epoch(&mut ctx).unwrap();
        assert!(ctx.stop_training);
    }

    #[test]
    fn test_terminate_on_nan() {
        let mut cb = TerminateOnNanCallback::new();
        let mut ctx = CallbackContext::new(1, 10);

        ctx.train_loss = Some(0.3);
        cb.after_batch(&mut ctx).unwrap();
        assert!(!ctx.stop_training);

        ctx.train_loss = Some(f32::INFINITY);
        cb.after_batch(&mut ctx).unwrap();
        assert!(ctx.stop_training);
        assert_eq!(cb.nan_count(), 1);
    }

    #[test]
    fn test_show_graph_callback_render() {
        let mut callback = ShowGraphCallback::new().with_width(30).with_height(5);
        assert_eq!(callback.width, 30);
        assert_eq!(callback.height, 5);

        let mut ctx = CallbackContext::new(10, 100);
        for i in 0..5 {
            ctx.train_loss = Some(1.0 - i as f32 * 0.1);
            ctx.valid_loss = Some(0.9 - i as f32 * 0.08);
            callback.after_epoch(&mut ctx).unwrap();
        }

        assert_eq!(callback.train_losses.len(), 5);
        let chart = callback.render();
        assert!(chart.contains("Epochs: 1 → 5"));
        assert!(chart.contains('█'));
    }
}
