//! # tfts
//!
//! Deep learning time series forecasting in Rust, built on Burn.
//!
//! tfts-rs bundles a model zoo of encoder-decoder forecasters behind a
//! name-keyed factory and a small trainer:
//!
//! - **Data**: sliding windows, chronological splits, built-in datasets, NPY/NPZ readers
//! - **Models**: RNN, Seq2seq, WaveNet, TCN, Transformer, BERT, Informer, N-BEATS, DLinear
//! - **Configuration**: [`AutoConfig`](prelude::AutoConfig) and [`AutoModel`](prelude::AutoModel), JSON round-trippable
//! - **Training**: [`Trainer`](prelude::Trainer) with callbacks, schedulers, checkpoints
//!   and auto-regressive [`generate`](prelude::generate)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tfts::prelude::*;
//!
//! let (train, valid) = get_data("sine", 24, 12, 0.2)?.into_pair();
//!
//! let auto = AutoModel::for_model("seq2seq", 12)?;
//! let mut trainer = Trainer::<Autodiff<NdArray>>::new(auto, Default::default());
//! trainer.train(&train, valid.as_ref(), &TrainerConfig::default().with_epochs(20))?;
//!
//! let preds = trainer.predict(&train)?; // (N, 12, 1)
//! ```
//!
//! ## Feature Flags
//!
//! - `backend-ndarray` (default): CPU backend using ndarray
//! - `backend-wgpu`: GPU backend using WGPU
//! - `backend-tch`: PyTorch backend via tch-rs

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

// Re-export all crates
pub use tfts_core as core;
pub use tfts_data as data;
pub use tfts_models as models;
pub use tfts_train as train;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use tfts::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use tfts_core::{ForecastBatch, ForecastShape, InputSpec, ModelInputs, Seed, TSForecastingModel};

    // Data
    pub use tfts_data::{
        get_data, read_npy, read_npz, sliding_windows, train_test_split, train_test_split_sequential,
        DataSplit, ForecastDataLoader, ForecastDataLoaders, ForecastDataset,
    };

    // Models
    pub use tfts_models::{AutoConfig, AutoForecaster, AutoModel, ModelConfig, SUPPORTED_MODELS};

    // Training
    pub use tfts_train::{
        generate, Callback, GenerationConfig, LossKind, OptimizerKind, SchedulerKind, Trainer,
        TrainerConfig, TrainingHistory,
    };

    #[cfg(feature = "backend-ndarray")]
    pub use tfts_core::backend::NdArray;
}

/// All module for importing everything.
pub mod all {
    pub use super::prelude::*;

    pub use tfts_core::backend;
    pub use tfts_models::{
        BertConfig, CheckpointMetadata, DLinearConfig, InformerConfig, NBeatsConfig, RnnConfig,
        RnnType, Seq2seqConfig, StackType, TcnConfig, TransformerConfig, WaveNetConfig,
    };
    pub use tfts_train::{
        CallbackContext, CallbackList, EarlyStoppingCallback, ProgressCallback, ShowGraphCallback,
        TerminateOnNanCallback,
    };
}
