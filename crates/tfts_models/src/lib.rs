//! # tfts_models
//!
//! Forecasting model zoo for tfts-rs.
//!
//! ## Models
//!
//! | name          | family                                             |
//! |---------------|----------------------------------------------------|
//! | `rnn`         | GRU/LSTM encoder with a dense forecast head        |
//! | `seq2seq`     | recurrent encoder-decoder with optional attention  |
//! | `wavenet`     | gated causal dilated convolutions                  |
//! | `tcn`         | temporal convolutional network                     |
//! | `transformer` | auto-regressive encoder-decoder transformer        |
//! | `bert`        | encoder-only transformer                           |
//! | `informer`    | transformer with ProbSparse attention and distilling |
//! | `nbeats`      | stacked fully-connected basis expansion            |
//! | `dlinear`     | trend/seasonal decomposition with linear maps      |
//!
//! Every model maps history of shape `(B, T, F)` to forecasts of shape
//! `(B, H, 1)`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use tfts_models::{AutoConfig, AutoModel};
//! use tfts_core::InputSpec;
//!
//! let config = AutoConfig::for_model("rnn")?;
//! let auto = AutoModel::from_config(config, 12);
//! let model = auto.build::<NdArray>(InputSpec::univariate(24, 1), &device)?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod auto;
pub mod checkpoint;
pub mod config;
mod error;
pub mod layers;
pub mod models;

pub use auto::{AutoForecaster, AutoModel};
pub use checkpoint::{load_forecaster, load_record, save_forecaster, save_model, CheckpointMetadata};
pub use config::{AutoConfig, ModelConfig, SUPPORTED_MODELS};
pub use error::{ModelError, Result};
pub use models::{
    Bert, BertConfig, DLinear, DLinearConfig, Informer, InformerConfig, NBeats, NBeatsConfig,
    Rnn, RnnConfig, RnnType, Seq2seq, Seq2seqConfig, StackType, Tcn, TcnConfig, Transformer,
    TransformerConfig, WaveNet, WaveNetConfig,
};
