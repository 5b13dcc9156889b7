//! Build any supported architecture from its [`ModelConfig`].

use burn::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{AutoConfig, ModelConfig};
use crate::error::{ModelError, Result};
use crate::models::{Bert, DLinear, Informer, NBeats, Rnn, Seq2seq, Tcn, Transformer, WaveNet};
use tfts_core::{InputSpec, ModelInputs, TSForecastingModel};

/// A model description that can be built once the input widths are known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoModel {
    /// Architecture and hyperparameters.
    pub config: ModelConfig,
    /// Forecast horizon `H`.
    pub predict_sequence_length: usize,
}

impl AutoModel {
    /// Wrap an existing config.
    pub fn from_config(config: ModelConfig, predict_sequence_length: usize) -> Self {
        Self {
            config,
            predict_sequence_length,
        }
    }

    /// Default config of the named model.
    pub fn for_model(name: &str, predict_sequence_length: usize) -> Result<Self> {
        Ok(Self::from_config(AutoConfig::for_model(name)?, predict_sequence_length))
    }

    /// Model name.
    pub fn name(&self) -> &'static str {
        self.config.name()
    }

    /// Validate against `spec` and create the Burn module.
    ///
    /// # Errors
    ///
    /// [`ModelError::InvalidConfig`] if the horizon or an input width is zero
    /// or the hyperparameters do not fit the inputs.
    pub fn build<B: Backend>(&self, spec: InputSpec, device: &B::Device) -> Result<AutoForecaster<B>> {
        let name = self.name();
        let horizon = self.predict_sequence_length;
        if horizon == 0 {
            return Err(ModelError::invalid(name, "predict_sequence_length must be > 0"));
        }
        if spec.train_length == 0 || spec.encoder_features == 0 || spec.decoder_features == 0 {
            return Err(ModelError::invalid(name, format!("input widths must be > 0, got {spec:?}")));
        }
        self.config.validate(&spec, horizon)?;

        tracing::debug!(model = name, ?spec, horizon, "Building model");

        let mut model = AutoForecaster::empty(horizon);
        match &self.config {
            ModelConfig::Rnn(c) => model.rnn = Some(c.init(&spec, horizon, device)),
            ModelConfig::Seq2seq(c) => model.seq2seq = Some(c.init(&spec, horizon, device)),
            ModelConfig::WaveNet(c) => model.wavenet = Some(c.init(&spec, horizon, device)),
            ModelConfig::Tcn(c) => model.tcn = Some(c.init(&spec, horizon, device)),
            ModelConfig::Transformer(c) => model.transformer = Some(c.init(&spec, horizon, device)),
            ModelConfig::Bert(c) => model.bert = Some(c.init(&spec, horizon, device)),
            ModelConfig::Informer(c) => model.informer = Some(c.init(&spec, horizon, device)),
            ModelConfig::NBeats(c) => model.nbeats = Some(c.init(&spec, horizon, device)),
            ModelConfig::DLinear(c) => model.dlinear = Some(c.init(&spec, horizon, device)),
        }
        Ok(model)
    }
}

/// Whichever architecture [`AutoModel::build`] created.
///
/// Exactly one field is set.
#[derive(Module, Debug)]
pub struct AutoForecaster<B: Backend> {
    rnn: Option<Rnn<B>>,
    seq2seq: Option<Seq2seq<B>>,
    wavenet: Option<WaveNet<B>>,
    tcn: Option<Tcn<B>>,
    transformer: Option<Transformer<B>>,
    bert: Option<Bert<B>>,
    informer: Option<Informer<B>>,
    nbeats: Option<NBeats<B>>,
    dlinear: Option<DLinear<B>>,
    predict_sequence_length: usize,
}

impl<B: Backend> AutoForecaster<B> {
    fn empty(predict_sequence_length: usize) -> Self {
        Self {
            rnn: None,
            seq2seq: None,
            wavenet: None,
            tcn: None,
            transformer: None,
            bert: None,
            informer: None,
            nbeats: None,
            dlinear: None,
            predict_sequence_length,
        }
    }

    /// Name of the wrapped architecture.
    pub fn name(&self) -> &'static str {
        if self.rnn.is_some() {
            "rnn"
        } else if self.seq2seq.is_some() {
            "seq2seq"
        } else if self.wavenet.is_some() {
            "wavenet"
        } else if self.tcn.is_some() {
            "tcn"
        } else if self.transformer.is_some() {
            "transformer"
        } else if self.bert.is_some() {
            "bert"
        } else if self.informer.is_some() {
            "informer"
        } else if self.nbeats.is_some() {
            "nbeats"
        } else if self.dlinear.is_some() {
            "dlinear"
        } else {
            "empty"
        }
    }
}

impl<B: Backend> TSForecastingModel<B> for AutoForecaster<B> {
    fn forward(&self, inputs: ModelInputs<B>, teacher: Option<Tensor<B, 3>>) -> Tensor<B, 3> {
        if let Some(m) = &self.rnn {
            m.forward(inputs)
        } else if let Some(m) = &self.seq2seq {
            m.forward(inputs, teacher)
        } else if let Some(m) = &self.wavenet {
            m.forward(inputs, teacher)
        } else if let Some(m) = &self.tcn {
            m.forward(inputs)
        } else if let Some(m) = &self.transformer {
            m.forward(inputs, teacher)
        } else if let Some(m) = &self.bert {
            m.forward(inputs)
        } else if let Some(m) = &self.informer {
            m.forward(inputs)
        } else if let Some(m) = &self.nbeats {
            m.forward(inputs)
        } else if let Some(m) = &self.dlinear {
            m.forward(inputs)
        } else {
            let batch = inputs.batch_size();
            Tensor::zeros([batch, self.predict_sequence_length, 1], &inputs.device())
        }
    }

    fn predict_sequence_length(&self) -> usize {
        self.predict_sequence_length
    }
}
