//! Serializable model configurations keyed by model name.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ModelError, Result};
use crate::models::{
    BertConfig, DLinearConfig, InformerConfig, NBeatsConfig, RnnConfig, Seq2seqConfig, TcnConfig,
    TransformerConfig, WaveNetConfig,
};
use tfts_core::InputSpec;

/// Names accepted by [`AutoConfig::for_model`].
pub const SUPPORTED_MODELS: &[&str] = &[
    "rnn",
    "seq2seq",
    "wavenet",
    "tcn",
    "transformer",
    "bert",
    "informer",
    "nbeats",
    "dlinear",
];

/// Hyperparameters of one architecture.
///
/// Serialized as a flat JSON object whose `model_type` field names the
/// architecture, e.g. `{"model_type": "rnn", "rnn_hidden_size": 64, ...}`.
/// Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model_type")]
pub enum ModelConfig {
    /// Recurrent encoder with dense head.
    #[serde(rename = "rnn")]
    Rnn(RnnConfig),
    /// Recurrent encoder-decoder.
    #[serde(rename = "seq2seq")]
    Seq2seq(Seq2seqConfig),
    /// Gated dilated convolutions.
    #[serde(rename = "wavenet")]
    WaveNet(WaveNetConfig),
    /// Temporal convolutional network.
    #[serde(rename = "tcn")]
    Tcn(TcnConfig),
    /// Encoder-decoder transformer.
    #[serde(rename = "transformer")]
    Transformer(TransformerConfig),
    /// Encoder-only transformer.
    #[serde(rename = "bert")]
    Bert(BertConfig),
    /// Informer.
    #[serde(rename = "informer")]
    Informer(InformerConfig),
    /// N-BEATS.
    #[serde(rename = "nbeats")]
    NBeats(NBeatsConfig),
    /// DLinear.
    #[serde(rename = "dlinear")]
    DLinear(DLinearConfig),
}

impl ModelConfig {
    /// Model name as used by [`AutoConfig`].
    pub fn name(&self) -> &'static str {
        match self {
            Self::Rnn(_) => "rnn",
            Self::Seq2seq(_) => "seq2seq",
            Self::WaveNet(_) => "wavenet",
            Self::Tcn(_) => "tcn",
            Self::Transformer(_) => "transformer",
            Self::Bert(_) => "bert",
            Self::Informer(_) => "informer",
            Self::NBeats(_) => "nbeats",
            Self::DLinear(_) => "dlinear",
        }
    }

    /// Check the hyperparameters against the input widths and horizon.
    pub fn validate(&self, spec: &InputSpec, predict_sequence_length: usize) -> Result<()> {
        match self {
            Self::Rnn(c) => c.validate(spec, predict_sequence_length),
            Self::Seq2seq(c) => c.validate(spec, predict_sequence_length),
            Self::WaveNet(c) => c.validate(spec, predict_sequence_length),
            Self::Tcn(c) => c.validate(spec, predict_sequence_length),
            Self::Transformer(c) => c.validate(spec, predict_sequence_length),
            Self::Bert(c) => c.validate(spec, predict_sequence_length),
            Self::Informer(c) => c.validate(spec, predict_sequence_length),
            Self::NBeats(c) => c.validate(spec, predict_sequence_length),
            Self::DLinear(c) => c.validate(spec, predict_sequence_length),
        }
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Write the JSON form to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Read a config written by [`ModelConfig::save`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Overwrite fields from a JSON object.
    ///
    /// Keys that the architecture does not have are rejected, as is an
    /// attempt to change `model_type`.
    pub fn update(&mut self, overrides: &Value) -> Result<()> {
        let Value::Object(overrides) = overrides else {
            return Err(ModelError::invalid(self.name(), "overrides must be a JSON object"));
        };

        let mut current = serde_json::to_value(&*self)?;
        let Some(fields) = current.as_object_mut() else {
            return Err(ModelError::invalid(self.name(), "config did not serialize to an object"));
        };

        for (key, value) in overrides {
            if key == "model_type" {
                if value.as_str() != Some(self.name()) {
                    return Err(ModelError::invalid(self.name(), "model_type cannot be overridden"));
                }
                continue;
            }
            match fields.get_mut(key) {
                Some(slot) => *slot = value.clone(),
                None => {
                    return Err(ModelError::invalid(self.name(), format!("unknown parameter '{key}'")));
                }
            }
        }

        *self = serde_json::from_value(current)?;
        Ok(())
    }
}

/// Default configurations looked up by model name.
pub struct AutoConfig;

impl AutoConfig {
    /// Default hyperparameters for `name` (case-insensitive).
    ///
    /// # Errors
    ///
    /// [`ModelError::UnknownModel`] listing the supported names.
    pub fn for_model(name: &str) -> Result<ModelConfig> {
        let config = match name.to_lowercase().as_str() {
            "rnn" => ModelConfig::Rnn(RnnConfig::default()),
            "seq2seq" => ModelConfig::Seq2seq(Seq2seqConfig::default()),
            "wavenet" => ModelConfig::WaveNet(WaveNetConfig::default()),
            "tcn" => ModelConfig::Tcn(TcnConfig::default()),
            "transformer" => ModelConfig::Transformer(TransformerConfig::default()),
            "bert" => ModelConfig::Bert(BertConfig::default()),
            "informer" => ModelConfig::Informer(InformerConfig::default()),
            "nbeats" => ModelConfig::NBeats(NBeatsConfig::default()),
            "dlinear" => ModelConfig::DLinear(DLinearConfig::default()),
            _ => {
                return Err(ModelError::UnknownModel {
                    name: name.to_string(),
                    supported: SUPPORTED_MODELS.join(", "),
                })
            }
        };
        Ok(config)
    }

    /// Defaults for `name` with `overrides` applied.
    pub fn for_model_with(name: &str, overrides: &Value) -> Result<ModelConfig> {
        let mut config = Self::for_model(name)?;
        config.update(overrides)?;
        Ok(config)
    }

    /// All supported model names.
    pub fn supported_models() -> &'static [&'static str] {
        SUPPORTED_MODELS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::RnnType;
    use serde_json::json;

    #[test]
    fn test_every_supported_model_has_defaults() {
        for name in AutoConfig::supported_models() {
            let config = AutoConfig::for_model(name).unwrap();
            assert_eq!(config.name(), *name);
        }
    }

    #[test]
    fn test_unknown_model() {
        match AutoConfig::for_model("autoformer-xl") {
            Err(ModelError::UnknownModel { name, supported }) => {
                assert_eq!(name, "autoformer-xl");
                assert!(supported.contains("informer"));
            }
            other => panic!("expected UnknownModel, got {other:?}"),
        }
    }

    #[test]
    fn test_case_insensitive_lookup() {
        assert_eq!(AutoConfig::for_model("WaveNet").unwrap().name(), "wavenet");
    }

    #[test]
    fn test_json_round_trip() {
        for name in SUPPORTED_MODELS {
            let config = AutoConfig::for_model(name).unwrap();
            let json = config.to_json().unwrap();
            assert!(json.contains(&format!("\"model_type\": \"{name}\"")));
            assert_eq!(ModelConfig::from_json(&json).unwrap(), config);
        }
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = ModelConfig::from_json(r#"{"model_type": "rnn", "rnn_type": "lstm"}"#).unwrap();
        match config {
            ModelConfig::Rnn(c) => {
                assert_eq!(c.rnn_type, RnnType::Lstm);
                assert_eq!(c.rnn_hidden_size, 64);
            }
            other => panic!("expected rnn, got {other:?}"),
        }
    }

    #[test]
    fn test_overrides() {
        let config = AutoConfig::for_model_with("bert", &json!({"hidden_size": 32, "num_attention_heads": 2})).unwrap();
        match config {
            ModelConfig::Bert(c) => {
                assert_eq!(c.hidden_size, 32);
                assert_eq!(c.num_attention_heads, 2);
            }
            other => panic!("expected bert, got {other:?}"),
        }

        assert!(AutoConfig::for_model_with("bert", &json!({"no_such_field": 1})).is_err());
        assert!(AutoConfig::for_model_with("bert", &json!({"model_type": "rnn"})).is_err());
        assert!(AutoConfig::for_model_with("bert", &json!({"hidden_size": "wide"})).is_err());
        assert!(AutoConfig::for_model_with("bert", &json!([1, 2])).is_err());
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("tfts_config_{}.json", std::process::id()));
        let config = AutoConfig::for_model_with("tcn", &json!({"filters": 8})).unwrap();
        config.save(&path).unwrap();
        assert_eq!(ModelConfig::load(&path).unwrap(), config);
        std::fs::remove_file(&path).ok();
    }
}
