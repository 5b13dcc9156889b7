//! Integration tests for the forecasting pipeline.
//!
//! These tests exercise data loading, every model in the zoo, training,
//! checkpoints and generation end to end on the CPU backend.

use burn::tensor::Tensor;
use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;
use ndarray::{s, Array3};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde_json::json;

use tfts::prelude::*;

type TrainBackend = Autodiff<NdArray>;

/// Random history, covariates and targets.
fn create_synthetic_data(n_samples: usize, train_length: usize, horizon: usize) -> ForecastDataset {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let mut random = |shape: (usize, usize, usize)| Array3::from_shape_simple_fn(shape, || rng.gen::<f32>() - 0.5);

    let x = random((n_samples, train_length, 1));
    let y = random((n_samples, horizon, 1));
    let encoder_feature = random((n_samples, train_length, 2));
    let decoder_feature = random((n_samples, horizon, 2));

    ForecastDataset::from_arrays(x, Some(y))
        .and_then(|ds| ds.with_features(Some(encoder_feature), Some(decoder_feature)))
        .expect("Failed to create dataset")
}

/// Small variants so every architecture trains quickly.
fn small(name: &str, horizon: usize) -> AutoModel {
    let overrides = match name {
        "rnn" | "seq2seq" => json!({"rnn_hidden_size": 8, "dense_hidden_size": 8}),
        "wavenet" | "tcn" => json!({"filters": 8, "dense_hidden_size": 8}),
        "transformer" => json!({"hidden_size": 8, "num_attention_heads": 2, "ffn_intermediate_size": 16, "num_layers": 1}),
        "bert" => json!({"hidden_size": 8, "num_attention_heads": 2, "ffn_intermediate_size": 16, "num_layers": 1, "dense_hidden_size": 8}),
        "informer" => json!({"hidden_size": 8, "ffn_intermediate_size": 16}),
        "nbeats" => json!({"hidden_size": 8, "nb_blocks_per_stack": 1}),
        "dlinear" => json!({"moving_avg": 5}),
        _ => json!({}),
    };
    let config = AutoConfig::for_model_with(name, &overrides).expect("Failed to build config");
    AutoModel::from_config(config, horizon)
}

fn quick_config(epochs: usize) -> TrainerConfig {
    TrainerConfig::new()
        .with_epochs(epochs)
        .with_batch_size(8)
        .with_learning_rate(5e-3)
        .with_early_stopping(0, 0.0)
}

#[test]
fn test_every_model_trains_one_epoch() {
    let train = create_synthetic_data(16, 16, 4);
    let valid = create_synthetic_data(8, 16, 4);

    for name in SUPPORTED_MODELS {
        let mut trainer = Trainer::<TrainBackend>::new(small(name, 4), Default::default());
        let history = trainer
            .train(&train, Some(&valid), &quick_config(1))
            .unwrap_or_else(|e| panic!("{name} failed to train: {e}"));

        assert_eq!(history.epochs_run(), 1, "model {name}");
        assert!(history.final_train_loss().is_some_and(f32::is_finite), "model {name}");

        let preds = trainer.predict(&valid).expect("Prediction failed");
        assert_eq!(preds.shape(), &[8, 4, 1], "model {name}");
    }
}

/// Uniform `[0, 1)` arrays for the given shapes.
fn uniform(rng: &mut ChaCha8Rng, shape: (usize, usize, usize)) -> Array3<f32> {
    Array3::from_shape_simple_fn(shape, || rng.gen::<f32>())
}

#[test]
fn test_default_configs_train_on_common_shapes() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let mut array_input = |t: usize, h: usize, features: usize| {
        ForecastDataset::from_arrays(uniform(&mut rng, (2, t, features)), Some(uniform(&mut rng, (2, h, 1))))
            .expect("Failed to create dataset")
    };
    let array_32_9 = array_input(32, 9, 2);
    let array_20_10 = array_input(20, 10, 1);

    let x = uniform(&mut rng, (2, 32, 1));
    let y = uniform(&mut rng, (2, 9, 1));
    let encoder_feature = uniform(&mut rng, (2, 32, 2));
    let decoder_feature = uniform(&mut rng, (2, 9, 3));
    let features_32_9 = ForecastDataset::from_arrays(x, Some(y))
        .and_then(|ds| ds.with_features(Some(encoder_feature), Some(decoder_feature)))
        .expect("Failed to create dataset");

    let config = TrainerConfig::new()
        .with_epochs(1)
        .with_batch_size(2)
        .with_learning_rate(3e-3)
        .with_early_stopping(0, 0.0);

    for (data, horizon) in [(&array_32_9, 9), (&features_32_9, 9), (&array_20_10, 10)] {
        for name in SUPPORTED_MODELS {
            let auto = AutoModel::for_model(name, horizon).expect("Failed to build default config");
            let mut trainer = Trainer::<TrainBackend>::new(auto, Default::default());
            let history = trainer
                .train(data, Some(data), &config)
                .unwrap_or_else(|e| panic!("{name} (T={}, H={horizon}) failed: {e}", data.train_length()));
            assert!(history.final_train_loss().is_some_and(f32::is_finite), "model {name}");

            let preds = trainer.predict(data).expect("Prediction failed");
            assert_eq!(preds.shape(), &[2, horizon, 1], "model {name}");
        }
    }
}

#[test]
fn test_recurrent_models_remember_early_history() {
    let device = Default::default();
    let spec = InputSpec::univariate(8, 1);
    let mut values = vec![1.0f32; 8];
    let same = Tensor::<NdArray, 1>::from_floats(values.as_slice(), &device).reshape([1, 8, 1]);
    values[0] = 9.0;
    let first_changed = Tensor::<NdArray, 1>::from_floats(values.as_slice(), &device).reshape([1, 8, 1]);

    for name in ["rnn", "seq2seq"] {
        let model = AutoModel::for_model(name, 4)
            .and_then(|auto| auto.build::<NdArray>(spec, &device))
            .expect("Failed to build model");
        let a = model.forward(ModelInputs::array(same.clone()), None);
        let b = model.forward(ModelInputs::array(first_changed.clone()), None);
        let diff: f32 = (a - b).abs().sum().into_scalar();
        assert!(diff > 1e-6, "{name} forecast ignores the first history step");
    }
}

#[test]
fn test_transformer_teacher_forcing_is_causal() {
    let device = Default::default();
    let spec = InputSpec::univariate(16, 1);
    let model = AutoModel::for_model("transformer", 4)
        .and_then(|auto| auto.build::<NdArray>(spec, &device))
        .expect("Failed to build model");
    let x = Tensor::<NdArray, 1>::from_floats([0.5f32; 16], &device).reshape([1, 16, 1]);

    let teacher = Tensor::<NdArray, 3>::zeros([1, 4, 1], &device);
    let shifted_first = Tensor::<NdArray, 1>::from_floats([50.0, 0.0, 0.0, 0.0], &device).reshape([1, 4, 1]);
    let a = model.forward(ModelInputs::array(x.clone()), Some(teacher));
    let b = model.forward(ModelInputs::array(x), Some(shifted_first));

    let step0: f32 = (a.slice([0..1, 0..1, 0..1]) - b.slice([0..1, 0..1, 0..1])).abs().into_scalar();
    assert!(step0 < 1e-5, "first forecast step sees its own target");
}

#[test]
fn test_loss_decreases_on_sine() {
    let (train, valid) = get_data("sine", 24, 12, 0.2).expect("Failed to load sine").into_pair();

    let mut trainer = Trainer::<TrainBackend>::new(small("rnn", 12), Default::default());
    let config = quick_config(15).with_batch_size(16).with_seed(315);
    let history = trainer.train(&train, valid.as_ref(), &config).expect("Training failed");

    let first = history.train_losses[0];
    let last = history.final_train_loss().expect("No epochs ran");
    assert!(last < first, "loss did not decrease: {first} -> {last}");
    assert_eq!(history.valid_losses.len(), history.epochs_run());
}

#[test]
fn test_airpassengers_pipeline() {
    let (train, valid) = get_data("airpassengers", 24, 12, 0.2)
        .expect("Failed to load airpassengers")
        .into_pair();
    let valid = valid.expect("Expected a validation split");

    let mut trainer = Trainer::<TrainBackend>::new(small("dlinear", 12), Default::default());
    trainer.train(&train, Some(&valid), &quick_config(2)).expect("Training failed");

    let scores = trainer.evaluate(&valid).expect("Evaluation failed");
    assert!(scores["loss"].is_finite());
    assert!(scores["rmse"] >= 0.0);

    let preds = trainer.predict(&valid).expect("Prediction failed");
    let chart = trainer.plot(valid.x(), valid.y().expect("targets"), &preds);
    assert!(chart.contains("Forecast"));
}

#[test]
fn test_save_load_reproduces_predictions() {
    let dir = std::env::temp_dir().join(format!("tfts_integration_ckpt_{}", std::process::id()));
    let data = create_synthetic_data(8, 16, 4);

    for name in ["seq2seq", "nbeats"] {
        let mut trainer = Trainer::<TrainBackend>::new(small(name, 4), Default::default());
        trainer.train(&data, None, &quick_config(1)).expect("Training failed");
        trainer.save(&dir).expect("Save failed");

        let loaded = Trainer::<TrainBackend>::load(&dir, Default::default()).expect("Load failed");
        let before = trainer.predict(&data).expect("Prediction failed");
        let after = loaded.predict(&data).expect("Prediction failed");
        for (a, b) in before.iter().zip(after.iter()) {
            assert!((a - b).abs() < 1e-5, "model {name}: {a} != {b}");
        }
    }

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_config_json_round_trip_through_trainer() {
    let auto = small("wavenet", 6);
    let json = auto.config.to_json().expect("Serialization failed");
    let restored = ModelConfig::from_json(&json).expect("Deserialization failed");
    assert_eq!(restored, auto.config);

    assert!(AutoModel::for_model("autoformer", 6).is_err());
}

#[test]
fn test_generate_beyond_horizon() {
    let (train, _) = get_data("sine", 24, 6, 0.0).expect("Failed to load sine").into_pair();

    let mut trainer = Trainer::<TrainBackend>::new(small("tcn", 6), Default::default());
    trainer.train(&train, None, &quick_config(1)).expect("Training failed");

    let history = train.x().slice(s![..4, .., ..]).to_owned();
    let out = generate(&trainer, &history, GenerationConfig::new(20), None).expect("Generation failed");
    assert_eq!(out.dim(), (4, 20, 1));
    assert!(out.iter().all(|v| v.is_finite()));
}
