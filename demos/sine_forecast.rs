//! Example: forecast a sine wave with any model from the zoo
//!
//! Trains the named model on the built-in sine dataset, prints validation
//! metrics and an ASCII plot of one forecast.
//!
//! Run with: cargo run --example sine_forecast -- seq2seq

use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;
use tfts::prelude::*;

type TrainBackend = Autodiff<NdArray>;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let model_name = std::env::args().nth(1).unwrap_or_else(|| "rnn".to_string());
    let train_length = 24;
    let horizon = 12;

    println!("=== Sine Forecasting with {} ===\n", model_name);

    let (train, valid) = get_data("sine", train_length, horizon, 0.2)?.into_pair();
    let valid = valid.ok_or_else(|| anyhow::anyhow!("sine split returned no validation set"))?;

    println!("Data splits:");
    println!("  Train: {} samples", train.len());
    println!("  Valid: {} samples\n", valid.len());

    let config = AutoConfig::for_model(&model_name)?;
    println!("Model config:\n{}\n", config.to_json()?);

    let mut trainer = Trainer::<TrainBackend>::new(AutoModel::from_config(config, horizon), Default::default());
    let trainer_config = TrainerConfig::new()
        .with_epochs(30)
        .with_batch_size(16)
        .with_learning_rate(5e-3)
        .with_early_stopping(5, 1e-5)
        .with_show_graph(true);

    let history = trainer.train(&train, Some(&valid), &trainer_config)?;
    println!(
        "Trained {} epochs in {:.1}s",
        history.epochs_run(),
        history.training_time_secs
    );

    let mut scores: Vec<_> = trainer.evaluate(&valid)?.into_iter().collect();
    scores.sort_by(|a, b| a.0.cmp(&b.0));
    for (name, value) in scores {
        println!("  {name:<6} {value:.5}");
    }

    let preds = trainer.predict(&valid)?;
    if let Some(truth) = valid.y() {
        println!("\n{}", trainer.plot(valid.x(), truth, &preds));
    }

    Ok(())
}
