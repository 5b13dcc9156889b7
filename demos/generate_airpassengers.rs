//! Example: auto-regressive forecasting beyond the model horizon
//!
//! Trains DLinear on the air passengers series with a 12 month horizon, then
//! feeds its own forecasts back to extend the last window by three years.
//!
//! Run with: cargo run --example generate_airpassengers

use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;
use ndarray::s;
use tfts::prelude::*;

type TrainBackend = Autodiff<NdArray>;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("warn").init();

    let train_length = 36;
    let horizon = 12;
    let steps = 36;

    println!("=== Air Passengers Generation ===\n");

    let (train, _) = get_data("airpassengers", train_length, horizon, 0.0)?.into_pair();
    println!("Windows: {} of {} months\n", train.len(), train_length);

    let mut trainer = Trainer::<TrainBackend>::new(AutoModel::for_model("dlinear", horizon)?, Default::default());
    let config = TrainerConfig::new()
        .with_epochs(200)
        .with_batch_size(16)
        .with_learning_rate(1e-2)
        .with_early_stopping(20, 1e-6);
    let history = trainer.train(&train, None, &config)?;
    println!(
        "Trained {} epochs, final loss {:.5}\n",
        history.epochs_run(),
        history.final_train_loss().unwrap_or(f32::NAN)
    );

    // The last window of history, as one batch.
    let last = train.len() - 1;
    let history_window = train.x().slice(s![last..last + 1, .., ..]).to_owned();
    let generated = generate(&trainer, &history_window, GenerationConfig::new(steps), None)?;

    println!("Generated {} months (scaled):", steps);
    for (month, value) in generated.iter().enumerate() {
        println!("  +{:>2}: {:.4}", month + 1, value);
    }

    let empty = ndarray::Array3::<f32>::zeros((1, 0, 1));
    println!("\n{}", trainer.plot(&history_window, &empty, &generated));

    Ok(())
}
