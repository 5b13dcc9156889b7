//! tfts-rs CLI for listing models, writing configs and training forecasters.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;
use tfts_core::Seed;
use tfts_data::{get_data_seeded, read_npz, train_test_split_sequential, ForecastDataset, AVAILABLE_DATASETS};
use tfts_models::{AutoConfig, AutoModel, ModelConfig, SUPPORTED_MODELS};
use tfts_train::{Trainer, TrainerConfig};

/// Backend type for training.
type TrainBackend = Autodiff<NdArray>;

#[derive(Parser)]
#[command(name = "tfts")]
#[command(author, version)]
#[command(about = "Deep learning time series forecasting - train models on built-in or NPZ data")]
#[command(long_about = "tfts-rs: encoder-decoder time series forecasting on Burn.

EXAMPLES:
  # List available models
  tfts models

  # Print the default config of a model, or save it for editing
  tfts config seq2seq
  tfts config seq2seq --output seq2seq.json

  # Train an RNN on the sine dataset and plot a forecast
  tfts train --model rnn --data sine --epochs 100 --plot

  # Train with an edited config and keep the checkpoint
  tfts train --model seq2seq --config seq2seq.json --output ./runs/seq2seq")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List supported model names
    Models,
    /// Print or save the default config of a model
    Config {
        /// Model name (see `tfts models`)
        model: String,

        /// Write the JSON config to this file instead of stdout
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Train a model and report validation metrics
    Train(TrainArgs),
}

#[derive(clap::Args)]
struct TrainArgs {
    /// Model name (see `tfts models`)
    #[arg(long, default_value = "rnn", value_name = "MODEL")]
    model: String,

    /// Built-in dataset (sine, airpassengers) or path to an .npz file
    #[arg(long, default_value = "sine", value_name = "DATA")]
    data: String,

    /// History length fed to the model
    #[arg(long, default_value = "24", value_name = "T")]
    train_length: usize,

    /// Number of future steps to forecast
    #[arg(long, default_value = "12", value_name = "H")]
    predict_sequence_length: usize,

    /// Fraction of the latest samples held out for validation
    #[arg(long, default_value = "0.2", value_name = "FRACTION")]
    test_size: f32,

    /// Number of training epochs
    #[arg(long, default_value = "100", value_name = "N")]
    epochs: usize,

    /// Batch size for training
    #[arg(long, default_value = "16", value_name = "SIZE")]
    batch_size: usize,

    /// Learning rate
    #[arg(long, default_value = "5e-4", value_name = "LR")]
    learning_rate: f64,

    /// Early stopping patience in epochs (0 disables)
    #[arg(long, default_value = "10", value_name = "N")]
    patience: usize,

    /// Random seed for reproducibility
    #[arg(long, default_value = "315", value_name = "SEED")]
    seed: u64,

    /// Model config JSON (as written by `tfts config`)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Trainer config JSON; command line flags override epochs, batch size, learning rate and seed
    #[arg(long, value_name = "FILE")]
    trainer_config: Option<PathBuf>,

    /// Directory for the checkpoint of the trained model
    #[arg(long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Print an ASCII plot of the first validation forecast
    #[arg(long, default_value = "false")]
    plot: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging; RUST_LOG takes precedence over -v
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Models => handle_models(),
        Commands::Config { model, output } => handle_config(&model, output),
        Commands::Train(args) => handle_train(args),
    }
}

fn handle_models() -> Result<()> {
    println!("Available models:\n");
    for name in SUPPORTED_MODELS {
        println!("  {name}");
    }
    println!("\nAvailable datasets: {}", AVAILABLE_DATASETS.join(", "));
    Ok(())
}

fn handle_config(model: &str, output: Option<PathBuf>) -> Result<()> {
    let config = AutoConfig::for_model(model)?;
    match output {
        Some(path) => {
            config
                .save(&path)
                .with_context(|| format!("Failed to write config to {}", path.display()))?;
            println!("Wrote {} config to {}", config.name(), path.display());
        }
        None => println!("{}", config.to_json()?),
    }
    Ok(())
}

fn load_data(args: &TrainArgs) -> Result<(ForecastDataset, Option<ForecastDataset>)> {
    if args.data.ends_with(".npz") {
        let dataset = read_npz(&args.data).with_context(|| format!("Failed to read '{}'", args.data))?;
        if args.test_size == 0.0 {
            return Ok((dataset, None));
        }
        let (train, valid) = train_test_split_sequential(&dataset, args.test_size)?;
        return Ok((train, Some(valid)));
    }

    let split = get_data_seeded(
        &args.data,
        args.train_length,
        args.predict_sequence_length,
        args.test_size,
        Seed::new(args.seed),
    )
    .with_context(|| format!("Failed to load dataset '{}'", args.data))?;
    Ok(split.into_pair())
}

fn handle_train(args: TrainArgs) -> Result<()> {
    println!("=== tfts-rs Training ===\n");

    let model_config = match &args.config {
        Some(path) => ModelConfig::load(path)
            .with_context(|| format!("Failed to read model config {}", path.display()))?,
        None => AutoConfig::for_model(&args.model)?,
    };
    if args.config.is_some() && !model_config.name().eq_ignore_ascii_case(&args.model) {
        tracing::warn!(
            "--model {} ignored, config file describes {}",
            args.model,
            model_config.name()
        );
    }

    let (train, valid) = load_data(&args)?;
    let horizon = match train.predict_sequence_length() {
        Some(h) => h,
        None => bail!("Training data has no targets"),
    };

    let mut trainer_config = match &args.trainer_config {
        Some(path) => TrainerConfig::load(path)
            .with_context(|| format!("Failed to read trainer config {}", path.display()))?,
        None => TrainerConfig::default().with_early_stopping(args.patience, 0.0),
    };
    trainer_config = trainer_config
        .with_epochs(args.epochs)
        .with_batch_size(args.batch_size)
        .with_learning_rate(args.learning_rate)
        .with_seed(args.seed);

    println!("Configuration:");
    println!("  Model: {}", model_config.name());
    println!("  Data: {}", args.data);
    println!("  Train samples: {}", train.len());
    println!("  Valid samples: {}", valid.as_ref().map_or(0, ForecastDataset::len));
    println!("  History length: {}", train.train_length());
    println!("  Horizon: {}", horizon);
    println!("  Epochs: {}", trainer_config.epochs);
    println!("  Batch size: {}", trainer_config.batch_size);
    println!("  Learning rate: {}", trainer_config.learning_rate);
    println!("  Seed: {}\n", trainer_config.seed);

    let auto = AutoModel::from_config(model_config, horizon);
    let mut trainer = Trainer::<TrainBackend>::new(auto, Default::default());

    println!("Starting training...\n");
    let history = trainer
        .train(&train, valid.as_ref(), &trainer_config)
        .context("Training failed")?;

    println!("\nTraining complete in {:.1}s", history.training_time_secs);
    println!("  Epochs run: {}", history.epochs_run());
    if let (Some(epoch), Some(loss)) = (history.best_epoch, history.best_loss) {
        println!("  Best loss: {:.6} at epoch {}", loss, epoch + 1);
    }
    if history.stopped_early {
        println!("  Stopped early");
    }

    let eval_set = valid.as_ref().unwrap_or(&train);
    let scores = trainer.evaluate(eval_set).context("Evaluation failed")?;
    let mut names: Vec<_> = scores.keys().cloned().collect();
    names.sort();
    println!("\nMetrics ({}):", if valid.is_some() { "valid" } else { "train" });
    for name in names {
        println!("  {:<6} {:.6}", name, scores[&name]);
    }

    if args.plot {
        let preds = trainer.predict(eval_set)?;
        if let Some(truth) = eval_set.y() {
            println!("\n{}", trainer.plot(eval_set.x(), truth, &preds));
        }
    }

    if let Some(dir) = &args.output {
        trainer
            .save(dir)
            .with_context(|| format!("Failed to save checkpoint to {}", dir.display()))?;
        std::fs::write(dir.join("trainer.json"), serde_json::to_string_pretty(&trainer_config)?)?;
        println!("\nCheckpoint saved to {}", dir.display());
    }

    Ok(())
}
