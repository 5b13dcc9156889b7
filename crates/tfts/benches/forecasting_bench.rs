//! Benchmarks for forecasting performance.
//!
//! Run with: cargo bench --bench forecasting_bench

use burn::prelude::*;
use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::Array3;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use tfts::prelude::*;

type TrainBackend = Autodiff<NdArray>;

const TRAIN_LENGTH: usize = 48;
const HORIZON: usize = 12;

/// Create noisy sine windows for benchmarking.
fn create_synthetic_data(n_samples: usize) -> ForecastDataset {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let phases: Vec<f32> = (0..n_samples).map(|_| rng.gen::<f32>() * 6.0).collect();
    let mut noise = ChaCha8Rng::seed_from_u64(7);

    let x = Array3::from_shape_fn((n_samples, TRAIN_LENGTH, 1), |(i, t, _)| {
        (phases[i] + t as f32 * 0.2).sin() + noise.gen::<f32>() * 0.05
    });
    let y = Array3::from_shape_fn((n_samples, HORIZON, 1), |(i, t, _)| {
        (phases[i] + (TRAIN_LENGTH + t) as f32 * 0.2).sin()
    });
    ForecastDataset::from_arrays(x, Some(y)).unwrap()
}

fn bench_model_forward(c: &mut Criterion) {
    let mut group = c.benchmark_group("model_forward");

    let device = <NdArray as Backend>::Device::default();
    let spec = InputSpec::univariate(TRAIN_LENGTH, 1);

    for name in ["rnn", "seq2seq", "tcn", "transformer", "nbeats", "dlinear"] {
        let model = AutoModel::for_model(name, HORIZON)
            .unwrap()
            .build::<NdArray>(spec, &device)
            .unwrap();
        let x: Tensor<NdArray, 3> = Tensor::random(
            [32, TRAIN_LENGTH, 1],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );

        group.bench_with_input(BenchmarkId::new(name, 32), &x, |b, x| {
            b.iter(|| {
                let output = model.forward(ModelInputs::array(black_box(x.clone())), None);
                black_box(output)
            })
        });
    }

    group.finish();
}

fn bench_dataset_iteration(c: &mut Criterion) {
    let mut group = c.benchmark_group("dataset_iteration");

    let device = <NdArray as Backend>::Device::default();

    for n_samples in [100, 500, 1000].iter() {
        let loader = ForecastDataLoader::builder(create_synthetic_data(*n_samples))
            .batch_size(32)
            .shuffle(true)
            .build()
            .unwrap();

        group.bench_with_input(BenchmarkId::new("train_iteration", n_samples), n_samples, |b, _| {
            b.iter(|| {
                let mut count = 0;
                for batch_result in loader.iter::<NdArray>(&device, 0) {
                    let _batch = batch_result.unwrap();
                    count += 1;
                }
                black_box(count)
            })
        });
    }

    group.finish();
}

fn bench_single_training_epoch(c: &mut Criterion) {
    let mut group = c.benchmark_group("training_epoch");
    group.sample_size(10);

    let data = create_synthetic_data(64);
    let config = TrainerConfig::new()
        .with_epochs(1)
        .with_batch_size(16)
        .with_early_stopping(0, 0.0);

    for name in ["rnn", "dlinear"] {
        group.bench_function(name, |b| {
            b.iter(|| {
                let auto = AutoModel::for_model(name, HORIZON).unwrap();
                let mut trainer = Trainer::<TrainBackend>::new(auto, Default::default());
                black_box(trainer.train(&data, None, &config).unwrap())
            })
        });
    }

    group.finish();
}

fn bench_generate(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate");
    group.sample_size(10);

    let data = create_synthetic_data(32);
    let auto = AutoModel::for_model("dlinear", HORIZON).unwrap();
    let mut trainer = Trainer::<TrainBackend>::new(auto, Default::default());
    trainer
        .train(&data, None, &TrainerConfig::new().with_epochs(1).with_early_stopping(0, 0.0))
        .unwrap();

    for steps in [12, 48, 96].iter() {
        group.bench_with_input(BenchmarkId::new("dlinear", steps), steps, |b, &steps| {
            b.iter(|| black_box(generate(&trainer, data.x(), GenerationConfig::new(steps), None).unwrap()))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_model_forward,
    bench_dataset_iteration,
    bench_single_training_epoch,
    bench_generate,
);
criterion_main!(benches);
