//! Forecasting architectures.
//!
//! Each model has a serde config with defaults, a `validate` step that checks
//! hyperparameters against the input widths, and an `init` that builds the
//! Burn module.

mod bert;
mod dlinear;
mod informer;
mod nbeats;
mod rnn;
mod seq2seq;
mod tcn;
mod transformer;
mod wavenet;

pub use bert::{Bert, BertConfig};
pub use dlinear::{DLinear, DLinearConfig};
pub use informer::{Informer, InformerConfig};
pub use nbeats::{NBeats, NBeatsConfig, StackType};
pub use rnn::{Rnn, RnnConfig};
pub use seq2seq::{Seq2seq, Seq2seqConfig};
pub use tcn::{Tcn, TcnConfig};
pub use transformer::{Transformer, TransformerConfig};
pub use wavenet::{WaveNet, WaveNetConfig};

pub use crate::layers::RnnType;

use burn::prelude::*;
use burn::tensor::{Distribution, ElementConversion};

use crate::error::{ModelError, Result};

/// Add the optional residual paths shared by the dense-head models.
///
/// `circle` adds the last `H` history values of the target, `mean` adds the
/// history mean of the target.
pub(crate) fn skip_connections<B: Backend>(
    outputs: Tensor<B, 3>,
    x: &Tensor<B, 3>,
    circle: bool,
    mean: bool,
) -> Tensor<B, 3> {
    let [batch, horizon, _] = outputs.dims();
    let train_length = x.dims()[1];
    let target = x.clone().slice([0..batch, 0..train_length, 0..1]);

    let mut outputs = outputs;
    if circle {
        outputs = outputs + target.clone().slice([0..batch, train_length - horizon..train_length, 0..1]);
    }
    if mean {
        outputs = outputs + target.mean_dim(1);
    }
    outputs
}

/// Check that `num_heads` divides `hidden_size`.
pub(crate) fn check_heads(model: &str, hidden_size: usize, num_heads: usize) -> Result<()> {
    if num_heads == 0 || hidden_size % num_heads != 0 {
        return Err(ModelError::invalid(
            model,
            format!(
                "hidden_size {} is not a multiple of the number of attention heads {}",
                hidden_size, num_heads
            ),
        ));
    }
    Ok(())
}

/// Check that a width or count is positive.
pub(crate) fn check_positive(model: &str, name: &str, value: usize) -> Result<()> {
    if value == 0 {
        return Err(ModelError::invalid(model, format!("{name} must be > 0")));
    }
    Ok(())
}

/// Check that a probability lies in `[0, 1]`.
pub(crate) fn check_probability(model: &str, name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ModelError::invalid(model, format!("{name} must be in [0, 1], got {value}")));
    }
    Ok(())
}

/// Decide whether an auto-regressive step feeds the ground truth back.
///
/// `scheduled_sampling = 0` always uses the teacher, `1` never does. Draws
/// come from the backend RNG, so `Backend::seed` makes them reproducible.
pub(crate) fn use_teacher<B: Backend>(scheduled_sampling: f64, device: &B::Device) -> bool {
    if scheduled_sampling <= 0.0 {
        return true;
    }
    if scheduled_sampling >= 1.0 {
        return false;
    }
    let draw = Tensor::<B, 1>::random([1], Distribution::Uniform(0.0, 1.0), device)
        .into_scalar()
        .elem::<f64>();
    draw >= scheduled_sampling
}

/// Last time step of the target column `x[:, -1:, 0:1]` as `(B, 1)`.
pub(crate) fn last_target<B: Backend>(x: &Tensor<B, 3>) -> Tensor<B, 2> {
    let [batch, train_length, _] = x.dims();
    x.clone()
        .slice([0..batch, train_length - 1..train_length, 0..1])
        .reshape([batch, 1])
}

/// Time step `t` of `(B, L, F)` as `(B, F)`.
pub(crate) fn time_step<B: Backend>(x: &Tensor<B, 3>, t: usize) -> Tensor<B, 2> {
    let [batch, _, features] = x.dims();
    x.clone().slice([0..batch, t..t + 1, 0..features]).reshape([batch, features])
}

/// Decoder input for teacher forcing: `[x_last, y_0, ..., y_{H-2}]` as `(B, H, 1)`.
pub(crate) fn shifted_targets<B: Backend>(x: &Tensor<B, 3>, teacher: Tensor<B, 3>) -> Tensor<B, 3> {
    let [batch, horizon, _] = teacher.dims();
    let start = last_target(x).unsqueeze_dim::<3>(2);
    if horizon <= 1 {
        return start;
    }
    Tensor::cat(vec![start, teacher.slice([0..batch, 0..horizon - 1, 0..1])], 1)
}

/// First `len` steps of `(B, L, F)`.
pub(crate) fn prefix<B: Backend>(x: &Tensor<B, 3>, len: usize) -> Tensor<B, 3> {
    let [batch, _, features] = x.dims();
    x.clone().slice([0..batch, 0..len, 0..features])
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    #[test]
    fn test_skip_connections() {
        let device = Default::default();
        let x = Tensor::<NdArray, 1>::from_floats([1.0, 2.0, 3.0, 4.0], &device).reshape([1, 4, 1]);
        let zeros = Tensor::<NdArray, 3>::zeros([1, 2, 1], &device);

        let circle: Vec<f32> = skip_connections(zeros.clone(), &x, true, false)
            .into_data()
            .to_vec()
            .unwrap();
        assert_eq!(circle, vec![3.0, 4.0]);

        let mean: Vec<f32> = skip_connections(zeros, &x, false, true)
            .into_data()
            .to_vec()
            .unwrap();
        assert_eq!(mean, vec![2.5, 2.5]);
    }

    #[test]
    fn test_shifted_targets() {
        let device = Default::default();
        let x = Tensor::<NdArray, 1>::from_floats([1.0, 2.0, 3.0], &device).reshape([1, 3, 1]);
        let y = Tensor::<NdArray, 1>::from_floats([4.0, 5.0, 6.0], &device).reshape([1, 3, 1]);
        let shifted: Vec<f32> = shifted_targets(&x, y).into_data().to_vec().unwrap();
        assert_eq!(shifted, vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_checks() {
        assert!(check_heads("bert", 64, 4).is_ok());
        assert!(check_heads("bert", 64, 3).is_err());
        assert!(check_heads("bert", 64, 0).is_err());
        assert!(check_positive("tcn", "filters", 0).is_err());
        assert!(check_probability("wavenet", "scheduled_sampling", 1.5).is_err());
    }

    #[test]
    fn test_use_teacher_extremes() {
        let device = Default::default();
        assert!((0..100).all(|_| use_teacher::<NdArray>(0.0, &device)));
        assert!((0..100).all(|_| !use_teacher::<NdArray>(1.0, &device)));
    }
}
