//! Regression losses for forecasts.

use burn::nn::loss::{MseLoss, Reduction};
use burn::prelude::*;
use serde::{Deserialize, Serialize};

/// Loss applied to `(B, H, 1)` forecasts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum LossKind {
    /// Mean squared error.
    #[default]
    Mse,
    /// Mean absolute error.
    Mae,
    /// Huber (smooth L1) loss.
    Huber {
        /// Threshold between L2 and L1 behavior.
        delta: f32,
    },
}

impl LossKind {
    /// Short name used in logs and metric maps.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mse => "mse",
            Self::Mae => "mae",
            Self::Huber { .. } => "huber",
        }
    }

    /// Compute the mean loss.
    pub fn forward<B: Backend>(&self, preds: Tensor<B, 3>, targets: Tensor<B, 3>) -> Tensor<B, 1> {
        match *self {
            Self::Mse => MseLoss::new().forward(preds, targets, Reduction::Mean),
            Self::Mae => (preds - targets).abs().mean(),
            Self::Huber { delta } => huber(preds, targets, delta),
        }
    }
}

/// Huber loss (smooth L1).
///
/// L = 0.5 * (y - pred)^2                   if |y - pred| <= delta
/// L = delta * |y - pred| - 0.5 * delta^2   otherwise
fn huber<B: Backend>(preds: Tensor<B, 3>, targets: Tensor<B, 3>, delta: f32) -> Tensor<B, 1> {
    let diff = preds - targets;
    let abs_diff = diff.clone().abs();
    let quadratic = diff.powf_scalar(2.0) * 0.5;
    let linear = abs_diff.clone() * delta - 0.5 * delta * delta;
    quadratic.mask_where(abs_diff.greater_elem(delta), linear).mean()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    fn tensors(preds: [f32; 3], targets: [f32; 3]) -> (Tensor<TestBackend, 3>, Tensor<TestBackend, 3>) {
        let device = Default::default();
        (
            Tensor::<TestBackend, 1>::from_floats(preds, &device).reshape([1, 3, 1]),
            Tensor::<TestBackend, 1>::from_floats(targets, &device).reshape([1, 3, 1]),
        )
    }

    fn scalar(t: Tensor<TestBackend, 1>) -> f32 {
        t.into_scalar().elem()
    }

    #[test]
    fn test_mse_and_mae() {
        let (p, t) = tensors([1.0, 2.0, 3.0], [1.0, 0.0, 6.0]);
        assert!((scalar(LossKind::Mse.forward(p.clone(), t.clone())) - 13.0 / 3.0).abs() < 1e-5);
        assert!((scalar(LossKind::Mae.forward(p, t)) - 5.0 / 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_huber() {
        let (p, t) = tensors([0.5, 0.0, 3.0], [0.0, 0.0, 0.0]);
        // 0.125, 0, 1*3 - 0.5
        let expected = (0.125 + 0.0 + 2.5) / 3.0;
        assert!((scalar(LossKind::Huber { delta: 1.0 }.forward(p, t)) - expected).abs() < 1e-5);
    }

    #[test]
    fn test_loss_serde() {
        let loss: LossKind = serde_json::from_str(r#"{"type": "huber", "delta": 0.5}"#).unwrap();
        assert_eq!(loss, LossKind::Huber { delta: 0.5 });
        assert_eq!(loss.name(), "huber");
    }
}
