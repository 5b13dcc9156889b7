//! Forecast accuracy metrics.

use burn::prelude::*;

/// Trait for forecast metrics over `(B, H, 1)` tensors.
pub trait Metric<B: Backend>: Send + Sync {
    /// Compute the metric from predictions and targets.
    fn compute(&self, preds: &Tensor<B, 3>, targets: &Tensor<B, 3>) -> f32;

    /// Get the metric name.
    fn name(&self) -> &str;

    /// Whether higher is better.
    fn higher_is_better(&self) -> bool {
        false
    }
}

/// Mean Squared Error metric.
#[derive(Debug, Clone, Default)]
pub struct MSE;

impl<B: Backend> Metric<B> for MSE {
    fn compute(&self, preds: &Tensor<B, 3>, targets: &Tensor<B, 3>) -> f32 {
        let diff = preds.clone() - targets.clone();
        let squared = diff.clone() * diff;
        squared.mean().into_scalar().elem()
    }

    fn name(&self) -> &str {
        "mse"
    }
}

/// Mean Absolute Error metric.
#[derive(Debug, Clone, Default)]
pub struct MAE;

impl<B: Backend> Metric<B> for MAE {
    fn compute(&self, preds: &Tensor<B, 3>, targets: &Tensor<B, 3>) -> f32 {
        (preds.clone() - targets.clone()).abs().mean().into_scalar().elem()
    }

    fn name(&self) -> &str {
        "mae"
    }
}

/// Root Mean Squared Error metric.
#[derive(Debug, Clone, Default)]
pub struct RMSE;

impl<B: Backend> Metric<B> for RMSE {
    fn compute(&self, preds: &Tensor<B, 3>, targets: &Tensor<B, 3>) -> f32 {
        <MSE as Metric<B>>::compute(&MSE, preds, targets).sqrt()
    }

    fn name(&self) -> &str {
        "rmse"
    }
}

/// Mean Absolute Percentage Error metric, in percent.
///
/// Targets with magnitude below `epsilon` are clamped to avoid division by zero.
#[derive(Debug, Clone)]
pub struct MAPE {
    epsilon: f32,
}

impl MAPE {
    /// Create a MAPE metric with the given denominator floor.
    pub fn new(epsilon: f32) -> Self {
        Self { epsilon }
    }
}

impl Default for MAPE {
    fn default() -> Self {
        Self::new(1e-8)
    }
}

impl<B: Backend> Metric<B> for MAPE {
    fn compute(&self, preds: &Tensor<B, 3>, targets: &Tensor<B, 3>) -> f32 {
        let denom = targets.clone().abs().clamp_min(self.epsilon);
        let ratio = (preds.clone() - targets.clone()).abs() / denom;
        let value: f32 = ratio.mean().into_scalar().elem();
        value * 100.0
    }

    fn name(&self) -> &str {
        "mape"
    }
}

/// The metrics reported by [`crate::Trainer::evaluate`].
pub fn default_metrics<B: Backend>() -> Vec<Box<dyn Metric<B>>> {
    vec![Box::new(MSE), Box::new(MAE), Box::new(RMSE), Box::new(MAPE::default())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    fn tensors() -> (Tensor<TestBackend, 3>, Tensor<TestBackend, 3>) {
        let device = Default::default();
        (
            Tensor::<TestBackend, 1>::from_floats([1.0, 2.0, 3.0, 4.0], &device).reshape([2, 2, 1]),
            Tensor::<TestBackend, 1>::from_floats([2.0, 2.0, 2.0, 2.0], &device).reshape([2, 2, 1]),
        )
    }

    #[test]
    fn test_regression_metrics() {
        let (p, t) = tensors();
        assert!((Metric::<TestBackend>::compute(&MSE, &p, &t) - 1.5).abs() < 1e-6);
        assert!((Metric::<TestBackend>::compute(&MAE, &p, &t) - 1.0).abs() < 1e-6);
        assert!((Metric::<TestBackend>::compute(&RMSE, &p, &t) - 1.5f32.sqrt()).abs() < 1e-6);
        assert!((Metric::<TestBackend>::compute(&MAPE::default(), &p, &t) - 50.0).abs() < 1e-4);
    }

    #[test]
    fn test_metric_names() {
        let names: Vec<String> = default_metrics::<TestBackend>()
            .iter()
            .map(|m| m.name().to_string())
            .collect();
        assert_eq!(names, vec!["mse", "mae", "rmse", "mape"]);
        assert!(!Metric::<TestBackend>::higher_is_better(&MSE));
    }
}
