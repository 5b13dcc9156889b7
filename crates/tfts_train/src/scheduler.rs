//! Learning rate schedulers.

use serde::{Deserialize, Serialize};

/// Trait for learning rate schedulers.
pub trait Scheduler: Send + Sync {
    /// Get the learning rate for the current step.
    fn get_lr(&self, step: usize) -> f64;

    /// Get the scheduler name.
    fn name(&self) -> &str;
}

/// Scheduler selection stored in [`crate::TrainerConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum SchedulerKind {
    /// Fixed learning rate.
    #[default]
    Constant,
    /// Warmup to the learning rate, then cosine decay.
    OneCycle {
        /// Fraction of steps spent warming up.
        pct_start: f64,
    },
    /// Cosine decay to `min_lr`.
    Cosine {
        /// Final learning rate.
        min_lr: f64,
    },
    /// Multiply by `gamma` every `step_size` steps.
    Step {
        /// Steps between decays.
        step_size: usize,
        /// Decay factor.
        gamma: f64,
    },
}

impl SchedulerKind {
    /// Create the scheduler for a base learning rate and run length.
    pub fn build(&self, lr: f64, total_steps: usize) -> Box<dyn Scheduler> {
        let total_steps = total_steps.max(1);
        match *self {
            Self::Constant => Box::new(ConstantLR::new(lr)),
            Self::OneCycle { pct_start } => Box::new(OneCycleLR::new(OneCycleLRConfig {
                max_lr: lr,
                total_steps,
                pct_start,
                ..Default::default()
            })),
            Self::Cosine { min_lr } => Box::new(CosineAnnealingLR::new(lr, min_lr, total_steps)),
            Self::Step { step_size, gamma } => Box::new(StepLR::new(lr, step_size.max(1), gamma)),
        }
    }
}

/// Configuration for OneCycleLR scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneCycleLRConfig {
    /// Maximum learning rate.
    pub max_lr: f64,
    /// Total number of steps.
    pub total_steps: usize,
    /// Percentage of steps for warmup.
    pub pct_start: f64,
    /// Division factor for initial LR.
    pub div_factor: f64,
    /// Final division factor.
    pub final_div_factor: f64,
}

impl Default for OneCycleLRConfig {
    fn default() -> Self {
        Self {
            max_lr: 1e-3,
            total_steps: 1000,
            pct_start: 0.3,
            div_factor: 25.0,
            final_div_factor: 10000.0,
        }
    }
}

/// One-cycle learning rate scheduler.
///
/// The LR starts low, increases to max_lr, then decreases to a very low value.
#[derive(Debug, Clone)]
pub struct OneCycleLR {
    config: OneCycleLRConfig,
    initial_lr: f64,
    final_lr: f64,
    warmup_steps: usize,
}

impl OneCycleLR {
    /// Create a new OneCycleLR scheduler.
    pub fn new(config: OneCycleLRConfig) -> Self {
        let initial_lr = config.max_lr / config.div_factor;
        let final_lr = config.max_lr / config.final_div_factor;
        let warmup_steps = (config.total_steps as f64 * config.pct_start) as usize;

        Self {
            config,
            initial_lr,
            final_lr,
            warmup_steps,
        }
    }
}

impl Scheduler for OneCycleLR {
    fn get_lr(&self, step: usize) -> f64 {
        let step = step.min(self.config.total_steps.saturating_sub(1));

        if step < self.warmup_steps {
            let progress = step as f64 / self.warmup_steps as f64;
            self.initial_lr + (self.config.max_lr - self.initial_lr) * progress
        } else {
            let annealing_steps = (self.config.total_steps - self.warmup_steps).max(1);
            let progress = (step - self.warmup_steps) as f64 / annealing_steps as f64;
            let cosine = (1.0 + (std::f64::consts::PI * progress).cos()) / 2.0;
            self.final_lr + (self.config.max_lr - self.final_lr) * cosine
        }
    }

    fn name(&self) -> &str {
        "OneCycleLR"
    }
}

/// Cosine annealing scheduler.
#[derive(Debug, Clone)]
pub struct CosineAnnealingLR {
    initial_lr: f64,
    min_lr: f64,
    total_steps: usize,
}

impl CosineAnnealingLR {
    /// Create a new cosine annealing scheduler.
    pub fn new(initial_lr: f64, min_lr: f64, total_steps: usize) -> Self {
        Self {
            initial_lr,
            min_lr,
            total_steps,
        }
    }
}

impl Scheduler for CosineAnnealingLR {
    fn get_lr(&self, step: usize) -> f64 {
        let step = step.min(self.total_steps.saturating_sub(1));
        let progress = step as f64 / self.total_steps as f64;
        let cosine = (1.0 + (std::f64::consts::PI * progress).cos()) / 2.0;
        self.min_lr + (self.initial_lr - self.min_lr) * cosine
    }

    fn name(&self) -> &str {
        "CosineAnnealingLR"
    }
}

/// Step decay scheduler.
#[derive(Debug, Clone)]
pub struct StepLR {
    initial_lr: f64,
    step_size: usize,
    gamma: f64,
}

impl StepLR {
    /// Create a new step decay scheduler.
    pub fn new(initial_lr: f64, step_size: usize, gamma: f64) -> Self {
        Self {
            initial_lr,
            step_size,
            gamma,
        }
    }
}

impl Scheduler for StepLR {
    fn get_lr(&self, step: usize) -> f64 {
        let n_decays = step / self.step_size;
        self.initial_lr * self.gamma.powi(n_decays as i32)
    }

    fn name(&self) -> &str {
        "StepLR"
    }
}

/// Constant learning rate (no scheduling).
#[derive(Debug, Clone)]
pub struct ConstantLR {
    lr: f64,
}

impl ConstantLR {
    /// Create a new constant LR scheduler.
    pub fn new(lr: f64) -> Self {
        Self { lr }
    }
}

impl Scheduler for ConstantLR {
    fn get_lr(&self, _step: usize) -> f64 {
        self.lr
    }

    fn name(&self) -> &str {
        "ConstantLR"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_cycle() {
        let scheduler = SchedulerKind::OneCycle { pct_start: 0.3 }.build(1e-2, 100);
        assert!((scheduler.get_lr(0) - 1e-2 / 25.0).abs() < 1e-9);
        assert!((scheduler.get_lr(30) - 1e-2).abs() < 1e-9);
        assert!(scheduler.get_lr(99) < 1e-4);
    }

    #[test]
    fn test_cosine_and_step() {
        let cosine = SchedulerKind::Cosine { min_lr: 0.0 }.build(1.0, 10);
        assert!((cosine.get_lr(0) - 1.0).abs() < 1e-9);
        assert!(cosine.get_lr(5) < cosine.get_lr(4));

        let step = SchedulerKind::Step { step_size: 2, gamma: 0.5 }.build(1.0, 10);
        assert_eq!(step.get_lr(1), 1.0);
        assert_eq!(step.get_lr(2), 0.5);
        assert_eq!(step.get_lr(5), 0.25);
    }

    #[test]
    fn test_constant_default() {
        let scheduler = SchedulerKind::default().build(5e-4, 0);
        assert_eq!(scheduler.name(), "ConstantLR");
        assert_eq!(scheduler.get_lr(1234), 5e-4);
    }

    #[test]
    fn test_scheduler_serde() {
        let kind: SchedulerKind = serde_json::from_str(r#"{"type": "one_cycle", "pct_start": 0.25}"#).unwrap();
        assert_eq!(kind, SchedulerKind::OneCycle { pct_start: 0.25 });
    }
}
