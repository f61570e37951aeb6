//! Learning rate schedulers
//!
//! Schedulers here count epochs, not optimizer steps: the trainer advances
//! them exactly once after every epoch. All decaying schedules support an
//! optional linear warmup that starts below the base rate and reaches it
//! after `warmup_steps` advances. A new scheduler already reports the rate
//! for the first epoch.

use crate::error::{Error, Result};

/// Trait for learning rate schedulers
#[cfg_attr(test, mockall::automock)]
pub trait Scheduler {
    /// Advance the schedule by one epoch
    fn step(&mut self);

    /// Get current learning rate
    fn get_lr(&self) -> f64;

    /// Reset scheduler to initial state
    fn reset(&mut self);
}

/// Linear ramp `base / (W + 1)`, `2 * base / (W + 1)`, ... for epochs `0..W`
fn warmup_lr(base_lr: f64, current_step: usize, warmup_steps: usize) -> f64 {
    base_lr * ((current_step + 1) as f64 / (warmup_steps + 1) as f64)
}

/// Scheduler that never changes the learning rate
pub struct ConstantScheduler {
    lr: f64,
}

impl ConstantScheduler {
    /// Create a new constant scheduler
    pub fn new(lr: f64) -> Self {
        Self { lr }
    }
}

impl Scheduler for ConstantScheduler {
    fn step(&mut self) {}

    fn get_lr(&self) -> f64 {
        self.lr
    }

    fn reset(&mut self) {}
}

/// Step learning rate scheduler
pub struct StepScheduler {
    /// Base learning rate
    base_lr: f64,

    /// Epochs between decays
    step_size: usize,

    /// Decay factor
    gamma: f64,

    /// Warmup epochs
    warmup_steps: usize,

    /// Current epoch
    current_step: usize,

    /// Current learning rate
    current_lr: f64,
}

impl StepScheduler {
    /// Create a new step scheduler
    pub fn new(base_lr: f64, step_size: usize, gamma: f64, warmup_steps: usize) -> Result<Self> {
        if step_size == 0 {
            return Err(Error::config("step scheduler step_size must be > 0"));
        }
        let mut scheduler = Self {
            base_lr,
            step_size,
            gamma,
            warmup_steps,
            current_step: 0,
            current_lr: base_lr,
        };
        scheduler.reset();
        Ok(scheduler)
    }

    fn calculate_lr(&self) -> f64 {
        if self.current_step < self.warmup_steps {
            warmup_lr(self.base_lr, self.current_step, self.warmup_steps)
        } else {
            let decay_steps = self.current_step - self.warmup_steps;
            let decays = decay_steps / self.step_size;
            self.base_lr * self.gamma.powi(decays as i32)
        }
    }
}

impl Scheduler for StepScheduler {
    fn step(&mut self) {
        self.current_step += 1;
        self.current_lr = self.calculate_lr();
    }

    fn get_lr(&self) -> f64 {
        self.current_lr
    }

    fn reset(&mut self) {
        self.current_step = 0;
        self.current_lr = self.calculate_lr();
    }
}

/// Exponential learning rate scheduler
pub struct ExponentialScheduler {
    base_lr: f64,
    gamma: f64,
    warmup_steps: usize,
    current_step: usize,
    current_lr: f64,
}

impl ExponentialScheduler {
    /// Create a new exponential scheduler
    pub fn new(base_lr: f64, gamma: f64, warmup_steps: usize) -> Self {
        let mut scheduler = Self {
            base_lr,
            gamma,
            warmup_steps,
            current_step: 0,
            current_lr: base_lr,
        };
        scheduler.reset();
        scheduler
    }

    fn calculate_lr(&self) -> f64 {
        if self.current_step < self.warmup_steps {
            warmup_lr(self.base_lr, self.current_step, self.warmup_steps)
        } else {
            let decay_steps = self.current_step - self.warmup_steps;
            self.base_lr * self.gamma.powi(decay_steps as i32)
        }
    }
}

impl Scheduler for ExponentialScheduler {
    fn step(&mut self) {
        self.current_step += 1;
        self.current_lr = self.calculate_lr();
    }

    fn get_lr(&self) -> f64 {
        self.current_lr
    }

    fn reset(&mut self) {
        self.current_step = 0;
        self.current_lr = self.calculate_lr();
    }
}

/// Cosine annealing learning rate scheduler
pub struct CosineScheduler {
    /// Base learning rate
    base_lr: f64,

    /// Floor reached at `total_steps`
    min_lr: f64,

    /// Length of the schedule in epochs
    total_steps: usize,

    /// Warmup epochs
    warmup_steps: usize,

    current_step: usize,
    current_lr: f64,
}

impl CosineScheduler {
    /// Create a new cosine scheduler
    ///
    /// `total_steps` must exceed `warmup_steps`.
    pub fn new(
        base_lr: f64,
        min_lr: f64,
        total_steps: usize,
        warmup_steps: usize,
    ) -> Result<Self> {
        if total_steps <= warmup_steps {
            return Err(Error::config(format!(
                "cosine scheduler total_steps ({total_steps}) must exceed \
                 warmup_steps ({warmup_steps})"
            )));
        }
        let mut scheduler = Self {
            base_lr,
            min_lr,
            total_steps,
            warmup_steps,
            current_step: 0,
            current_lr: base_lr,
        };
        scheduler.reset();
        Ok(scheduler)
    }

    fn calculate_lr(&self) -> f64 {
        if self.current_step < self.warmup_steps {
            warmup_lr(self.base_lr, self.current_step, self.warmup_steps)
        } else {
            let decay_steps = self.total_steps - self.warmup_steps;
            let decay_progress =
                (self.current_step - self.warmup_steps) as f64 / decay_steps as f64;
            let cosine_factor =
                0.5 * (1.0 + (std::f64::consts::PI * decay_progress.min(1.0)).cos());

            self.min_lr + (self.base_lr - self.min_lr) * cosine_factor
        }
    }

    /// Whether the schedule has reached its floor
    pub fn is_done(&self) -> bool {
        self.current_step >= self.total_steps
    }
}

impl Scheduler for CosineScheduler {
    fn step(&mut self) {
        self.current_step += 1;
        self.current_lr = self.calculate_lr();
    }

    fn get_lr(&self) -> f64 {
        self.current_lr
    }

    fn reset(&mut self) {
        self.current_step = 0;
        self.current_lr = self.calculate_lr();
    }
}
