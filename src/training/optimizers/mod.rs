//! Optimizers and learning rate schedulers
//!
//! Optimizers wrap the `candle_nn` implementations behind a small trait that
//! separates gradient computation (`backward`) from parameter updates
//! (`step`), so the trainer can clear, accumulate and apply gradients in the
//! order a classic zero-grad / backward / step loop expects. Schedulers are
//! advanced once per epoch and report the learning rate the trainer then
//! pushes into the optimizer.

pub mod adamw;
pub mod schedulers;
pub mod sgd;

pub use adamw::AdamWOptimizer;
pub use sgd::SgdOptimizer;
pub use schedulers::{
    ConstantScheduler, CosineScheduler, ExponentialScheduler, Scheduler, StepScheduler,
};

#[cfg(test)]
pub use schedulers::MockScheduler;

use candle_core::backprop::GradStore;
use candle_core::{Tensor, Var};

use crate::error::{Error, Result};
use crate::training::config::{OptimizerConfig, OptimizerType, SchedulerConfig};

/// Trait for optimizers driven by the training loop
pub trait Optimizer {
    /// Optimizer name
    fn name(&self) -> &str;

    /// Drop any gradients computed since the last step
    fn clear_gradients(&mut self);

    /// Add the gradients of `loss` to those applied by the next `step`
    fn backward(&mut self, loss: &Tensor) -> Result<()>;

    /// Apply the held gradients to the parameters
    fn step(&mut self) -> Result<()>;

    /// Get current learning rate
    fn learning_rate(&self) -> f64;

    /// Set learning rate
    fn set_learning_rate(&mut self, lr: f64);

    /// Number of parameter updates applied so far
    fn step_count(&self) -> usize;
}

/// Losses accumulated between `clear` and `take`.
///
/// Gradients of a sum equal the sum of gradients, so accumulating the
/// scalar losses and backpropagating once at `take` yields the same update
/// as summing per-batch gradient stores.
#[derive(Default)]
pub(crate) struct GradientBuffer {
    pending: Option<Tensor>,
}

impl GradientBuffer {
    pub(crate) fn clear(&mut self) {
        self.pending = None;
    }

    pub(crate) fn backward(&mut self, loss: &Tensor) -> Result<()> {
        let loss = loss.sum_all()?;
        self.pending = Some(match self.pending.take() {
            Some(acc) => acc.add(&loss)?,
            None => loss,
        });
        Ok(())
    }

    pub(crate) fn take(&mut self, optimizer: &str) -> Result<GradStore> {
        let pending = self.pending.take().ok_or_else(|| {
            Error::invalid_input(format!(
                "{optimizer}: step called without a preceding backward pass"
            ))
        })?;
        Ok(pending.backward()?)
    }
}

/// Build an optimizer over `vars` from its configuration
pub fn create_optimizer(config: &OptimizerConfig, vars: Vec<Var>) -> Result<Box<dyn Optimizer>> {
    config.validate()?;

    let optimizer: Box<dyn Optimizer> = match config.optimizer_type {
        OptimizerType::Sgd => Box::new(SgdOptimizer::new(vars, config.learning_rate)?),
        OptimizerType::AdamW => Box::new(AdamWOptimizer::new(
            vars,
            config.learning_rate,
            config.beta1,
            config.beta2,
            config.epsilon,
            config.weight_decay,
        )?),
    };

    Ok(optimizer)
}

/// Build a learning rate scheduler starting from `base_lr`
pub fn create_scheduler(config: &SchedulerConfig, base_lr: f64) -> Result<Box<dyn Scheduler>> {
    let scheduler: Box<dyn Scheduler> = match *config {
        SchedulerConfig::Constant => Box::new(ConstantScheduler::new(base_lr)),
        SchedulerConfig::Step {
            step_size,
            gamma,
            warmup_epochs,
        } => Box::new(StepScheduler::new(base_lr, step_size, gamma, warmup_epochs)?),
        SchedulerConfig::Exponential {
            gamma,
            warmup_epochs,
        } => Box::new(ExponentialScheduler::new(base_lr, gamma, warmup_epochs)),
        SchedulerConfig::Cosine {
            total_epochs,
            min_lr,
            warmup_epochs,
        } => Box::new(CosineScheduler::new(
            base_lr,
            min_lr,
            total_epochs,
            warmup_epochs,
        )?),
    };

    Ok(scheduler)
}
