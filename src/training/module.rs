//! The contract between a model and the trainer

use candle_core::{Device, Tensor};

use crate::error::Result;
use crate::training::optimizers::{Optimizer, Scheduler};

/// A model the trainer can fit, evaluate and run inference with
///
/// The model owns its parameters and decides how they are optimized: the
/// trainer asks it for an optimizer (and optionally a scheduler) once at the
/// start of `fit` and then only drives them.
pub trait TrainableModule {
    /// Run the model on a batch of inputs
    ///
    /// Classifiers return `[batch, num_classes]` logits, or `[batch]` scores
    /// for a single-output binary model.
    fn forward(&self, inputs: &Tensor) -> Result<Tensor>;

    /// Enable training behaviour such as dropout
    fn set_train_mode(&mut self);

    /// Disable training behaviour
    fn set_eval_mode(&mut self);

    /// Move all parameters to `device`
    fn to_device(&mut self, device: &Device) -> Result<()>;

    /// Build the optimizer for this model's parameters
    fn configure_optimizer(&self) -> Result<Box<dyn Optimizer>>;

    /// Build a learning rate scheduler for `optimizer`, if the model uses one
    fn configure_scheduler(
        &self,
        _optimizer: &dyn Optimizer,
    ) -> Result<Option<Box<dyn Scheduler>>> {
        Ok(None)
    }
}
