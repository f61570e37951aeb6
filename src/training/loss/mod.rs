//! Loss criteria shared by training and evaluation
//!
//! A [`Criterion`] is a pure function of `(predictions, targets)` returning a
//! scalar loss tensor. Criteria hold no device state; inputs are expected to
//! already live on the compute device.

pub mod supervised;

pub use supervised::{BinaryCrossEntropyWithLogitsLoss, CrossEntropyLoss};

use std::sync::Arc;

use candle_core::Tensor;

use crate::error::Result;
use crate::training::config::LossType;

/// Loss function applied to raw model outputs
pub trait Criterion: Send + Sync {
    /// Criterion name
    fn name(&self) -> &str;

    /// Compute the scalar loss of `predictions` against `targets`
    fn loss(&self, predictions: &Tensor, targets: &Tensor) -> Result<Tensor>;
}

/// Build the criterion selected by `loss_type`
pub fn create_criterion(loss_type: LossType) -> Arc<dyn Criterion> {
    match loss_type {
        LossType::CrossEntropy => Arc::new(CrossEntropyLoss),
        LossType::BinaryCrossEntropyWithLogits => Arc::new(BinaryCrossEntropyWithLogitsLoss),
    }
}

/// Read a loss tensor as a single `f64`, averaging if it is not a scalar
pub(crate) fn scalar_value(loss: &Tensor) -> Result<f64> {
    Ok(loss
        .to_dtype(candle_core::DType::F64)?
        .mean_all()?
        .to_scalar::<f64>()?)
}
