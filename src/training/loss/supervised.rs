//! Classification criteria

use candle_core::{DType, Tensor};
use tracing::trace;

use super::Criterion;
use crate::error::{Error, Result};

/// Softmax cross-entropy over `[batch, num_classes]` logits
///
/// Targets are class indices of shape `[batch]` and are converted to `u32`
/// before the loss is taken.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossEntropyLoss;

impl Criterion for CrossEntropyLoss {
    fn name(&self) -> &str {
        "cross_entropy"
    }

    fn loss(&self, predictions: &Tensor, targets: &Tensor) -> Result<Tensor> {
        if predictions.rank() != 2 {
            return Err(Error::invalid_input(format!(
                "cross_entropy expects [batch, num_classes] predictions, got {:?}",
                predictions.dims()
            )));
        }
        let predictions = predictions.to_dtype(DType::F32)?;
        let targets = targets.flatten_all()?.to_dtype(DType::U32)?;
        trace!(batch = targets.dim(0)?, "cross_entropy");

        Ok(candle_nn::loss::cross_entropy(&predictions, &targets)?)
    }
}

/// Sigmoid cross-entropy over one score per sample
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryCrossEntropyWithLogitsLoss;

impl Criterion for BinaryCrossEntropyWithLogitsLoss {
    fn name(&self) -> &str {
        "binary_cross_entropy_with_logits"
    }

    fn loss(&self, predictions: &Tensor, targets: &Tensor) -> Result<Tensor> {
        let predictions = predictions.flatten_all()?.to_dtype(DType::F32)?;
        let targets = targets.flatten_all()?.to_dtype(DType::F32)?;
        if predictions.dims() != targets.dims() {
            return Err(Error::invalid_input(format!(
                "binary_cross_entropy_with_logits: {} scores for {} targets",
                predictions.elem_count(),
                targets.elem_count()
            )));
        }

        Ok(candle_nn::loss::binary_cross_entropy_with_logit(
            &predictions,
            &targets,
        )?)
    }
}
