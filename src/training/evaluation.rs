//! Validation passes and metric scoring

use std::sync::Arc;

use candle_core::{DType, Device, Tensor};
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::training::data::BatchSource;
use crate::training::history::MetricMap;
use crate::training::loss::{scalar_value, Criterion};
use crate::training::metrics::{
    Accuracy, Average, CohenKappa, F1Score, Metric, EVAL_ACCURACY_AVG, EVAL_ACCURACY_OVERALL,
    EVAL_F1, EVAL_KAPPA, EVAL_LOSS,
};
use crate::training::module::TrainableModule;

/// Scores a model against a labeled source
///
/// The metric accumulators are built once for a fixed class count and reused
/// by every call; each call scores the complete source from a clean state.
pub struct MetricEvaluationEngine {
    num_classes: usize,
    criterion: Arc<dyn Criterion>,
    device: Device,
    f1: F1Score,
    accuracy_macro: Accuracy,
    accuracy_micro: Accuracy,
    kappa: CohenKappa,
}

impl MetricEvaluationEngine {
    /// Create an engine for `num_classes` classes
    pub fn new(num_classes: usize, criterion: Arc<dyn Criterion>, device: Device) -> Result<Self> {
        if num_classes == 0 {
            return Err(Error::config("num_classes must be > 0"));
        }
        Ok(Self {
            num_classes,
            criterion,
            device,
            f1: F1Score::new(num_classes, Average::Weighted),
            accuracy_macro: Accuracy::new(num_classes, Average::Macro),
            accuracy_micro: Accuracy::new(num_classes, Average::Micro),
            kappa: CohenKappa::new(num_classes),
        })
    }

    /// Size of the label space
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Run `model` over all of `source` and score the result
    ///
    /// The model is left in eval mode. Outputs are detached from the autograd
    /// graph, so no gradients are tracked for the pass.
    #[instrument(skip_all, fields(batches = source.num_batches()))]
    pub fn validate(
        &mut self,
        model: &mut dyn TrainableModule,
        source: &dyn BatchSource,
    ) -> Result<MetricMap> {
        model.to_device(&self.device)?;
        model.set_eval_mode();

        let mut predictions = Vec::with_capacity(source.num_batches());
        let mut targets = Vec::with_capacity(source.num_batches());
        for batch in source.batches() {
            let (inputs, batch_targets) = batch?;
            let inputs = inputs.to_device(&self.device)?;
            predictions.push(model.forward(&inputs)?.detach());
            targets.push(batch_targets.to_device(&self.device)?);
        }
        if predictions.is_empty() {
            return Err(Error::empty_source("evaluation source yielded no batches"));
        }

        let predictions = Tensor::cat(&predictions, 0)?;
        let targets = Tensor::cat(&targets, 0)?;
        self.score(&predictions, &targets)
    }

    /// Score materialized raw predictions against targets
    pub fn score(&mut self, predictions: &Tensor, targets: &Tensor) -> Result<MetricMap> {
        let decided = decide_classes(predictions)?;
        let labels = class_labels(targets)?;

        let mut metrics = MetricMap::new();
        metrics.insert(EVAL_F1.to_string(), self.f1.score(&decided, &labels)?);
        metrics.insert(
            EVAL_ACCURACY_OVERALL.to_string(),
            self.accuracy_macro.score(&decided, &labels)?,
        );
        metrics.insert(
            EVAL_ACCURACY_AVG.to_string(),
            self.accuracy_micro.score(&decided, &labels)?,
        );
        metrics.insert(EVAL_KAPPA.to_string(), self.kappa.score(&decided, &labels)?);

        // Labels are range-checked by the metrics above before the criterion sees them
        let loss = self
            .criterion
            .loss(&predictions.to_dtype(DType::F32)?, targets)?;
        metrics.insert(EVAL_LOSS.to_string(), scalar_value(&loss)?);

        debug!(samples = labels.len(), ?metrics, "scored evaluation set");
        Ok(metrics)
    }
}

/// Read targets as class indices
///
/// Values must be non-negative integers whatever the tensor dtype; a float
/// `1.7` or an integer or float `-1` is a label-space error.
fn class_labels(targets: &Tensor) -> Result<Vec<u32>> {
    targets
        .flatten_all()?
        .to_dtype(DType::F64)?
        .to_vec1::<f64>()?
        .into_iter()
        .map(|value| {
            let is_index = value.is_finite()
                && value >= 0.0
                && value.fract() == 0.0
                && value <= u32::MAX as f64;
            if is_index {
                Ok(value as u32)
            } else {
                Err(Error::config(format!("target {value} is not a class index")))
            }
        })
        .collect()
}

/// Turn raw model outputs into class indices
///
/// One score per sample decides class `1` where `sigmoid(score) > 0.5`;
/// otherwise the class is the arg-max over axis 1.
pub fn decide_classes(predictions: &Tensor) -> Result<Vec<u32>> {
    let predictions = predictions.to_dtype(DType::F32)?;
    let decided = match predictions.rank() {
        0 => return Err(Error::invalid_input("predictions must have a batch axis")),
        1 => candle_nn::ops::sigmoid(&predictions)?
            .gt(0.5)?
            .to_dtype(DType::U32)?,
        _ => predictions.argmax(1)?.flatten_all()?,
    };
    Ok(decided.to_vec1::<u32>()?)
}
