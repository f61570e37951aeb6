//! Read-only prediction passes

use candle_core::{Device, Tensor};
use tracing::{debug, instrument};

use crate::error::Result;
use crate::training::data::{BatchSource, InputSource};
use crate::training::module::TrainableModule;

/// Raw outputs of an unlabeled pass, one element per batch
#[derive(Debug, Clone)]
pub struct Predictions {
    /// Input batches as fed to the model
    pub inputs: Vec<Tensor>,
    /// Raw model outputs, aligned with `inputs`
    pub predictions: Vec<Tensor>,
}

impl Predictions {
    /// Number of batches
    pub fn len(&self) -> usize {
        self.predictions.len()
    }

    /// Whether the pass saw no batches
    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }
}

/// Raw outputs of a labeled pass, one element per batch
#[derive(Debug, Clone)]
pub struct LabeledPredictions {
    /// Input batches as fed to the model
    pub inputs: Vec<Tensor>,
    /// Targets, aligned with `inputs`
    pub targets: Vec<Tensor>,
    /// Raw model outputs, aligned with `inputs`
    pub predictions: Vec<Tensor>,
}

impl LabeledPredictions {
    /// Number of batches
    pub fn len(&self) -> usize {
        self.predictions.len()
    }

    /// Whether the pass saw no batches
    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }
}

/// Runs a model over a source in eval mode without tracking gradients
///
/// No decision rule or scoring is applied; outputs are returned as the model
/// produced them.
#[derive(Debug, Clone)]
pub struct InferenceRunner {
    device: Device,
}

impl InferenceRunner {
    /// Create a runner on `device`
    pub fn new(device: Device) -> Self {
        Self { device }
    }

    /// Compute device
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Predict over an unlabeled source
    #[instrument(skip_all, fields(batches = source.num_batches()))]
    pub fn predict(
        &self,
        model: &mut dyn TrainableModule,
        source: &dyn InputSource,
    ) -> Result<Predictions> {
        model.to_device(&self.device)?;
        model.set_eval_mode();

        let mut inputs = Vec::with_capacity(source.num_batches());
        let mut predictions = Vec::with_capacity(source.num_batches());
        for batch in source.inputs() {
            let x = batch?.to_device(&self.device)?;
            predictions.push(model.forward(&x)?.detach());
            inputs.push(x);
        }

        debug!(batches = predictions.len(), "prediction pass finished");
        Ok(Predictions {
            inputs,
            predictions,
        })
    }

    /// Predict over a labeled source, keeping the targets alongside
    #[instrument(skip_all, fields(batches = source.num_batches()))]
    pub fn predict_labeled(
        &self,
        model: &mut dyn TrainableModule,
        source: &dyn BatchSource,
    ) -> Result<LabeledPredictions> {
        model.to_device(&self.device)?;
        model.set_eval_mode();

        let mut inputs = Vec::with_capacity(source.num_batches());
        let mut targets = Vec::with_capacity(source.num_batches());
        let mut predictions = Vec::with_capacity(source.num_batches());
        for batch in source.batches() {
            let (x, y) = batch?;
            let x = x.to_device(&self.device)?;
            predictions.push(model.forward(&x)?.detach());
            inputs.push(x);
            targets.push(y.to_device(&self.device)?);
        }

        debug!(batches = predictions.len(), "labeled prediction pass finished");
        Ok(LabeledPredictions {
            inputs,
            targets,
            predictions,
        })
    }
}
