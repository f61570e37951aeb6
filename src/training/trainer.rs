//! Classification trainer
//!
//! [`ClassificationTrainer`] owns the epoch loop: it accumulates mini-batches
//! into optimizer steps, validates on a fixed epoch cadence, advances the
//! learning rate schedule once per epoch and records one [`HistoryEntry`] per
//! epoch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use candle_core::{Device, Tensor};
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::error::{Error, Result};
use crate::training::config::TrainerConfig;
use crate::training::data::{BatchSource, InputSource};
use crate::training::evaluation::MetricEvaluationEngine;
use crate::training::history::{HistoryEntry, MetricMap, TrainerFeedback};
use crate::training::inference::{InferenceRunner, LabeledPredictions, Predictions};
use crate::training::loss::{create_criterion, scalar_value, Criterion};
use crate::training::metrics::TRAIN_LOSS;
use crate::training::module::TrainableModule;
use crate::training::optimizers::Optimizer;
use crate::training::progress::{ProgressReporter, TracingProgress, TrainingEvent};

/// Trainer for supervised classification models
pub struct ClassificationTrainer {
    /// Trainer configuration
    config: TrainerConfig,

    /// Criterion shared with the evaluation engine
    criterion: Arc<dyn Criterion>,

    /// Device every batch is moved to
    device: Device,

    /// Metric accumulators, reused by every validation pass
    engine: MetricEvaluationEngine,

    /// Prediction passes
    inference: InferenceRunner,

    /// Progress sink
    progress: Box<dyn ProgressReporter>,

    /// Event channel for monitoring
    event_tx: Option<mpsc::UnboundedSender<TrainingEvent>>,

    /// Checked between epochs
    stop_signal: Option<Arc<AtomicBool>>,

    /// Optimizer steps applied across all `fit` calls
    global_step: usize,
}

impl ClassificationTrainer {
    /// Create a new trainer
    pub fn new(
        config: TrainerConfig,
        criterion: Arc<dyn Criterion>,
        device: Device,
    ) -> Result<Self> {
        config.validate()?;

        let engine =
            MetricEvaluationEngine::new(config.num_classes, criterion.clone(), device.clone())?;
        let inference = InferenceRunner::new(device.clone());

        info!(
            "Created classification trainer: {} epochs, {} classes, accumulation window {}, \
             validation every {} epochs, criterion {}",
            config.num_epochs,
            config.num_classes,
            config.dl_accumulation_steps,
            config.validate_every_n_steps,
            criterion.name()
        );

        Ok(Self {
            config,
            criterion,
            device,
            engine,
            inference,
            progress: Box::new(TracingProgress::new()),
            event_tx: None,
            stop_signal: None,
            global_step: 0,
        })
    }

    /// Create a trainer whose criterion and device come from `config`
    pub fn from_config(config: TrainerConfig) -> Result<Self> {
        config.validate()?;
        let device = config.device()?;
        let criterion = create_criterion(config.loss);
        Self::new(config, criterion, device)
    }

    /// Replace the progress reporter
    pub fn with_progress(mut self, progress: Box<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Set up event monitoring
    pub fn with_event_monitoring(mut self, tx: mpsc::UnboundedSender<TrainingEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Stop after the current epoch once `signal` is raised
    pub fn with_stop_signal(mut self, signal: Arc<AtomicBool>) -> Self {
        self.stop_signal = Some(signal);
        self
    }

    /// Trainer configuration
    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Compute device
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Optimizer steps applied so far
    pub fn global_step(&self) -> usize {
        self.global_step
    }

    /// Train `model` for the configured number of epochs
    ///
    /// Every `dl_accumulation_steps` training batches are concatenated into
    /// one forward pass and one optimizer step. Batches left over at the end
    /// of an epoch that do not fill a window are not trained on, and the
    /// epoch loss is the sum of step losses divided by the source's batch
    /// count.
    ///
    /// When `eval` is given it is scored after every epoch whose one-based
    /// index is a multiple of `validate_every_n_steps`. When `test` is given
    /// it is scored once after the last epoch; its metrics are reported but
    /// not added to the history.
    #[instrument(skip_all, fields(epochs = self.config.num_epochs))]
    pub fn fit(
        &mut self,
        model: &mut dyn TrainableModule,
        train: &dyn BatchSource,
        eval: Option<&dyn BatchSource>,
        test: Option<&dyn BatchSource>,
    ) -> Result<TrainerFeedback> {
        let started_at = Utc::now();
        let num_batches = train.num_batches();
        if num_batches == 0 {
            return Err(Error::empty_source("training source has no batches"));
        }

        model.to_device(&self.device)?;
        let mut optimizer = model.configure_optimizer()?;
        let mut scheduler = model.configure_scheduler(optimizer.as_ref())?;
        if let Some(scheduler) = scheduler.as_ref() {
            optimizer.set_learning_rate(scheduler.get_lr());
        }
        info!(
            "Starting training with {} optimizer, scheduler: {}, {} batches per epoch",
            optimizer.name(),
            scheduler.is_some(),
            num_batches
        );

        let num_epochs = self.config.num_epochs;
        let mut history = Vec::new();
        let mut postfix = MetricMap::new();
        let mut epochs_run = 0;
        let steps_before = self.global_step;
        self.progress.start(num_epochs);

        for epoch in 0..num_epochs {
            self.send_event(TrainingEvent::EpochStarted { epoch });
            model.set_train_mode();

            let epoch_loss = self.train_epoch(model, optimizer.as_mut(), train, num_batches)?;
            let mut train_metrics = MetricMap::new();
            train_metrics.insert(TRAIN_LOSS.to_string(), epoch_loss);

            let eval_metrics = match eval {
                Some(source) if self.should_validate(epoch) => {
                    let metrics = self.validate(model, source)?;
                    self.send_event(TrainingEvent::EvaluationCompleted {
                        epoch,
                        metrics: metrics.clone(),
                    });
                    Some(metrics)
                }
                _ => None,
            };

            let entry = HistoryEntry::new(epoch, train_metrics, eval_metrics);
            postfix = entry.as_postfix();
            self.progress.set_postfix(&postfix);
            self.progress.update();
            debug!("{entry}");
            self.send_event(TrainingEvent::EpochCompleted {
                epoch,
                metrics: postfix.clone(),
            });
            if self.config.record_history {
                history.push(entry);
            }

            if let Some(scheduler) = scheduler.as_mut() {
                scheduler.step();
                optimizer.set_learning_rate(scheduler.get_lr());
            }
            epochs_run += 1;

            if self.stop_requested() {
                warn!("Stop requested, ending training after epoch {}", epoch + 1);
                break;
            }
        }

        let test_metrics = match test {
            Some(source) => {
                let metrics = self.validate(model, source)?;
                postfix.extend(metrics.iter().map(|(k, v)| (k.clone(), *v)));
                self.progress.set_postfix(&postfix);
                self.send_event(TrainingEvent::TestCompleted {
                    metrics: metrics.clone(),
                });
                Some(metrics)
            }
            None => None,
        };
        self.progress.finish();

        let total_steps = self.global_step - steps_before;
        info!(
            "Training completed: {} epochs, {} optimizer steps",
            epochs_run, total_steps
        );
        self.send_event(TrainingEvent::TrainingCompleted {
            epochs: epochs_run,
            total_steps,
        });

        Ok(TrainerFeedback {
            history,
            test_metrics,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Train for one epoch and return the normalized epoch loss
    fn train_epoch(
        &mut self,
        model: &mut dyn TrainableModule,
        optimizer: &mut dyn Optimizer,
        train: &dyn BatchSource,
        num_batches: usize,
    ) -> Result<f64> {
        let window = self.config.dl_accumulation_steps;
        let mut inputs = Vec::with_capacity(window);
        let mut targets = Vec::with_capacity(window);
        let mut epoch_loss = 0.0;

        for batch in train.batches() {
            let (x, y) = batch?;
            inputs.push(x.to_device(&self.device)?);
            targets.push(y.to_device(&self.device)?);

            if inputs.len() >= window {
                let x = Tensor::cat(&inputs, 0)?;
                let y = Tensor::cat(&targets, 0)?;
                inputs.clear();
                targets.clear();

                optimizer.clear_gradients();
                let outputs = model.forward(&x)?;
                let loss = self.criterion.loss(&outputs, &y)?;
                optimizer.backward(&loss)?;
                optimizer.step()?;

                let loss_value = scalar_value(&loss)?;
                epoch_loss += loss_value;
                self.global_step += 1;
                self.send_event(TrainingEvent::StepCompleted {
                    step: self.global_step,
                    loss: loss_value,
                    lr: optimizer.learning_rate(),
                });
            }
        }

        if !inputs.is_empty() {
            debug!(
                "{} trailing batches did not fill an accumulation window of {}",
                inputs.len(),
                window
            );
        }

        Ok(epoch_loss / num_batches as f64)
    }

    fn should_validate(&self, epoch: usize) -> bool {
        (epoch + 1) % self.config.validate_every_n_steps == 0
    }

    fn stop_requested(&self) -> bool {
        self.stop_signal
            .as_ref()
            .is_some_and(|signal| signal.load(Ordering::SeqCst))
    }

    /// Score `model` on a labeled source
    pub fn validate(
        &mut self,
        model: &mut dyn TrainableModule,
        source: &dyn BatchSource,
    ) -> Result<MetricMap> {
        self.engine.validate(model, source)
    }

    /// Raw model outputs over an unlabeled source
    pub fn predict(
        &self,
        model: &mut dyn TrainableModule,
        source: &dyn InputSource,
    ) -> Result<Predictions> {
        self.inference.predict(model, source)
    }

    /// Raw model outputs over a labeled source, aligned with inputs and targets
    pub fn predict_labeled(
        &self,
        model: &mut dyn TrainableModule,
        source: &dyn BatchSource,
    ) -> Result<LabeledPredictions> {
        self.inference.predict_labeled(model, source)
    }

    fn send_event(&self, event: TrainingEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }
}
