//! Common utilities for testing the training pipeline

use std::cell::RefCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use approx::assert_relative_eq;
use candle_core::{Device, Tensor};

use crate::error::Result;
use crate::training::metrics::{
    EVAL_ACCURACY_AVG, EVAL_ACCURACY_OVERALL, EVAL_F1, EVAL_KAPPA, EVAL_LOSS,
};
use crate::training::{
    Criterion, MetricMap, MlpClassifier, MlpConfig, Optimizer, OptimizerConfig, OptimizerType,
    Scheduler, SgdOptimizer, TrainableModule, TrainerConfig,
};

/// Create a test device (CPU for CI compatibility)
pub fn create_test_device() -> Device {
    Device::Cpu
}

/// Route `tracing` output through the test harness
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Minimal trainer configuration
pub fn create_test_config(num_epochs: usize, num_classes: usize) -> TrainerConfig {
    TrainerConfig::new(num_epochs, num_classes)
}

/// Single-layer classifier trained with plain SGD
pub fn create_test_model(num_features: usize, num_classes: usize) -> MlpClassifier {
    let config = MlpConfig {
        input_dim: num_features,
        hidden_dims: vec![],
        num_outputs: num_classes,
        dropout: 0.0,
        seed: 11,
        optimizer: OptimizerConfig {
            optimizer_type: OptimizerType::Sgd,
            learning_rate: 0.1,
            ..OptimizerConfig::default()
        },
        scheduler: None,
    };
    MlpClassifier::new(config, &create_test_device()).unwrap()
}

/// Assert that every evaluation key is present
pub fn assert_metrics_valid(metrics: &MetricMap) {
    for key in [EVAL_F1, EVAL_ACCURACY_OVERALL, EVAL_ACCURACY_AVG, EVAL_KAPPA, EVAL_LOSS] {
        assert!(metrics.contains_key(key), "missing {key} in {metrics:?}");
    }
}

/// Assert that a scalar tensor holds `expected`
pub fn assert_scalar_close(tensor: &Tensor, expected: f64) {
    let value = crate::training::loss::scalar_value(tensor).unwrap();
    assert_relative_eq!(value, expected, epsilon = 1e-6);
}

/// Shared counters updated by the counting test doubles
#[derive(Debug, Default)]
pub struct Counters {
    pub forward_calls: AtomicUsize,
    pub train_mode_calls: AtomicUsize,
    pub eval_mode_calls: AtomicUsize,
    pub clear_calls: AtomicUsize,
    pub optimizer_steps: AtomicUsize,
    pub scheduler_steps: AtomicUsize,
    /// Rows of every batch passed to `forward`, in call order
    pub forward_rows: Mutex<Vec<usize>>,
}

impl Counters {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn forward_rows(&self) -> Vec<usize> {
        self.forward_rows.lock().unwrap().clone()
    }
}

/// Model that records every call before delegating to a real classifier
pub struct CountingModel {
    inner: MlpClassifier,
    counters: Arc<Counters>,
    scheduler: RefCell<Option<Box<dyn Scheduler>>>,
    counting_scheduler: bool,
}

impl CountingModel {
    pub fn new(num_features: usize, num_classes: usize) -> Self {
        Self {
            inner: create_test_model(num_features, num_classes),
            counters: Arc::new(Counters::default()),
            scheduler: RefCell::new(None),
            counting_scheduler: false,
        }
    }

    /// Hand out a scheduler that counts its advances
    pub fn with_counting_scheduler(mut self) -> Self {
        self.counting_scheduler = true;
        self
    }

    /// Hand out `scheduler` on the first `configure_scheduler` call
    pub fn with_scheduler(self, scheduler: Box<dyn Scheduler>) -> Self {
        *self.scheduler.borrow_mut() = Some(scheduler);
        self
    }

    pub fn counters(&self) -> Arc<Counters> {
        self.counters.clone()
    }
}

impl TrainableModule for CountingModel {
    fn forward(&self, inputs: &Tensor) -> Result<Tensor> {
        self.counters.forward_calls.fetch_add(1, Ordering::SeqCst);
        self.counters
            .forward_rows
            .lock()
            .unwrap()
            .push(inputs.dim(0)?);
        self.inner.forward(inputs)
    }

    fn set_train_mode(&mut self) {
        self.counters.train_mode_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.set_train_mode();
    }

    fn set_eval_mode(&mut self) {
        self.counters.eval_mode_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.set_eval_mode();
    }

    fn to_device(&mut self, device: &Device) -> Result<()> {
        self.inner.to_device(device)
    }

    fn configure_optimizer(&self) -> Result<Box<dyn Optimizer>> {
        Ok(Box::new(CountingOptimizer {
            inner: SgdOptimizer::new(self.inner.vars(), 0.1)?,
            counters: self.counters.clone(),
        }))
    }

    fn configure_scheduler(
        &self,
        _optimizer: &dyn Optimizer,
    ) -> Result<Option<Box<dyn Scheduler>>> {
        if let Some(scheduler) = self.scheduler.borrow_mut().take() {
            return Ok(Some(scheduler));
        }
        if self.counting_scheduler {
            return Ok(Some(Box::new(CountingScheduler {
                counters: self.counters.clone(),
                lr: 0.1,
            })));
        }
        Ok(None)
    }
}

/// SGD wrapper that counts clears and steps
pub struct CountingOptimizer {
    inner: SgdOptimizer,
    counters: Arc<Counters>,
}

impl Optimizer for CountingOptimizer {
    fn name(&self) -> &str {
        "counting_sgd"
    }

    fn clear_gradients(&mut self) {
        self.counters.clear_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.clear_gradients();
    }

    fn backward(&mut self, loss: &Tensor) -> Result<()> {
        self.inner.backward(loss)
    }

    fn step(&mut self) -> Result<()> {
        self.counters.optimizer_steps.fetch_add(1, Ordering::SeqCst);
        self.inner.step()
    }

    fn learning_rate(&self) -> f64 {
        self.inner.learning_rate()
    }

    fn set_learning_rate(&mut self, lr: f64) {
        self.inner.set_learning_rate(lr);
    }

    fn step_count(&self) -> usize {
        self.inner.step_count()
    }
}

/// Scheduler that halves the rate on every advance and counts advances
pub struct CountingScheduler {
    counters: Arc<Counters>,
    lr: f64,
}

impl Scheduler for CountingScheduler {
    fn step(&mut self) {
        self.counters.scheduler_steps.fetch_add(1, Ordering::SeqCst);
        self.lr *= 0.5;
    }

    fn get_lr(&self) -> f64 {
        self.lr
    }

    fn reset(&mut self) {
        self.lr = 0.1;
    }
}

/// Model that returns its inputs as outputs
///
/// Feeding it one-hot logits makes a perfect classifier.
#[derive(Default)]
pub struct IdentityModel {
    pub training: bool,
}

impl TrainableModule for IdentityModel {
    fn forward(&self, inputs: &Tensor) -> Result<Tensor> {
        Ok(inputs.clone())
    }

    fn set_train_mode(&mut self) {
        self.training = true;
    }

    fn set_eval_mode(&mut self) {
        self.training = false;
    }

    fn to_device(&mut self, _device: &Device) -> Result<()> {
        Ok(())
    }

    fn configure_optimizer(&self) -> Result<Box<dyn Optimizer>> {
        Ok(Box::new(SgdOptimizer::new(vec![], 0.1)?))
    }
}

/// Criterion whose value is always `value`, with zero gradient
pub struct ConstantLoss(pub f64);

impl Criterion for ConstantLoss {
    fn name(&self) -> &str {
        "constant"
    }

    fn loss(&self, predictions: &Tensor, _targets: &Tensor) -> Result<Tensor> {
        Ok(predictions.sum_all()?.affine(0.0, self.0)?)
    }
}
