//! Training infrastructure for classification models
//!
//! This module provides the training loop, metric evaluation, inference
//! passes and the pieces they are built from: batch sources, criteria,
//! optimizers, schedulers and a reference model.
//!
//! # Main Components
//!
//! - **Trainer**: epoch loop with gradient accumulation and validation cadence
//! - **Evaluation**: weighted F1, macro/micro accuracy, Cohen's Kappa and loss
//! - **Inference**: read-only prediction passes
//! - **History**: per-epoch metric records returned from `fit`
//! - **Optimizers**: SGD and AdamW with per-epoch learning rate schedules
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use epochal::training::{ClassificationTrainer, MlpClassifier, TrainerConfig};
//! use candle_core::Device;
//!
//! let mut trainer = ClassificationTrainer::from_config(TrainerConfig::new(10, 3))?;
//! let mut model = MlpClassifier::new(model_config, &Device::Cpu)?;
//!
//! let feedback = trainer.fit(&mut model, &train_loader, Some(&eval_loader), None)?;
//! println!("{}", feedback.last().unwrap());
//! ```

pub mod config;
pub mod data;
pub mod evaluation;
pub mod history;
pub mod inference;
pub mod loss;
pub mod metrics;
pub mod models;
pub mod module;
pub mod optimizers;
pub mod progress;
pub mod trainer;

// Tests module
#[cfg(test)]
pub mod tests;

// Configuration re-exports
pub use config::{LossType, OptimizerConfig, OptimizerType, SchedulerConfig, TrainerConfig};

// Trainer re-exports
pub use trainer::ClassificationTrainer;

// Evaluation and inference re-exports
pub use evaluation::{decide_classes, MetricEvaluationEngine};
pub use inference::{InferenceRunner, LabeledPredictions, Predictions};

// History re-exports
pub use history::{HistoryEntry, MetricMap, TrainerFeedback};

// Data re-exports
pub use data::{
    BatchSource, DataLoader, DataLoaderConfig, GaussianBlobs, InputSource, TensorDataset,
};

// Model re-exports
pub use models::{MlpClassifier, MlpConfig};
pub use module::TrainableModule;

// Loss re-exports
pub use loss::{create_criterion, BinaryCrossEntropyWithLogitsLoss, Criterion, CrossEntropyLoss};

// Optimizer re-exports
pub use optimizers::{
    create_optimizer, create_scheduler, AdamWOptimizer, ConstantScheduler, CosineScheduler,
    ExponentialScheduler, Optimizer, Scheduler, SgdOptimizer, StepScheduler,
};

// Progress re-exports
pub use progress::{NoProgress, ProgressReporter, TracingProgress, TrainingEvent};
