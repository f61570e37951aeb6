//! Training configuration
//!
//! `TrainerConfig` carries everything the classification trainer needs at
//! construction time. Optimizer and scheduler settings live with the model
//! (see [`crate::training::models::MlpConfig`]) because the model builds its
//! own optimizer and scheduler.

use candle_core::Device;
use serde::{Deserialize, Serialize};

use crate::config::DeviceConfig;
use crate::error::{Error, Result};

/// Configuration for [`crate::training::ClassificationTrainer`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainerConfig {
    /// Number of passes over the training source
    pub num_epochs: usize,

    /// Size of the label space; fixed for the trainer's lifetime
    pub num_classes: usize,

    /// Whether to keep one history entry per epoch
    #[serde(default = "default_true")]
    pub record_history: bool,

    /// Validate every N epochs
    #[serde(default = "default_one")]
    pub validate_every_n_steps: usize,

    /// Number of mini-batches combined into one optimizer step
    #[serde(default = "default_one")]
    pub dl_accumulation_steps: usize,

    /// Compute device
    #[serde(default)]
    pub device: DeviceConfig,

    /// Criterion shared by training and evaluation
    #[serde(default)]
    pub loss: LossType,
}

fn default_true() -> bool {
    true
}

fn default_one() -> usize {
    1
}

impl TrainerConfig {
    /// Create a configuration with default cadence and accumulation
    pub fn new(num_epochs: usize, num_classes: usize) -> Self {
        Self {
            num_epochs,
            num_classes,
            record_history: true,
            validate_every_n_steps: 1,
            dl_accumulation_steps: 1,
            device: DeviceConfig::default(),
            loss: LossType::default(),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.num_classes == 0 {
            return Err(Error::config("num_classes must be > 0"));
        }
        if self.validate_every_n_steps == 0 {
            return Err(Error::config("validate_every_n_steps must be > 0"));
        }
        if self.dl_accumulation_steps == 0 {
            return Err(Error::config("dl_accumulation_steps must be > 0"));
        }
        if self.loss == LossType::BinaryCrossEntropyWithLogits && self.num_classes != 2 {
            return Err(Error::config(
                "binary_cross_entropy_with_logits requires num_classes == 2",
            ));
        }
        Ok(())
    }

    /// Resolve the configured compute device
    pub fn device(&self) -> Result<Device> {
        self.device.to_device()
    }
}

/// Loss function selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LossType {
    /// Softmax cross-entropy over `[batch, num_classes]` logits
    #[default]
    CrossEntropy,
    /// Sigmoid cross-entropy over `[batch]` scores
    BinaryCrossEntropyWithLogits,
}

/// Optimizer configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OptimizerConfig {
    /// Optimizer type
    #[serde(default)]
    pub optimizer_type: OptimizerType,

    /// Learning rate
    pub learning_rate: f64,

    /// Weight decay (AdamW only)
    #[serde(default)]
    pub weight_decay: f64,

    /// First moment decay (AdamW only)
    #[serde(default = "default_beta1")]
    pub beta1: f64,

    /// Second moment decay (AdamW only)
    #[serde(default = "default_beta2")]
    pub beta2: f64,

    /// Numerical stability term (AdamW only)
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
}

fn default_beta1() -> f64 {
    0.9
}

fn default_beta2() -> f64 {
    0.999
}

fn default_epsilon() -> f64 {
    1e-8
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            optimizer_type: OptimizerType::AdamW,
            learning_rate: 1e-3,
            weight_decay: 0.01,
            beta1: default_beta1(),
            beta2: default_beta2(),
            epsilon: default_epsilon(),
        }
    }
}

impl OptimizerConfig {
    /// Validate optimizer hyperparameters
    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate > 0.0) {
            return Err(Error::config("learning_rate must be > 0"));
        }
        if !(0.0..1.0).contains(&self.beta1) || !(0.0..1.0).contains(&self.beta2) {
            return Err(Error::config("AdamW betas must be in [0, 1)"));
        }
        Ok(())
    }
}

/// Optimizer types
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerType {
    /// Stochastic gradient descent
    Sgd,
    /// Adam with decoupled weight decay
    #[default]
    AdamW,
}

/// Learning rate schedule, advanced once per epoch
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SchedulerConfig {
    /// Keep the base learning rate
    Constant,
    /// Multiply by `gamma` every `step_size` epochs
    Step {
        /// Epochs between decays
        step_size: usize,
        /// Decay factor
        gamma: f64,
        /// Linear warmup epochs
        #[serde(default)]
        warmup_epochs: usize,
    },
    /// Multiply by `gamma` every epoch
    Exponential {
        /// Decay factor
        gamma: f64,
        /// Linear warmup epochs
        #[serde(default)]
        warmup_epochs: usize,
    },
    /// Cosine annealing down to `min_lr` over `total_epochs`
    Cosine {
        /// Schedule length
        total_epochs: usize,
        /// Floor learning rate
        #[serde(default)]
        min_lr: f64,
        /// Linear warmup epochs
        #[serde(default)]
        warmup_epochs: usize,
    },
}
