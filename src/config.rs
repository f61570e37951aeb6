//! Run configuration for the epochal binary

use std::path::Path;

use candle_core::Device;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::training::config::{LossType, TrainerConfig};
use crate::training::models::MlpConfig;

/// A complete training run: trainer, model and data
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunConfig {
    /// Trainer configuration
    pub trainer: TrainerConfig,

    /// Reference model configuration
    pub model: MlpConfig,

    /// Synthetic data configuration
    pub data: SyntheticDataConfig,
}

impl RunConfig {
    /// Load configuration from a `.json`, `.yaml` or `.yml` file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: Self = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&content)?,
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            _ => {
                return Err(Error::config(format!(
                    "unsupported config format: {}",
                    path.display()
                )))
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate every section and their agreement
    pub fn validate(&self) -> Result<()> {
        self.trainer.validate()?;
        self.model.validate()?;
        self.data.validate()?;

        if self.model.input_dim != self.data.feature_dim {
            return Err(Error::config(format!(
                "model input_dim {} does not match data feature_dim {}",
                self.model.input_dim, self.data.feature_dim
            )));
        }

        let expected_outputs = match self.trainer.loss {
            LossType::CrossEntropy => self.trainer.num_classes,
            LossType::BinaryCrossEntropyWithLogits => 1,
        };
        if self.model.num_outputs != expected_outputs {
            return Err(Error::config(format!(
                "model num_outputs {} does not fit {} classes with {:?}",
                self.model.num_outputs, self.trainer.num_classes, self.trainer.loss
            )));
        }
        Ok(())
    }
}

/// Gaussian-blob data for the binary's training runs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyntheticDataConfig {
    /// Input feature dimension
    pub feature_dim: usize,

    /// Training samples per class
    pub train_per_class: usize,

    /// Evaluation samples per class; `0` disables validation
    #[serde(default)]
    pub eval_per_class: usize,

    /// Test samples per class; `0` disables the final test pass
    #[serde(default)]
    pub test_per_class: usize,

    /// Standard deviation of the class centers
    #[serde(default = "default_separation")]
    pub separation: f64,

    /// Standard deviation of samples around their center
    #[serde(default = "default_spread")]
    pub spread: f64,

    /// Base seed for centers and samples
    #[serde(default)]
    pub seed: u64,

    /// Samples per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Reshuffle the training set every epoch
    #[serde(default = "default_shuffle")]
    pub shuffle: bool,
}

fn default_separation() -> f64 {
    3.0
}

fn default_spread() -> f64 {
    1.0
}

fn default_batch_size() -> usize {
    32
}

fn default_shuffle() -> bool {
    true
}

impl SyntheticDataConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.feature_dim == 0 {
            return Err(Error::config("feature_dim must be > 0"));
        }
        if self.train_per_class == 0 {
            return Err(Error::config("train_per_class must be > 0"));
        }
        if self.batch_size == 0 {
            return Err(Error::config("batch_size must be > 0"));
        }
        if !(self.spread > 0.0) || !(self.separation >= 0.0) {
            return Err(Error::config("spread must be > 0 and separation >= 0"));
        }
        Ok(())
    }
}

/// Device selection
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DeviceConfig {
    /// Device type
    #[serde(default)]
    pub device_type: DeviceType,

    /// Ordinal of the GPU to use
    #[serde(default)]
    pub device_id: usize,
}

impl DeviceConfig {
    /// Resolve the `candle_core` device
    ///
    /// CUDA and Metal fail unless the crate was built with the matching
    /// feature.
    pub fn to_device(&self) -> Result<Device> {
        let device = match self.device_type {
            DeviceType::Cpu => Device::Cpu,
            DeviceType::Cuda => Device::new_cuda(self.device_id)?,
            DeviceType::Metal => Device::new_metal(self.device_id)?,
        };
        Ok(device)
    }
}

/// Device types
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    /// CPU device
    #[default]
    Cpu,
    /// CUDA GPU
    Cuda,
    /// Metal (Apple Silicon)
    Metal,
}
