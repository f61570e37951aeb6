//! Reference classifier
//!
//! A small fully connected network used by the CLI and the tests. Hidden
//! layers apply ReLU followed by dropout; the output layer is linear.

use candle_core::{DType, Device, Tensor, Var};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Normal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::training::config::{OptimizerConfig, SchedulerConfig};
use crate::training::module::TrainableModule;
use crate::training::optimizers::{create_optimizer, create_scheduler, Optimizer, Scheduler};

/// Configuration for [`MlpClassifier`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MlpConfig {
    /// Input feature dimension
    pub input_dim: usize,

    /// Width of each hidden layer
    #[serde(default)]
    pub hidden_dims: Vec<usize>,

    /// Output width; `1` produces one score per sample for binary tasks
    pub num_outputs: usize,

    /// Dropout probability applied after each hidden layer in train mode
    #[serde(default)]
    pub dropout: f32,

    /// Seed for weight initialization
    #[serde(default)]
    pub seed: u64,

    /// Optimizer built by `configure_optimizer`
    #[serde(default)]
    pub optimizer: OptimizerConfig,

    /// Scheduler built by `configure_scheduler`
    #[serde(default)]
    pub scheduler: Option<SchedulerConfig>,
}

impl MlpConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.input_dim == 0 {
            return Err(Error::config("input_dim must be > 0"));
        }
        if self.num_outputs == 0 {
            return Err(Error::config("num_outputs must be > 0"));
        }
        if self.hidden_dims.contains(&0) {
            return Err(Error::config("hidden layer widths must be > 0"));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(Error::config("dropout must be in [0, 1)"));
        }
        self.optimizer.validate()
    }
}

/// Dense layer `y = x W^T + b`
struct Dense {
    weight: Var,
    bias: Var,
}

impl Dense {
    fn new(
        in_features: usize,
        out_features: usize,
        rng: &mut StdRng,
        device: &Device,
    ) -> Result<Self> {
        // He initialization
        let std = (2.0 / in_features as f32).sqrt();
        let normal = Normal::new(0.0, std)
            .map_err(|e| Error::internal(format!("weight initializer: {e}")))?;
        let values: Vec<f32> = (0..in_features * out_features)
            .map(|_| rng.sample(normal))
            .collect();

        let weight = Var::from_tensor(&Tensor::from_vec(
            values,
            (out_features, in_features),
            device,
        )?)?;
        let bias = Var::zeros(out_features, DType::F32, device)?;

        Ok(Self { weight, bias })
    }

    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let y = x.matmul(&self.weight.as_tensor().t()?)?;
        Ok(y.broadcast_add(self.bias.as_tensor())?)
    }

    fn to_device(&mut self, device: &Device) -> Result<()> {
        self.weight = Var::from_tensor(&self.weight.as_tensor().to_device(device)?)?;
        self.bias = Var::from_tensor(&self.bias.as_tensor().to_device(device)?)?;
        Ok(())
    }
}

/// Multi-layer perceptron classifier
pub struct MlpClassifier {
    config: MlpConfig,
    layers: Vec<Dense>,
    device: Device,
    training: bool,
}

impl MlpClassifier {
    /// Create a new classifier with freshly initialized weights
    pub fn new(config: MlpConfig, device: &Device) -> Result<Self> {
        config.validate()?;

        let mut rng = StdRng::seed_from_u64(config.seed);
        let widths: Vec<usize> = std::iter::once(config.input_dim)
            .chain(config.hidden_dims.iter().copied())
            .chain(std::iter::once(config.num_outputs))
            .collect();
        let layers = widths
            .windows(2)
            .map(|w| Dense::new(w[0], w[1], &mut rng, device))
            .collect::<Result<Vec<_>>>()?;

        let model = Self {
            config,
            layers,
            device: device.clone(),
            training: true,
        };
        info!(
            "Created MLP classifier with {} layers and {} parameters",
            model.layers.len(),
            model.parameter_count()
        );
        Ok(model)
    }

    /// All trainable parameters, weights before biases per layer
    pub fn vars(&self) -> Vec<Var> {
        self.layers
            .iter()
            .flat_map(|l| [l.weight.clone(), l.bias.clone()])
            .collect()
    }

    /// Number of scalar parameters
    pub fn parameter_count(&self) -> usize {
        self.vars().iter().map(|v| v.elem_count()).sum()
    }

    /// Whether training behaviour is enabled
    pub fn is_training(&self) -> bool {
        self.training
    }

    /// Device the parameters live on
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Model configuration
    pub fn config(&self) -> &MlpConfig {
        &self.config
    }
}

impl TrainableModule for MlpClassifier {
    fn forward(&self, inputs: &Tensor) -> Result<Tensor> {
        let mut x = inputs.to_dtype(DType::F32)?;
        let last = self.layers.len() - 1;

        for (i, layer) in self.layers.iter().enumerate() {
            x = layer.forward(&x)?;
            if i < last {
                x = x.relu()?;
                if self.training && self.config.dropout > 0.0 {
                    x = candle_nn::ops::dropout(&x, self.config.dropout)?;
                }
            }
        }

        if self.config.num_outputs == 1 {
            x = x.squeeze(1)?;
        }
        Ok(x)
    }

    fn set_train_mode(&mut self) {
        self.training = true;
    }

    fn set_eval_mode(&mut self) {
        self.training = false;
    }

    fn to_device(&mut self, device: &Device) -> Result<()> {
        if self.device.same_device(device) {
            return Ok(());
        }
        debug!("Moving MLP parameters to {:?}", device);
        for layer in &mut self.layers {
            layer.to_device(device)?;
        }
        self.device = device.clone();
        Ok(())
    }

    fn configure_optimizer(&self) -> Result<Box<dyn Optimizer>> {
        create_optimizer(&self.config.optimizer, self.vars())
    }

    fn configure_scheduler(
        &self,
        optimizer: &dyn Optimizer,
    ) -> Result<Option<Box<dyn Scheduler>>> {
        self.config
            .scheduler
            .as_ref()
            .map(|scheduler| create_scheduler(scheduler, optimizer.learning_rate()))
            .transpose()
    }
}
