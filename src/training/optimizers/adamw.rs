//! AdamW optimizer with decoupled weight decay

use candle_core::{Tensor, Var};
use candle_nn::{Optimizer as _, ParamsAdamW};

use super::{GradientBuffer, Optimizer};
use crate::error::Result;

/// AdamW optimizer backed by `candle_nn::AdamW`
pub struct AdamWOptimizer {
    inner: candle_nn::AdamW,
    grads: GradientBuffer,
    step_count: usize,
    weight_decay: f64,
}

impl AdamWOptimizer {
    /// Create a new AdamW optimizer over `vars`
    pub fn new(
        vars: Vec<Var>,
        learning_rate: f64,
        beta1: f64,
        beta2: f64,
        epsilon: f64,
        weight_decay: f64,
    ) -> Result<Self> {
        let params = ParamsAdamW {
            lr: learning_rate,
            beta1,
            beta2,
            eps: epsilon,
            weight_decay,
        };
        let inner = candle_nn::AdamW::new(vars, params)?;

        Ok(Self {
            inner,
            grads: GradientBuffer::default(),
            step_count: 0,
            weight_decay,
        })
    }

    /// Decoupled weight decay coefficient
    pub fn weight_decay(&self) -> f64 {
        self.weight_decay
    }
}

impl Optimizer for AdamWOptimizer {
    fn name(&self) -> &str {
        "adamw"
    }

    fn clear_gradients(&mut self) {
        self.grads.clear();
    }

    fn backward(&mut self, loss: &Tensor) -> Result<()> {
        self.grads.backward(loss)
    }

    fn step(&mut self) -> Result<()> {
        let name = self.name().to_owned();
        let grads = self.grads.take(&name)?;
        self.inner.step(&grads)?;
        self.step_count += 1;
        Ok(())
    }

    fn learning_rate(&self) -> f64 {
        self.inner.learning_rate()
    }

    fn set_learning_rate(&mut self, lr: f64) {
        self.inner.set_learning_rate(lr);
    }

    fn step_count(&self) -> usize {
        self.step_count
    }
}
