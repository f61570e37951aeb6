//! Plain stochastic gradient descent

use candle_core::{Tensor, Var};
use candle_nn::Optimizer as _;

use super::{GradientBuffer, Optimizer};
use crate::error::Result;

/// SGD optimizer backed by `candle_nn::SGD`
pub struct SgdOptimizer {
    inner: candle_nn::SGD,
    grads: GradientBuffer,
    step_count: usize,
    parameter_count: usize,
}

impl SgdOptimizer {
    /// Create a new SGD optimizer over `vars`
    pub fn new(vars: Vec<Var>, learning_rate: f64) -> Result<Self> {
        let parameter_count = vars.iter().map(|v| v.elem_count()).sum();
        let inner = candle_nn::SGD::new(vars, learning_rate)?;

        Ok(Self {
            inner,
            grads: GradientBuffer::default(),
            step_count: 0,
            parameter_count,
        })
    }

    /// Number of scalar parameters being optimized
    pub fn parameter_count(&self) -> usize {
        self.parameter_count
    }
}

impl Optimizer for SgdOptimizer {
    fn name(&self) -> &str {
        "sgd"
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
