//! Batch sources for training, evaluation and inference
//!
//! A batch source is a finite, restartable sequence: every call to
//! [`BatchSource::batches`] starts a fresh pass, and a full pass is one
//! epoch. Sources expose their batch count up front so the trainer can
//! normalize the epoch loss and reject empty sources before any work starts.

pub mod loaders;
pub mod synthetic;

pub use loaders::{DataLoader, DataLoaderConfig, TensorDataset};
pub use synthetic::GaussianBlobs;

use candle_core::Tensor;

use crate::error::Result;

/// One pass over a labeled source
pub type BatchIter<'a> = Box<dyn Iterator<Item = Result<(Tensor, Tensor)>> + 'a>;

/// One pass over an unlabeled source
pub type InputIter<'a> = Box<dyn Iterator<Item = Result<Tensor>> + 'a>;

/// Restartable source of `(inputs, targets)` batches
pub trait BatchSource {
    /// Number of batches a full pass yields
    fn num_batches(&self) -> usize;

    /// Start a new pass
    fn batches(&self) -> BatchIter<'_>;
}

/// Restartable source of input-only batches
pub trait InputSource {
    /// Number of batches a full pass yields
    fn num_batches(&self) -> usize;

    /// Start a new pass
    fn inputs(&self) -> InputIter<'_>;
}

impl BatchSource for Vec<(Tensor, Tensor)> {
    fn num_batches(&self) -> usize {
        self.len()
    }

    fn batches(&self) -> BatchIter<'_> {
        Box::new(self.iter().map(|(x, y)| Ok((x.clone(), y.clone()))))
    }
}

impl InputSource for Vec<Tensor> {
    fn num_batches(&self) -> usize {
        self.len()
    }

    fn inputs(&self) -> InputIter<'_> {
        Box::new(self.iter().map(|x| Ok(x.clone())))
    }
}
