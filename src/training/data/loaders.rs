//! In-memory data loader over stacked tensors

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use candle_core::{Device, Tensor};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{BatchIter, BatchSource, InputIter, InputSource};
use crate::error::{Error, Result};

/// Samples stacked along the first axis
#[derive(Debug, Clone)]
pub struct TensorDataset {
    inputs: Tensor,
    targets: Option<Tensor>,
}

impl TensorDataset {
    /// Create a labeled dataset; both tensors must agree on the sample count
    pub fn new(inputs: Tensor, targets: Tensor) -> Result<Self> {
        let n_inputs = inputs.dim(0)?;
        let n_targets = targets.dim(0)?;
        if n_inputs != n_targets {
            return Err(Error::invalid_input(format!(
                "dataset has {n_inputs} inputs but {n_targets} targets"
            )));
        }
        Ok(Self {
            inputs,
            targets: Some(targets),
        })
    }

    /// Create an input-only dataset
    pub fn unlabeled(inputs: Tensor) -> Self {
        Self {
            inputs,
            targets: None,
        }
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.inputs.dims().first().copied().unwrap_or(0)
    }

    /// Whether the dataset holds no samples
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stacked inputs
    pub fn inputs(&self) -> &Tensor {
        &self.inputs
    }

    /// Stacked targets, if labeled
    pub fn targets(&self) -> Option<&Tensor> {
        self.targets.as_ref()
    }

    /// Device the samples live on
    pub fn device(&self) -> &Device {
        self.inputs.device()
    }
}

/// Configuration for [`DataLoader`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataLoaderConfig {
    /// Samples per batch
    pub batch_size: usize,
    /// Reshuffle sample order at the start of every pass
    #[serde(default)]
    pub shuffle: bool,
    /// Drop the last incomplete batch
    #[serde(default)]
    pub drop_last: bool,
    /// Base seed for shuffling; pass `n` uses `seed + n`
    #[serde(default)]
    pub seed: u64,
}

impl Default for DataLoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            shuffle: false,
            drop_last: false,
            seed: 0,
        }
    }
}

/// Batches a [`TensorDataset`], optionally reshuffling each pass
pub struct DataLoader {
    dataset: Arc<TensorDataset>,
    config: DataLoaderConfig,
    epoch: AtomicU64,
}

impl DataLoader {
    /// Create a new loader
    pub fn new(dataset: Arc<TensorDataset>, config: DataLoaderConfig) -> Result<Self> {
        if config.batch_size == 0 {
            return Err(Error::config("batch_size must be > 0"));
        }

        info!(
            "Creating DataLoader with batch_size={}, shuffle={}, drop_last={}",
            config.batch_size, config.shuffle, config.drop_last
        );

        Ok(Self {
            dataset,
            config,
            epoch: AtomicU64::new(0),
        })
    }

    /// Get the number of batches per pass
    pub fn num_batches(&self) -> usize {
        let dataset_size = self.dataset.len();
        if self.config.drop_last {
            dataset_size / self.config.batch_size
        } else {
            dataset_size.div_ceil(self.config.batch_size)
        }
    }

    /// Get dataset size
    pub fn dataset_size(&self) -> usize {
        self.dataset.len()
    }

    /// Number of passes started so far
    pub fn epochs_started(&self) -> u64 {
        self.epoch.load(Ordering::Relaxed)
    }

    /// Sample indices for each batch of the next pass
    fn plan_batches(&self) -> Result<Vec<Vec<u32>>> {
        let epoch = self.epoch.fetch_add(1, Ordering::Relaxed);
        let mut indices = sample_indices(self.dataset.len())?;
        if self.config.shuffle {
            let mut rng = StdRng::seed_from_u64(self.config.seed.wrapping_add(epoch));
            indices.shuffle(&mut rng);
        }

        let batches: Vec<Vec<u32>> = indices
            .chunks(self.config.batch_size)
            .filter(|chunk| !self.config.drop_last || chunk.len() == self.config.batch_size)
            .map(|chunk| chunk.to_vec())
            .collect();
        debug!(epoch, batches = batches.len(), "planned data pass");
        Ok(batches)
    }

    fn select(tensor: &Tensor, indices: &[u32]) -> Result<Tensor> {
        let ids = Tensor::from_slice(indices, indices.len(), tensor.device())?;
        Ok(tensor.index_select(&ids, 0)?)
    }
}

impl BatchSource for DataLoader {
    fn num_batches(&self) -> usize {
        DataLoader::num_batches(self)
    }

    fn batches(&self) -> BatchIter<'_> {
        let Some(targets) = self.dataset.targets() else {
            return Box::new(std::iter::once(Err(Error::invalid_input(
                "labeled batches requested from an unlabeled dataset",
            ))));
        };
        let inputs = self.dataset.inputs();
        let plan = match self.plan_batches() {
            Ok(plan) => plan,
            Err(e) => return Box::new(std::iter::once(Err(e))),
        };

        Box::new(plan.into_iter().map(move |indices| {
            Ok((
                Self::select(inputs, &indices)?,
                Self::select(targets, &indices)?,
            ))
        }))
    }
}

impl InputSource for DataLoader {
    fn num_batches(&self) -> usize {
        DataLoader::num_batches(self)
    }

    fn inputs(&self) -> InputIter<'_> {
        let inputs = self.dataset.inputs();
        let plan = match self.plan_batches() {
            Ok(plan) => plan,
            Err(e) => return Box::new(std::iter::once(Err(e))),
        };
        Box::new(
            plan.into_iter()
                .map(move |indices| Self::select(inputs, &indices)),
        )
    }
}

/// `0..len` as `index_select` ids
fn sample_indices(len: usize) -> Result<Vec<u32>> {
    let len = u32::try_from(len).map_err(|_| {
        Error::invalid_input(format!("dataset of {len} samples exceeds u32 indexing"))
    })?;
    Ok((0..len).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::DType;

    fn dataset(n: usize) -> Arc<TensorDataset> {
        let device = Device::Cpu;
        let inputs = Tensor::arange(0f32, n as f32, &device)
            .unwrap()
            .reshape((n, 1))
            .unwrap();
        let targets = Tensor::arange(0u32, n as u32, &device).unwrap();
        Arc::new(TensorDataset::new(inputs, targets).unwrap())
    }

    fn loader(n: usize, batch_size: usize, shuffle: bool, drop_last: bool) -> DataLoader {
        let config = DataLoaderConfig {
            batch_size,
            shuffle,
            drop_last,
            seed: 7,
        };
        DataLoader::new(dataset(n), config).unwrap()
    }

    #[test]
    fn test_num_batches() {
        assert_eq!(loader(10, 3, false, false).num_batches(), 4);
        assert_eq!(loader(10, 3, false, true).num_batches(), 3);
        assert_eq!(loader(9, 3, false, false).num_batches(), 3);
    }

    #[test]
    fn test_pass_yields_every_sample_in_order() {
        let loader = loader(5, 2, false, false);
        let batches: Vec<_> = loader.batches().collect::<Result<_>>().unwrap();
        assert_eq!(batches.len(), 3);

        let targets: Vec<u32> = batches
            .iter()
            .flat_map(|(_, y)| y.to_vec1::<u32>().unwrap())
            .collect();
        assert_eq!(targets, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_shuffle_keeps_inputs_aligned_with_targets() {
        let loader = loader(8, 3, true, false);
        for _ in 0..2 {
            let mut seen = Vec::new();
            for batch in loader.batches() {
                let (x, y) = batch.unwrap();
                let x: Vec<f32> = x.flatten_all().unwrap().to_vec1().unwrap();
                let y: Vec<u32> = y.to_vec1().unwrap();
                for (xi, yi) in x.iter().zip(&y) {
                    assert_eq!(*xi as u32, *yi);
                }
                seen.extend(y);
            }
            seen.sort_unstable();
            assert_eq!(seen, (0..8).collect::<Vec<u32>>());
        }
        assert_eq!(loader.epochs_started(), 2);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let config = DataLoaderConfig {
            batch_size: 0,
            ..DataLoaderConfig::default()
        };
        assert!(DataLoader::new(dataset(4), config).is_err());
    }

    #[test]
    fn test_unlabeled_dataset_rejects_labeled_pass() {
        let inputs = Tensor::zeros((4, 2), DType::F32, &Device::Cpu).unwrap();
        let loader = DataLoader::new(
            Arc::new(TensorDataset::unlabeled(inputs)),
            DataLoaderConfig::default(),
        )
        .unwrap();

        assert!(loader.batches().next().unwrap().is_err());
        assert_eq!(loader.inputs().count(), 1);
    }

    #[test]
    fn test_sample_indices() {
        assert_eq!(sample_indices(3).unwrap(), vec![0, 1, 2]);
        assert!(sample_indices(0).unwrap().is_empty());
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_sample_indices_beyond_u32_rejected() {
        let result = sample_indices(u32::MAX as usize + 1);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_mismatched_dataset_rejected() {
        let device = Device::Cpu;
        let inputs = Tensor::zeros((4, 2), DType::F32, &device).unwrap();
        let targets = Tensor::zeros(3, DType::U32, &device).unwrap();
        assert!(TensorDataset::new(inputs, targets).is_err());
    }
}
