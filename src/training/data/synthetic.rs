//! Synthetic classification data

use candle_core::{Device, Tensor};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Normal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::TensorDataset;
use crate::error::{Error, Result};

/// Isotropic Gaussian clusters, one per class
///
/// Class centers are drawn once from `N(0, separation²)`; samples scatter
/// around their class center with standard deviation `spread`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaussianBlobs {
    centers: Vec<Vec<f32>>,
    spread: f64,
}

impl GaussianBlobs {
    /// Draw `num_classes` centers in `feature_dim` dimensions
    pub fn new(
        num_classes: usize,
        feature_dim: usize,
        separation: f64,
        spread: f64,
        seed: u64,
    ) -> Result<Self> {
        if num_classes == 0 || feature_dim == 0 {
            return Err(Error::config(
                "gaussian blobs need at least one class and one feature",
            ));
        }
        let center_dist = Normal::new(0.0f32, separation as f32)
            .map_err(|e| Error::config(format!("invalid separation {separation}: {e}")))?;
        Normal::new(0.0f32, spread as f32)
            .map_err(|e| Error::config(format!("invalid spread {spread}: {e}")))?;

        let mut rng = StdRng::seed_from_u64(seed);
        let centers = (0..num_classes)
            .map(|_| (0..feature_dim).map(|_| rng.sample(center_dist)).collect())
            .collect();

        Ok(Self { centers, spread })
    }

    /// Number of classes
    pub fn num_classes(&self) -> usize {
        self.centers.len()
    }

    /// Input dimensionality
    pub fn feature_dim(&self) -> usize {
        self.centers.first().map_or(0, Vec::len)
    }

    /// Draw `per_class` samples of every class, grouped by class
    ///
    /// Inputs are `f32` of shape `[n, feature_dim]`, targets `u32` of shape
    /// `[n]`.
    pub fn sample(&self, per_class: usize, seed: u64, device: &Device) -> Result<TensorDataset> {
        let noise = Normal::new(0.0f32, self.spread as f32)
            .map_err(|e| Error::config(format!("invalid spread {}: {e}", self.spread)))?;
        let mut rng = StdRng::seed_from_u64(seed);

        let n = per_class * self.num_classes();
        let dim = self.feature_dim();
        let mut inputs = Vec::with_capacity(n * dim);
        let mut targets = Vec::with_capacity(n);

        for (class, center) in self.centers.iter().enumerate() {
            for _ in 0..per_class {
                inputs.extend(center.iter().map(|c| c + rng.sample(noise)));
                targets.push(class as u32);
            }
        }
        debug!(samples = n, classes = self.num_classes(), "sampled gaussian blobs");

        let inputs = Tensor::from_vec(inputs, (n, dim), device)?;
        let targets = Tensor::from_vec(targets, n, device)?;
        TensorDataset::new(inputs, targets)
    }
}
