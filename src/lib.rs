//! Epochal - classification training orchestrator
//!
//! This crate drives supervised classification training on top of `candle`:
//! an epoch loop with gradient accumulation, periodic validation scored with
//! weighted F1, macro and micro accuracy and Cohen's Kappa, and a replayable
//! per-epoch history.

#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

pub mod config;
pub mod error;
pub mod training;

// Re-exports
pub use config::{DeviceConfig, DeviceType, RunConfig, SyntheticDataConfig};
pub use error::{Error, Result};
pub use training::{
    ClassificationTrainer, HistoryEntry, MetricEvaluationEngine, TrainableModule,
    TrainerConfig, TrainerFeedback,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
