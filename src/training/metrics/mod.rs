//! Classification metrics for evaluation passes
//!
//! Every metric is an explicit stateful accumulator built against a fixed
//! class count. The evaluation engine scores each validation set from a
//! clean state ([`Metric::score`]), so nothing carries over between calls.

pub mod classification;
pub mod confusion;

pub use classification::{Accuracy, Average, CohenKappa, F1Score, Metric};
pub use confusion::ConfusionMatrix;

/// Mean training loss of an epoch
pub const TRAIN_LOSS: &str = "train_loss";

/// Support-weighted F1 score
pub const EVAL_F1: &str = "eval_f1";

/// Macro-averaged accuracy
pub const EVAL_ACCURACY_OVERALL: &str = "eval_accuracy_overall";

/// Micro-averaged accuracy
pub const EVAL_ACCURACY_AVG: &str = "eval_accuracy_avg";

/// Cohen's Kappa
pub const EVAL_KAPPA: &str = "eval_kappa";

/// Criterion value on the raw evaluation outputs
pub const EVAL_LOSS: &str = "eval_loss";
