//! Multiclass classification metrics
//!
//! Averaging follows the usual conventions:
//!
//! - **micro** pools true positives and errors over all classes,
//! - **macro** takes the unweighted mean of per-class scores, skipping
//!   classes that occur in neither targets nor predictions,
//! - **weighted** weights per-class scores by their support.
//!
//! Divisions by zero inside a per-class score yield `0.0`.

use serde::{Deserialize, Serialize};

use super::confusion::ConfusionMatrix;
use crate::error::Result;

/// Stateful metric accumulator
pub trait Metric: Send {
    /// Metric name
    fn name(&self) -> &str;

    /// Accumulate aligned predictions and targets
    fn update(&mut self, predictions: &[u32], targets: &[u32]) -> Result<()>;

    /// Score everything accumulated since the last reset
    fn compute(&self) -> f64;

    /// Drop accumulated state
    fn reset(&mut self);

    /// Score one complete set in isolation
    fn score(&mut self, predictions: &[u32], targets: &[u32]) -> Result<f64> {
        self.reset();
        self.update(predictions, targets)?;
        Ok(self.compute())
    }
}

/// Averaging strategy over classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Average {
    /// Pool counts over all classes
    Micro,
    /// Unweighted mean over present classes
    Macro,
    /// Support-weighted mean
    Weighted,
}

fn safe_div(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

/// Average a per-class score according to `average`
///
/// `micro` is passed in already pooled because its form differs per metric.
fn reduce(
    cm: &ConfusionMatrix,
    average: Average,
    micro: f64,
    per_class: impl Fn(usize) -> f64,
) -> f64 {
    match average {
        Average::Micro => micro,
        Average::Macro => {
            let present: Vec<usize> = (0..cm.num_classes())
                .filter(|&c| !cm.is_absent(c))
                .collect();
            let sum: f64 = present.iter().map(|&c| per_class(c)).sum();
            safe_div(sum, present.len() as f64)
        }
        Average::Weighted => {
            let weighted: f64 = (0..cm.num_classes())
                .map(|c| cm.support(c) as f64 * per_class(c))
                .sum();
            safe_div(weighted, cm.total() as f64)
        }
    }
}

/// Recall-style accuracy, `tp / (tp + fn)` per class
#[derive(Debug, Clone)]
pub struct Accuracy {
    average: Average,
    confusion: ConfusionMatrix,
}

impl Accuracy {
    /// Create an accuracy metric over `num_classes` classes
    pub fn new(num_classes: usize, average: Average) -> Self {
        Self {
            average,
            confusion: ConfusionMatrix::new(num_classes),
        }
    }
}

impl Metric for Accuracy {
    fn name(&self) -> &str {
        match self.average {
            Average::Micro => "accuracy_micro",
            Average::Macro => "accuracy_macro",
            Average::Weighted => "accuracy_weighted",
        }
    }

    fn update(&mut self, predictions: &[u32], targets: &[u32]) -> Result<()> {
        self.confusion.update(predictions, targets)
    }

    fn compute(&self) -> f64 {
        let cm = &self.confusion;
        let correct: u64 = (0..cm.num_classes()).map(|c| cm.true_positives(c)).sum();
        let micro = safe_div(correct as f64, cm.total() as f64);

        reduce(cm, self.average, micro, |c| {
            safe_div(cm.true_positives(c) as f64, cm.support(c) as f64)
        })
    }

    fn reset(&mut self) {
        self.confusion.reset();
    }
}

/// F1 score, `2tp / (2tp + fp + fn)` per class
#[derive(Debug, Clone)]
pub struct F1Score {
    average: Average,
    confusion: ConfusionMatrix,
}

impl F1Score {
    /// Create an F1 metric over `num_classes` classes
    pub fn new(num_classes: usize, average: Average) -> Self {
        Self {
            average,
            confusion: ConfusionMatrix::new(num_classes),
        }
    }
}

impl Metric for F1Score {
    fn name(&self) -> &str {
        match self.average {
            Average::Micro => "f1_micro",
            Average::Macro => "f1_macro",
            Average::Weighted => "f1_weighted",
        }
    }

    fn update(&mut self, predictions: &[u32], targets: &[u32]) -> Result<()> {
        self.confusion.update(predictions, targets)
    }

    fn compute(&self) -> f64 {
        let cm = &self.confusion;
        let f1 = |tp: u64, fp: u64, fn_: u64| {
            safe_div(2.0 * tp as f64, (2 * tp + fp + fn_) as f64)
        };

        let classes = 0..cm.num_classes();
        let tp: u64 = classes.clone().map(|c| cm.true_positives(c)).sum();
        let fp: u64 = classes.clone().map(|c| cm.false_positives(c)).sum();
        let fn_: u64 = classes.map(|c| cm.false_negatives(c)).sum();
        let micro = f1(tp, fp, fn_);

        reduce(cm, self.average, micro, |c| {
            f1(
                cm.true_positives(c),
                cm.false_positives(c),
                cm.false_negatives(c),
            )
        })
    }

    fn reset(&mut self) {
        self.confusion.reset();
    }
}

/// Cohen's Kappa, agreement between predictions and targets beyond chance
///
/// Undefined (`NaN`) when chance disagreement is zero, for example when every
/// target and prediction is the same single class.
#[derive(Debug, Clone)]
pub struct CohenKappa {
    confusion: ConfusionMatrix,
}

impl CohenKappa {
    /// Create a kappa metric over `num_classes` classes
    pub fn new(num_classes: usize) -> Self {
        Self {
            confusion: ConfusionMatrix::new(num_classes),
        }
    }
}

impl Metric for CohenKappa {
    fn name(&self) -> &str {
        "cohen_kappa"
    }

    fn update(&mut self, predictions: &[u32], targets: &[u32]) -> Result<()> {
        self.confusion.update(predictions, targets)
    }

    fn compute(&self) -> f64 {
        let cm = &self.confusion;
        let k = cm.num_classes();
        let total = cm.total() as f64;

        let mut observed = 0.0;
        let mut expected = 0.0;
        for t in 0..k {
            for p in (0..k).filter(|&p| p != t) {
                observed += cm.get(t, p) as f64;
                expected += cm.support(t) as f64 * cm.predicted(p) as f64 / total;
            }
        }

        if expected == 0.0 {
            return f64::NAN;
        }
        1.0 - observed / expected
    }

    fn reset(&mut self) {
        self.confusion.reset();
    }
}
