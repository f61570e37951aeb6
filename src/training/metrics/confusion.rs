//! Multiclass confusion matrix

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Counts of `(target, prediction)` pairs over a fixed label space
///
/// Rows index the target class, columns the predicted class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    num_classes: usize,
    counts: Vec<u64>,
}

impl ConfusionMatrix {
    /// Create an empty matrix for `num_classes` classes
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            counts: vec![0; num_classes * num_classes],
        }
    }

    /// Size of the label space
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Add aligned predictions and targets
    ///
    /// Fails without modifying the matrix if the slices differ in length or
    /// any label falls outside the label space.
    pub fn update(&mut self, predictions: &[u32], targets: &[u32]) -> Result<()> {
        if predictions.len() != targets.len() {
            return Err(Error::invalid_input(format!(
                "{} predictions for {} targets",
                predictions.len(),
                targets.len()
            )));
        }
        let out_of_range = predictions
            .iter()
            .chain(targets)
            .find(|&&label| label as usize >= self.num_classes);
        if let Some(label) = out_of_range {
            return Err(Error::config(format!(
                "label {label} outside a label space of {} classes",
                self.num_classes
            )));
        }

        for (&pred, &target) in predictions.iter().zip(targets) {
            self.counts[target as usize * self.num_classes + pred as usize] += 1;
        }
        Ok(())
    }

    /// Zero every count
    pub fn reset(&mut self) {
        self.counts.iter_mut().for_each(|c| *c = 0);
    }

    /// Count of samples of class `target` predicted as `prediction`
    pub fn get(&self, target: usize, prediction: usize) -> u64 {
        self.counts[target * self.num_classes + prediction]
    }

    /// Total number of samples seen
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Correct predictions of `class`
    pub fn true_positives(&self, class: usize) -> u64 {
        self.get(class, class)
    }

    /// Samples predicted as `class` whose target is another class
    pub fn false_positives(&self, class: usize) -> u64 {
        self.predicted(class) - self.true_positives(class)
    }

    /// Samples of `class` predicted as another class
    pub fn false_negatives(&self, class: usize) -> u64 {
        self.support(class) - self.true_positives(class)
    }

    /// Samples whose target is `class`
    pub fn support(&self, class: usize) -> u64 {
        let row = class * self.num_classes;
        self.counts[row..row + self.num_classes].iter().sum()
    }

    /// Samples predicted as `class`
    pub fn predicted(&self, class: usize) -> u64 {
        (0..self.num_classes).map(|t| self.get(t, class)).sum()
    }

    /// Whether `class` appears in neither targets nor predictions
    pub fn is_absent(&self, class: usize) -> bool {
        self.support(class) == 0 && self.predicted(class) == 0
    }
}
