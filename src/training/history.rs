//! Per-epoch training history

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Metric name to value
pub type MetricMap = BTreeMap<String, f64>;

/// Metrics recorded for one epoch
///
/// `eval_metrics` is empty exactly when validation was not scheduled for the
/// epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    epoch: usize,
    train_metrics: MetricMap,
    #[serde(default)]
    eval_metrics: MetricMap,
}

impl HistoryEntry {
    /// Create an entry for `epoch`
    pub fn new(epoch: usize, train_metrics: MetricMap, eval_metrics: Option<MetricMap>) -> Self {
        Self {
            epoch,
            train_metrics,
            eval_metrics: eval_metrics.unwrap_or_default(),
        }
    }

    /// Zero-based epoch index
    pub fn epoch(&self) -> usize {
        self.epoch
    }

    /// Training-phase metrics
    pub fn train_metrics(&self) -> &MetricMap {
        &self.train_metrics
    }

    /// Evaluation-phase metrics, empty if validation was skipped
    pub fn eval_metrics(&self) -> &MetricMap {
        &self.eval_metrics
    }

    /// Whether validation ran this epoch
    pub fn was_validated(&self) -> bool {
        !self.eval_metrics.is_empty()
    }

    /// Look up a metric from either phase
    pub fn get(&self, name: &str) -> Option<f64> {
        self.train_metrics
            .get(name)
            .or_else(|| self.eval_metrics.get(name))
            .copied()
    }

    /// Flat display mapping with both phases merged
    pub fn as_postfix(&self) -> MetricMap {
        self.train_metrics
            .iter()
            .chain(&self.eval_metrics)
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }
}

impl fmt::Display for HistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "epoch {}:", self.epoch)?;
        for (name, value) in self.as_postfix() {
            write!(f, " {name}={value:.4}")?;
        }
        Ok(())
    }
}

/// Everything `fit` hands back to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerFeedback {
    /// One entry per completed epoch, empty when history is disabled
    pub history: Vec<HistoryEntry>,

    /// Metrics of the final pass over the test source, if one was given
    pub test_metrics: Option<MetricMap>,

    /// When `fit` started
    pub started_at: DateTime<Utc>,

    /// When `fit` returned
    pub finished_at: DateTime<Utc>,
}

impl TrainerFeedback {
    /// Number of recorded epochs
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// Whether no epochs were recorded
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Most recent entry
    pub fn last(&self) -> Option<&HistoryEntry> {
        self.history.last()
    }

    /// `(epoch, value)` for every entry that recorded `name`
    pub fn metric_series(&self, name: &str) -> Vec<(usize, f64)> {
        self.history
            .iter()
            .filter_map(|entry| entry.get(name).map(|v| (entry.epoch(), v)))
            .collect()
    }

    /// Entry with the highest value of `name`, ignoring NaN
    pub fn best(&self, name: &str) -> Option<&HistoryEntry> {
        self.history
            .iter()
            .filter_map(|entry| entry.get(name).filter(|v| !v.is_nan()).map(|v| (entry, v)))
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(entry, _)| entry)
    }

    /// Wall-clock duration of the run
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    /// Serialize the feedback as pretty-printed JSON
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::metrics::{EVAL_F1, TRAIN_LOSS};

    fn metrics(pairs: &[(&str, f64)]) -> MetricMap {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn feedback() -> TrainerFeedback {
        let now = Utc::now();
        TrainerFeedback {
            history: vec![
                HistoryEntry::new(0, metrics(&[(TRAIN_LOSS, 0.9)]), None),
                HistoryEntry::new(
                    1,
                    metrics(&[(TRAIN_LOSS, 0.5)]),
                    Some(metrics(&[(EVAL_F1, 0.7)])),
                ),
                HistoryEntry::new(
                    2,
                    metrics(&[(TRAIN_LOSS, 0.4)]),
                    Some(metrics(&[(EVAL_F1, 0.6)])),
                ),
            ],
            test_metrics: None,
            started_at: now,
            finished_at: now,
        }
    }

    #[test]
    fn test_postfix_merges_phases() {
        let entry = HistoryEntry::new(
            3,
            metrics(&[(TRAIN_LOSS, 0.25)]),
            Some(metrics(&[(EVAL_F1, 0.5)])),
        );
        let postfix = entry.as_postfix();
        assert_eq!(postfix.len(), 2);
        assert_eq!(postfix[TRAIN_LOSS], 0.25);
        assert_eq!(postfix[EVAL_F1], 0.5);
        assert_eq!(entry.to_string(), "epoch 3: eval_f1=0.5000 train_loss=0.2500");
    }

    #[test]
    fn test_skipped_validation_has_empty_eval() {
        let entry = HistoryEntry::new(0, metrics(&[(TRAIN_LOSS, 1.0)]), None);
        assert!(!entry.was_validated());
        assert!(entry.eval_metrics().is_empty());
    }

    #[test]
    fn test_metric_series_and_best() {
        let feedback = feedback();
        assert_eq!(feedback.metric_series(EVAL_F1), vec![(1, 0.7), (2, 0.6)]);
        assert_eq!(feedback.metric_series(TRAIN_LOSS).len(), 3);
        assert_eq!(feedback.best(EVAL_F1).map(HistoryEntry::epoch), Some(1));
        assert_eq!(feedback.last().map(HistoryEntry::epoch), Some(2));
    }

    #[test]
    fn test_json_replay() {
        let feedback = feedback();
        let json = feedback.to_json_pretty().unwrap();
        let replayed: TrainerFeedback = serde_json::from_str(&json).unwrap();
        assert_eq!(replayed, feedback);
    }
}
