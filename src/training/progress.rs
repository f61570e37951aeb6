//! Progress reporting and monitoring events
//!
//! The trainer never renders anything itself. It pushes a flat metric
//! snapshot to a [`ProgressReporter`] after every epoch and, if a channel is
//! attached, emits [`TrainingEvent`]s for external monitors.

use tracing::info;

use crate::training::history::MetricMap;

/// Receiver of per-epoch progress snapshots
pub trait ProgressReporter: Send {
    /// Training is about to run `total_epochs` epochs
    fn start(&mut self, total_epochs: usize);

    /// Replace the current snapshot
    fn set_postfix(&mut self, postfix: &MetricMap);

    /// One more epoch finished
    fn update(&mut self);

    /// Training ended
    fn finish(&mut self);
}

/// Reporter that logs every snapshot through `tracing`
#[derive(Debug, Default)]
pub struct TracingProgress {
    total: usize,
    completed: usize,
    postfix: MetricMap,
}

impl TracingProgress {
    /// Create a new reporter
    pub fn new() -> Self {
        Self::default()
    }

    /// Epochs completed so far
    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Last snapshot received
    pub fn postfix(&self) -> &MetricMap {
        &self.postfix
    }

    fn render(&self) -> String {
        self.postfix
            .iter()
            .map(|(k, v)| format!("{k}={v:.4}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl ProgressReporter for TracingProgress {
    fn start(&mut self, total_epochs: usize) {
        self.total = total_epochs;
        self.completed = 0;
        self.postfix.clear();
    }

    fn set_postfix(&mut self, postfix: &MetricMap) {
        self.postfix = postfix.clone();
    }

    fn update(&mut self) {
        self.completed += 1;
        info!("[{}/{}] {}", self.completed, self.total, self.render());
    }

    fn finish(&mut self) {
        info!("Finished {}/{} epochs: {}", self.completed, self.total, self.render());
    }
}

/// Reporter that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn start(&mut self, _total_epochs: usize) {}

    fn set_postfix(&mut self, _postfix: &MetricMap) {}

    fn update(&mut self) {}

    fn finish(&mut self) {}
}

/// Training events for monitoring
#[derive(Debug, Clone, PartialEq)]
pub enum TrainingEvent {
    /// An epoch is starting
    EpochStarted {
        /// Zero-based epoch index
        epoch: usize,
    },
    /// An optimizer step was applied
    StepCompleted {
        /// Optimizer steps applied so far across all epochs
        step: usize,
        /// Loss of the accumulated group
        loss: f64,
        /// Learning rate used for the step
        lr: f64,
    },
    /// A validation pass finished
    EvaluationCompleted {
        /// Epoch the pass belongs to
        epoch: usize,
        /// Scored metrics
        metrics: MetricMap,
    },
    /// An epoch finished
    EpochCompleted {
        /// Zero-based epoch index
        epoch: usize,
        /// Merged train and eval metrics of the epoch
        metrics: MetricMap,
    },
    /// The final pass over the test source finished
    TestCompleted {
        /// Scored metrics
        metrics: MetricMap,
    },
    /// `fit` is about to return
    TrainingCompleted {
        /// Epochs actually run
        epochs: usize,
        /// Optimizer steps applied
        total_steps: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_progress_keeps_last_snapshot() {
        let mut progress = TracingProgress::new();
        progress.start(2);

        let mut postfix = MetricMap::new();
        postfix.insert("train_loss".to_string(), 0.5);
        progress.set_postfix(&postfix);
        progress.update();

        postfix.insert("eval_f1".to_string(), 0.75);
        progress.set_postfix(&postfix);
        progress.update();
        progress.finish();

        assert_eq!(progress.completed(), 2);
        assert_eq!(progress.postfix().len(), 2);
        assert_eq!(progress.render(), "eval_f1=0.7500, train_loss=0.5000");
    }
}
