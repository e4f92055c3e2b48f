// Training progress reporting
//
// The classifier reports each finished epoch and the end of every training
// run through a `TrainingObserver`. `ChannelObserver` turns those calls
// into `TrainingEvent`s on a tokio channel for consumers that live on
// another task (UI charts, CLI progress output).

use std::ops::ControlFlow;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::{ErrorCode, TrainingError};

/// Metrics for one finished epoch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochLogs {
    pub loss: f32,
    pub accuracy: f32,
    /// `None` when the validation split is empty
    pub val_loss: Option<f32>,
    pub val_accuracy: Option<f32>,
}

/// Per-epoch logs of one training run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub epochs: Vec<EpochLogs>,
    /// An observer asked to stop before the configured epoch count
    pub stopped_early: bool,
}

impl TrainingHistory {
    pub fn final_logs(&self) -> Option<&EpochLogs> {
        self.epochs.last()
    }

    pub fn epochs_completed(&self) -> usize {
        self.epochs.len()
    }
}

/// How a `train` call ended, delivered once per call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TrainOutcome {
    Completed { epochs: usize },
    Stopped { epochs: usize },
    Failed { code: i32, message: String },
}

impl TrainOutcome {
    pub fn from_result(result: &Result<TrainingHistory, TrainingError>) -> Self {
        match result {
            Ok(history) if history.stopped_early => TrainOutcome::Stopped {
                epochs: history.epochs_completed(),
            },
            Ok(history) => TrainOutcome::Completed {
                epochs: history.epochs_completed(),
            },
            Err(err) => TrainOutcome::Failed {
                code: err.code(),
                message: err.message(),
            },
        }
    }
}

/// Hooks invoked by `Classifier::train`
///
/// `on_train_end` is called exactly once per `train` call, including calls
/// rejected before any epoch ran.
pub trait TrainingObserver: Send {
    /// Called after every epoch; return `ControlFlow::Break(())` to stop
    /// training after this epoch.
    fn on_epoch_end(&mut self, _epoch: usize, _logs: &EpochLogs) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn on_train_end(&mut self, _outcome: &TrainOutcome) {}
}

/// No-op observer
impl TrainingObserver for () {}

/// Events emitted by `ChannelObserver`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum TrainingEvent {
    EpochEnd { epoch: usize, logs: EpochLogs },
    TrainEnd(TrainOutcome),
}

/// Forwards observer calls as `TrainingEvent`s
///
/// A dropped receiver is ignored; training never depends on a listener.
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<TrainingEvent>,
}

impl ChannelObserver {
    pub fn new(tx: mpsc::UnboundedSender<TrainingEvent>) -> Self {
        Self { tx }
    }

    /// Observer plus the receiving end of its channel
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TrainingEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl TrainingObserver for ChannelObserver {
    fn on_epoch_end(&mut self, epoch: usize, logs: &EpochLogs) -> ControlFlow<()> {
        let _ = self.tx.send(TrainingEvent::EpochEnd { epoch, logs: *logs });
        ControlFlow::Continue(())
    }

    fn on_train_end(&mut self, outcome: &TrainOutcome) {
        let _ = self.tx.send(TrainingEvent::TrainEnd(outcome.clone()));
    }
}

/// Closure-backed observer for the epoch hook
pub struct FnObserver<F> {
    on_epoch: F,
    ended: usize,
}

impl<F> FnObserver<F>
where
    F: FnMut(usize, &EpochLogs) -> ControlFlow<()> + Send,
{
    pub fn new(on_epoch: F) -> Self {
        Self { on_epoch, ended: 0 }
    }

    /// Number of `on_train_end` calls received
    pub fn train_end_calls(&self) -> usize {
        self.ended
    }
}

impl<F> TrainingObserver for FnObserver<F>
where
    F: FnMut(usize, &EpochLogs) -> ControlFlow<()> + Send,
{
    fn on_epoch_end(&mut self, epoch: usize, logs: &EpochLogs) -> ControlFlow<()> {
        (self.on_epoch)(epoch, logs)
    }

    fn on_train_end(&mut self, _outcome: &TrainOutcome) {
        self.ended += 1;
    }
}
