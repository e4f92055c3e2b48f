// Training error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Training error code constants
///
/// Single source of truth for the numeric codes reported by `TrainingError`.
///
/// Error code range: 3001-3006
pub struct TrainingErrorCodes {}

impl TrainingErrorCodes {
    /// One of the two classes has no samples
    pub const EMPTY_CLASS: i32 = 3001;

    /// A training run is already in flight on this classifier
    pub const ALREADY_TRAINING: i32 = 3002;

    /// Sample has the wrong shape or contains no data
    pub const INVALID_SAMPLE: i32 = 3003;

    /// Label outside the {blow, not_blow} vocabulary
    pub const UNKNOWN_LABEL: i32 = 3004;

    /// Training set or model lock was poisoned
    pub const STATE_POISONED: i32 = 3005;

    /// Training step reached a classifier with no network
    pub const MODEL_NOT_BUILT: i32 = 3006;
}

/// Log a training error with structured context
///
/// Emits one `error!` record carrying the error code, the component and
/// the caller-supplied context string.
pub fn log_training_error(err: &TrainingError, context: &str) {
    error!(
        "Training error in {}: code={}, component=Trainer, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Training-related errors
///
/// These cover training-set bookkeeping, tensor assembly and the
/// classifier's training run.
///
/// Error code range: 3001-3006
#[derive(Debug, Clone, PartialEq)]
pub enum TrainingError {
    /// Cannot train a binary classifier with one class absent
    EmptyClass { label: String },

    /// Training requested while a run is in flight
    AlreadyTraining,

    /// Sample rejected before it reached the corpus
    InvalidSample { reason: String },

    /// Label string outside the two-label vocabulary
    UnknownLabel { label: String },

    /// Training set or model lock was poisoned
    StatePoisoned,

    /// The network disappeared between build and a training step
    ModelNotBuilt,
}

impl ErrorCode for TrainingError {
    fn code(&self) -> i32 {
        match self {
            TrainingError::EmptyClass { .. } => TrainingErrorCodes::EMPTY_CLASS,
            TrainingError::AlreadyTraining => TrainingErrorCodes::ALREADY_TRAINING,
            TrainingError::InvalidSample { .. } => TrainingErrorCodes::INVALID_SAMPLE,
            TrainingError::UnknownLabel { .. } => TrainingErrorCodes::UNKNOWN_LABEL,
            TrainingError::StatePoisoned => TrainingErrorCodes::STATE_POISONED,
            TrainingError::ModelNotBuilt => TrainingErrorCodes::MODEL_NOT_BUILT,
        }
    }

    fn message(&self) -> String {
        match self {
            TrainingError::EmptyClass { label } => {
                format!(
                    "No '{}' samples collected. Both classes need at least one sample.",
                    label
                )
            }
            TrainingError::AlreadyTraining => {
                "Training already in progress. Wait for the current run to finish.".to_string()
            }
            TrainingError::InvalidSample { reason } => format!("Invalid sample: {}", reason),
            TrainingError::UnknownLabel { label } => {
                format!("Unknown label '{}' (expected 'blow' or 'not_blow')", label)
            }
            TrainingError::StatePoisoned => "Training state lock poisoned".to_string(),
            TrainingError::ModelNotBuilt => "No network to train".to_string(),
        }
    }
}

impl fmt::Display for TrainingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TrainingError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for TrainingError {}
