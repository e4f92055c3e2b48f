// Error types for the blow detector
//
// This module defines custom error types for training-set and model operations,
// providing structured error handling with stable numeric error codes.

mod model;
mod training;

pub use model::{log_model_error, ModelError, ModelErrorCodes};
pub use training::{log_training_error, TrainingError, TrainingErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling for callers
/// that only see numeric codes (UI layers, CLI exit reporting).
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
