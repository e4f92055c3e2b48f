// Model error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Model error code constants
///
/// Error code range: 4001-4007
pub struct ModelErrorCodes {}

impl ModelErrorCodes {
    /// No trained or loaded model available
    pub const NOT_READY: i32 = 4001;

    /// No stored model under the requested name
    pub const NOT_FOUND: i32 = 4002;

    /// Stored blob could not be decoded into a model
    pub const CORRUPT: i32 = 4003;

    /// Backing store I/O failed
    pub const IO: i32 = 4004;

    /// Model state lock was poisoned
    pub const STATE_POISONED: i32 = 4005;

    /// Input does not match the fixed model input shape
    pub const SHAPE_MISMATCH: i32 = 4006;

    /// Model is being trained and cannot be replaced
    pub const BUSY: i32 = 4007;
}

/// Log a model error with structured context
pub fn log_model_error(err: &ModelError, context: &str) {
    error!(
        "Model error in {}: code={}, component=Classifier, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Model-related errors
///
/// These cover prediction readiness and the save/load path through a
/// `ModelStore`. None of them leave the classifier unusable: the caller can
/// always retrain.
///
/// Error code range: 4001-4007
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Prediction or save requested before a model was trained or loaded
    NotReady,

    /// Store has no blob under this name
    NotFound { name: String },

    /// Blob exists but does not decode into a compatible model
    Corrupt { reason: String },

    /// Backing store failed
    Io { details: String },

    /// Model state lock was poisoned
    StatePoisoned,

    /// Spectrogram shape differs from the model input
    ShapeMismatch {
        expected: [usize; 2],
        actual: [usize; 2],
    },

    /// Load requested while training is in flight
    Busy,
}

impl ErrorCode for ModelError {
    fn code(&self) -> i32 {
        match self {
            ModelError::NotReady => ModelErrorCodes::NOT_READY,
            ModelError::NotFound { .. } => ModelErrorCodes::NOT_FOUND,
            ModelError::Corrupt { .. } => ModelErrorCodes::CORRUPT,
            ModelError::Io { .. } => ModelErrorCodes::IO,
            ModelError::StatePoisoned => ModelErrorCodes::STATE_POISONED,
            ModelError::ShapeMismatch { .. } => ModelErrorCodes::SHAPE_MISMATCH,
            ModelError::Busy => ModelErrorCodes::BUSY,
        }
    }

    fn message(&self) -> String {
        match self {
            ModelError::NotReady => {
                "Model not ready. Train or load a model first.".to_string()
            }
            ModelError::NotFound { name } => format!("No saved model named '{}'", name),
            ModelError::Corrupt { reason } => format!("Saved model is corrupt: {}", reason),
            ModelError::Io { details } => format!("Model store I/O error: {}", details),
            ModelError::StatePoisoned => "Model state lock poisoned".to_string(),
            ModelError::ShapeMismatch { expected, actual } => format!(
                "Input shape {}x{} does not match model input {}x{}",
                actual[0], actual[1], expected[0], expected[1]
            ),
            ModelError::Busy => "Model is training and cannot be replaced".to_string(),
        }
    }
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ModelError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ModelError {}

/// Convert from std::io::Error to ModelError
impl From<std::io::Error> for ModelError {
    fn from(err: std::io::Error) -> Self {
        ModelError::Io {
            details: err.to_string(),
        }
    }
}

/// Convert from serde_json::Error to ModelError
impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        ModelError::Corrupt {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_error_codes() {
        assert_eq!(ModelError::NotReady.code(), 4001);
        assert_eq!(
            ModelError::NotFound {
                name: "m".to_string()
            }
            .code(),
            4002
        );
        assert_eq!(
            ModelError::Corrupt {
                reason: "x".to_string()
            }
            .code(),
            4003
        );
        assert_eq!(
            ModelError::Io {
                details: "x".to_string()
            }
            .code(),
            4004
        );
        assert_eq!(ModelError::StatePoisoned.code(), 4005);
        assert_eq!(
            ModelError::ShapeMismatch {
                expected: [32, 128],
                actual: [1, 1]
            }
            .code(),
            4006
        );
        assert_eq!(ModelError::Busy.code(), 4007);
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "test error");
        let model_err: ModelError = io_err.into();

        match model_err {
            ModelError::Io { details } => assert!(details.contains("test error")),
            other => panic!("Expected Io variant, got {:?}", other),
        }
    }

    #[test]
    fn test_json_error_is_corrupt() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let model_err: ModelError = json_err.into();
        assert_eq!(model_err.code(), ModelErrorCodes::CORRUPT);
    }

    #[test]
    fn test_not_ready_message() {
        assert!(ModelError::NotReady.message().contains("not ready"));
    }
}
