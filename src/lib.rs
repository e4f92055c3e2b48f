// Blow Detector Core - breath-blow audio classification
// Log-Mel features, a small CNN trained on user captures, and model storage

// Module declarations
pub mod analysis;
pub mod capture;
pub mod config;
pub mod context;
pub mod error;
pub mod store;
pub mod training;

// Re-exports for convenience
pub use analysis::{Classifier, FeatureExtractor, ModelStatus, Prediction, Spectrogram};
pub use config::{AppConfig, StoreConfig, TrainingConfig};
pub use context::AppContext;
pub use error::{ErrorCode, ModelError, TrainingError};
pub use store::{FileStore, MemoryStore, ModelStore};
pub use training::{
    ChannelObserver, EpochLogs, FnObserver, Label, SampleCounts, TrainOutcome, TrainingEvent,
    TrainingHistory, TrainingObserver, TrainingSet,
};
