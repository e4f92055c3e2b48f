// Training module - labeled sample collection and tensor assembly
//
// This module provides:
// 1. Label: the two-class vocabulary (blow / not_blow)
// 2. TrainingSet: per-label spectrogram corpus with counts and clear
// 3. TrainingTensors: shuffled (X, y) arrays handed to the classifier
// 4. TrainingObserver: epoch / end-of-run hooks and their channel form
//
// The workflow:
// 1. Capture clip -> FeatureExtractor -> TrainingSet::add_sample(label)
// 2. Repeat for both labels
// 3. Classifier::train pulls TrainingSet::to_training_tensors

pub mod label;
pub mod observer;
pub mod set;
pub mod tensors;

pub use label::Label;
pub use observer::{
    ChannelObserver, EpochLogs, FnObserver, TrainOutcome, TrainingEvent, TrainingHistory,
    TrainingObserver,
};
pub use set::{SampleCounts, TrainingSet};
pub use tensors::{fisher_yates_permutation, TrainingTensors};
