// Analysis module - feature extraction and classification
//
// Pipeline: raw clip -> FeatureExtractor (log-Mel spectrogram) ->
// Classifier (CNN) -> Prediction
//
// Module organization:
// - features: FFT, Mel filter bank, frame normalization
// - network: CNN layer math and the Adam optimizer
// - classifier: model lifecycle, training, prediction, persistence

pub mod classifier;
pub mod features;
pub mod network;

pub use classifier::{Classifier, ModelStatus, Prediction};
pub use features::{FeatureExtractor, Spectrogram};
