//! Configuration management for training and model storage
//!
//! Settings load from a JSON file at startup so epoch counts, batch sizes
//! and the model directory can be tuned without recompiling. A missing or
//! malformed file falls back to defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub training: TrainingConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

/// Classifier training parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Passes over the training rows
    pub epochs: usize,
    /// Samples per gradient step
    pub batch_size: usize,
    /// Adam step size
    pub learning_rate: f32,
    /// Fraction of the shuffled rows held out (taken from the tail)
    pub validation_split: f32,
    /// Fixed seed for shuffling, initialization and dropout; random when unset
    pub seed: Option<u64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 50,
            batch_size: 32,
            learning_rate: 0.001,
            validation_split: 0.2,
            seed: None,
        }
    }
}

impl TrainingConfig {
    /// Same settings with a fixed seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Model persistence configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding `<name>.json` model blobs
    pub directory: PathBuf,
    /// Name used when none is given
    pub default_model: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("models"),
            default_model: "blow_detector".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The parsed configuration, or defaults when the file is missing or
    /// invalid (a warning is logged).
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.training.epochs, 50);
        assert_eq!(config.training.batch_size, 32);
        assert_eq!(config.training.learning_rate, 0.001);
        assert_eq!(config.training.validation_split, 0.2);
        assert_eq!(config.training.seed, None);
        assert_eq!(config.store.directory, PathBuf::from("models"));
    }

    #[test]
    fn test_json_roundtrip() {
        let config = AppConfig {
            training: TrainingConfig::default().with_seed(7),
            ..AppConfig::default()
        };
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let parsed: AppConfig = serde_json::from_str(r#"{"training": {"epochs": 3}}"#).unwrap();
        assert_eq!(parsed.training.epochs, 3);
        assert_eq!(parsed.training.batch_size, 32);
        assert_eq!(parsed.store, StoreConfig::default());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = AppConfig::load_from_file("/nonexistent/blow_config.json");
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_invalid_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert_eq!(AppConfig::load_from_file(file.path()), AppConfig::default());
    }
}
