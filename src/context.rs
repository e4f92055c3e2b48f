// AppContext: owns the blow-detection pipeline for one session
//
// Bundles the feature extractor, the labeled corpus, the classifier and a
// model store behind one surface: capture under a label, train, predict a
// clip, save, load. Lock failures surface as typed errors (no unwrap).

use std::sync::{Arc, Mutex, MutexGuard};

use crate::analysis::classifier::{Classifier, Prediction};
use crate::analysis::features::FeatureExtractor;
use crate::config::AppConfig;
use crate::error::{log_model_error, log_training_error, ModelError, TrainingError};
use crate::store::{FileStore, MemoryStore, ModelStore};
use crate::training::{Label, SampleCounts, TrainingHistory, TrainingObserver, TrainingSet};

/// Session state shared by the UI or CLI
pub struct AppContext {
    config: AppConfig,
    extractor: Mutex<Option<Arc<FeatureExtractor>>>,
    training_set: Mutex<TrainingSet>,
    classifier: Arc<Classifier>,
    store: Arc<dyn ModelStore>,
}

impl AppContext {
    /// Context persisting models under `config.store.directory`
    pub fn new(config: AppConfig) -> Self {
        let store = Arc::new(FileStore::new(&config.store.directory));
        Self::with_store(config, store)
    }

    pub fn with_store(config: AppConfig, store: Arc<dyn ModelStore>) -> Self {
        Self {
            config,
            extractor: Mutex::new(None),
            training_set: Mutex::new(TrainingSet::new()),
            classifier: Arc::new(Classifier::new()),
            store,
        }
    }

    /// In-memory store and a fixed training seed
    pub fn new_test() -> Self {
        let mut config = AppConfig::default();
        config.training.seed = Some(0);
        Self::with_store(config, Arc::new(MemoryStore::new()))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn classifier(&self) -> Arc<Classifier> {
        Arc::clone(&self.classifier)
    }

    // ========================================================================
    // LOCK HELPER METHODS
    // ========================================================================

    fn lock_training_set(&self) -> Result<MutexGuard<'_, TrainingSet>, TrainingError> {
        self.training_set
            .lock()
            .map_err(|_| TrainingError::StatePoisoned)
    }

    /// Extractor for `sample_rate`, rebuilt when the rate changes
    ///
    /// `None` when the extractor lock is poisoned.
    fn extractor_for(&self, sample_rate: u32) -> Option<Arc<FeatureExtractor>> {
        let mut slot = self.extractor.lock().ok()?;
        match slot.as_ref() {
            Some(extractor) if extractor.sample_rate() == sample_rate => Some(Arc::clone(extractor)),
            _ => {
                log::info!("[AppContext] Creating feature extractor for {} Hz", sample_rate);
                let extractor = Arc::new(FeatureExtractor::new(sample_rate));
                *slot = Some(Arc::clone(&extractor));
                Some(extractor)
            }
        }
    }

    // ========================================================================
    // CORPUS
    // ========================================================================

    /// Extract features from a clip and store them under `label`
    ///
    /// # Returns
    /// * `Ok(true)` - sample stored
    /// * `Ok(false)` - clip too short or otherwise produced no features
    ///
    /// # Errors
    /// * `TrainingError::InvalidSample` - sample rate of zero
    /// * `TrainingError::StatePoisoned` - a lock was poisoned
    pub fn add_capture(&self, label: Label, samples: &[f32], sample_rate: u32) -> Result<bool, TrainingError> {
        if sample_rate == 0 {
            let err = TrainingError::InvalidSample {
                reason: "sample rate must be positive".to_string(),
            };
            log_training_error(&err, "add_capture");
            return Err(err);
        }

        let extractor = self
            .extractor_for(sample_rate)
            .ok_or(TrainingError::StatePoisoned)?;
        // Extraction runs outside the corpus lock
        let spectrogram = extractor.extract(samples);

        let mut set = self.lock_training_set()?;
        Ok(set.add_sample(spectrogram, label))
    }

    /// Drop the most recent sample for `label`; `false` when there was none
    pub fn remove_last(&self, label: Label) -> Result<bool, TrainingError> {
        Ok(self.lock_training_set()?.remove_last(label).is_some())
    }

    pub fn counts(&self) -> Result<SampleCounts, TrainingError> {
        Ok(self.lock_training_set()?.counts())
    }

    pub fn clear_samples(&self) -> Result<(), TrainingError> {
        self.lock_training_set()?.clear();
        Ok(())
    }

    // ========================================================================
    // MODEL
    // ========================================================================

    /// Train the classifier on a snapshot of the current corpus
    ///
    /// Captures added while training runs go into the next run.
    pub async fn train<O>(&self, observer: &mut O) -> Result<TrainingHistory, TrainingError>
    where
        O: TrainingObserver + ?Sized,
    {
        let snapshot = self.lock_training_set()?.clone();
        self.classifier
            .train(&snapshot, &self.config.training, observer)
            .await
    }

    /// Classify one raw clip
    ///
    /// `Ok(None)` when the clip yields no features.
    pub fn predict_clip(&self, samples: &[f32], sample_rate: u32) -> Result<Option<Prediction>, ModelError> {
        let spectrogram = if sample_rate == 0 {
            log::warn!("[AppContext] Ignoring clip with zero sample rate");
            None
        } else {
            self.extractor_for(sample_rate)
                .ok_or(ModelError::StatePoisoned)?
                .extract(samples)
        };
        self.classifier
            .predict(spectrogram.as_ref())
            .inspect_err(|err| log_model_error(err, "predict_clip"))
    }

    /// Save under `name`, or the configured default name
    pub fn save_model(&self, name: Option<&str>) -> Result<(), ModelError> {
        let name = name.unwrap_or(self.config.store.default_model.as_str());
        self.classifier.save(self.store.as_ref(), name)
    }

    /// Load from `name`, or the configured default name
    pub fn load_model(&self, name: Option<&str>) -> Result<(), ModelError> {
        let name = name.unwrap_or(self.config.store.default_model.as_str());
        self.classifier.load(self.store.as_ref(), name)
    }
}
