// Classifier - CNN blow / not-blow classification
//
// Owns one `Network` behind a mutex plus a busy flag that admits a single
// training run at a time. Training is async and yields to the runtime after
// every mini-batch; the parameter lock is never held across an await, so
// `predict` and `status` stay usable while a run is in flight.
//
// Lifecycle:
//   Empty --build/train--> Built --train--> Trained
//   any (not training) --load--> Loaded --train--> Trained
//
// Only `Trained` and `Loaded` networks predict or save; `Built` weights are
// random.
//
// Persistence goes through a `ModelStore` as a versioned JSON blob.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::analysis::features::{Spectrogram, N_FRAMES, N_MELS};
use crate::analysis::network::{loss, Adam, Network, INPUT_SHAPE};
use crate::config::TrainingConfig;
use crate::error::{log_model_error, log_training_error, ModelError, TrainingError};
use crate::store::ModelStore;
use crate::training::observer::{EpochLogs, TrainOutcome, TrainingHistory, TrainingObserver};
use crate::training::{Label, TrainingSet, TrainingTensors};

/// Version written into every saved model blob
pub const MODEL_FORMAT_VERSION: u32 = 1;

/// Where the classifier is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    /// No network yet
    Empty,
    /// Freshly initialized weights
    Built,
    /// At least one epoch of training completed
    Trained,
    /// Weights restored from a store
    Loaded,
}

/// Two-class probability distribution for one clip
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub blow: f32,
    pub not_blow: f32,
    pub label: Label,
}

impl Prediction {
    /// `label` is `Blow` only when `blow > not_blow`; ties go to `NotBlow`
    pub fn from_probabilities(probs: [f32; 2]) -> Self {
        let label = if probs[0] > probs[1] {
            Label::Blow
        } else {
            Label::NotBlow
        };
        Self {
            blow: probs[0],
            not_blow: probs[1],
            label,
        }
    }

    /// Probability of the predicted label
    pub fn confidence(&self) -> f32 {
        self.blow.max(self.not_blow)
    }
}

/// Serialized form of a network
#[derive(Serialize, Deserialize)]
struct ModelBlob<N> {
    format_version: u32,
    input_shape: [usize; 3],
    network: N,
}

struct ModelState {
    status: ModelStatus,
    network: Option<Network>,
}

impl ModelState {
    /// Network fit for inference: trained this session or loaded
    fn ready_network(&self) -> Result<&Network, ModelError> {
        match (self.status, self.network.as_ref()) {
            (ModelStatus::Trained | ModelStatus::Loaded, Some(network)) => Ok(network),
            _ => Err(ModelError::NotReady),
        }
    }
}

/// Holds the busy flag for as long as it lives
struct FlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> FlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Running sums for one pass over a range of rows
#[derive(Default)]
struct PassTotals {
    loss: f32,
    correct: usize,
    seen: usize,
}

impl PassTotals {
    fn record(&mut self, loss: f32, correct: bool) {
        self.loss += loss;
        self.seen += 1;
        if correct {
            self.correct += 1;
        }
    }

    fn mean_loss(&self) -> Option<f32> {
        (self.seen > 0).then(|| self.loss / self.seen as f32)
    }

    fn accuracy(&self) -> Option<f32> {
        (self.seen > 0).then(|| self.correct as f32 / self.seen as f32)
    }
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// CNN classifier with single-flight training
pub struct Classifier {
    state: Mutex<ModelState>,
    training: AtomicBool,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier {
    /// Classifier with no network
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ModelState {
                status: ModelStatus::Empty,
                network: None,
            }),
            training: AtomicBool::new(false),
        }
    }

    /// # Errors
    /// `ModelError::StatePoisoned` when the parameter lock was poisoned
    pub fn status(&self) -> Result<ModelStatus, ModelError> {
        self.lock_model().map(|state| state.status)
    }

    /// A training run is in flight
    pub fn is_training(&self) -> bool {
        self.training.load(Ordering::Acquire)
    }

    fn lock_model(&self) -> Result<MutexGuard<'_, ModelState>, ModelError> {
        self.state.lock().map_err(|_| ModelError::StatePoisoned)
    }

    fn lock_training(&self) -> Result<MutexGuard<'_, ModelState>, TrainingError> {
        self.state.lock().map_err(|_| TrainingError::StatePoisoned)
    }

    /// Initialize the fixed topology if no network exists yet
    ///
    /// Existing weights are kept. Returns the resulting status. A `Built`
    /// network is not ready for `predict` or `save` until it is trained.
    pub fn build(&self, seed: Option<u64>) -> Result<ModelStatus, ModelError> {
        let mut state = self.lock_model()?;
        if state.network.is_none() {
            state.network = Some(Network::new(&mut seeded_rng(seed)));
            state.status = ModelStatus::Built;
            log::info!("[Classifier] Built network");
        }
        Ok(state.status)
    }

    /// Train on `set`, reporting through `observer`
    ///
    /// Fails immediately with `AlreadyTraining` when another run is in
    /// flight; that call does not affect the running one.
    /// `observer.on_train_end` fires exactly once per call, on every path.
    ///
    /// # Errors
    /// * `TrainingError::AlreadyTraining` - another run holds the busy flag
    /// * `TrainingError::EmptyClass` - a label has no samples
    /// * `TrainingError::StatePoisoned` - the parameter lock was poisoned
    /// * `TrainingError::ModelNotBuilt` - the network vanished mid-run
    pub async fn train<O>(
        &self,
        set: &TrainingSet,
        config: &TrainingConfig,
        observer: &mut O,
    ) -> Result<TrainingHistory, TrainingError>
    where
        O: TrainingObserver + ?Sized,
    {
        let result = match FlightGuard::acquire(&self.training) {
            Some(_guard) => self.run_training(set, config, observer).await,
            None => Err(TrainingError::AlreadyTraining),
        };

        match &result {
            Ok(history) => tracing::info!(
                "[Classifier] Training finished after {} epochs (stopped early: {})",
                history.epochs_completed(),
                history.stopped_early
            ),
            Err(err) => log_training_error(err, "train"),
        }
        observer.on_train_end(&TrainOutcome::from_result(&result));
        result
    }

    async fn run_training<O>(
        &self,
        set: &TrainingSet,
        config: &TrainingConfig,
        observer: &mut O,
    ) -> Result<TrainingHistory, TrainingError>
    where
        O: TrainingObserver + ?Sized,
    {
        let mut rng = seeded_rng(config.seed);
        let tensors = set.to_training_tensors(&mut rng)?;
        self.ensure_built(&mut rng)?;

        let split = tensors.validation_split_index(config.validation_split);
        let batch_size = config.batch_size.max(1);
        let mut adam = Adam::new(config.learning_rate);
        let mut history = TrainingHistory::default();

        tracing::info!(
            "[Classifier] Training on {} rows ({} validation), {} epochs, batch {}",
            split,
            tensors.len() - split,
            config.epochs,
            batch_size
        );

        for epoch in 0..config.epochs {
            let mut train = PassTotals::default();
            let mut batch_start = 0;
            while batch_start < split {
                let batch_end = (batch_start + batch_size).min(split);
                self.train_batch(&tensors, batch_start..batch_end, &mut adam, &mut rng, &mut train)?;
                batch_start = batch_end;
                tokio::task::yield_now().await;
            }

            let validation = self.evaluate(&tensors, split..tensors.len())?;
            let logs = EpochLogs {
                loss: train.mean_loss().unwrap_or(0.0),
                accuracy: train.accuracy().unwrap_or(0.0),
                val_loss: validation.mean_loss(),
                val_accuracy: validation.accuracy(),
            };
            history.epochs.push(logs);
            self.mark_trained()?;

            tracing::debug!(
                "[Classifier] Epoch {}: loss={:.4} acc={:.3} val_loss={:?} val_acc={:?}",
                epoch,
                logs.loss,
                logs.accuracy,
                logs.val_loss,
                logs.val_accuracy
            );

            if let ControlFlow::Break(()) = observer.on_epoch_end(epoch, &logs) {
                history.stopped_early = epoch + 1 < config.epochs;
                break;
            }
        }

        Ok(history)
    }

    fn ensure_built(&self, rng: &mut StdRng) -> Result<(), TrainingError> {
        let mut state = self.lock_training()?;
        if state.network.is_none() {
            state.network = Some(Network::new(rng));
            state.status = ModelStatus::Built;
            tracing::info!("[Classifier] Built network for training");
        }
        Ok(())
    }

    fn mark_trained(&self) -> Result<(), TrainingError> {
        self.lock_training()?.status = ModelStatus::Trained;
        Ok(())
    }

    /// One Adam step over `rows`, averaged gradients
    fn train_batch(
        &self,
        tensors: &TrainingTensors,
        rows: std::ops::Range<usize>,
        adam: &mut Adam,
        rng: &mut StdRng,
        totals: &mut PassTotals,
    ) -> Result<(), TrainingError> {
        let mut state = self.lock_training()?;
        let network = state.network.as_mut().ok_or(TrainingError::ModelNotBuilt)?;

        let batch_len = rows.len();
        let mut grads = network.zero_gradients();
        for row in rows {
            if let Some(outcome) = network.accumulate(tensors.features(row), tensors.label(row), rng, &mut grads) {
                totals.record(outcome.loss, outcome.correct);
            }
        }
        grads.scale(1.0 / batch_len as f32);
        adam.step(network.parameters_mut(), grads.slices());
        Ok(())
    }

    /// Inference-mode loss and accuracy over `rows`
    fn evaluate(
        &self,
        tensors: &TrainingTensors,
        rows: std::ops::Range<usize>,
    ) -> Result<PassTotals, TrainingError> {
        let state = self.lock_training()?;
        let network = state.network.as_ref().ok_or(TrainingError::ModelNotBuilt)?;

        let mut totals = PassTotals::default();
        for row in rows {
            let target = tensors.label(row);
            if let Some(probs) = network.predict(tensors.features(row)) {
                totals.record(
                    loss::categorical_cross_entropy(&probs, target),
                    loss::argmax(&probs) == loss::argmax(target),
                );
            }
        }
        Ok(totals)
    }

    /// Class probabilities for one spectrogram
    ///
    /// `None` passes through as `Ok(None)` (no features upstream).
    ///
    /// # Errors
    /// * `ModelError::NotReady` - not trained or loaded
    /// * `ModelError::ShapeMismatch` - input is not `[N_FRAMES, N_MELS]`
    pub fn predict(&self, spectrogram: Option<&Spectrogram>) -> Result<Option<Prediction>, ModelError> {
        let state = self.lock_model()?;
        let network = state.ready_network()?;

        let Some(spectrogram) = spectrogram else {
            return Ok(None);
        };
        let mismatch = ModelError::ShapeMismatch {
            expected: [N_FRAMES, N_MELS],
            actual: spectrogram.shape(),
        };
        if spectrogram.shape() != [N_FRAMES, N_MELS] {
            return Err(mismatch);
        }

        let probs = network.predict(spectrogram.as_slice()).ok_or(mismatch)?;
        Ok(Some(Prediction::from_probabilities(probs)))
    }

    /// Serialize the current network into `store` under `name`
    ///
    /// # Errors
    /// `ModelError::NotReady` unless trained or loaded, or the store's error.
    pub fn save(&self, store: &dyn ModelStore, name: &str) -> Result<(), ModelError> {
        let blob = {
            let state = self.lock_model()?;
            let network = state.ready_network()?;
            serde_json::to_vec(&ModelBlob {
                format_version: MODEL_FORMAT_VERSION,
                input_shape: INPUT_SHAPE,
                network,
            })?
        };

        store
            .save(name, &blob)
            .inspect_err(|err| log_model_error(err, "save"))?;
        log::info!("[Classifier] Saved model '{}' ({} bytes)", name, blob.len());
        Ok(())
    }

    /// Replace the network with the one stored under `name`
    ///
    /// On any error the current network is left untouched.
    ///
    /// # Errors
    /// * `ModelError::Busy` - a training run is in flight
    /// * `ModelError::NotFound` - nothing stored under `name`
    /// * `ModelError::Corrupt` - blob unreadable or built for another topology
    pub fn load(&self, store: &dyn ModelStore, name: &str) -> Result<(), ModelError> {
        let _guard = FlightGuard::acquire(&self.training).ok_or(ModelError::Busy)?;

        let network = store
            .load(name)
            .and_then(|bytes| Self::decode(&bytes))
            .inspect_err(|err| log_model_error(err, "load"))?;

        let mut state = self.lock_model()?;
        state.network = Some(network);
        state.status = ModelStatus::Loaded;
        log::info!("[Classifier] Loaded model '{}'", name);
        Ok(())
    }

    fn decode(bytes: &[u8]) -> Result<Network, ModelError> {
        let blob: ModelBlob<Network> = serde_json::from_slice(bytes)?;
        if blob.format_version != MODEL_FORMAT_VERSION {
            return Err(ModelError::Corrupt {
                reason: format!("unsupported format version {}", blob.format_version),
            });
        }
        if blob.input_shape != INPUT_SHAPE {
            return Err(ModelError::Corrupt {
                reason: format!(
                    "input shape {:?} does not match {:?}",
                    blob.input_shape, INPUT_SHAPE
                ),
            });
        }
        blob.network
            .validate_topology()
            .map_err(|reason| ModelError::Corrupt { reason })?;
        Ok(blob.network)
    }
}

#[cfg(test)]
#[path = "classifier_tests.rs"]
mod tests;
