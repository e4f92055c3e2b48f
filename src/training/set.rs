// TrainingSet - labeled spectrogram corpus
//
// Accumulates normalized spectrograms under the two labels, in insertion
// order, and turns them into shuffled training tensors. Mutated only by
// add / remove_last / clear.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::analysis::features::{FeatureExtractor, Spectrogram, N_FRAMES, N_MELS};
use crate::error::TrainingError;
use crate::training::label::Label;
use crate::training::tensors::TrainingTensors;

/// Per-label sample counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SampleCounts {
    pub blow: usize,
    pub not_blow: usize,
    pub total: usize,
}

impl SampleCounts {
    /// Count for one label
    pub fn get(&self, label: Label) -> usize {
        match label {
            Label::Blow => self.blow,
            Label::NotBlow => self.not_blow,
        }
    }

    /// Both classes have at least one sample
    pub fn is_trainable(&self) -> bool {
        self.blow > 0 && self.not_blow > 0
    }
}

/// Two ordered sequences of spectrograms, one per label
#[derive(Debug, Clone, Default)]
pub struct TrainingSet {
    blow: Vec<Spectrogram>,
    not_blow: Vec<Spectrogram>,
}

impl TrainingSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn bucket(&self, label: Label) -> &Vec<Spectrogram> {
        match label {
            Label::Blow => &self.blow,
            Label::NotBlow => &self.not_blow,
        }
    }

    fn bucket_mut(&mut self, label: Label) -> &mut Vec<Spectrogram> {
        match label {
            Label::Blow => &mut self.blow,
            Label::NotBlow => &mut self.not_blow,
        }
    }

    /// Append a spectrogram under `label`
    ///
    /// # Returns
    /// * `true` - sample stored
    /// * `false` - `None`, empty, or not `[N_FRAMES, N_MELS]`; the set is unchanged
    pub fn add_sample(&mut self, spectrogram: Option<Spectrogram>, label: Label) -> bool {
        match spectrogram {
            Some(spec) if Self::check_sample(&spec).is_ok() => {
                self.bucket_mut(label).push(spec);
                log::debug!(
                    "[TrainingSet] Added {} sample ({} total)",
                    label,
                    self.bucket(label).len()
                );
                true
            }
            Some(spec) => {
                if let Err(err) = Self::check_sample(&spec) {
                    log::warn!("[TrainingSet] Rejected {} sample: {}", label, err);
                }
                false
            }
            None => {
                log::warn!("[TrainingSet] Discarded {} capture: no features", label);
                false
            }
        }
    }

    /// Extract features from a raw capture and append them
    ///
    /// Returns `false` when the clip produced no features.
    pub fn add_capture(&mut self, label: Label, samples: &[f32], extractor: &FeatureExtractor) -> bool {
        self.add_sample(extractor.extract(samples), label)
    }

    /// Remove and return the most recent sample for `label`
    pub fn remove_last(&mut self, label: Label) -> Option<Spectrogram> {
        self.bucket_mut(label).pop()
    }

    /// Stored samples for `label`, in insertion order
    pub fn samples(&self, label: Label) -> &[Spectrogram] {
        self.bucket(label)
    }

    pub fn counts(&self) -> SampleCounts {
        SampleCounts {
            blow: self.blow.len(),
            not_blow: self.not_blow.len(),
            total: self.blow.len() + self.not_blow.len(),
        }
    }

    pub fn clear(&mut self) {
        self.blow.clear();
        self.not_blow.clear();
        log::info!("[TrainingSet] Cleared all samples");
    }

    /// Build shuffled `(X, y)` for training
    ///
    /// Rows are laid out blow-then-not_blow, then permuted once with
    /// Fisher–Yates; the same permutation is applied to features and labels.
    ///
    /// # Errors
    /// `TrainingError::EmptyClass` when either label has no samples.
    pub fn to_training_tensors<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Result<TrainingTensors, TrainingError> {
        for label in Label::ALL {
            if self.bucket(label).is_empty() {
                return Err(TrainingError::EmptyClass {
                    label: label.to_string(),
                });
            }
        }

        let rows: Vec<(&[f32], [f32; 2])> = Label::ALL
            .iter()
            .flat_map(|&label| {
                self.bucket(label)
                    .iter()
                    .map(move |spec| (spec.as_slice(), label.one_hot()))
            })
            .collect();

        Ok(TrainingTensors::shuffled(rows, N_FRAMES, N_MELS, rng))
    }

    fn check_sample(spec: &Spectrogram) -> Result<(), TrainingError> {
        if spec.is_empty() {
            return Err(TrainingError::InvalidSample {
                reason: "spectrogram is empty".to_string(),
            });
        }
        if spec.shape() != [N_FRAMES, N_MELS] {
            return Err(TrainingError::InvalidSample {
                reason: format!(
                    "shape {:?} does not match [{}, {}]",
                    spec.shape(),
                    N_FRAMES,
                    N_MELS
                ),
            });
        }
        if spec.as_slice().len() != N_FRAMES * N_MELS {
            return Err(TrainingError::InvalidSample {
                reason: format!(
                    "{} values for a {}x{} spectrogram",
                    spec.as_slice().len(),
                    N_FRAMES,
                    N_MELS
                ),
            });
        }
        Ok(())
    }
}
