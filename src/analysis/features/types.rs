// Types module - Data structures for spectrogram features
//
// This module defines the matrix type produced by the feature extraction
// pipeline and consumed by the training set and classifier.

use serde::{Deserialize, Serialize};

/// One Mel-band energy vector per analysis window
pub type MelFrame = Vec<f32>;

/// Fixed-shape time-by-Mel matrix
///
/// Stored row-major: `data[frame * n_mels + mel]`. The extractor always
/// produces the normalized (log + global z-score) form; the same type is
/// used for the raw matrix before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSpectrogram")]
pub struct Spectrogram {
    n_frames: usize,
    n_mels: usize,
    data: Vec<f32>,
}

/// Unchecked wire form; deserialization goes through `Spectrogram::from_data`
#[derive(Deserialize)]
struct RawSpectrogram {
    n_frames: usize,
    n_mels: usize,
    data: Vec<f32>,
}

impl TryFrom<RawSpectrogram> for Spectrogram {
    type Error = String;

    fn try_from(raw: RawSpectrogram) -> Result<Self, Self::Error> {
        let len = raw.data.len();
        Spectrogram::from_data(raw.n_frames, raw.n_mels, raw.data).ok_or_else(|| {
            format!(
                "{} values do not fill a {}x{} spectrogram",
                len, raw.n_frames, raw.n_mels
            )
        })
    }
}

impl Spectrogram {
    /// Build from a flat row-major buffer
    ///
    /// Returns `None` when `data.len() != n_frames * n_mels`.
    pub fn from_data(n_frames: usize, n_mels: usize, data: Vec<f32>) -> Option<Self> {
        if data.len() != n_frames * n_mels {
            return None;
        }
        Some(Self {
            n_frames,
            n_mels,
            data,
        })
    }

    /// Build from a sequence of equally sized frames
    ///
    /// Returns `None` when frames differ in length.
    pub fn from_frames(frames: &[MelFrame]) -> Option<Self> {
        let n_mels = frames.first().map_or(0, Vec::len);
        if frames.iter().any(|frame| frame.len() != n_mels) {
            return None;
        }
        let data = frames.iter().flatten().copied().collect();
        Self::from_data(frames.len(), n_mels, data)
    }

    pub fn n_frames(&self) -> usize {
        self.n_frames
    }

    pub fn n_mels(&self) -> usize {
        self.n_mels
    }

    /// `[n_frames, n_mels]`
    pub fn shape(&self) -> [usize; 2] {
        [self.n_frames, self.n_mels]
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Mel vector of one frame
    pub fn frame(&self, index: usize) -> &[f32] {
        let start = index * self.n_mels;
        &self.data[start..start + self.n_mels]
    }

    /// Mean over every cell
    pub fn mean(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().sum::<f32>() / self.data.len() as f32
    }

    /// Population standard deviation over every cell
    pub fn std_dev(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        let variance = self
            .data
            .iter()
            .map(|value| (value - mean) * (value - mean))
            .sum::<f32>()
            / self.data.len() as f32;
        variance.sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_data_rejects_wrong_length() {
        assert!(Spectrogram::from_data(2, 3, vec![0.0; 5]).is_none());
        assert!(Spectrogram::from_data(2, 3, vec![0.0; 6]).is_some());
    }

    #[test]
    fn test_deserialize_checks_length() {
        let short = r#"{"n_frames":32,"n_mels":128,"data":[0.0]}"#;
        assert!(serde_json::from_str::<Spectrogram>(short).is_err());

        let spec = Spectrogram::from_data(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let json = serde_json::to_string(&spec).unwrap();
        assert_eq!(serde_json::from_str::<Spectrogram>(&json).unwrap(), spec);
    }

    #[test]
    fn test_from_frames_is_row_major() {
        let frames = vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]];
        let spec = Spectrogram::from_frames(&frames).unwrap();

        assert_eq!(spec.shape(), [3, 2]);
        assert_eq!(spec.frame(1), &[3.0, 4.0]);
        assert_eq!(spec.as_slice(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_from_frames_rejects_ragged_input() {
        let frames = vec![vec![1.0, 2.0], vec![3.0]];
        assert!(Spectrogram::from_frames(&frames).is_none());
    }

    #[test]
    fn test_statistics() {
        let spec = Spectrogram::from_data(1, 4, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert!((spec.mean() - 2.5).abs() < 1e-6);
        assert!((spec.std_dev() - 1.118_034).abs() < 1e-5);
    }
}
