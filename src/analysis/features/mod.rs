// FeatureExtractor - log-Mel spectrogram extraction for blow detection
//
// This module turns a mono PCM clip into a fixed-shape, normalized
// log-Mel-spectrogram matrix suitable as CNN input.
//
// Module organization:
// - types: Data structures (Spectrogram, MelFrame)
// - fft: FFT computation with windowing
// - mel: Triangular Mel filter bank
// - frames: Windowing, frame-count normalization, log + z-score
// - mod.rs: Coordinator (FeatureExtractor)
//
// Pipeline:
// 1. Slide a FFT_SIZE window with stride HOP_LENGTH over the clip
// 2. Magnitude spectrum -> N_MELS band energies per window
// 3. Force exactly N_FRAMES frames (strided pick or cyclic repeat)
// 4. ln(max(x, 1e-10))
// 5. One global mean/std over the whole matrix, (x - mean) / (std + 1e-8)

mod fft;
pub mod frames;
pub mod mel;
mod types;

pub use fft::FFT_SIZE;
pub use types::{MelFrame, Spectrogram};

use std::sync::atomic::{AtomicU64, Ordering};

use fft::FftProcessor;
use mel::MelFilterBank;

/// Stride between successive analysis windows
pub const HOP_LENGTH: usize = 512;

/// Mel bands per frame
pub const N_MELS: usize = 128;

/// Frames per spectrogram after frame-count normalization
pub const N_FRAMES: usize = 32;

/// FeatureExtractor coordinates the spectrogram pipeline
///
/// Extraction is deterministic and holds no per-clip state. The only
/// mutable field is the degraded-frame diagnostic counter.
pub struct FeatureExtractor {
    fft_processor: FftProcessor,
    mel_bank: MelFilterBank,
    sample_rate: u32,
    degraded_frames: AtomicU64,
}

impl FeatureExtractor {
    /// Create a new FeatureExtractor for the given sample rate
    ///
    /// # Arguments
    /// * `sample_rate` - Audio sample rate in Hz (e.g., 48000)
    pub fn new(sample_rate: u32) -> Self {
        Self {
            fft_processor: FftProcessor::new(FFT_SIZE),
            mel_bank: MelFilterBank::new(sample_rate, FFT_SIZE, N_MELS),
            sample_rate,
            degraded_frames: AtomicU64::new(0),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of frames replaced by zero vectors since construction
    pub fn degraded_frames(&self) -> u64 {
        self.degraded_frames.load(Ordering::Relaxed)
    }

    /// Extract a normalized `[N_FRAMES, N_MELS]` spectrogram
    ///
    /// # Returns
    /// * `Some(Spectrogram)` - normalized matrix, always `[N_FRAMES, N_MELS]`
    /// * `None` - clip shorter than one window; the caller should discard it
    pub fn extract(&self, samples: &[f32]) -> Option<Spectrogram> {
        let frames = self.mel_frames(samples);
        if frames.is_empty() {
            log::debug!(
                "[FeatureExtractor] No complete window in {} samples (need {})",
                samples.len(),
                FFT_SIZE
            );
            return None;
        }

        let raw_count = frames.len();
        let frames = frames::normalize_frame_count(frames, N_FRAMES);
        let mut spectrogram = Spectrogram::from_frames(&frames)?;

        frames::log_compress(spectrogram.as_mut_slice());
        let (mean, std) = frames::standardize(spectrogram.as_mut_slice());

        log::trace!(
            "[FeatureExtractor] {} raw frames -> {}x{}, log mean={:.3} std={:.3}",
            raw_count,
            N_FRAMES,
            N_MELS,
            mean,
            std
        );

        Some(spectrogram)
    }

    /// Mel energies for every complete window, before frame-count normalization
    pub fn mel_frames(&self, samples: &[f32]) -> Vec<MelFrame> {
        frames::sliding_windows(samples, FFT_SIZE, HOP_LENGTH)
            .map(|window| {
                self.mel_frame(window).unwrap_or_else(|| {
                    let total = self.degraded_frames.fetch_add(1, Ordering::Relaxed) + 1;
                    log::warn!(
                        "[FeatureExtractor] Degenerate Mel frame replaced with zeros (total {})",
                        total
                    );
                    vec![0.0; N_MELS]
                })
            })
            .collect()
    }

    /// Mel energies for one window
    ///
    /// Returns `None` when the result is not a finite, non-negative vector
    /// (e.g. NaN samples upstream).
    fn mel_frame(&self, window: &[f32]) -> Option<MelFrame> {
        let spectrum = self.fft_processor.compute_magnitude_spectrum(window);
        let energies = self.mel_bank.apply(&spectrum);

        let valid = energies.len() == N_MELS
            && energies.iter().all(|e| e.is_finite() && *e >= 0.0);
        valid.then_some(energies)
    }
}
