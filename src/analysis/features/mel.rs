// Mel module - triangular Mel filter bank
//
// Converts a linear magnitude spectrum into `n_mels` perceptually spaced
// band energies. Filters use the HTK Mel scale and are laid out between
// 0 Hz and the Nyquist frequency with unit peak height.

/// Convert frequency in Hz to the HTK Mel scale
pub fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

/// Convert a Mel value back to Hz
pub fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10f32.powf(mel / 2595.0) - 1.0)
}

/// One triangular filter stored sparsely over the bins it covers
#[derive(Debug, Clone)]
struct MelFilter {
    start_bin: usize,
    weights: Vec<f32>,
}

/// Bank of `n_mels` triangular filters over an FFT magnitude spectrum
#[derive(Debug, Clone)]
pub struct MelFilterBank {
    filters: Vec<MelFilter>,
    spectrum_len: usize,
}

impl MelFilterBank {
    /// Build the filter bank
    ///
    /// # Arguments
    /// * `sample_rate` - Audio sample rate in Hz
    /// * `fft_size` - FFT length the spectra were computed with
    /// * `n_mels` - Number of Mel bands
    pub fn new(sample_rate: u32, fft_size: usize, n_mels: usize) -> Self {
        let spectrum_len = fft_size / 2 + 1;
        let nyquist = sample_rate as f32 / 2.0;
        let mel_max = hz_to_mel(nyquist);

        // n_mels + 2 edges: each filter spans edges[m]..edges[m + 2]
        let edges: Vec<f32> = (0..n_mels + 2)
            .map(|i| mel_to_hz(mel_max * i as f32 / (n_mels + 1) as f32))
            .collect();

        let bin_hz = sample_rate as f32 / fft_size as f32;

        let filters = (0..n_mels)
            .map(|m| {
                let (lower, center, upper) = (edges[m], edges[m + 1], edges[m + 2]);
                let start_bin = ((lower / bin_hz).ceil() as usize).min(spectrum_len);
                let end_bin = ((upper / bin_hz).floor() as usize + 1).min(spectrum_len);

                let weights = (start_bin..end_bin.max(start_bin))
                    .map(|bin| {
                        let freq = bin as f32 * bin_hz;
                        let rising = (freq - lower) / (center - lower);
                        let falling = (upper - freq) / (upper - center);
                        rising.min(falling).max(0.0)
                    })
                    .collect();

                MelFilter { start_bin, weights }
            })
            .collect();

        Self {
            filters,
            spectrum_len,
        }
    }

    pub fn n_mels(&self) -> usize {
        self.filters.len()
    }

    /// Expected magnitude spectrum length
    pub fn spectrum_len(&self) -> usize {
        self.spectrum_len
    }

    /// Apply the filter bank to one magnitude spectrum
    ///
    /// Bins beyond the end of `spectrum` contribute nothing.
    pub fn apply(&self, spectrum: &[f32]) -> Vec<f32> {
        self.filters
            .iter()
            .map(|filter| {
                spectrum
                    .iter()
                    .skip(filter.start_bin)
                    .zip(&filter.weights)
                    .map(|(magnitude, weight)| magnitude * weight)
                    .sum()
            })
            .collect()
    }
}
