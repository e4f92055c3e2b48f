// Frames module - windowing and matrix normalization
//
// Pure helpers for the steps around the spectral transform:
// - slicing the signal into overlapping windows
// - forcing the frame sequence to a fixed length
// - log compression and global z-score standardization

use super::types::MelFrame;

/// Floor applied before the natural log
pub const LOG_FLOOR: f32 = 1e-10;

/// Added to the standard deviation before dividing
pub const STD_EPSILON: f32 = 1e-8;

/// Number of complete windows of `window` samples at stride `hop`
///
/// Zero when the signal is shorter than one window.
pub fn frame_count(len: usize, window: usize, hop: usize) -> usize {
    if window == 0 || hop == 0 || len < window {
        return 0;
    }
    (len - window) / hop + 1
}

/// Iterate over the complete windows of `samples`
pub fn sliding_windows(samples: &[f32], window: usize, hop: usize) -> impl Iterator<Item = &[f32]> {
    (0..frame_count(samples.len(), window, hop)).map(move |i| &samples[i * hop..i * hop + window])
}

/// Source frame indices kept when down-sampling `len` frames to `target`
///
/// `floor(i * len / target)` for `i in 0..target`. Strictly increasing
/// whenever `len >= target`.
pub fn downsample_indices(len: usize, target: usize) -> Vec<usize> {
    (0..target).map(|i| i * len / target).collect()
}

/// Force a frame sequence to exactly `target` frames
///
/// - longer: strided pick via `downsample_indices`
/// - shorter: cyclic repetition from the start, last cycle truncated
/// - equal: returned unchanged
///
/// An empty input stays empty; there is nothing to repeat.
pub fn normalize_frame_count(frames: Vec<MelFrame>, target: usize) -> Vec<MelFrame> {
    let len = frames.len();
    if len == target || len == 0 {
        return frames;
    }

    if len > target {
        downsample_indices(len, target)
            .into_iter()
            .map(|index| frames[index].clone())
            .collect()
    } else {
        frames.iter().cycle().take(target).cloned().collect()
    }
}

/// Element-wise `ln(max(x, LOG_FLOOR))`
pub fn log_compress(values: &mut [f32]) {
    for value in values.iter_mut() {
        *value = value.max(LOG_FLOOR).ln();
    }
}

/// Standardize with one mean and one standard deviation over all cells
///
/// Uses the population standard deviation. Returns the `(mean, std)` used.
pub fn standardize(values: &mut [f32]) -> (f32, f32) {
    if values.is_empty() {
        return (0.0, 0.0);
    }

    let count = values.len() as f64;
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / count;
    let variance = values
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / count;
    let (mean, std) = (mean as f32, variance.sqrt() as f32);

    for value in values.iter_mut() {
        *value = (*value - mean) / (std + STD_EPSILON);
    }

    (mean, std)
}
