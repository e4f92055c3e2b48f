//! Recorded clips as mono PCM
//!
//! Microphone capture lives outside this crate; clips arrive either as
//! sample buffers from the host or as WAV files, decoded here with `hound`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

/// Mono float samples in `[-1, 1]` plus their rate
#[derive(Debug, Clone, PartialEq)]
pub struct Capture {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Capture {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// Decode a WAV file; multi-channel audio is averaged down to mono
    pub fn read_wav(path: &Path) -> Result<Self> {
        let mut reader =
            hound::WavReader::open(path).with_context(|| format!("opening {}", path.display()))?;
        let spec = reader.spec();
        let channels = usize::from(spec.channels.max(1));

        let interleaved = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .map(|sample| sample.map_err(|err| anyhow!(err)))
                .collect::<Result<Vec<f32>>>()?,
            hound::SampleFormat::Int => {
                let max = (1i64 << (spec.bits_per_sample - 1)) - 1;
                match spec.bits_per_sample {
                    8 | 16 | 24 | 32 => reader
                        .samples::<i32>()
                        .map(|sample| {
                            sample
                                .map(|value| value as f32 / max as f32)
                                .map_err(|err| anyhow!(err))
                        })
                        .collect::<Result<Vec<f32>>>()?,
                    other => {
                        return Err(anyhow!(
                            "Unsupported bits per sample {} in {}",
                            other,
                            path.display()
                        ))
                    }
                }
            }
        };

        let samples = if channels == 1 {
            interleaved
        } else {
            interleaved
                .chunks(channels)
                .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
                .collect()
        };

        log::debug!(
            "[Capture] Read {} ({} samples @ {} Hz, {} ch)",
            path.display(),
            samples.len(),
            spec.sample_rate,
            channels
        );
        Ok(Self::new(samples, spec.sample_rate))
    }

    /// Write as 32-bit float mono WAV
    pub fn write_wav(&self, path: &Path) -> Result<()> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(path, spec)
            .with_context(|| format!("creating {}", path.display()))?;
        for &sample in &self.samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
        Ok(())
    }
}

/// `.wav` files directly inside `dir`, sorted by path
pub fn wav_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let path = entry?.path();
        let is_wav = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));
        if path.is_file() && is_wav {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}
