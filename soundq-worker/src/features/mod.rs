//! Feature extraction
//!
//! Turns a decoded clip into one fixed-per-extractor feature vector. The
//! default [`MidTermExtractor`] computes 21 short-term features per frame,
//! summarizes them per mid-term segment as mean and standard deviation, then
//! averages the segments over the whole clip (42 values).

mod mfcc;
mod short_term;

use crate::audio_decoder::decode_audio_file;
use crate::error::{AssetError, ExtractionError};
use serde::{Deserialize, Serialize};
use short_term::FrameAnalyzer;
use std::path::Path;

const NUM_MEL_BANDS: usize = 40;
const NUM_MFCC: usize = 13;

/// Audio in, feature vector out
///
/// Implementations are pure CPU work and are called from the blocking pool.
pub trait FeatureExtractor: Send + Sync {
    /// Features for a mono signal
    fn extract(&self, samples: &[f32], sample_rate: u32) -> Result<Vec<f64>, ExtractionError>;

    /// Decode `path` (downmixed to mono) and extract
    fn extract_file(&self, path: &Path) -> Result<Vec<f64>, ExtractionError> {
        let decoded = decode_audio_file(path)?;
        self.extract(&decoded.samples, decoded.sample_rate)
    }
}

/// `[worker.extraction]` window parameters, in seconds
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ExtractionConfig {
    #[serde(default = "default_st_window")]
    pub st_window: f64,
    #[serde(default = "default_st_step")]
    pub st_step: f64,
    #[serde(default = "default_mt_window")]
    pub mt_window: f64,
    #[serde(default = "default_mt_step")]
    pub mt_step: f64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            st_window: default_st_window(),
            st_step: default_st_step(),
            mt_window: default_mt_window(),
            mt_step: default_mt_step(),
        }
    }
}

fn default_st_window() -> f64 {
    0.05
}

fn default_st_step() -> f64 {
    0.05
}

fn default_mt_window() -> f64 {
    1.0
}

fn default_mt_step() -> f64 {
    1.0
}

impl ExtractionConfig {
    pub fn validate(&self) -> Result<(), AssetError> {
        let params = [
            ("st_window", self.st_window),
            ("st_step", self.st_step),
            ("mt_window", self.mt_window),
            ("mt_step", self.mt_step),
        ];
        for (name, value) in params {
            if !value.is_finite() || value <= 0.0 {
                return Err(AssetError::Config(format!(
                    "extraction.{} must be a positive number of seconds, got {}",
                    name, value
                )));
            }
        }
        if self.mt_window < self.st_window {
            return Err(AssetError::Config(
                "extraction.mt_window must not be shorter than st_window".to_string(),
            ));
        }
        Ok(())
    }
}

/// Mid-term feature summary averaged over the clip
#[derive(Debug, Clone, Default)]
pub struct MidTermExtractor {
    config: ExtractionConfig,
}

impl MidTermExtractor {
    pub fn new(config: ExtractionConfig) -> Self {
        Self { config }
    }

    /// Length of every vector this extractor produces
    pub fn output_dim(&self) -> usize {
        2 * (short_term::NUM_SPECTRAL_FEATURES + NUM_MFCC)
    }
}

impl FeatureExtractor for MidTermExtractor {
    fn extract(&self, samples: &[f32], sample_rate: u32) -> Result<Vec<f64>, ExtractionError> {
        if samples.is_empty() {
            return Err(ExtractionError::EmptySignal);
        }
        if sample_rate == 0 {
            return Err(ExtractionError::InvalidSampleRate(sample_rate));
        }

        let fs = sample_rate as f64;
        let st_window = (self.config.st_window * fs).round() as usize;
        let st_step = ((self.config.st_step * fs).round() as usize).max(1);
        if st_window < 2 {
            return Err(ExtractionError::InvalidSampleRate(sample_rate));
        }
        if samples.len() < st_window {
            return Err(ExtractionError::TooShort {
                samples: samples.len(),
                required: st_window,
            });
        }

        let signal: Vec<f64> = samples.iter().map(|&s| s as f64).collect();
        let analyzer = FrameAnalyzer::new(st_window, sample_rate, NUM_MEL_BANDS, NUM_MFCC);
        let frames = analyzer.analyze(&signal, st_step);

        let mt_window = ((self.config.mt_window / self.config.st_step).round() as usize).max(1);
        let mt_step = ((self.config.mt_step / self.config.st_step).round() as usize).max(1);
        let segments = mid_term_segments(&frames, mt_window, mt_step);

        tracing::trace!(
            frames = frames.len(),
            segments = segments.len(),
            "Computed mid-term features"
        );

        Ok(column_mean(&segments, self.output_dim()))
    }
}

/// Mean and standard deviation of each feature per segment of frames
///
/// Segments start every `step` frames and span up to `window` frames; the
/// last ones may be shorter.
fn mid_term_segments(frames: &[Vec<f64>], window: usize, step: usize) -> Vec<Vec<f64>> {
    let mut segments = Vec::new();
    let mut start = 0;

    while start < frames.len() {
        let end = (start + window).min(frames.len());
        let segment = &frames[start..end];
        let width = segment[0].len();

        let mean = column_mean(segment, width);
        let std: Vec<f64> = (0..width)
            .map(|j| {
                let variance = segment
                    .iter()
                    .map(|row| (row[j] - mean[j]).powi(2))
                    .sum::<f64>()
                    / segment.len() as f64;
                variance.sqrt()
            })
            .collect();

        segments.push(mean.into_iter().chain(std).collect());
        start += step;
    }

    segments
}

fn column_mean(rows: &[Vec<f64>], width: usize) -> Vec<f64> {
    let mut sums = vec![0.0; width];
    for row in rows {
        for (sum, value) in sums.iter_mut().zip(row) {
            *sum += value;
        }
    }
    let count = rows.len().max(1) as f64;
    sums.into_iter().map(|s| s / count).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn tone(freq: f32, sample_rate: u32, seconds: f32) -> Vec<f32> {
        let len = (sample_rate as f32 * seconds) as usize;
        (0..len)
            .map(|i| 0.5 * (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_default_output_is_42_wide() {
        let extractor = MidTermExtractor::default();
        let features = extractor.extract(&tone(440.0, 8000, 2.5), 8000).unwrap();

        assert_eq!(extractor.output_dim(), 42);
        assert_eq!(features.len(), 42);
        assert!(features.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_clip_shorter_than_mid_term_window() {
        // Half a second still yields one (short) segment
        let features = MidTermExtractor::default()
            .extract(&tone(440.0, 8000, 0.5), 8000)
            .unwrap();
        assert_eq!(features.len(), 42);
    }

    #[test]
    fn test_empty_signal() {
        let result = MidTermExtractor::default().extract(&[], 8000);
        assert!(matches!(result, Err(ExtractionError::EmptySignal)));
    }

    #[test]
    fn test_shorter_than_one_frame() {
        // 0.05 s at 8 kHz is 400 samples
        let result = MidTermExtractor::default().extract(&[0.1; 100], 8000);
        assert!(matches!(
            result,
            Err(ExtractionError::TooShort {
                samples: 100,
                required: 400
            })
        ));
    }

    #[test]
    fn test_zero_sample_rate() {
        let result = MidTermExtractor::default().extract(&[0.1; 100], 0);
        assert!(matches!(result, Err(ExtractionError::InvalidSampleRate(0))));
    }

    #[test]
    fn test_different_tones_give_different_features() {
        let extractor = MidTermExtractor::default();
        let low = extractor.extract(&tone(200.0, 8000, 1.0), 8000).unwrap();
        let high = extractor.extract(&tone(3000.0, 8000, 1.0), 8000).unwrap();
        assert_ne!(low, high);
        // mean zero-crossing rate
        assert!(high[0] > low[0]);
    }

    #[test]
    fn test_mid_term_segments_mean_and_std() {
        let frames = vec![vec![1.0], vec![3.0], vec![5.0]];
        let segments = mid_term_segments(&frames, 2, 2);

        assert_eq!(segments, vec![vec![2.0, 1.0], vec![5.0, 0.0]]);
        assert_eq!(column_mean(&segments, 2), vec![3.5, 0.5]);
    }

    #[test]
    fn test_config_validation() {
        assert!(ExtractionConfig::default().validate().is_ok());

        let negative = ExtractionConfig {
            st_step: -0.1,
            ..Default::default()
        };
        assert!(matches!(negative.validate(), Err(AssetError::Config(_))));

        let inverted = ExtractionConfig {
            mt_window: 0.01,
            ..Default::default()
        };
        assert!(inverted.validate().is_err());
    }
}
