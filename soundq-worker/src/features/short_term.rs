//! Short-term (per-frame) features
//!
//! Features per frame, in output order:
//! 0. zero-crossing rate
//! 1. energy
//! 2. energy entropy
//! 3. spectral centroid (normalized by Nyquist)
//! 4. spectral spread (normalized by Nyquist)
//! 5. spectral entropy
//! 6. spectral flux
//! 7. spectral rolloff (90%, as a fraction of the spectrum)
//! 8.. MFCCs

use super::mfcc::MfccBank;
use realfft::{RealFftPlanner, RealToComplex};
use std::sync::Arc;

const EPS: f64 = 1e-8;
const SUB_BLOCKS: usize = 10;
const ROLLOFF_FRACTION: f64 = 0.90;

/// Features that do not come from the MFCC bank
pub const NUM_SPECTRAL_FEATURES: usize = 8;

/// Computes one feature row per frame
pub struct FrameAnalyzer {
    frame_len: usize,
    sample_rate: u32,
    fft: Arc<dyn RealToComplex<f64>>,
    mfcc: MfccBank,
}

impl FrameAnalyzer {
    pub fn new(frame_len: usize, sample_rate: u32, num_mel_bands: usize, num_mfcc: usize) -> Self {
        let mut planner = RealFftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(frame_len);
        Self {
            frame_len,
            sample_rate,
            fft,
            mfcc: MfccBank::new(sample_rate, frame_len / 2, num_mel_bands, num_mfcc),
        }
    }

    pub fn num_features(&self) -> usize {
        NUM_SPECTRAL_FEATURES + self.mfcc.num_coefficients()
    }

    /// Feature matrix, one row per frame
    ///
    /// Frames start every `step` samples; only full frames are analyzed.
    /// The signal is DC-removed and peak-normalized first.
    pub fn analyze(&self, signal: &[f64], step: usize) -> Vec<Vec<f64>> {
        let signal = normalize_signal(signal);
        let num_bins = self.frame_len / 2;
        let mut input = self.fft.make_input_vec();
        let mut spectrum = self.fft.make_output_vec();
        let mut previous: Option<Vec<f64>> = None;
        let mut rows = Vec::new();

        let mut start = 0;
        while start + self.frame_len <= signal.len() {
            let frame = &signal[start..start + self.frame_len];
            input.copy_from_slice(frame);

            let magnitude: Vec<f64> = match self.fft.process(&mut input, &mut spectrum) {
                Ok(()) => spectrum[..num_bins]
                    .iter()
                    .map(|c| c.norm() / num_bins as f64)
                    .collect(),
                Err(e) => {
                    tracing::warn!(error = %e, "FFT failed for frame, using empty spectrum");
                    vec![0.0; num_bins]
                }
            };
            let prev = previous.as_deref().unwrap_or(&magnitude);

            let (centroid, spread) = spectral_centroid_spread(&magnitude, self.sample_rate);
            let mut row = Vec::with_capacity(self.num_features());
            row.push(zero_crossing_rate(frame));
            row.push(energy(frame));
            row.push(energy_entropy(frame));
            row.push(centroid);
            row.push(spread);
            row.push(spectral_entropy(&magnitude));
            row.push(spectral_flux(&magnitude, prev));
            row.push(spectral_rolloff(&magnitude));
            row.extend(self.mfcc.coefficients(&magnitude));

            rows.push(row);
            previous = Some(magnitude);
            start += step;
        }

        rows
    }
}

/// Remove DC offset and scale to peak 1
fn normalize_signal(signal: &[f64]) -> Vec<f64> {
    if signal.is_empty() {
        return Vec::new();
    }
    let dc = signal.iter().sum::<f64>() / signal.len() as f64;
    let peak = signal.iter().fold(0.0f64, |m, &s| m.max(s.abs()));
    signal.iter().map(|&s| (s - dc) / (peak + 1e-10)).collect()
}

fn zero_crossing_rate(frame: &[f64]) -> f64 {
    if frame.len() < 2 {
        return 0.0;
    }
    let crossings = frame
        .windows(2)
        .filter(|w| sign(w[0]) != sign(w[1]))
        .count();
    crossings as f64 / (frame.len() - 1) as f64
}

fn sign(x: f64) -> i8 {
    if x > 0.0 {
        1
    } else if x < 0.0 {
        -1
    } else {
        0
    }
}

fn energy(frame: &[f64]) -> f64 {
    frame.iter().map(|s| s * s).sum::<f64>() / frame.len().max(1) as f64
}

/// Entropy of the energy distribution across equal sub-blocks
fn block_entropy(values: &[f64]) -> f64 {
    let block_len = values.len() / SUB_BLOCKS;
    if block_len == 0 {
        return 0.0;
    }
    let total: f64 = values.iter().map(|v| v * v).sum();

    values
        .chunks_exact(block_len)
        .take(SUB_BLOCKS)
        .map(|block| {
            let share = block.iter().map(|v| v * v).sum::<f64>() / (total + EPS);
            -share * (share + EPS).log2()
        })
        .sum()
}

fn energy_entropy(frame: &[f64]) -> f64 {
    block_entropy(frame)
}

fn spectral_entropy(magnitude: &[f64]) -> f64 {
    block_entropy(magnitude)
}

fn spectral_centroid_spread(magnitude: &[f64], sample_rate: u32) -> (f64, f64) {
    let nyquist = sample_rate as f64 / 2.0;
    let peak = magnitude.iter().fold(0.0f64, |m, &v| m.max(v));
    if peak <= 0.0 || magnitude.is_empty() {
        return (0.0, 0.0);
    }

    let bin_hz = nyquist / magnitude.len() as f64;
    let weights: Vec<f64> = magnitude.iter().map(|v| v / peak).collect();
    let denominator = weights.iter().sum::<f64>() + EPS;

    let centroid = weights
        .iter()
        .enumerate()
        .map(|(k, w)| (k + 1) as f64 * bin_hz * w)
        .sum::<f64>()
        / denominator;
    let spread = (weights
        .iter()
        .enumerate()
        .map(|(k, w)| ((k + 1) as f64 * bin_hz - centroid).powi(2) * w)
        .sum::<f64>()
        / denominator)
        .sqrt();

    (centroid / nyquist, spread / nyquist)
}

fn spectral_flux(magnitude: &[f64], previous: &[f64]) -> f64 {
    let sum = magnitude.iter().sum::<f64>() + EPS;
    let prev_sum = previous.iter().sum::<f64>() + EPS;
    magnitude
        .iter()
        .zip(previous)
        .map(|(x, p)| (x / sum - p / prev_sum).powi(2))
        .sum()
}

fn spectral_rolloff(magnitude: &[f64]) -> f64 {
    let total: f64 = magnitude.iter().map(|v| v * v).sum();
    let threshold = ROLLOFF_FRACTION * total;

    let mut cumulative = EPS;
    for (k, v) in magnitude.iter().enumerate() {
        cumulative += v * v;
        if cumulative > threshold {
            return k as f64 / magnitude.len() as f64;
        }
    }
    0.0
}
