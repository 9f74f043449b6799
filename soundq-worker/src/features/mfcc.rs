//! Mel-frequency cepstral coefficients
//!
//! Triangular mel filter bank over the magnitude spectrum, log10 of the band
//! energies, then an orthonormal DCT-II keeping the first coefficients.

use std::f64::consts::PI;

const EPS: f64 = 1e-8;

pub struct MfccBank {
    /// One weight row per mel band, `spectrum_len` weights each
    filters: Vec<Vec<f64>>,
    /// `num_coefficients` x `num_bands` DCT-II matrix (orthonormal)
    dct: Vec<Vec<f64>>,
}

impl MfccBank {
    /// Build a bank for spectra of `spectrum_len` bins spanning 0..sample_rate/2
    pub fn new(
        sample_rate: u32,
        spectrum_len: usize,
        num_bands: usize,
        num_coefficients: usize,
    ) -> Self {
        Self {
            filters: mel_filters(sample_rate, spectrum_len, num_bands),
            dct: dct_matrix(num_bands, num_coefficients.min(num_bands)),
        }
    }

    pub fn num_coefficients(&self) -> usize {
        self.dct.len()
    }

    /// Cepstral coefficients for one magnitude spectrum
    pub fn coefficients(&self, magnitude: &[f64]) -> Vec<f64> {
        let log_energies: Vec<f64> = self
            .filters
            .iter()
            .map(|filter| {
                let energy: f64 = filter
                    .iter()
                    .zip(magnitude)
                    .map(|(weight, value)| weight * value)
                    .sum();
                (energy + EPS).log10()
            })
            .collect();

        self.dct
            .iter()
            .map(|row| row.iter().zip(&log_energies).map(|(c, e)| c * e).sum())
            .collect()
    }
}

fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10f64.powf(mel / 2595.0) - 1.0)
}

/// Triangular filters with mel-spaced centers
///
/// Bin `k` of the spectrum sits at `k * (sample_rate / 2) / spectrum_len` Hz.
fn mel_filters(sample_rate: u32, spectrum_len: usize, num_bands: usize) -> Vec<Vec<f64>> {
    let nyquist = sample_rate as f64 / 2.0;
    let mel_max = hz_to_mel(nyquist);
    let bin_hz = nyquist / spectrum_len.max(1) as f64;

    let edges_hz: Vec<f64> = (0..num_bands + 2)
        .map(|i| mel_to_hz(mel_max * i as f64 / (num_bands + 1) as f64))
        .collect();

    (0..num_bands)
        .map(|band| {
            let (left, center, right) = (edges_hz[band], edges_hz[band + 1], edges_hz[band + 2]);
            (0..spectrum_len)
                .map(|k| {
                    let freq = k as f64 * bin_hz;
                    if freq > left && freq <= center && center > left {
                        (freq - left) / (center - left)
                    } else if freq > center && freq < right && right > center {
                        (right - freq) / (right - center)
                    } else {
                        0.0
                    }
                })
                .collect()
        })
        .collect()
}

fn dct_matrix(num_inputs: usize, num_outputs: usize) -> Vec<Vec<f64>> {
    let n = num_inputs as f64;
    (0..num_outputs)
        .map(|k| {
            let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
            (0..num_inputs)
                .map(|i| scale * (PI * k as f64 * (2.0 * i as f64 + 1.0) / (2.0 * n)).cos())
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mel_roundtrip() {
        for hz in [0.0, 440.0, 4000.0, 11025.0] {
            assert!((mel_to_hz(hz_to_mel(hz)) - hz).abs() < 1e-6);
        }
    }

    #[test]
    fn test_filters_are_triangular_and_bounded() {
        let filters = mel_filters(16000, 400, 40);
        assert_eq!(filters.len(), 40);
        for filter in &filters {
            assert_eq!(filter.len(), 400);
            assert!(filter.iter().all(|&w| (0.0..=1.0).contains(&w)));
        }
        // Upper bands cover some bins
        assert!(filters[39].iter().any(|&w| w > 0.0));
    }

    #[test]
    fn test_dct_rows_are_orthonormal() {
        let dct = dct_matrix(8, 8);
        for a in 0..8 {
            for b in 0..8 {
                let dot: f64 = dct[a].iter().zip(&dct[b]).map(|(x, y)| x * y).sum();
                let expected = if a == b { 1.0 } else { 0.0 };
                assert!((dot - expected).abs() < 1e-9, "rows {a},{b}: {dot}");
            }
        }
    }

    #[test]
    fn test_flat_spectrum_concentrates_in_first_coefficient() {
        let bank = MfccBank::new(16000, 400, 40, 13);
        assert_eq!(bank.num_coefficients(), 13);

        let silent = bank.coefficients(&vec![0.0; 400]);
        // log10(eps) on every band: only the DC coefficient is non-zero
        assert!(silent[0] < 0.0);
        assert!(silent[1..].iter().all(|c| c.abs() < 1e-9));
    }
}
