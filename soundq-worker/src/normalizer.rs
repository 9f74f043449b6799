//! Fixed-width feature normalization
//!
//! Every raw feature vector is coerced to exactly `target_dim` values before
//! it reaches the classifier: zero-padded on the right when short, truncated
//! from the right when long. The mean vector is then subtracted element-wise.

use crate::error::NormalizationError;
use std::sync::Arc;

/// Pad/truncate `raw` to `target_dim`, then subtract `mean`
pub fn normalize(
    raw: &[f64],
    target_dim: usize,
    mean: &[f64],
) -> Result<Vec<f64>, NormalizationError> {
    check_dimensions(target_dim, mean)?;
    Ok(coerce_and_center(raw, target_dim, mean))
}

fn check_dimensions(target_dim: usize, mean: &[f64]) -> Result<(), NormalizationError> {
    if target_dim == 0 {
        return Err(NormalizationError::ZeroDimension);
    }
    if mean.len() != target_dim {
        return Err(NormalizationError::MeanDimensionMismatch {
            expected: target_dim,
            actual: mean.len(),
        });
    }
    Ok(())
}

fn coerce_and_center(raw: &[f64], target_dim: usize, mean: &[f64]) -> Vec<f64> {
    raw.iter()
        .copied()
        .chain(std::iter::repeat(0.0))
        .take(target_dim)
        .zip(mean)
        .map(|(value, m)| value - m)
        .collect()
}

/// Validated target dimension plus mean vector
///
/// Dimensions are checked once in [`Normalizer::new`]; [`Normalizer::apply`]
/// cannot fail afterwards.
#[derive(Debug, Clone)]
pub struct Normalizer {
    target_dim: usize,
    mean: Arc<[f64]>,
}

impl Normalizer {
    pub fn new(target_dim: usize, mean: Vec<f64>) -> Result<Self, NormalizationError> {
        check_dimensions(target_dim, &mean)?;
        Ok(Self {
            target_dim,
            mean: mean.into(),
        })
    }

    /// All-zero mean vector
    pub fn zero_mean(target_dim: usize) -> Result<Self, NormalizationError> {
        Self::new(target_dim, vec![0.0; target_dim])
    }

    pub fn target_dim(&self) -> usize {
        self.target_dim
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn apply(&self, raw: &[f64]) -> Vec<f64> {
        coerce_and_center(raw, self.target_dim, &self.mean)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pads_short_vector() {
        let normalized = normalize(&[0.1, 0.2], 4, &[0.0; 4]).unwrap();
        assert_eq!(normalized, vec![0.1, 0.2, 0.0, 0.0]);
    }

    #[test]
    fn test_truncates_long_vector_then_subtracts_mean() {
        let raw = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let mean = [0.5, 0.5, 1.0, 1.0];
        let normalized = normalize(&raw, 4, &mean).unwrap();
        assert_eq!(normalized, vec![0.5, 1.5, 2.0, 3.0]);
    }

    #[test]
    fn test_exact_length_passes_through() {
        let raw = [3.0, -1.0, 0.25];
        assert_eq!(normalize(&raw, 3, &[0.0; 3]).unwrap(), raw.to_vec());
    }

    #[test]
    fn test_empty_raw_vector_is_negated_mean() {
        let normalized = normalize(&[], 3, &[1.0, -2.0, 0.0]).unwrap();
        assert_eq!(normalized, vec![-1.0, 2.0, 0.0]);
    }

    #[test]
    fn test_projection_is_stable_with_zero_mean() {
        let once = normalize(&[1.0, 2.0, 3.0, 4.0, 5.0], 3, &[0.0; 3]).unwrap();
        let twice = normalize(&once, 3, &[0.0; 3]).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_repeated_calls_give_identical_output() {
        let raw = [0.3, -1.7, 2.25, 9.0, 4.5];
        let mean = [0.1, -0.4, 1.5, 2.0];
        for input in [&raw[..2], &raw[..]] {
            let first = normalize(input, 4, &mean).unwrap();
            let second = normalize(input, 4, &mean).unwrap();
            assert_eq!(first, second);
        }

        let normalizer = Normalizer::new(4, mean.to_vec()).unwrap();
        assert_eq!(normalizer.apply(&raw), normalizer.apply(&raw));
    }

    #[test]
    fn test_dimension_errors() {
        assert_eq!(
            normalize(&[1.0], 4, &[0.0; 3]),
            Err(NormalizationError::MeanDimensionMismatch {
                expected: 4,
                actual: 3
            })
        );
        assert_eq!(
            Normalizer::new(0, vec![]).unwrap_err(),
            NormalizationError::ZeroDimension
        );
    }

    #[test]
    fn test_normalizer_matches_function() {
        let normalizer = Normalizer::new(4, vec![0.1, 0.1, 0.1, 0.1]).unwrap();
        let raw = [1.0, 2.0];
        assert_eq!(normalizer.apply(&raw), normalize(&raw, 4, normalizer.mean()).unwrap());
        assert_eq!(normalizer.target_dim(), 4);
        assert_eq!(Normalizer::zero_mean(2).unwrap().apply(&[7.0]), vec![7.0, 0.0]);
    }
}
