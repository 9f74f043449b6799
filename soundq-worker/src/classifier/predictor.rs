//! Predictor capability
//!
//! The worker treats the trained model as an opaque value that can produce a
//! class prediction and, optionally, a probability distribution.

use crate::error::PredictionError;

/// Raw model output before label resolution
#[derive(Debug, Clone, PartialEq)]
pub enum RawPrediction {
    /// Class index (possibly fractional, resolved by rounding)
    Numeric(f64),
    /// Class label produced by the model itself
    Label(String),
}

pub trait Predictor: Send + Sync {
    /// Short name for logs (`nearest_centroid`, `decision_forest`, ...)
    fn kind(&self) -> &'static str;

    /// Feature vector length the model was trained on
    fn input_dim(&self) -> usize;

    fn predict(&self, features: &[f64]) -> Result<RawPrediction, PredictionError>;

    /// Whether `predict` returns class names instead of indices, so no label
    /// map is needed to resolve them
    fn emits_labels(&self) -> bool {
        false
    }

    /// Class probabilities, `None` when the model has no probability estimate
    fn predict_proba(&self, features: &[f64]) -> Result<Option<Vec<f64>>, PredictionError> {
        let _ = features;
        Ok(None)
    }
}

/// Reject vectors of the wrong length before touching model parameters
pub(crate) fn check_input(expected: usize, features: &[f64]) -> Result<(), PredictionError> {
    if features.len() != expected {
        return Err(PredictionError::DimensionMismatch {
            expected,
            actual: features.len(),
        });
    }
    Ok(())
}
