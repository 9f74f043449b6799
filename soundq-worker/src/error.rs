//! Error types for soundq-worker
//!
//! Per-job errors ([`ExtractionError`], [`PredictionError`], wrapped in
//! [`JobError`]) end up as an `error` job result and never stop the worker.
//! Startup errors ([`NormalizationError`], [`AssetError`]) keep the worker
//! from starting at all.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Audio could not be turned into a feature vector
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Artifact missing or unreadable
    #[error("Failed to open audio file {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Container/codec problem
    #[error("Audio decoding error: {0}")]
    Decode(String),

    /// Zero-length signal
    #[error("Audio signal is empty")]
    EmptySignal,

    /// Shorter than one analysis window
    #[error("Audio signal too short: {samples} samples, need at least {required}")]
    TooShort { samples: usize, required: usize },

    #[error("Invalid sample rate: {0} Hz")]
    InvalidSampleRate(u32),

    /// Extractor produced NaN or infinity
    #[error("Feature vector contains a non-finite value at index {0}")]
    NonFinite(usize),
}

/// The predictor failed or returned something unusable
#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("Feature dimension mismatch: model expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Predictor returned unusable output: {0}")]
    InvalidOutput(String),

    #[error("Predictor failed: {0}")]
    Failed(String),
}

/// Mean vector and target dimension disagree (configuration error)
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizationError {
    #[error("Target dimension must be greater than zero")]
    ZeroDimension,

    #[error("Mean vector has {actual} elements but target dimension is {expected}")]
    MeanDimensionMismatch { expected: usize, actual: usize },
}

/// Why a single job ended in an `error` result
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Feature extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Classification failed: {0}")]
    Prediction(#[from] PredictionError),

    #[error("Processing timed out after {0:?}")]
    Timeout(Duration),

    /// Inference task panicked or was aborted
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Inference assets could not be loaded (fatal at startup)
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Normalization(#[from] NormalizationError),

    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("Invalid worker configuration: {0}")]
    Config(String),
}
