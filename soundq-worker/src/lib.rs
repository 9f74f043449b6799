//! soundq-worker library interface
//!
//! Feature extraction, normalization, classification and the worker loop
//! that ties them to the job queue and result store. Exposed as a library for
//! the binary and for integration tests.

pub mod assets;
pub mod audio_decoder;
pub mod classifier;
pub mod config;
pub mod error;
pub mod features;
pub mod normalizer;
pub mod pipeline;
pub mod worker;

pub use crate::assets::InferenceAssets;
pub use crate::classifier::{Classification, Classifier, LabelMap, Predictor, RawPrediction};
pub use crate::config::WorkerConfig;
pub use crate::error::{AssetError, ExtractionError, JobError, NormalizationError, PredictionError};
pub use crate::features::{ExtractionConfig, FeatureExtractor, MidTermExtractor};
pub use crate::normalizer::{normalize, Normalizer};
pub use crate::pipeline::InferencePipeline;
pub use crate::worker::{
    run_workers, CleanupOutcome, Iteration, JobReport, JobStage, WorkerLoop, WorkerSettings,
};

/// Name of the `[worker]` section in the config file
pub const CONFIG_SECTION: &str = "worker";
