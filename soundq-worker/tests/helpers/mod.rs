//! Shared fixtures for worker integration tests

#![allow(dead_code)]

use soundq_worker::{
    Classifier, ExtractionError, FeatureExtractor, InferenceAssets, InferencePipeline, LabelMap,
    Normalizer, PredictionError, Predictor, RawPrediction,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub fn motor_labels() -> LabelMap {
    LabelMap::new(
        ["fan", "gearbox", "pump", "valve"]
            .into_iter()
            .map(String::from)
            .collect(),
    )
}

/// Write a mono 16-bit sine WAV
pub fn write_tone_wav(path: &Path, freq: f64, sample_rate: u32, seconds: f64) -> PathBuf {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    let total = (seconds * sample_rate as f64) as usize;
    for i in 0..total {
        let t = i as f64 / sample_rate as f64;
        let sample = (2.0 * std::f64::consts::PI * freq * t).sin() * 0.5;
        writer.write_sample((sample * i16::MAX as f64) as i16).unwrap();
    }
    writer.finalize().unwrap();
    path.to_path_buf()
}

/// Write a WAV header with no samples
pub fn write_empty_wav(path: &Path) -> PathBuf {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 8000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    hound::WavWriter::create(path, spec).unwrap().finalize().unwrap();
    path.to_path_buf()
}

/// Returns a fixed vector for any file that exists
pub struct FixedFeatures {
    pub features: Vec<f64>,
    pub delay: Option<Duration>,
}

impl FixedFeatures {
    pub fn new(features: Vec<f64>) -> Self {
        Self {
            features,
            delay: None,
        }
    }

    pub fn slow(features: Vec<f64>, delay: Duration) -> Self {
        Self {
            features,
            delay: Some(delay),
        }
    }
}

impl FeatureExtractor for FixedFeatures {
    fn extract(&self, _samples: &[f32], _sample_rate: u32) -> Result<Vec<f64>, ExtractionError> {
        Ok(self.features.clone())
    }

    fn extract_file(&self, path: &Path) -> Result<Vec<f64>, ExtractionError> {
        std::fs::metadata(path).map_err(|source| ExtractionError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        Ok(self.features.clone())
    }
}

pub enum Behavior {
    Numeric(f64),
    Label(&'static str),
    Fail(&'static str),
    Panic,
}

/// Predictor with scripted output and no probability estimate
pub struct ScriptedPredictor {
    pub input_dim: usize,
    pub behavior: Behavior,
}

impl Predictor for ScriptedPredictor {
    fn kind(&self) -> &'static str {
        "scripted"
    }

    fn input_dim(&self) -> usize {
        self.input_dim
    }

    fn predict(&self, _features: &[f64]) -> Result<RawPrediction, PredictionError> {
        match &self.behavior {
            Behavior::Numeric(value) => Ok(RawPrediction::Numeric(*value)),
            Behavior::Label(label) => Ok(RawPrediction::Label(label.to_string())),
            Behavior::Fail(message) => Err(PredictionError::Failed(message.to_string())),
            Behavior::Panic => panic!("scripted predictor panic"),
        }
    }
}

pub fn pipeline(
    target_dim: usize,
    extractor: impl FeatureExtractor + 'static,
    behavior: Behavior,
) -> Arc<InferencePipeline> {
    let predictor = ScriptedPredictor {
        input_dim: target_dim,
        behavior,
    };
    let assets = InferenceAssets::new(
        Normalizer::zero_mean(target_dim).unwrap(),
        Classifier::new(Arc::new(predictor), motor_labels()),
    )
    .unwrap();
    Arc::new(InferencePipeline::new(Arc::new(assets), Arc::new(extractor)))
}
