//! Classification: predictor output → (label, confidence)
//!
//! Label policy:
//! - numeric prediction → rounded to the nearest integer → label map index;
//!   an index outside the map (or a non-finite value) is reported verbatim
//! - string prediction that reads as a number → same as numeric, falling back
//!   to the original string
//! - any other string → used directly
//!
//! Confidence policy: the maximum class probability, clamped to [0, 1] and
//! rounded to 4 decimals; exactly 1.0 when the predictor has no probability
//! estimate.

mod models;
mod predictor;

pub use models::{load_model, DecisionForest, LinearSoftmax, ModelSpec, NearestCentroid, TreeNode};
pub use predictor::{Predictor, RawPrediction};

use crate::error::PredictionError;
use serde::Serialize;
use soundq_common::JobResult;
use std::sync::Arc;

/// Ordered class labels, index `i` names class `i`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelMap {
    labels: Vec<String>,
}

impl LabelMap {
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    /// Label for a raw prediction (see module docs)
    pub fn resolve(&self, prediction: &RawPrediction) -> String {
        match prediction {
            RawPrediction::Numeric(value) => self
                .lookup(*value)
                .unwrap_or_else(|| format!("{:?}", value)),
            RawPrediction::Label(label) => label
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(|value| self.lookup(value))
                .unwrap_or_else(|| label.clone()),
        }
    }

    fn lookup(&self, value: f64) -> Option<String> {
        if !value.is_finite() {
            return None;
        }
        let index = value.round();
        if index < 0.0 || index >= self.labels.len() as f64 {
            return None;
        }
        self.get(index as usize).map(String::from)
    }
}

impl From<Vec<String>> for LabelMap {
    fn from(labels: Vec<String>) -> Self {
        Self::new(labels)
    }
}

/// Outcome of a successful classification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub label: String,
    pub confidence: f64,
}

impl From<Classification> for JobResult {
    fn from(classification: Classification) -> Self {
        JobResult::completed(classification.label, classification.confidence)
    }
}

/// Predictor plus label map
#[derive(Clone)]
pub struct Classifier {
    predictor: Arc<dyn Predictor>,
    labels: LabelMap,
}

impl Classifier {
    pub fn new(predictor: Arc<dyn Predictor>, labels: LabelMap) -> Self {
        Self { predictor, labels }
    }

    pub fn predictor(&self) -> &dyn Predictor {
        self.predictor.as_ref()
    }

    pub fn labels(&self) -> &LabelMap {
        &self.labels
    }

    /// Classify one normalized feature vector
    pub fn classify(&self, features: &[f64]) -> Result<Classification, PredictionError> {
        let prediction = self.predictor.predict(features)?;
        let confidence = match self.predictor.predict_proba(features)? {
            Some(probabilities) => confidence_from(&probabilities)?,
            None => 1.0,
        };

        Ok(Classification {
            label: self.labels.resolve(&prediction),
            confidence,
        })
    }
}

impl std::fmt::Debug for Classifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Classifier")
            .field("predictor", &self.predictor.kind())
            .field("labels", &self.labels)
            .finish()
    }
}

fn confidence_from(probabilities: &[f64]) -> Result<f64, PredictionError> {
    if probabilities.is_empty() {
        return Err(PredictionError::InvalidOutput(
            "empty probability distribution".to_string(),
        ));
    }
    if let Some(index) = probabilities.iter().position(|p| !p.is_finite()) {
        return Err(PredictionError::InvalidOutput(format!(
            "probability at index {} is not finite",
            index
        )));
    }
    let max = probabilities
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    Ok(round4(max.clamp(0.0, 1.0)))
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
