//! Extract → normalize → classify for one artifact
//!
//! Synchronous CPU work; the worker loop runs it on the blocking thread pool.

use crate::assets::InferenceAssets;
use crate::classifier::Classification;
use crate::error::{ExtractionError, JobError};
use crate::features::FeatureExtractor;
use crate::worker::JobStage;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct InferencePipeline {
    assets: Arc<InferenceAssets>,
    extractor: Arc<dyn FeatureExtractor>,
}

impl InferencePipeline {
    pub fn new(assets: Arc<InferenceAssets>, extractor: Arc<dyn FeatureExtractor>) -> Self {
        Self { assets, extractor }
    }

    pub fn assets(&self) -> &InferenceAssets {
        &self.assets
    }

    /// Classify the audio file at `path`
    ///
    /// Stages run strictly in order and the first failure ends the job.
    pub fn run(&self, job_id: &str, path: &Path) -> Result<Classification, JobError> {
        debug!(job_id, stage = ?JobStage::Extracting, path = %path.display(), "Job advancing");
        let raw = self.extractor.extract_file(path)?;
        if let Some(index) = raw.iter().position(|v| !v.is_finite()) {
            return Err(ExtractionError::NonFinite(index).into());
        }

        debug!(
            job_id,
            stage = ?JobStage::Normalizing,
            raw_dim = raw.len(),
            target_dim = self.assets.target_dim(),
            "Job advancing"
        );
        let features = self.assets.normalizer().apply(&raw);

        debug!(job_id, stage = ?JobStage::Classifying, "Job advancing");
        let classification = self.assets.classifier().classify(&features)?;

        debug!(
            job_id,
            label = %classification.label,
            confidence = classification.confidence,
            "Classification complete"
        );
        Ok(classification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{Classifier, LabelMap, NearestCentroid};
    use crate::normalizer::Normalizer;

    /// Ignores the file and returns a fixed vector
    struct FixedFeatures(Vec<f64>);

    impl FeatureExtractor for FixedFeatures {
        fn extract(&self, _samples: &[f32], _sample_rate: u32) -> Result<Vec<f64>, ExtractionError> {
            Ok(self.0.clone())
        }

        fn extract_file(&self, _path: &Path) -> Result<Vec<f64>, ExtractionError> {
            Ok(self.0.clone())
        }
    }

    fn pipeline(raw: Vec<f64>) -> InferencePipeline {
        let predictor = NearestCentroid::new(vec![vec![0.0; 4], vec![0.1, 0.2, 0.0, 0.0]]).unwrap();
        let assets = InferenceAssets::new(
            Normalizer::zero_mean(4).unwrap(),
            Classifier::new(
                Arc::new(predictor),
                LabelMap::new(vec!["silence".into(), "hum".into()]),
            ),
        )
        .unwrap();
        InferencePipeline::new(Arc::new(assets), Arc::new(FixedFeatures(raw)))
    }

    #[test]
    fn test_short_vector_is_padded_before_classification() {
        let result = pipeline(vec![0.1, 0.2]).run("job-1", Path::new("unused.wav")).unwrap();
        assert_eq!(result.label, "hum");
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_non_finite_features_fail_extraction() {
        let result = pipeline(vec![0.1, f64::INFINITY]).run("job-2", Path::new("unused.wav"));
        assert!(matches!(
            result,
            Err(JobError::Extraction(ExtractionError::NonFinite(1)))
        ));
    }
}
