//! Inference assets
//!
//! The model, mean vector and label map are loaded exactly once at startup
//! into an [`InferenceAssets`] value, then shared read-only (via `Arc`) by
//! every worker loop. Any inconsistency between them is fatal here, before
//! the first job is dequeued.

use crate::classifier::{load_model, Classifier, LabelMap, Predictor};
use crate::config::WorkerConfig;
use crate::error::AssetError;
use crate::normalizer::Normalizer;
use serde::de::DeserializeOwned;
use soundq_common::config::resolve_path;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct InferenceAssets {
    normalizer: Normalizer,
    classifier: Classifier,
}

impl InferenceAssets {
    /// Assemble from already-built parts, checking they agree
    pub fn new(normalizer: Normalizer, classifier: Classifier) -> Result<Self, AssetError> {
        let input_dim = classifier.predictor().input_dim();
        if input_dim != normalizer.target_dim() {
            return Err(AssetError::Config(format!(
                "model expects {} features but target_dim is {}",
                input_dim,
                normalizer.target_dim()
            )));
        }
        if classifier.labels().is_empty() && !classifier.predictor().emits_labels() {
            return Err(AssetError::Config(
                "label map is empty and the model predicts class indices".to_string(),
            ));
        }
        Ok(Self {
            normalizer,
            classifier,
        })
    }

    /// Load everything named by the `[worker]` section
    ///
    /// Relative paths resolve against `root`.
    pub fn load(config: &WorkerConfig, root: &Path) -> Result<Self, AssetError> {
        config.validate()?;

        let predictor: Arc<dyn Predictor> = load_model(&resolve_path(root, &config.model_path))?;

        let normalizer = match &config.mean_vector_path {
            Some(path) => {
                let mean: Vec<f64> = read_json(&resolve_path(root, path))?;
                if let Some(index) = mean.iter().position(|v| !v.is_finite()) {
                    return Err(AssetError::Config(format!(
                        "mean vector has a non-finite value at index {}",
                        index
                    )));
                }
                Normalizer::new(config.target_dim, mean)?
            }
            None => {
                warn!(
                    target_dim = config.target_dim,
                    "No mean_vector_path configured, using an all-zero mean vector"
                );
                Normalizer::zero_mean(config.target_dim)?
            }
        };

        let labels = match &config.label_map_path {
            Some(path) => read_json::<Vec<String>>(&resolve_path(root, path))?,
            None => config.label_map.clone(),
        };

        let assets = Self::new(normalizer, Classifier::new(predictor, LabelMap::new(labels)))?;

        info!(
            model = assets.classifier.predictor().kind(),
            target_dim = assets.target_dim(),
            classes = assets.classifier.labels().len(),
            "Inference assets loaded"
        );

        Ok(assets)
    }

    pub fn target_dim(&self) -> usize {
        self.normalizer.target_dim()
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, AssetError> {
    let content = std::fs::read_to_string(path).map_err(|source| AssetError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| AssetError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NormalizationError;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    fn config(target_dim: usize) -> WorkerConfig {
        WorkerConfig {
            target_dim,
            model_path: PathBuf::from("model.json"),
            label_map: vec!["fan".into(), "pump".into()],
            ..Default::default()
        }
    }

    #[test]
    fn test_load_with_mean_vector_and_label_file() {
        let root = TempDir::new().unwrap();
        write(root.path(), "model.json", r#"{"kind": "nearest_centroid", "centroids": [[0, 0, 0], [1, 1, 1]]}"#);
        write(root.path(), "mean.json", "[0.5, 0.5, 0.5]");
        write(root.path(), "labels.json", r#"["fan", "pump"]"#);

        let config = WorkerConfig {
            mean_vector_path: Some(PathBuf::from("mean.json")),
            label_map: Vec::new(),
            label_map_path: Some(PathBuf::from("labels.json")),
            ..config(3)
        };
        let assets = InferenceAssets::load(&config, root.path()).unwrap();

        assert_eq!(assets.target_dim(), 3);
        assert_eq!(assets.normalizer().mean(), &[0.5, 0.5, 0.5]);
        assert_eq!(assets.classifier().labels().get(1), Some("pump"));
    }

    #[test]
    fn test_missing_mean_vector_defaults_to_zeros() {
        let root = TempDir::new().unwrap();
        write(root.path(), "model.json", r#"{"kind": "nearest_centroid", "centroids": [[0, 0]]}"#);

        let assets = InferenceAssets::load(&config(2), root.path()).unwrap();
        assert_eq!(assets.normalizer().mean(), &[0.0, 0.0]);
    }

    #[test]
    fn test_mean_vector_dimension_mismatch_is_fatal() {
        let root = TempDir::new().unwrap();
        write(root.path(), "model.json", r#"{"kind": "nearest_centroid", "centroids": [[0, 0, 0, 0]]}"#);
        write(root.path(), "mean.json", "[0.0, 0.0, 0.0]");

        let config = WorkerConfig {
            mean_vector_path: Some(PathBuf::from("mean.json")),
            ..config(4)
        };
        assert!(matches!(
            InferenceAssets::load(&config, root.path()),
            Err(AssetError::Normalization(
                NormalizationError::MeanDimensionMismatch {
                    expected: 4,
                    actual: 3
                }
            ))
        ));
    }

    #[test]
    fn test_model_dimension_mismatch_is_fatal() {
        let root = TempDir::new().unwrap();
        write(root.path(), "model.json", r#"{"kind": "nearest_centroid", "centroids": [[0, 0]]}"#);

        assert!(matches!(
            InferenceAssets::load(&config(42), root.path()),
            Err(AssetError::Config(_))
        ));
    }

    #[test]
    fn test_empty_label_map_is_fatal() {
        let root = TempDir::new().unwrap();
        write(root.path(), "model.json", r#"{"kind": "nearest_centroid", "centroids": [[0, 0]]}"#);

        let config = WorkerConfig {
            label_map: Vec::new(),
            ..config(2)
        };
        assert!(matches!(
            InferenceAssets::load(&config, root.path()),
            Err(AssetError::Config(_))
        ));
    }

    #[test]
    fn test_named_class_model_needs_no_label_map() {
        let root = TempDir::new().unwrap();
        write(
            root.path(),
            "model.json",
            r#"{"kind": "decision_forest", "input_dim": 2, "n_classes": 2,
                "classes": ["fan", "pump"],
                "trees": [{"leaf": {"distribution": [0.2, 0.8]}}]}"#,
        );

        let config = WorkerConfig {
            label_map: Vec::new(),
            ..config(2)
        };
        let assets = InferenceAssets::load(&config, root.path()).unwrap();
        assert!(assets.classifier().labels().is_empty());

        let classification = assets.classifier().classify(&[0.0, 0.0]).unwrap();
        assert_eq!(classification.label, "pump");
    }

    #[test]
    fn test_missing_model_file() {
        let root = TempDir::new().unwrap();
        assert!(matches!(
            InferenceAssets::load(&config(2), root.path()),
            Err(AssetError::Read { .. })
        ));
    }
}
