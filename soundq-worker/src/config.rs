//! `[worker]` section of the SoundQ configuration file
//!
//! ```toml
//! [worker]
//! target_dim = 42
//! model_path = "models/motor_sounds.json"
//! mean_vector_path = "models/mean.json"
//! label_map = ["fan", "gearbox", "pump", "valve"]
//! dequeue_timeout_ms = 1000
//! concurrency = 1
//!
//! [worker.extraction]
//! mt_window = 1.0
//! mt_step = 1.0
//! st_window = 0.05
//! st_step = 0.05
//! ```

use crate::error::AssetError;
use crate::features::ExtractionConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerConfig {
    /// Length every feature vector is coerced to before classification
    #[serde(default = "default_target_dim")]
    pub target_dim: usize,

    /// JSON model file (relative paths resolve against root folder)
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// JSON array of `target_dim` numbers; all zeros when unset
    #[serde(default)]
    pub mean_vector_path: Option<PathBuf>,

    /// Class index → label
    #[serde(default)]
    pub label_map: Vec<String>,

    /// JSON array of labels (alternative to inline `label_map`)
    #[serde(default)]
    pub label_map_path: Option<PathBuf>,

    /// Longest single wait on the queue before the loop re-checks shutdown
    #[serde(default = "default_dequeue_timeout_ms")]
    pub dequeue_timeout_ms: u64,

    /// Number of worker loops sharing the queue
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Pause after a queue backend error
    #[serde(default = "default_error_backoff_ms")]
    pub error_backoff_ms: u64,

    /// Upper bound for extract + normalize + classify of one job
    #[serde(default)]
    pub stage_timeout_secs: Option<u64>,

    #[serde(default)]
    pub extraction: ExtractionConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            target_dim: default_target_dim(),
            model_path: default_model_path(),
            mean_vector_path: None,
            label_map: Vec::new(),
            label_map_path: None,
            dequeue_timeout_ms: default_dequeue_timeout_ms(),
            concurrency: default_concurrency(),
            error_backoff_ms: default_error_backoff_ms(),
            stage_timeout_secs: None,
            extraction: ExtractionConfig::default(),
        }
    }
}

fn default_target_dim() -> usize {
    // 21 short-term features x (mean, std) with the default extractor
    42
}

fn default_model_path() -> PathBuf {
    PathBuf::from("model.json")
}

fn default_dequeue_timeout_ms() -> u64 {
    1000
}

fn default_concurrency() -> usize {
    1
}

fn default_error_backoff_ms() -> u64 {
    1000
}

impl WorkerConfig {
    /// Reject settings that cannot work before anything is loaded
    pub fn validate(&self) -> Result<(), AssetError> {
        if self.dequeue_timeout_ms == 0 {
            return Err(AssetError::Config(
                "dequeue_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(AssetError::Config(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.stage_timeout_secs == Some(0) {
            return Err(AssetError::Config(
                "stage_timeout_secs must be greater than zero when set".to_string(),
            ));
        }
        if !self.label_map.is_empty() && self.label_map_path.is_some() {
            return Err(AssetError::Config(
                "set either label_map or label_map_path, not both".to_string(),
            ));
        }
        self.extraction.validate()
    }

    pub fn dequeue_timeout(&self) -> Duration {
        Duration::from_millis(self.dequeue_timeout_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    pub fn stage_timeout(&self) -> Option<Duration> {
        self.stage_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = WorkerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.target_dim, 42);
        assert_eq!(config.dequeue_timeout(), Duration::from_secs(1));
        assert_eq!(config.stage_timeout(), None);
    }

    #[test]
    fn test_partial_section_fills_defaults() {
        let config: WorkerConfig = toml::from_str(
            r#"
            target_dim = 4
            label_map = ["fan", "gearbox", "pump", "valve"]

            [extraction]
            st_window = 0.025
            st_step = 0.025
            "#,
        )
        .unwrap();

        assert_eq!(config.target_dim, 4);
        assert_eq!(config.label_map.len(), 4);
        assert_eq!(config.extraction.st_window, 0.025);
        assert_eq!(config.extraction.mt_window, 1.0);
        assert_eq!(config.concurrency, 1);
    }

    #[test]
    fn test_both_label_sources_rejected() {
        let config = WorkerConfig {
            label_map: vec!["a".into()],
            label_map_path: Some(PathBuf::from("labels.json")),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(AssetError::Config(_))));
    }

    #[test]
    fn test_zero_values_rejected() {
        let config = WorkerConfig {
            concurrency: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = WorkerConfig {
            stage_timeout_secs: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
