//! Job descriptor and job result types
//!
//! These are the two records exchanged between services:
//! - [`JobDescriptor`] travels through the job queue (submitter → worker)
//! - [`JobResult`] is written once to the result store (worker → poller)
//!
//! # Wire formats
//!
//! Descriptor: `{"job_id": "...", "filepath": "...", "filename": "..."}`
//! (`filename` optional).
//!
//! Result, stored under `"result:" + job_id`:
//! - `{"status": "completed", "predicted_class": "...", "confidence": 0.93}`
//! - `{"status": "error", "error": "..."}`

use crate::error::QueueError;
use serde::{Deserialize, Serialize, Serializer};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Store key prefix for job results
pub const RESULT_KEY_PREFIX: &str = "result:";

/// Build the result store key for a job
pub fn result_key(job_id: &str) -> String {
    format!("{}{}", RESULT_KEY_PREFIX, job_id)
}

/// One unit of work: classify the audio artifact at `filepath`
///
/// The descriptor only references the artifact; the bytes stay on disk
/// until the worker deletes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDescriptor {
    /// Correlation key between queue entry and result
    pub job_id: String,
    /// Location of the uploaded audio artifact
    pub filepath: PathBuf,
    /// Original upload filename (informational only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl JobDescriptor {
    /// Create a descriptor with a freshly generated job id
    pub fn new(filepath: impl Into<PathBuf>, filename: Option<String>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), filepath, filename)
    }

    pub fn with_id(
        job_id: impl Into<String>,
        filepath: impl Into<PathBuf>,
        filename: Option<String>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            filepath: filepath.into(),
            filename,
        }
    }

    pub fn path(&self) -> &Path {
        &self.filepath
    }

    /// Human-friendly name for log lines
    pub fn display_name(&self) -> String {
        match &self.filename {
            Some(name) => name.clone(),
            None => self.filepath.display().to_string(),
        }
    }

    /// Encode for the queue
    pub fn to_wire(&self) -> Result<String, QueueError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a queue payload
    ///
    /// On failure `job_id` and `filepath` are salvaged when the payload is a
    /// JSON object carrying them as non-empty strings, so the caller can still
    /// report an error result and remove the upload.
    pub fn from_wire(payload: &str) -> Result<Self, QueueError> {
        serde_json::from_str::<Self>(payload).map_err(|e| {
            let value = serde_json::from_str::<serde_json::Value>(payload).ok();
            let salvage = |key: &str| {
                value
                    .as_ref()
                    .and_then(|v| v.get(key))
                    .and_then(|field| field.as_str())
                    .filter(|field| !field.is_empty())
                    .map(String::from)
            };
            QueueError::Malformed {
                job_id: salvage("job_id"),
                filepath: salvage("filepath").map(PathBuf::from),
                reason: e.to_string(),
            }
        })
    }
}

/// Terminal outcome of one job
///
/// Serialized with an internal `status` tag, which makes the field
/// invariants hold by construction: `predicted_class`/`confidence` exist only
/// on `completed`, `error` exists only on `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum JobResult {
    Completed {
        predicted_class: String,
        /// Confidence in [0, 1]
        confidence: f64,
    },
    Error {
        error: String,
    },
}

impl JobResult {
    /// Successful classification; confidence is clamped to [0, 1]
    pub fn completed(predicted_class: impl Into<String>, confidence: f64) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        JobResult::Completed {
            predicted_class: predicted_class.into(),
            confidence,
        }
    }

    /// Failed job; an empty message is replaced so pollers always see a reason
    pub fn error(message: impl Into<String>) -> Self {
        let message = message.into();
        let error = if message.trim().is_empty() {
            "unknown error".to_string()
        } else {
            message
        };
        JobResult::Error { error }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, JobResult::Completed { .. })
    }

    pub fn status_str(&self) -> &'static str {
        match self {
            JobResult::Completed { .. } => "completed",
            JobResult::Error { .. } => "error",
        }
    }
}

/// What a poller sees for a job id
///
/// Serializes flat: `{"status": "pending"}` when no result exists yet,
/// otherwise the stored [`JobResult`] record unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum PollStatus {
    Pending,
    Ready(JobResult),
}

impl PollStatus {
    pub fn status_str(&self) -> &'static str {
        match self {
            PollStatus::Pending => "pending",
            PollStatus::Ready(result) => result.status_str(),
        }
    }
}

impl From<Option<JobResult>> for PollStatus {
    fn from(result: Option<JobResult>) -> Self {
        match result {
            Some(result) => PollStatus::Ready(result),
            None => PollStatus::Pending,
        }
    }
}

impl Serialize for PollStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        match self {
            PollStatus::Pending => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("status", "pending")?;
                map.end()
            }
            PollStatus::Ready(result) => result.serialize(serializer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_descriptor_wire_format() {
        let job = JobDescriptor::with_id("abc", "jobs/abc_engine.wav", Some("engine.wav".into()));
        let value: serde_json::Value = serde_json::from_str(&job.to_wire().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"job_id": "abc", "filepath": "jobs/abc_engine.wav", "filename": "engine.wav"})
        );
    }

    #[test]
    fn test_descriptor_tolerates_missing_filename() {
        let job = JobDescriptor::from_wire(r#"{"job_id":"j1","filepath":"/tmp/a.wav"}"#).unwrap();
        assert_eq!(job.job_id, "j1");
        assert_eq!(job.filename, None);
        assert_eq!(job.display_name(), "/tmp/a.wav");
    }

    #[test]
    fn test_descriptor_ignores_unknown_fields() {
        let job = JobDescriptor::from_wire(
            r#"{"job_id":"j1","filepath":"/tmp/a.wav","filename":"a.wav","priority":3}"#,
        )
        .unwrap();
        assert_eq!(job.filename.as_deref(), Some("a.wav"));
    }

    #[test]
    fn test_malformed_payload_salvages_job_id() {
        match JobDescriptor::from_wire(r#"{"job_id":"j2"}"#) {
            Err(QueueError::Malformed {
                job_id,
                filepath,
                reason,
            }) => {
                assert_eq!(job_id.as_deref(), Some("j2"));
                assert!(filepath.is_none());
                assert!(reason.contains("filepath"));
            }
            other => panic!("expected malformed error, got {:?}", other),
        }

        match JobDescriptor::from_wire(r#"{"job_id":"j3","filepath":"/tmp/j3.wav","filename":42}"#) {
            Err(QueueError::Malformed {
                job_id, filepath, ..
            }) => {
                assert_eq!(job_id.as_deref(), Some("j3"));
                assert_eq!(filepath, Some(PathBuf::from("/tmp/j3.wav")));
            }
            other => panic!("expected malformed error, got {:?}", other),
        }

        match JobDescriptor::from_wire("not json") {
            Err(QueueError::Malformed {
                job_id, filepath, ..
            }) => {
                assert!(job_id.is_none());
                assert!(filepath.is_none());
            }
            other => panic!("expected malformed error, got {:?}", other),
        }
    }

    #[test]
    fn test_new_generates_unique_ids() {
        let a = JobDescriptor::new("a.wav", None);
        let b = JobDescriptor::new("a.wav", None);
        assert_ne!(a.job_id, b.job_id);
        assert!(Uuid::parse_str(&a.job_id).is_ok());
    }

    #[test]
    fn test_completed_result_wire_format() {
        let result = JobResult::completed("pump", 0.8731);
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"status": "completed", "predicted_class": "pump", "confidence": 0.8731})
        );
    }

    #[test]
    fn test_error_result_wire_format() {
        let result = JobResult::error("decode failed");
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"status": "error", "error": "decode failed"})
        );
        assert!(!result.is_completed());
    }

    #[test]
    fn test_confidence_is_clamped() {
        assert_eq!(JobResult::completed("x", 1.7), JobResult::completed("x", 1.0));
        assert_eq!(JobResult::completed("x", -0.2), JobResult::completed("x", 0.0));
        assert_eq!(JobResult::completed("x", f64::NAN), JobResult::completed("x", 0.0));
    }

    #[test]
    fn test_empty_error_message_is_replaced() {
        match JobResult::error("  ") {
            JobResult::Error { error } => assert!(!error.trim().is_empty()),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_poll_status_serialization() {
        assert_eq!(
            serde_json::to_value(PollStatus::Pending).unwrap(),
            json!({"status": "pending"})
        );
        let ready = PollStatus::from(Some(JobResult::error("boom")));
        assert_eq!(ready.status_str(), "error");
        assert_eq!(
            serde_json::to_value(ready).unwrap(),
            json!({"status": "error", "error": "boom"})
        );
    }

    #[test]
    fn test_result_key() {
        assert_eq!(result_key("123"), "result:123");
    }
}
