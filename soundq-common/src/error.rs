//! Common error types for SoundQ

use std::path::PathBuf;
use thiserror::Error;

/// Common result type for SoundQ operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across SoundQ services
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

}

/// Job queue errors
///
/// A dequeue timeout is not represented here: it is `Ok(None)`.
#[derive(Error, Debug)]
pub enum QueueError {
    /// Queue backend failure (connection lost, database busy, ...)
    #[error("Queue backend error: {0}")]
    Backend(#[from] sqlx::Error),

    /// Descriptor could not be encoded for the wire
    #[error("Failed to encode job descriptor: {0}")]
    Encode(#[from] serde_json::Error),

    /// A queue entry was popped but could not be decoded
    ///
    /// The entry is gone from the queue. `job_id` and `filepath` are set
    /// when they could be recovered from the payload, so the caller can still
    /// record a result and delete the upload.
    #[error("Malformed job descriptor: {reason}")]
    Malformed {
        job_id: Option<String>,
        filepath: Option<PathBuf>,
        reason: String,
    },
}

/// Result store errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// Store backend failure
    #[error("Result store backend error: {0}")]
    Backend(#[from] sqlx::Error),

    /// Stored record could not be encoded or decoded
    #[error("Result record serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
