//! # SoundQ Common Library
//!
//! Shared code for the SoundQ services:
//! - Job descriptor and job result types (queue and store wire formats)
//! - Job queue and result store traits with SQLite and in-memory backends
//! - Database initialization
//! - Configuration loading and logging setup

pub mod config;
pub mod db;
pub mod error;
pub mod job;
pub mod logging;
pub mod queue;
pub mod store;

pub use error::{Error, QueueError, Result, StoreError};
pub use job::{JobDescriptor, JobResult, PollStatus};
pub use queue::JobQueue;
pub use store::ResultStore;
