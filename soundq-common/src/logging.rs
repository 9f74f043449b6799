//! Tracing subscriber setup shared by the binaries

use crate::config::LoggingConfig;
use crate::{Error, Result};
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber
///
/// `RUST_LOG` wins when set; otherwise the configured level applies to the
/// given crate targets. With `logging.file` set, output goes to that file
/// (appending, no ANSI colors) instead of stderr.
pub fn init_tracing(config: &LoggingConfig, crate_targets: &[&str]) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(&config.level, crate_targets)))
        .map_err(|e| Error::Config(format!("Invalid log level '{}': {}", config.level, e)))?;

    let registry = tracing_subscriber::registry().with(filter);

    let installed = match &config.file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .try_init()
        }
        None => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };

    installed.map_err(|e| Error::Config(format!("Failed to install tracing subscriber: {}", e)))
}

/// `soundq_worker=debug,soundq_common=debug` for level "debug"
///
/// A value that already looks like a directive list is used verbatim.
fn default_directive(level: &str, crate_targets: &[&str]) -> String {
    if level.contains('=') || level.contains(',') || crate_targets.is_empty() {
        return level.to_string();
    }
    crate_targets
        .iter()
        .map(|target| format!("{}={}", target, level))
        .collect::<Vec<_>>()
        .join(",")
}
