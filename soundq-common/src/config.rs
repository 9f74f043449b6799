//! Configuration loading and root folder resolution
//!
//! Both services read one bootstrap TOML file. Shared sections are parsed
//! into [`TomlConfig`]; service-specific sections (`[worker]`) are pulled
//! out of the same file with [`LoadedConfig::section`].
//!
//! Config file resolution order:
//! 1. Command-line argument (highest priority)
//! 2. `SOUNDQ_CONFIG` environment variable
//! 3. `<config_dir>/soundq/config.toml` if it exists
//! 4. Built-in defaults (no file)
//!
//! Root folder resolution order:
//! 1. Command-line argument
//! 2. `SOUNDQ_ROOT_FOLDER` environment variable
//! 3. `root_folder` in the TOML file
//! 4. OS-dependent default (`<data_local_dir>/soundq`)

use crate::queue::DEFAULT_QUEUE_NAME;
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const CONFIG_ENV_VAR: &str = "SOUNDQ_CONFIG";
pub const ROOT_FOLDER_ENV_VAR: &str = "SOUNDQ_ROOT_FOLDER";
const DEFAULT_DATABASE_FILE: &str = "soundq.db";

/// Shared bootstrap configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TomlConfig {
    /// Base folder for the database, uploads and relative asset paths
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// SQLite database file (relative paths resolve against root folder)
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub api: ApiConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Job queue settings shared by producer and consumer
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    #[serde(default = "default_queue_name")]
    pub name: String,

    /// Interval between polls while a consumer waits for work
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: default_queue_name(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// HTTP submitter settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Upload folder (relative paths resolve against root folder)
    #[serde(default = "default_jobs_dir")]
    pub jobs_dir: PathBuf,

    /// Maximum accepted upload size
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            jobs_dir: default_jobs_dir(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_queue_name() -> String {
    DEFAULT_QUEUE_NAME.to_string()
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_bind_address() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_jobs_dir() -> PathBuf {
    PathBuf::from("jobs")
}

fn default_max_upload_bytes() -> usize {
    50 * 1024 * 1024
}

/// A parsed config file plus the raw table for service-specific sections
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    /// File the configuration came from (None = built-in defaults)
    pub source: Option<PathBuf>,
    pub toml: TomlConfig,
    raw: toml::Table,
}

impl LoadedConfig {
    /// Parse configuration text
    pub fn parse(content: &str, source: Option<PathBuf>) -> Result<Self> {
        let raw: toml::Table = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
        let toml: TomlConfig = toml::Value::Table(raw.clone())
            .try_into()
            .map_err(|e| Error::Config(format!("Invalid configuration: {}", e)))?;
        Ok(Self { source, toml, raw })
    }

    /// Read and parse a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read TOML {} failed: {}", path.display(), e)))?;
        Self::parse(&content, Some(path.to_path_buf()))
    }

    /// Resolve the config file and load it, falling back to defaults
    ///
    /// An explicitly requested file (CLI or environment) must exist; the
    /// per-user default location is optional.
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = cli_path {
            return Self::from_file(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return Self::from_file(Path::new(&path));
            }
        }

        if let Some(path) = default_config_path() {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        warn!("No configuration file found, using built-in defaults");
        Ok(Self::default())
    }

    /// Deserialize a named section, or its defaults if absent
    pub fn section<T: DeserializeOwned + Default>(&self, name: &str) -> Result<T> {
        match self.raw.get(name) {
            Some(value) => value
                .clone()
                .try_into()
                .map_err(|e| Error::Config(format!("Invalid [{}] section: {}", name, e))),
            None => Ok(T::default()),
        }
    }
}

/// Per-user config file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("soundq").join("config.toml"))
}

/// Resolve the root folder following the documented priority order
pub fn resolve_root_folder(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    get_default_root_folder()
}

/// Get OS-dependent default root folder path
fn get_default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("soundq"))
        .unwrap_or_else(|| PathBuf::from("./soundq_data"))
}

/// Join a possibly-relative path onto the root folder
pub fn resolve_path(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

impl TomlConfig {
    /// Database file location for a given root folder
    pub fn database_path(&self, root: &Path) -> PathBuf {
        match &self.database_path {
            Some(path) => resolve_path(root, path),
            None => root.join(DEFAULT_DATABASE_FILE),
        }
    }
}

/// Create the root folder if missing
pub fn ensure_directory_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
        info!("Created directory: {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Section {
        #[serde(default)]
        target_dim: usize,
    }

    #[test]
    fn test_defaults_when_empty() {
        let config = LoadedConfig::parse("", None).unwrap();
        assert_eq!(config.toml.logging.level, "info");
        assert_eq!(config.toml.queue.name, "audio_jobs");
        assert_eq!(config.toml.queue.poll_interval_ms, 100);
        assert_eq!(config.toml.api.jobs_dir, PathBuf::from("jobs"));
        assert_eq!(config.section::<Section>("worker").unwrap(), Section::default());
    }

    #[test]
    fn test_parses_shared_and_service_sections() {
        let config = LoadedConfig::parse(
            r#"
            root_folder = "/srv/soundq"
            database_path = "db/queue.db"

            [logging]
            level = "debug"

            [queue]
            name = "motor_jobs"

            [worker]
            target_dim = 68
            "#,
            None,
        )
        .unwrap();

        assert_eq!(config.toml.root_folder, Some(PathBuf::from("/srv/soundq")));
        assert_eq!(config.toml.logging.level, "debug");
        assert_eq!(config.toml.queue.name, "motor_jobs");
        assert_eq!(config.section::<Section>("worker").unwrap().target_dim, 68);
        assert_eq!(
            config.toml.database_path(Path::new("/srv/soundq")),
            PathBuf::from("/srv/soundq/db/queue.db")
        );
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = LoadedConfig::parse("root_folder = [", None).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_invalid_section_is_config_error() {
        let config = LoadedConfig::parse("[worker]\ntarget_dim = \"many\"", None).unwrap();
        assert!(matches!(config.section::<Section>("worker"), Err(Error::Config(_))));
    }

    #[test]
    fn test_resolve_path() {
        let root = Path::new("/data");
        assert_eq!(resolve_path(root, Path::new("model.json")), PathBuf::from("/data/model.json"));
        assert_eq!(resolve_path(root, Path::new("/abs/m.json")), PathBuf::from("/abs/m.json"));
    }

    #[test]
    fn test_cli_root_folder_wins() {
        let config = TomlConfig {
            root_folder: Some(PathBuf::from("/from/toml")),
            ..Default::default()
        };
        assert_eq!(
            resolve_root_folder(Some(Path::new("/from/cli")), &config),
            PathBuf::from("/from/cli")
        );
    }

    #[test]
    fn test_default_database_path() {
        let config = TomlConfig::default();
        assert_eq!(
            config.database_path(Path::new("/data")),
            PathBuf::from("/data/soundq.db")
        );
    }
}
