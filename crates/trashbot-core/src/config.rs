//! Configuration loading and typed config structures for the dashboard hub.
//!
//! The configuration lives in `trashbot-config.yaml` next to the binary's
//! working directory. Every field has a default, so a missing file or a
//! partial file is fine.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "trashbot-config.yaml";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// An environment override could not be parsed.
    #[error("invalid value for {var}: {source}")]
    Env {
        /// The environment variable name.
        var: &'static str,
        /// Why the value was rejected.
        source: std::num::ParseIntError,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
///
/// Mirrors the structure of `trashbot-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DashboardConfig {
    /// Listener and static asset settings.
    #[serde(default)]
    pub server: ServerSettings,

    /// Observer registry limits.
    #[serde(default)]
    pub observers: ObserverConfig,

    /// Ingest body limits.
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl DashboardConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `TRASHBOT_HOST` overrides `server.host`
    /// - `TRASHBOT_PORT` overrides `server.port`
    /// - `TRASHBOT_WEB_ROOT` overrides `server.web_root`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Env`] if an override is malformed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, then apply environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.server.apply_env_overrides()?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise fall back to defaults
    /// (environment overrides still apply).
    ///
    /// # Errors
    ///
    /// Same as [`DashboardConfig::from_file`].
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::info!(path = %path.display(), "Config file not found, using defaults");
            let mut config = Self::default();
            config.server.apply_env_overrides()?;
            Ok(config)
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerSettings {
    /// Address to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory holding the browser dashboard. When unset, `/` serves a
    /// built-in status page instead.
    #[serde(default)]
    pub web_root: Option<PathBuf>,
}

impl ServerSettings {
    /// Apply `TRASHBOT_*` environment overrides.
    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(val) = std::env::var("TRASHBOT_HOST") {
            self.host = val;
        }
        if let Ok(val) = std::env::var("TRASHBOT_PORT") {
            self.port = val.parse().map_err(|source| ConfigError::Env {
                var: "TRASHBOT_PORT",
                source,
            })?;
        }
        if let Ok(val) = std::env::var("TRASHBOT_WEB_ROOT") {
            self.web_root = Some(PathBuf::from(val));
        }
        Ok(())
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            web_root: None,
        }
    }
}

/// Observer registry limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ObserverConfig {
    /// Maximum number of simultaneously connected observers.
    #[serde(default = "default_observer_capacity")]
    pub capacity: usize,

    /// Bytes of unread frames one observer may have queued before it is
    /// considered stalled and evicted. A reader that keeps up never gets
    /// near this.
    #[serde(default = "default_max_pending_bytes")]
    pub max_pending_bytes: usize,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            capacity: default_observer_capacity(),
            max_pending_bytes: default_max_pending_bytes(),
        }
    }
}

/// Ingest body limits, in bytes.
///
/// The defaults leave room for a terminator in the producers' 4 KiB and
/// 2 KiB request buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct IngestConfig {
    /// Largest accepted detection report body.
    #[serde(default = "default_max_vision_body_bytes")]
    pub max_vision_body_bytes: usize,

    /// Largest accepted arm status body.
    #[serde(default = "default_max_arm_body_bytes")]
    pub max_arm_body_bytes: usize,
}

impl IngestConfig {
    /// The larger of the two limits; bodies above this are refused before
    /// being buffered.
    pub const fn max_body_bytes(&self) -> usize {
        if self.max_vision_body_bytes > self.max_arm_body_bytes {
            self.max_vision_body_bytes
        } else {
            self.max_arm_body_bytes
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_vision_body_bytes: default_max_vision_body_bytes(),
            max_arm_body_bytes: default_max_arm_body_bytes(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON log lines instead of human-readable ones.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_host() -> String {
    String::from("0.0.0.0")
}

const fn default_port() -> u16 {
    8080
}

const fn default_observer_capacity() -> usize {
    64
}

const fn default_max_pending_bytes() -> usize {
    1_048_576
}

const fn default_max_vision_body_bytes() -> usize {
    4094
}

const fn default_max_arm_body_bytes() -> usize {
    2046
}

fn default_log_level() -> String {
    String::from("info")
}
