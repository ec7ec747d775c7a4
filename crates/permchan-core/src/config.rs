//! Configuration loading and typed config structures.
//!
//! The configuration is a YAML file. Every section and field has a
//! default, so an empty document is a valid configuration with
//! persistence disabled and no declared channels.
//!
//! ```yaml
//! permchanneldb:
//!   filename: "data/permchannels.conf"
//!   max_line_bytes: 1024
//!   overflow: truncate
//!   on_flush_failure: clear
//! permchannels:
//!   - channel: "#help"
//!     topic: "Ask here"
//!     modes: "Pnt"
//! server:
//!   name: irc.example.net
//!   flush_interval_secs: 5
//! logging:
//!   level: info
//!   json: false
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::service::FlushFailurePolicy;
use crate::snapshot::{DEFAULT_MAX_LINE_BYTES, LINE_OVERHEAD, LineLimit, OverflowPolicy};

/// Environment variable that overrides `permchanneldb.filename`.
pub const DB_PATH_ENV: &str = "PERMCHAN_DB";

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

    /// `max_line_bytes` leaves no room for a channel name.
    #[error("permchanneldb.max_line_bytes must be at least {minimum}, got {max_line_bytes}")]
    LineBoundTooSmall {
        /// The configured bound.
        max_line_bytes: usize,
        /// The smallest accepted bound.
        minimum: usize,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PermChannelsConfig {
    /// Snapshot database settings.
    #[serde(default)]
    pub permchanneldb: DatabaseConfig,

    /// Channels declared permanent by configuration, in file order.
    #[serde(default)]
    pub permchannels: Vec<ChannelTag>,

    /// Host server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl PermChannelsConfig {
    /// Load configuration from a YAML file.
    ///
    /// `PERMCHAN_DB` overrides `permchanneldb.filename` when set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or any
    /// error [`parse`](Self::parse) returns.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::LineBoundTooSmall`] if `max_line_bytes` cannot hold
    /// a line with a one-byte channel name.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.permchanneldb.validate()?;
        config.permchanneldb.apply_env_overrides();
        Ok(config)
    }
}

/// Snapshot database settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseConfig {
    /// Snapshot file path. Empty disables persistence.
    #[serde(default)]
    pub filename: String,

    /// Maximum snapshot line length in bytes.
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,

    /// What to do with a line longer than `max_line_bytes`.
    #[serde(default)]
    pub overflow: OverflowPolicy,

    /// Whether a failed flush keeps the dirty flag for a retry.
    #[serde(default)]
    pub on_flush_failure: FlushFailurePolicy,
}

impl DatabaseConfig {
    /// Reject a line bound that only fits the fixed line frame.
    const fn validate(&self) -> Result<(), ConfigError> {
        if self.max_line_bytes <= LINE_OVERHEAD {
            return Err(ConfigError::LineBoundTooSmall {
                max_line_bytes: self.max_line_bytes,
                minimum: LINE_OVERHEAD.saturating_add(1),
            });
        }
        Ok(())
    }

    /// Replace `filename` with `PERMCHAN_DB` if it is set.
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var(DB_PATH_ENV) {
            self.filename = path;
        }
    }

    /// Return the line bound and overflow policy.
    pub const fn line_limit(&self) -> LineLimit {
        LineLimit {
            max_bytes: self.max_line_bytes,
            overflow: self.overflow,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            filename: String::new(),
            max_line_bytes: default_max_line_bytes(),
            overflow: OverflowPolicy::default(),
            on_flush_failure: FlushFailurePolicy::default(),
        }
    }
}

/// One declared permanent channel.
///
/// Missing fields parse as empty strings; an empty `channel` makes the
/// record malformed and it is skipped at rehydration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChannelTag {
    /// Channel name. Required.
    #[serde(default)]
    pub channel: String,

    /// Initial topic.
    #[serde(default)]
    pub topic: String,

    /// Initial modes: a letters token followed by parameter tokens.
    #[serde(default)]
    pub modes: String,
}

/// Host server settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// Server name, used as the setter of declared topics.
    #[serde(default = "default_server_name")]
    pub name: String,

    /// Seconds between background timer ticks.
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: default_server_name(),
            flush_interval_secs: default_flush_interval_secs(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error), used when `RUST_LOG`
    /// is not set.
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

const fn default_max_line_bytes() -> usize {
    DEFAULT_MAX_LINE_BYTES
}

fn default_server_name() -> String {
    "irc.local".to_owned()
}

const fn default_flush_interval_secs() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_owned()
}
