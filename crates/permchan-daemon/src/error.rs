//! Error types for the daemon binary.
//!
//! [`DaemonError`] covers startup and the main loop. [`CommandError`] is
//! what a single console command can fail with; it is reported to the
//! operator and the daemon keeps running.

use permchan_core::{ConfigError, PersistError, RegistryError};

/// Top-level error for the daemon binary.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },
}

/// Failure of a single console command.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// The named channel does not exist.
    #[error("no such channel: {channel}")]
    NoSuchChannel {
        /// The requested channel name.
        channel: String,
    },

    /// The registry refused to create a channel.
    #[error("registry error: {source}")]
    Registry {
        /// The underlying registry error.
        #[from]
        source: RegistryError,
    },

    /// A forced flush failed.
    #[error("flush failed: {source}")]
    Persist {
        /// The underlying persistence error.
        #[from]
        source: PersistError,
    },

    /// Reloading the configuration failed; the old settings stay in effect.
    #[error("rehash failed: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },

    /// A channel could not be rendered as JSON.
    #[error("serialization error: {source}")]
    Json {
        /// The underlying serde error.
        #[from]
        source: serde_json::Error,
    },
}
