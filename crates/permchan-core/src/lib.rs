//! Permanent IRC channels that survive restarts.
//!
//! A channel carrying mode `+P` is kept alive when its last member leaves.
//! Its name, topic, and modes are written to a snapshot file in the
//! server's `compat` configuration format, so including that file at
//! startup recreates the channels. Writes are coalesced behind a dirty
//! flag and flushed on a periodic timer, replacing the file atomically.
//!
//! # Modules
//!
//! - [`alerts`] -- Operator alerts raised when a flush fails.
//! - [`channel`] -- [`Channel`] state: topic, modes, member count.
//! - [`config`] -- YAML configuration: database settings and declared
//!   channels.
//! - [`dirty`] -- The pending-changes flag.
//! - [`gate`] -- Rules for setting and clearing the permanent mode,
//!   including deletion of channels left empty.
//! - [`modes`] -- Mode handlers, the mode table, and mode sequence parsing.
//! - [`registry`] -- The [`ChannelRegistry`] trait and an in-memory
//!   implementation.
//! - [`rehydrate`] -- Creating declared channels at startup and rehash.
//! - [`service`] -- [`PermanentChannels`], the lifecycle hooks the host
//!   server drives.
//! - [`snapshot`] -- Rendering permanent channels as snapshot lines with
//!   escaping and a per-line byte bound.
//! - [`writer`] -- Atomic temp-file-and-rename replacement of the snapshot.
//!
//! [`Channel`]: channel::Channel
//! [`ChannelRegistry`]: registry::ChannelRegistry
//! [`PermanentChannels`]: service::PermanentChannels

pub mod alerts;
pub mod channel;
pub mod config;
pub mod dirty;
pub mod gate;
pub mod modes;
pub mod registry;
pub mod rehydrate;
pub mod service;
pub mod snapshot;
pub mod writer;

// Re-export primary types at crate root.
pub use alerts::{AlertLog, AlertSeverity, AlertSink, OperatorAlert};
pub use channel::{Channel, ModeState, PERMANENT_MODE, Topic};
pub use config::{ChannelTag, ConfigError, PermChannelsConfig};
pub use modes::{ModeAction, ModeChange, ModeTable};
pub use registry::{
    ChannelObserver, ChannelRegistry, MemoryRegistry, NoOpObserver, RegistryError,
};
pub use rehydrate::RehydrateReport;
pub use service::{FlushFailurePolicy, FlushReport, HookResult, PermanentChannels, TimerOutcome};
pub use snapshot::{LineLimit, OverflowPolicy};
pub use writer::{AtomicWriter, PersistError};
