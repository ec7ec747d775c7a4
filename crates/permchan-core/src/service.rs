//! The permanent-channel service and its host lifecycle.
//!
//! [`PermanentChannels`] owns everything the subsystem keeps between
//! calls: the snapshot writer, the dirty flag, the line policy, the
//! flush-failure policy, and an alert sink. The host drives it through
//! explicit calls, all on one thread:
//!
//! | Host event | Method |
//! |------------|--------|
//! | module load | [`init`](PermanentChannels::init) |
//! | config reload | [`on_rehash`](PermanentChannels::on_rehash) |
//! | raw mode change (before it is applied) | [`on_raw_mode`](PermanentChannels::on_raw_mode) |
//! | topic changed | [`on_post_topic_change`](PermanentChannels::on_post_topic_change) |
//! | periodic timer | [`on_background_timer`](PermanentChannels::on_background_timer) |
//! | channel about to be deleted | [`on_channel_pre_delete`](PermanentChannels::on_channel_pre_delete) |
//! | module unload | [`shutdown`](PermanentChannels::shutdown) |
//!
//! # Flush failures
//!
//! A failed flush is logged, raised as a critical alert, and returned to
//! the caller. With [`FlushFailurePolicy::Clear`] (the default) the dirty
//! flag is cleared anyway and the stale file stays until the next
//! relevant mutation. [`FlushFailurePolicy::KeepDirty`] keeps the flag so
//! the next timer tick retries.

use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::alerts::{AlertLog, AlertSeverity, AlertSink, OperatorAlert};
use crate::channel::{Channel, PERMANENT_MODE};
use crate::config::PermChannelsConfig;
use crate::dirty::DirtyTracker;
use crate::modes::{ModeTable, PERMANENT_DEFINITION};
use crate::registry::{self, ChannelObserver, ChannelRegistry};
use crate::rehydrate::{self, RehydrateReport};
use crate::snapshot::{self, LineLimit};
use crate::writer::{AtomicWriter, PersistError};

/// Dirty-flag handling after a failed flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushFailurePolicy {
    /// Clear the flag; retry only after the next relevant mutation.
    #[default]
    Clear,
    /// Keep the flag; retry on the next timer tick.
    KeepDirty,
}

/// Answer to a host hook that can veto an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookResult {
    /// No opinion; the host proceeds.
    Passthrough,
    /// The host must not proceed.
    Deny,
}

/// Summary of one successful flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushReport {
    /// Record lines written.
    pub records: usize,
    /// Record lines truncated to fit the line bound.
    pub truncated: usize,
    /// Records left out for exceeding the line bound.
    pub skipped: usize,
    /// Bytes written, header included.
    pub bytes: usize,
}

/// What a background timer tick did.
#[derive(Debug)]
pub enum TimerOutcome {
    /// Nothing was dirty; no write happened.
    Idle,
    /// The snapshot was rewritten.
    Flushed(FlushReport),
    /// The flush failed. The error has already been logged and alerted.
    Failed(PersistError),
}

/// The permanent-channel service.
#[derive(Debug)]
pub struct PermanentChannels<S = AlertLog> {
    /// Atomic writer for the snapshot file.
    writer: AtomicWriter,
    /// Pending-change flag.
    dirty: DirtyTracker,
    /// Snapshot line bound and overflow policy.
    line_limit: LineLimit,
    /// Dirty handling after a failed flush.
    failure_policy: FlushFailurePolicy,
    /// Destination for operator alerts.
    alerts: S,
}

impl PermanentChannels<AlertLog> {
    /// Create a service with persistence disabled and an in-memory alert
    /// log. Settings arrive with [`init`](Self::init).
    pub fn new() -> Self {
        Self::with_alert_sink(AlertLog::new())
    }
}

impl Default for PermanentChannels<AlertLog> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: AlertSink> PermanentChannels<S> {
    /// Create a service delivering alerts to `alerts`.
    pub fn with_alert_sink(alerts: S) -> Self {
        Self {
            writer: AtomicWriter::default(),
            dirty: DirtyTracker::new(),
            line_limit: LineLimit::default(),
            failure_policy: FlushFailurePolicy::default(),
            alerts,
        }
    }

    /// Register the permanent mode and run the first rehash.
    pub fn init(
        &mut self,
        registry: &mut dyn ChannelRegistry,
        modes: &mut ModeTable,
        observer: &mut dyn ChannelObserver,
        config: &PermChannelsConfig,
        now: i64,
    ) -> RehydrateReport {
        if !modes.register(PERMANENT_DEFINITION) {
            warn!(mode = %PERMANENT_MODE, "Permanent mode letter already registered");
        }
        info!("Permanent channels service initialized");
        self.on_rehash(registry, modes, observer, config, now)
    }

    /// Apply database settings and create declared channels.
    ///
    /// `observer` hears of any declared channel that its own mode sequence
    /// deletes again (`+P-P` on an empty channel).
    pub fn on_rehash(
        &mut self,
        registry: &mut dyn ChannelRegistry,
        modes: &ModeTable,
        observer: &mut dyn ChannelObserver,
        config: &PermChannelsConfig,
        now: i64,
    ) -> RehydrateReport {
        let db = &config.permchanneldb;
        self.writer = AtomicWriter::new(&db.filename);
        self.line_limit = db.line_limit();
        self.failure_policy = db.on_flush_failure;

        let report = rehydrate::rehydrate(
            registry,
            modes,
            observer,
            &config.permchannels,
            now,
            &config.server.name,
        );
        info!(
            path = %self.writer.target().display(),
            declared = config.permchannels.len(),
            created = report.created.len(),
            existing = report.existing,
            malformed = report.malformed,
            "Permanent channels rehashed"
        );
        report
    }

    /// Mark dirty for a mode change on a permanent channel, or for any
    /// change of the permanent mode itself.
    ///
    /// Called before the change is applied, whether or not it is accepted.
    pub fn on_raw_mode(&mut self, channel: Option<&Channel>, letter: char) {
        if channel.is_some_and(|chan| chan.is_permanent() || letter == PERMANENT_MODE) {
            self.dirty.mark_dirty();
        }
    }

    /// Mark dirty when a permanent channel's topic changed.
    pub fn on_post_topic_change(&mut self, channel: &Channel) {
        if channel.is_permanent() {
            self.dirty.mark_dirty();
        }
    }

    /// Flush if dirty, then settle the dirty flag per the failure policy.
    pub fn on_background_timer(&mut self, registry: &dyn ChannelRegistry) -> TimerOutcome {
        if !self.dirty.is_dirty() {
            return TimerOutcome::Idle;
        }
        match self.flush(registry) {
            Ok(report) => {
                self.dirty.clear();
                TimerOutcome::Flushed(report)
            }
            Err(e) => {
                match self.failure_policy {
                    FlushFailurePolicy::Clear => self.dirty.clear(),
                    FlushFailurePolicy::KeepDirty => {
                        debug!("Keeping dirty flag for retry on next tick");
                    }
                }
                TimerOutcome::Failed(e)
            }
        }
    }

    /// Serialize the permanent channels and atomically replace the
    /// snapshot file. Does not touch the dirty flag.
    ///
    /// # Errors
    ///
    /// Returns the [`PersistError`] of the failing write step, after
    /// logging it and raising a critical alert.
    pub fn flush(&mut self, registry: &dyn ChannelRegistry) -> Result<FlushReport, PersistError> {
        let snapshot = snapshot::render(registry, self.line_limit);
        let report = FlushReport {
            records: snapshot.records,
            truncated: snapshot.truncated,
            skipped: snapshot.skipped,
            bytes: snapshot.contents.len(),
        };

        match self.writer.write(snapshot.contents.as_bytes()) {
            Ok(()) => {
                info!(
                    path = %self.writer.target().display(),
                    records = report.records,
                    bytes = report.bytes,
                    "Permanent channels snapshot written"
                );
                Ok(report)
            }
            Err(e) => {
                error!(
                    path = %self.writer.target().display(),
                    error = %e.io_error(),
                    "Permanent channels snapshot write failed"
                );
                self.alerts.raise(OperatorAlert::now(
                    AlertSeverity::Critical,
                    format!("database: {e}"),
                ));
                Err(e)
            }
        }
    }

    /// Veto deletion of permanent channels.
    #[allow(clippy::unused_self)]
    pub fn on_channel_pre_delete(&self, channel: &Channel) -> HookResult {
        if channel.is_permanent() {
            HookResult::Deny
        } else {
            HookResult::Passthrough
        }
    }

    /// Delete every channel with no members, then unregister the permanent
    /// mode. Returns the names of the deleted channels.
    ///
    /// While loaded, the deletion veto keeps empty permanent channels alive;
    /// once the mode is gone nothing else would ever collect them.
    pub fn shutdown(
        &mut self,
        registry: &mut dyn ChannelRegistry,
        modes: &mut ModeTable,
        observer: &mut dyn ChannelObserver,
    ) -> Vec<String> {
        let mut removed = Vec::new();
        for name in registry.names() {
            let Some(chan) = registry.find(&name) else {
                continue;
            };
            if chan.member_count() != 0 {
                continue;
            }
            if registry::delete(registry, observer, &name).is_some() {
                removed.push(name);
            }
        }
        modes.unregister(PERMANENT_MODE);
        info!(removed = removed.len(), "Permanent channels service shut down");
        removed
    }

    /// Return whether a flush is pending.
    pub const fn is_dirty(&self) -> bool {
        self.dirty.is_dirty()
    }

    /// Return the snapshot writer.
    pub const fn writer(&self) -> &AtomicWriter {
        &self.writer
    }

    /// Return the alert sink.
    pub const fn alerts(&self) -> &S {
        &self.alerts
    }
}
