//! The in-process host server.
//!
//! [`Host`] owns the channel registry, the mode table, and the
//! permanent-channel service, and calls the service hooks in the order a
//! real server would: the raw-mode hook before each mode change, the
//! topic hook after a topic change, and the deletion veto before an
//! emptied channel is removed.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::Utc;
use permchan_core::{
    Channel, ChannelObserver, ChannelRegistry, HookResult, MemoryRegistry, ModeAction, ModeTable,
    PermChannelsConfig, PermanentChannels, RehydrateReport, TimerOutcome,
};
use tracing::{debug, info, warn};

use crate::error::CommandError;

/// Nick recorded as the setter of topics changed from the console.
const CONSOLE_NICK: &str = "console";

/// Logs each channel deleted by a part, a `-P`, or the shutdown sweep.
struct DeletionLogger;

impl ChannelObserver for DeletionLogger {
    fn on_channel_delete(&mut self, channel: &Channel) {
        debug!(channel = channel.name(), "Deleting empty channel");
    }
}

/// The in-process host server.
pub struct Host {
    /// Path the configuration is reloaded from on rehash.
    config_path: PathBuf,
    /// Configuration currently in effect.
    config: PermChannelsConfig,
    /// All live channels.
    registry: MemoryRegistry,
    /// Registered channel modes.
    modes: ModeTable,
    /// The permanent-channel service.
    service: PermanentChannels,
}

impl Host {
    /// Start a host: register standard modes and load the service.
    pub fn start(config_path: PathBuf, config: PermChannelsConfig) -> Self {
        let mut registry = MemoryRegistry::new();
        let mut modes = ModeTable::with_standard_modes();
        let mut service = PermanentChannels::new();
        let report = service.init(
            &mut registry,
            &mut modes,
            &mut DeletionLogger,
            &config,
            now(),
        );
        info!(
            created = report.created.len(),
            modes_applied = report.modes_applied,
            "Declared channels loaded"
        );
        Self {
            config_path,
            config,
            registry,
            modes,
            service,
        }
    }

    /// Return the configured seconds between timer ticks, at least one.
    pub fn flush_interval_secs(&self) -> u64 {
        self.config.server.flush_interval_secs.max(1)
    }

    /// Return the registry.
    pub const fn registry(&self) -> &MemoryRegistry {
        &self.registry
    }

    /// Run one command and return the reply text.
    ///
    /// [`Command::Quit`](crate::console::Command::Quit) replies with
    /// nothing; stopping is up to the caller.
    pub fn execute(&mut self, command: crate::console::Command) -> Result<String, CommandError> {
        use crate::console::Command;

        match command {
            Command::Join { channel } => self.join(&channel),
            Command::Part { channel } => self.part(&channel),
            Command::Topic { channel, text } => self.topic(&channel, &text),
            Command::Mode { channel, sequence } => self.mode(&channel, &sequence),
            Command::Show { channel } => self.show(&channel),
            Command::List => Ok(self.list()),
            Command::Flush => self.flush(),
            Command::Rehash => self.rehash(),
            Command::Alerts => Ok(self.alerts()),
            Command::Help => Ok(crate::console::HELP.to_owned()),
            Command::Quit => Ok(String::new()),
        }
    }

    /// Add one member, creating the channel if it does not exist.
    pub fn join(&mut self, channel: &str) -> Result<String, CommandError> {
        if self.registry.find(channel).is_none() {
            self.registry.create(channel, now())?;
        }
        let members = self.find_mut(channel)?.add_member();
        Ok(format!("{channel}: {members} member(s)"))
    }

    /// Remove one member. An emptied channel is deleted unless the service
    /// vetoes it.
    pub fn part(&mut self, channel: &str) -> Result<String, CommandError> {
        let chan = self.find_mut(channel)?;
        if chan.member_count() == 0 {
            return Ok(format!("{channel}: no members"));
        }
        let members = chan.remove_member();
        if members != 0 {
            return Ok(format!("{channel}: {members} member(s)"));
        }

        let chan = self.find(channel)?;
        if self.service.on_channel_pre_delete(chan) == HookResult::Deny {
            return Ok(format!("{channel}: empty, kept (permanent)"));
        }
        permchan_core::registry::delete(&mut self.registry, &mut DeletionLogger, channel);
        Ok(format!("{channel}: empty, deleted"))
    }

    /// Set the topic and notify the service.
    pub fn topic(&mut self, channel: &str, text: &str) -> Result<String, CommandError> {
        self.find_mut(channel)?.set_topic(text, CONSOLE_NICK, now());
        if let Some(chan) = self.registry.find(channel) {
            self.service.on_post_topic_change(chan);
        }
        Ok(format!("{channel}: topic set"))
    }

    /// Apply a mode sequence, one change at a time.
    pub fn mode(&mut self, channel: &str, sequence: &str) -> Result<String, CommandError> {
        self.find(channel)?;
        let mut applied = Vec::new();
        for change in self.modes.parse_sequence(sequence) {
            self.service.on_raw_mode(self.registry.find(channel), change.letter);
            let action = self.modes.set_mode(
                &mut self.registry,
                &mut DeletionLogger,
                channel,
                change.letter,
                change.param.as_deref(),
                change.adding,
            );
            if action == ModeAction::Allow {
                applied.push(change.to_string());
            }
        }

        let mut reply = if applied.is_empty() {
            format!("{channel}: no mode changes")
        } else {
            format!("{channel}: {}", applied.join(" "))
        };
        if self.registry.find(channel).is_none() {
            reply.push_str(" (channel deleted)");
        }
        Ok(reply)
    }

    /// Render one channel as pretty JSON.
    pub fn show(&self, channel: &str) -> Result<String, CommandError> {
        Ok(serde_json::to_string_pretty(self.find(channel)?)?)
    }

    /// One line per channel: name, member count, modes.
    pub fn list(&self) -> String {
        let mut out = String::new();
        for chan in self.registry.channels() {
            let _ = writeln!(
                out,
                "{} members={} modes=+{}",
                chan.name(),
                chan.member_count(),
                chan.modes().render()
            );
        }
        if out.is_empty() {
            out.push_str("no channels");
        }
        out.trim_end().to_owned()
    }

    /// Write the snapshot immediately.
    pub fn flush(&mut self) -> Result<String, CommandError> {
        let report = self.service.flush(&self.registry)?;
        Ok(format!(
            "wrote {} channel(s), {} bytes to {}",
            report.records,
            report.bytes,
            self.service.writer().target().display()
        ))
    }

    /// Reload the configuration file and rehydrate declared channels.
    pub fn rehash(&mut self) -> Result<String, CommandError> {
        let config = load_config(&self.config_path)?;
        let report = self.service.on_rehash(
            &mut self.registry,
            &self.modes,
            &mut DeletionLogger,
            &config,
            now(),
        );
        self.config = config;
        Ok(describe_rehash(&report))
    }

    /// Print operator alerts, newest first.
    pub fn alerts(&self) -> String {
        let alerts = self.service.alerts().all();
        if alerts.is_empty() {
            return "no alerts".to_owned();
        }
        let mut out = String::new();
        for alert in alerts {
            let _ = writeln!(
                out,
                "{} {:?} {}",
                alert.raised_at.to_rfc3339(),
                alert.severity,
                alert.message
            );
        }
        out.trim_end().to_owned()
    }

    /// Run the background timer hook.
    pub fn tick(&mut self) {
        match self.service.on_background_timer(&self.registry) {
            TimerOutcome::Idle => {}
            TimerOutcome::Flushed(report) => {
                debug!(records = report.records, "Timer flush complete");
            }
            TimerOutcome::Failed(e) => {
                warn!(error = %e, "Timer flush failed");
            }
        }
    }

    /// Unload the service, deleting every empty channel.
    pub fn shutdown(mut self) -> Vec<String> {
        self.service
            .shutdown(&mut self.registry, &mut self.modes, &mut DeletionLogger)
    }

    fn find(&self, channel: &str) -> Result<&Channel, CommandError> {
        self.registry
            .find(channel)
            .ok_or_else(|| CommandError::NoSuchChannel {
                channel: channel.to_owned(),
            })
    }

    fn find_mut(&mut self, channel: &str) -> Result<&mut Channel, CommandError> {
        self.registry
            .find_mut(channel)
            .ok_or_else(|| CommandError::NoSuchChannel {
                channel: channel.to_owned(),
            })
    }
}

/// Load the configuration file, or defaults if it does not exist.
pub fn load_config(path: &Path) -> Result<PermChannelsConfig, permchan_core::ConfigError> {
    if path.exists() {
        PermChannelsConfig::from_file(path)
    } else {
        PermChannelsConfig::parse("")
    }
}

fn describe_rehash(report: &RehydrateReport) -> String {
    let mut out = format!(
        "rehashed: {} created, {} existing",
        report.created.len(),
        report.existing
    );
    if report.malformed > 0 {
        let _ = write!(out, ", {} malformed", report.malformed);
    }
    out
}

fn now() -> i64 {
    Utc::now().timestamp()
}
