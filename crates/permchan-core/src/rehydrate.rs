//! Creating declared channels from configuration.
//!
//! Runs at startup and on every rehash. Each [`ChannelTag`] whose channel
//! does not exist yet produces a new channel with the declared topic and
//! modes. A channel that already exists is never touched, whatever its
//! current state, so running the same list twice is the same as running
//! it once.

use tracing::{debug, warn};

use crate::config::ChannelTag;
use crate::modes::{ModeAction, ModeTable};
use crate::registry::{ChannelObserver, ChannelRegistry};

/// Topic timestamp given to declared topics.
///
/// Linked servers settle topic conflicts by comparing timestamps. This
/// constant sits below any real clock value, so a declared topic wins when
/// a peer's topic for the same channel is merged in.
pub const DECLARED_TOPIC_TS: i64 = 42;

/// What one rehydration pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RehydrateReport {
    /// Names of channels created by this pass, in declaration order.
    pub created: Vec<String>,
    /// Declared channels that already existed and were left alone.
    pub existing: usize,
    /// Records skipped for an empty channel name.
    pub malformed: usize,
    /// Mode changes accepted on newly created channels.
    pub modes_applied: usize,
}

/// Create every declared channel that does not exist yet.
///
/// `now` becomes the creation timestamp of new channels; `server_name` is
/// recorded as the setter of declared topics.
pub fn rehydrate(
    registry: &mut dyn ChannelRegistry,
    modes: &ModeTable,
    observer: &mut dyn ChannelObserver,
    tags: &[ChannelTag],
    now: i64,
    server_name: &str,
) -> RehydrateReport {
    let mut report = RehydrateReport::default();

    for tag in tags {
        if tag.channel.is_empty() {
            debug!("Malformed permchannels tag with empty channel name");
            report.malformed = report.malformed.saturating_add(1);
            continue;
        }

        if registry.find(&tag.channel).is_some() {
            report.existing = report.existing.saturating_add(1);
            continue;
        }

        let chan = match registry.create(&tag.channel, now) {
            Ok(chan) => chan,
            Err(e) => {
                warn!(channel = %tag.channel, error = %e, "Could not create declared channel");
                continue;
            }
        };
        if !tag.topic.is_empty() {
            chan.set_topic(&tag.topic, server_name, DECLARED_TOPIC_TS);
        }
        debug!(channel = %tag.channel, topic = %tag.topic, "Added declared channel");
        report.created.push(tag.channel.clone());

        for change in modes.parse_sequence(&tag.modes) {
            let action = modes.set_mode(
                registry,
                observer,
                &tag.channel,
                change.letter,
                change.param.as_deref(),
                change.adding,
            );
            if action == ModeAction::Allow {
                report.modes_applied = report.modes_applied.saturating_add(1);
            } else {
                debug!(channel = %tag.channel, mode = %change, "Declared mode not applied");
            }
        }
    }

    report
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::modes::PERMANENT_DEFINITION;
    use crate::registry::{MemoryRegistry, NoOpObserver};

    fn table() -> ModeTable {
        let mut table = ModeTable::with_standard_modes();
        table.register(PERMANENT_DEFINITION);
        table
    }

    fn tag(channel: &str, topic: &str, modes: &str) -> ChannelTag {
        ChannelTag {
            channel: channel.to_owned(),
            topic: topic.to_owned(),
            modes: modes.to_owned(),
        }
    }

    #[test]
    fn creates_declared_channel_with_topic_and_modes() {
        let mut reg = MemoryRegistry::new();
        let report = rehydrate(
            &mut reg,
            &table(),
            &mut NoOpObserver,
            &[tag("#help", "Ask here", "Pnt")],
            1_000,
            "irc.local",
        );

        assert_eq!(report.created, vec!["#help"]);
        assert_eq!(report.modes_applied, 3);
        let chan = reg.find("#help").unwrap();
        assert_eq!(chan.created_at(), 1_000);
        assert_eq!(chan.topic().text, "Ask here");
        assert_eq!(chan.topic().set_by, "irc.local");
        assert_eq!(chan.topic().set_at, DECLARED_TOPIC_TS);
        assert_eq!(chan.modes().render(), "Pnt");
    }

    #[test]
    fn empty_topic_leaves_topic_unset() {
        let mut reg = MemoryRegistry::new();
        rehydrate(
            &mut reg,
            &table(),
            &mut NoOpObserver,
            &[tag("#a", "", "")],
            5,
            "irc.local",
        );
        let chan = reg.find("#a").unwrap();
        assert_eq!(chan.topic().text, "");
        assert_eq!(chan.topic().set_at, 0);
        assert_eq!(chan.modes().render(), "");
    }

    #[test]
    fn malformed_records_are_skipped() {
        let mut reg = MemoryRegistry::new();
        let report = rehydrate(
            &mut reg,
            &table(),
            &mut NoOpObserver,
            &[tag("", "orphan topic", "nt"), tag("#ok", "", "")],
            0,
            "irc.local",
        );
        assert_eq!(report.malformed, 1);
        assert_eq!(report.created, vec!["#ok"]);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn existing_channel_is_never_touched() {
        let mut reg = MemoryRegistry::new();
        let live = reg.create("#help", 7).unwrap();
        live.set_topic("live topic", "alice", 900);
        live.modes_mut().set_flag('s', true);
        let before = live.clone();

        let report = rehydrate(
            &mut reg,
            &table(),
            &mut NoOpObserver,
            &[tag("#help", "Ask here", "Pntk key")],
            1_000,
            "irc.local",
        );

        assert_eq!(report.existing, 1);
        assert!(report.created.is_empty());
        assert_eq!(reg.find("#help").unwrap(), &before);
    }

    #[test]
    fn second_pass_is_a_noop() {
        let mut reg = MemoryRegistry::new();
        let tags = [tag("#help", "Ask here", "Pnt"), tag("#ops", "", "Psk pw")];
        let first = rehydrate(
            &mut reg,
            &table(),
            &mut NoOpObserver,
            &tags,
            1_000,
            "irc.local",
        );
        let after_first: Vec<_> = reg.channels().cloned().collect();

        let second = rehydrate(
            &mut reg,
            &table(),
            &mut NoOpObserver,
            &tags,
            2_000,
            "irc.local",
        );
        let after_second: Vec<_> = reg.channels().cloned().collect();

        assert_eq!(first.created.len(), 2);
        assert!(second.created.is_empty());
        assert_eq!(second.existing, 2);
        assert_eq!(second.modes_applied, 0);
        assert_eq!(after_first, after_second);
    }

    #[test]
    fn params_follow_letters_that_need_them() {
        let mut reg = MemoryRegistry::new();
        rehydrate(
            &mut reg,
            &table(),
            &mut NoOpObserver,
            &[tag("#keyed", "", "Pxkl hunter2 20")],
            0,
            "irc.local",
        );
        let chan = reg.find("#keyed").unwrap();
        assert_eq!(chan.modes().param('k'), Some("hunter2"));
        assert_eq!(chan.modes().param('l'), Some("20"));
        assert!(!chan.modes().is_set('x'));
        assert_eq!(chan.modes().render(), "Pkl hunter2 20");
    }

    #[test]
    fn letter_missing_its_param_is_not_applied() {
        let mut reg = MemoryRegistry::new();
        let report = rehydrate(
            &mut reg,
            &table(),
            &mut NoOpObserver,
            &[tag("#a", "", "nk")],
            0,
            "irc.local",
        );
        assert_eq!(report.modes_applied, 1);
        assert!(!reg.find("#a").unwrap().modes().is_set('k'));
    }
}
