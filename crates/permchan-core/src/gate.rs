//! Transitions of the permanent flag.
//!
//! Adding is accepted only when the flag is unset, removing only when it
//! is set. Any other request is denied and leaves the channel untouched.
//! Removing the flag from a channel with no members deletes the channel on
//! the spot: the deletion veto in
//! [`PermanentChannels::on_channel_pre_delete`] kept it alive while it was
//! permanent, and nothing else would collect it afterwards.
//!
//! [`PermanentChannels::on_channel_pre_delete`]: crate::service::PermanentChannels::on_channel_pre_delete

use tracing::info;

use crate::channel::PERMANENT_MODE;
use crate::modes::ModeAction;
use crate::registry::{self, ChannelObserver, ChannelRegistry};

/// Set the permanent flag on a channel.
pub fn add(registry: &mut dyn ChannelRegistry, channel: &str) -> ModeAction {
    let Some(chan) = registry.find_mut(channel) else {
        return ModeAction::Deny;
    };
    if chan.is_permanent() {
        return ModeAction::Deny;
    }
    chan.modes_mut().set_flag(PERMANENT_MODE, true);
    ModeAction::Allow
}

/// Clear the permanent flag, deleting the channel if it is empty.
///
/// `observer` is told about the deletion before the channel goes away.
pub fn remove(
    registry: &mut dyn ChannelRegistry,
    observer: &mut dyn ChannelObserver,
    channel: &str,
) -> ModeAction {
    let Some(chan) = registry.find_mut(channel) else {
        return ModeAction::Deny;
    };
    if !chan.is_permanent() {
        return ModeAction::Deny;
    }
    chan.modes_mut().set_flag(PERMANENT_MODE, false);
    if chan.member_count() == 0 {
        registry::delete(registry, observer, channel);
        info!(channel, "Removed empty channel after clearing permanent flag");
    }
    ModeAction::Allow
}

/// Dispatch to [`add`] or [`remove`].
pub fn toggle(
    registry: &mut dyn ChannelRegistry,
    observer: &mut dyn ChannelObserver,
    channel: &str,
    adding: bool,
) -> ModeAction {
    if adding {
        add(registry, channel)
    } else {
        remove(registry, observer, channel)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::registry::{MemoryRegistry, NoOpObserver};

    fn registry_with(name: &str, members: u32) -> MemoryRegistry {
        let mut reg = MemoryRegistry::new();
        let chan = reg.create(name, 0).unwrap();
        for _ in 0..members {
            chan.add_member();
        }
        reg
    }

    #[test]
    fn add_is_accepted_once() {
        let mut reg = registry_with("#a", 1);
        assert_eq!(add(&mut reg, "#a"), ModeAction::Allow);
        assert!(reg.find("#a").unwrap().is_permanent());
        assert_eq!(add(&mut reg, "#a"), ModeAction::Deny);
        assert!(reg.find("#a").unwrap().is_permanent());
    }

    #[test]
    fn remove_requires_flag() {
        let mut reg = registry_with("#a", 1);
        assert_eq!(remove(&mut reg, &mut NoOpObserver, "#a"), ModeAction::Deny);
        assert!(reg.find("#a").is_some());
    }

    #[test]
    fn remove_keeps_occupied_channel() {
        let mut reg = registry_with("#a", 2);
        add(&mut reg, "#a");
        assert_eq!(remove(&mut reg, &mut NoOpObserver, "#a"), ModeAction::Allow);
        let chan = reg.find("#a").unwrap();
        assert!(!chan.is_permanent());
        assert_eq!(chan.member_count(), 2);
    }

    #[test]
    fn remove_deletes_empty_channel() {
        let mut reg = registry_with("#a", 0);
        add(&mut reg, "#a");
        assert_eq!(remove(&mut reg, &mut NoOpObserver, "#a"), ModeAction::Allow);
        assert!(reg.find("#a").is_none());
    }

    #[derive(Default)]
    struct Recorder(Vec<String>);

    impl ChannelObserver for Recorder {
        fn on_channel_delete(&mut self, channel: &crate::channel::Channel) {
            self.0.push(channel.name().to_owned());
        }
    }

    #[test]
    fn forced_removal_notifies_observer() {
        let mut reg = registry_with("#a", 0);
        add(&mut reg, "#a");
        let mut seen = Recorder::default();
        assert_eq!(remove(&mut reg, &mut seen, "#a"), ModeAction::Allow);
        assert_eq!(seen.0, vec!["#a"]);

        let mut reg = registry_with("#b", 1);
        add(&mut reg, "#b");
        let mut seen = Recorder::default();
        assert_eq!(remove(&mut reg, &mut seen, "#b"), ModeAction::Allow);
        assert!(seen.0.is_empty());
    }

    #[test]
    fn each_accepted_transition_flips_only_the_flag() {
        let mut reg = registry_with("#a", 1);
        reg.find_mut("#a").unwrap().modes_mut().set_flag('n', true);
        let before = reg.find("#a").unwrap().modes().clone();

        assert_eq!(toggle(&mut reg, &mut NoOpObserver, "#a", true), ModeAction::Allow);
        let mut expected = before.clone();
        expected.set_flag(PERMANENT_MODE, true);
        assert_eq!(reg.find("#a").unwrap().modes(), &expected);

        assert_eq!(toggle(&mut reg, &mut NoOpObserver, "#a", false), ModeAction::Allow);
        assert_eq!(reg.find("#a").unwrap().modes(), &before);
    }

    #[test]
    fn missing_channel_is_denied() {
        let mut reg = MemoryRegistry::new();
        assert_eq!(toggle(&mut reg, &mut NoOpObserver, "#ghost", true), ModeAction::Deny);
        assert_eq!(toggle(&mut reg, &mut NoOpObserver, "#ghost", false), ModeAction::Deny);
    }
}
