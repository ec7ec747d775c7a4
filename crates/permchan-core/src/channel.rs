//! Channel state as seen by the permanent-channel subsystem.
//!
//! A [`Channel`] is owned by a [`ChannelRegistry`] and carries a name, a
//! creation timestamp, a [`Topic`], a [`ModeState`], and a live member
//! count. The permanent flag is the `P` letter inside the mode state; it
//! is only ever flipped through the gate in [`crate::gate`].
//!
//! [`ChannelRegistry`]: crate::registry::ChannelRegistry

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

/// Mode letter that marks a channel as permanent.
pub const PERMANENT_MODE: char = 'P';

/// A channel topic together with its conflict-resolution timestamp.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Topic {
    /// Topic text. Empty when no topic is set.
    pub text: String,
    /// Nick or server name that set the topic.
    pub set_by: String,
    /// Unix timestamp used by peers for last-writer-wins merging.
    pub set_at: i64,
}

/// The mode letters currently set on a channel.
///
/// Flag modes carry no value; parametrised modes (key, limit) carry one.
/// A letter is never present in both maps at once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModeState {
    /// Letters of set flag modes.
    flags: BTreeSet<char>,
    /// Letters of set parametrised modes and their values.
    params: BTreeMap<char, String>,
}

impl ModeState {
    /// Create an empty mode state.
    pub const fn new() -> Self {
        Self {
            flags: BTreeSet::new(),
            params: BTreeMap::new(),
        }
    }

    /// Return whether `letter` is set, either as a flag or with a parameter.
    pub fn is_set(&self, letter: char) -> bool {
        self.flags.contains(&letter) || self.params.contains_key(&letter)
    }

    /// Set or clear a flag mode. Returns `true` if the state changed.
    pub fn set_flag(&mut self, letter: char, on: bool) -> bool {
        if on {
            self.flags.insert(letter)
        } else {
            self.flags.remove(&letter)
        }
    }

    /// Set a parametrised mode. Returns `true` if the stored value changed.
    pub fn set_param(&mut self, letter: char, value: &str) -> bool {
        if self.params.get(&letter).is_some_and(|current| current == value) {
            return false;
        }
        self.params.insert(letter, value.to_owned());
        true
    }

    /// Clear a parametrised mode. Returns `true` if it was set.
    pub fn clear_param(&mut self, letter: char) -> bool {
        self.params.remove(&letter).is_some()
    }

    /// Return the value of a parametrised mode, if set.
    pub fn param(&self, letter: char) -> Option<&str> {
        self.params.get(&letter).map(String::as_str)
    }

    /// Render the canonical compact mode string.
    ///
    /// Letters come first in ASCII order without a leading `+`, followed by
    /// the parameters of parametrised letters in the same order, each
    /// preceded by a single space. The key is shown in clear.
    ///
    /// ```
    /// use permchan_core::channel::ModeState;
    ///
    /// let mut modes = ModeState::new();
    /// modes.set_flag('t', true);
    /// modes.set_flag('n', true);
    /// modes.set_param('l', "50");
    /// modes.set_flag('P', true);
    /// assert_eq!(modes.render(), "Plnt 50");
    /// ```
    pub fn render(&self) -> String {
        let letters: BTreeSet<char> = self
            .flags
            .iter()
            .chain(self.params.keys())
            .copied()
            .collect();
        let mut out: String = letters.iter().collect();
        for value in self.params.values() {
            out.push(' ');
            out.push_str(value);
        }
        out
    }
}

/// A named channel in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Channel {
    /// Unique channel name, e.g. `#help`.
    name: String,
    /// Unix timestamp of channel creation.
    created_at: i64,
    /// Current topic.
    topic: Topic,
    /// Currently set modes, including the permanent flag.
    modes: ModeState,
    /// Number of users currently joined.
    members: u32,
}

impl Channel {
    /// Create an empty channel with no topic, no modes, and no members.
    pub fn new(name: &str, created_at: i64) -> Self {
        Self {
            name: name.to_owned(),
            created_at,
            topic: Topic::default(),
            modes: ModeState::new(),
            members: 0,
        }
    }

    /// Return the channel name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the creation timestamp.
    pub const fn created_at(&self) -> i64 {
        self.created_at
    }

    /// Return the current topic.
    pub const fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Replace the topic text, setter, and timestamp.
    pub fn set_topic(&mut self, text: &str, set_by: &str, set_at: i64) {
        text.clone_into(&mut self.topic.text);
        set_by.clone_into(&mut self.topic.set_by);
        self.topic.set_at = set_at;
    }

    /// Return the current mode state.
    pub const fn modes(&self) -> &ModeState {
        &self.modes
    }

    /// Return the mode state for mutation.
    pub const fn modes_mut(&mut self) -> &mut ModeState {
        &mut self.modes
    }

    /// Return whether the permanent flag is set.
    pub fn is_permanent(&self) -> bool {
        self.modes.is_set(PERMANENT_MODE)
    }

    /// Return the number of joined users.
    pub const fn member_count(&self) -> u32 {
        self.members
    }

    /// Record a user joining. Returns the new member count.
    pub const fn add_member(&mut self) -> u32 {
        self.members = self.members.saturating_add(1);
        self.members
    }

    /// Record a user leaving. Returns the new member count.
    pub const fn remove_member(&mut self) -> u32 {
        self.members = self.members.saturating_sub(1);
        self.members
    }
}
