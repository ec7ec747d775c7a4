//! Channel mode handlers and the mode table.
//!
//! Every mode letter maps to one [`ModeHandler`] variant. The set of
//! variants is closed: plain flags, parametrised settings (key, limit), and
//! the permanent flag, whose transitions are owned by [`crate::gate`].
//! Dispatch goes through [`ModeTable`], keyed by letter.

use std::collections::BTreeMap;

use crate::channel::PERMANENT_MODE;
use crate::gate;
use crate::registry::{ChannelObserver, ChannelRegistry};

/// Outcome of a single mode change request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeAction {
    /// The change was a real state transition and has been applied.
    Allow,
    /// The change was refused or had no effect.
    Deny,
}

/// How a mode letter behaves when set or unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeHandler {
    /// A boolean flag with no parameter (`n`, `t`, `s`, ...).
    Flag,
    /// A setting that takes a parameter when added.
    Parameter {
        /// Whether removing the mode also consumes a parameter (`k` does,
        /// `l` does not).
        unset_needs_param: bool,
    },
    /// The permanent flag. Transitions go through [`gate::toggle`].
    Permanent,
}

impl ModeHandler {
    /// Return whether a change in the given direction consumes a parameter.
    pub const fn needs_param(self, adding: bool) -> bool {
        match self {
            Self::Flag | Self::Permanent => false,
            Self::Parameter { unset_needs_param } => adding || unset_needs_param,
        }
    }

    /// Apply a change of `letter` to the named channel.
    ///
    /// Returns [`ModeAction::Allow`] only when the channel state actually
    /// changed. A missing channel, a missing parameter, or a request that
    /// would leave the state as it was all yield [`ModeAction::Deny`].
    /// `observer` hears of a channel the change deletes.
    pub fn apply(
        self,
        letter: char,
        registry: &mut dyn ChannelRegistry,
        observer: &mut dyn ChannelObserver,
        channel: &str,
        param: Option<&str>,
        adding: bool,
    ) -> ModeAction {
        if self == Self::Permanent {
            return gate::toggle(registry, observer, channel, adding);
        }
        let Some(chan) = registry.find_mut(channel) else {
            return ModeAction::Deny;
        };
        let modes = chan.modes_mut();
        let changed = match self {
            Self::Flag => modes.set_flag(letter, adding),
            Self::Parameter { .. } if adding => match param {
                Some(value) if !value.is_empty() => modes.set_param(letter, value),
                _ => false,
            },
            Self::Parameter { .. } => modes.clear_param(letter),
            Self::Permanent => false,
        };
        if changed {
            ModeAction::Allow
        } else {
            ModeAction::Deny
        }
    }
}

/// A registered mode letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeDefinition {
    /// The mode letter.
    pub letter: char,
    /// Human-readable mode name.
    pub name: &'static str,
    /// Behaviour of the mode.
    pub handler: ModeHandler,
}

/// Definition of the permanent channel mode.
pub const PERMANENT_DEFINITION: ModeDefinition = ModeDefinition {
    letter: PERMANENT_MODE,
    name: "permanent",
    handler: ModeHandler::Permanent,
};

/// Standard channel modes every server provides.
const STANDARD_MODES: [ModeDefinition; 8] = [
    ModeDefinition { letter: 'i', name: "inviteonly", handler: ModeHandler::Flag },
    ModeDefinition { letter: 'm', name: "moderated", handler: ModeHandler::Flag },
    ModeDefinition { letter: 'n', name: "noextmsg", handler: ModeHandler::Flag },
    ModeDefinition { letter: 'p', name: "private", handler: ModeHandler::Flag },
    ModeDefinition { letter: 's', name: "secret", handler: ModeHandler::Flag },
    ModeDefinition { letter: 't', name: "topiclock", handler: ModeHandler::Flag },
    ModeDefinition {
        letter: 'k',
        name: "key",
        handler: ModeHandler::Parameter { unset_needs_param: true },
    },
    ModeDefinition {
        letter: 'l',
        name: "limit",
        handler: ModeHandler::Parameter { unset_needs_param: false },
    },
];

/// Lookup table from mode letter to definition.
#[derive(Debug, Clone, Default)]
pub struct ModeTable {
    /// Registered definitions keyed by letter.
    modes: BTreeMap<char, ModeDefinition>,
}

impl ModeTable {
    /// Create an empty table.
    pub const fn new() -> Self {
        Self {
            modes: BTreeMap::new(),
        }
    }

    /// Create a table holding the standard channel modes (`imnpst`, `k`,
    /// `l`). The permanent mode is registered separately by the service.
    pub fn with_standard_modes() -> Self {
        let mut table = Self::new();
        for def in STANDARD_MODES {
            table.register(def);
        }
        table
    }

    /// Register a mode. Returns `false` if the letter is already taken.
    pub fn register(&mut self, def: ModeDefinition) -> bool {
        if self.modes.contains_key(&def.letter) {
            return false;
        }
        self.modes.insert(def.letter, def);
        true
    }

    /// Unregister a mode letter, returning its definition if it existed.
    pub fn unregister(&mut self, letter: char) -> Option<ModeDefinition> {
        self.modes.remove(&letter)
    }

    /// Look up a mode letter.
    pub fn find(&self, letter: char) -> Option<&ModeDefinition> {
        self.modes.get(&letter)
    }

    /// Set or unset a mode on a channel through its registered handler.
    ///
    /// Unknown letters are denied.
    pub fn set_mode(
        &self,
        registry: &mut dyn ChannelRegistry,
        observer: &mut dyn ChannelObserver,
        channel: &str,
        letter: char,
        param: Option<&str>,
        adding: bool,
    ) -> ModeAction {
        match self.find(letter) {
            Some(def) => def.handler.apply(letter, registry, observer, channel, param, adding),
            None => ModeAction::Deny,
        }
    }

    /// Split a mode sequence such as `"+ntk-s key"` into individual changes.
    ///
    /// The first whitespace-separated token holds the letters; every later
    /// token is the parameter for the next letter whose handler consumes
    /// one. `+` and `-` switch direction, starting with adding. Letters the
    /// table does not know are dropped without consuming a parameter. A
    /// letter that needs a parameter when none are left gets `None`.
    pub fn parse_sequence(&self, sequence: &str) -> Vec<ModeChange> {
        let mut tokens = sequence.split_whitespace();
        let Some(letters) = tokens.next() else {
            return Vec::new();
        };

        let mut adding = true;
        let mut changes = Vec::new();
        for letter in letters.chars() {
            match letter {
                '+' => adding = true,
                '-' => adding = false,
                _ => {
                    let Some(def) = self.find(letter) else {
                        continue;
                    };
                    let param = if def.handler.needs_param(adding) {
                        tokens.next().map(str::to_owned)
                    } else {
                        None
                    };
                    changes.push(ModeChange {
                        letter,
                        param,
                        adding,
                    });
                }
            }
        }
        changes
    }
}

/// One mode change parsed from a sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeChange {
    /// The mode letter.
    pub letter: char,
    /// The parameter, if the handler consumes one.
    pub param: Option<String>,
    /// `true` to set, `false` to unset.
    pub adding: bool,
}

impl core::fmt::Display for ModeChange {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let sign = if self.adding { '+' } else { '-' };
        match &self.param {
            Some(param) => write!(f, "{sign}{} {param}", self.letter),
            None => write!(f, "{sign}{}", self.letter),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::registry::{MemoryRegistry, NoOpObserver};

    fn table() -> ModeTable {
        let mut table = ModeTable::with_standard_modes();
        table.register(PERMANENT_DEFINITION);
        table
    }

    fn set(
        table: &ModeTable,
        reg: &mut MemoryRegistry,
        channel: &str,
        letter: char,
        param: Option<&str>,
        adding: bool,
    ) -> ModeAction {
        table.set_mode(reg, &mut NoOpObserver, channel, letter, param, adding)
    }

    fn change(letter: char, param: Option<&str>, adding: bool) -> ModeChange {
        ModeChange {
            letter,
            param: param.map(str::to_owned),
            adding,
        }
    }

    #[test]
    fn parse_flags_only() {
        let changes = table().parse_sequence("nt");
        assert_eq!(changes, vec![change('n', None, true), change('t', None, true)]);
    }

    #[test]
    fn parse_assigns_params_in_order() {
        let changes = table().parse_sequence("ntkl secret 25");
        assert_eq!(
            changes,
            vec![
                change('n', None, true),
                change('t', None, true),
                change('k', Some("secret"), true),
                change('l', Some("25"), true),
            ]
        );
    }

    #[test]
    fn parse_skips_unknown_letters_without_consuming() {
        let changes = table().parse_sequence("xkZl pass 10");
        assert_eq!(
            changes,
            vec![change('k', Some("pass"), true), change('l', Some("10"), true)]
        );
    }

    #[test]
    fn parse_handles_direction_switches() {
        let changes = table().parse_sequence("+n-lk oldkey");
        assert_eq!(
            changes,
            vec![
                change('n', None, true),
                change('l', None, false),
                change('k', Some("oldkey"), false),
            ]
        );
    }

    #[test]
    fn parse_missing_param_yields_none() {
        let changes = table().parse_sequence("k");
        assert_eq!(changes, vec![change('k', None, true)]);
    }

    #[test]
    fn parse_empty_sequence() {
        assert!(table().parse_sequence("   ").is_empty());
    }

    #[test]
    fn register_rejects_taken_letter() {
        let mut table = table();
        assert!(!table.register(PERMANENT_DEFINITION));
        assert!(table.unregister('P').is_some());
        assert!(table.register(PERMANENT_DEFINITION));
    }

    #[test]
    fn flag_apply_reports_transitions() {
        let table = table();
        let mut reg = MemoryRegistry::new();
        reg.create("#a", 0).unwrap();
        assert_eq!(set(&table, &mut reg, "#a", 'n', None, true), ModeAction::Allow);
        assert_eq!(set(&table, &mut reg, "#a", 'n', None, true), ModeAction::Deny);
        assert_eq!(set(&table, &mut reg, "#a", 'n', None, false), ModeAction::Allow);
        assert_eq!(set(&table, &mut reg, "#a", 'n', None, false), ModeAction::Deny);
    }

    #[test]
    fn parameter_apply_requires_value() {
        let table = table();
        let mut reg = MemoryRegistry::new();
        reg.create("#a", 0).unwrap();
        assert_eq!(set(&table, &mut reg, "#a", 'k', None, true), ModeAction::Deny);
        assert_eq!(set(&table, &mut reg, "#a", 'k', Some(""), true), ModeAction::Deny);
        assert_eq!(set(&table, &mut reg, "#a", 'k', Some("pw"), true), ModeAction::Allow);
        assert_eq!(reg.find("#a").unwrap().modes().param('k'), Some("pw"));
        assert_eq!(set(&table, &mut reg, "#a", 'k', None, false), ModeAction::Allow);
        assert!(!reg.find("#a").unwrap().modes().is_set('k'));
    }

    #[test]
    fn unknown_letter_or_channel_is_denied() {
        let table = table();
        let mut reg = MemoryRegistry::new();
        reg.create("#a", 0).unwrap();
        assert_eq!(set(&table, &mut reg, "#a", 'Q', None, true), ModeAction::Deny);
        assert_eq!(set(&table, &mut reg, "#nope", 'n', None, true), ModeAction::Deny);
    }

    #[test]
    fn mode_change_display() {
        assert_eq!(change('k', Some("pw"), true).to_string(), "+k pw");
        assert_eq!(change('n', None, false).to_string(), "-n");
    }
}
