//! The channel registry seam.
//!
//! The registry itself belongs to the host server. This module defines the
//! [`ChannelRegistry`] trait the permanent-channel subsystem consumes, and
//! [`MemoryRegistry`], an ordered in-memory implementation used by the
//! daemon and by tests.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use crate::channel::Channel;

/// Receives notice of channels about to be deleted.
///
/// Every deletion made by this crate goes through [`delete`], which calls
/// the observer first, so the host can tell peers and clean up.
pub trait ChannelObserver {
    /// Called just before `channel` is removed from the registry.
    fn on_channel_delete(&mut self, channel: &Channel);
}

/// A no-op channel observer.
pub struct NoOpObserver;

impl ChannelObserver for NoOpObserver {
    fn on_channel_delete(&mut self, _channel: &Channel) {}
}

/// Notify `observer`, then remove the named channel.
///
/// Returns the removed channel, or `None` (without notifying) if no such
/// channel exists.
pub fn delete(
    registry: &mut dyn ChannelRegistry,
    observer: &mut dyn ChannelObserver,
    name: &str,
) -> Option<Channel> {
    observer.on_channel_delete(registry.find(name)?);
    registry.remove(name)
}

/// Errors that can occur when creating channels.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A channel with this name already exists.
    #[error("channel already exists: {0}")]
    AlreadyExists(String),

    /// Channel names must not be empty.
    #[error("channel name must not be empty")]
    EmptyName,
}

/// Create, find, delete, and iterate channels.
///
/// Iteration order is the order the snapshot file is written in, so
/// implementations should keep it stable between calls when the channel
/// set has not changed.
pub trait ChannelRegistry {
    /// Look up a channel by exact name.
    fn find(&self, name: &str) -> Option<&Channel>;

    /// Look up a channel by exact name for mutation.
    fn find_mut(&mut self, name: &str) -> Option<&mut Channel>;

    /// Create a new empty channel.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AlreadyExists`] if the name is taken, or
    /// [`RegistryError::EmptyName`] for an empty name.
    fn create(&mut self, name: &str, created_at: i64) -> Result<&mut Channel, RegistryError>;

    /// Remove a channel unconditionally, returning it if it existed.
    ///
    /// Callers are responsible for consulting deletion vetoes first.
    fn remove(&mut self, name: &str) -> Option<Channel>;

    /// Iterate all channels in registry order.
    fn channels(&self) -> Box<dyn Iterator<Item = &Channel> + '_>;

    /// Snapshot the current channel names in registry order.
    ///
    /// Used by sweeps that remove channels while walking the set.
    fn names(&self) -> Vec<String> {
        self.channels().map(|c| c.name().to_owned()).collect()
    }

    /// Return the number of channels.
    fn len(&self) -> usize {
        self.channels().count()
    }

    /// Return whether the registry holds no channels.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory registry ordered by channel name.
#[derive(Debug, Clone, Default)]
pub struct MemoryRegistry {
    /// Channels keyed by name.
    channels: BTreeMap<String, Channel>,
}

impl MemoryRegistry {
    /// Create an empty registry.
    pub const fn new() -> Self {
        Self {
            channels: BTreeMap::new(),
        }
    }
}

impl ChannelRegistry for MemoryRegistry {
    fn find(&self, name: &str) -> Option<&Channel> {
        self.channels.get(name)
    }

    fn find_mut(&mut self, name: &str) -> Option<&mut Channel> {
        self.channels.get_mut(name)
    }

    fn create(&mut self, name: &str, created_at: i64) -> Result<&mut Channel, RegistryError> {
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        match self.channels.entry(name.to_owned()) {
            Entry::Occupied(_) => Err(RegistryError::AlreadyExists(name.to_owned())),
            Entry::Vacant(slot) => Ok(slot.insert(Channel::new(name, created_at))),
        }
    }

    fn remove(&mut self, name: &str) -> Option<Channel> {
        self.channels.remove(name)
    }

    fn channels(&self) -> Box<dyn Iterator<Item = &Channel> + '_> {
        Box::new(self.channels.values())
    }

    fn len(&self) -> usize {
        self.channels.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn create_then_find() {
        let mut reg = MemoryRegistry::new();
        reg.create("#b", 10).unwrap();
        assert_eq!(reg.find("#b").unwrap().created_at(), 10);
        assert!(reg.find("#missing").is_none());
    }

    #[test]
    fn duplicate_create_is_rejected() {
        let mut reg = MemoryRegistry::new();
        reg.create("#b", 10).unwrap();
        let err = reg.create("#b", 20).unwrap_err();
        assert_eq!(err, RegistryError::AlreadyExists("#b".to_owned()));
        assert_eq!(reg.find("#b").unwrap().created_at(), 10);
    }

    #[test]
    fn empty_name_is_rejected() {
        let mut reg = MemoryRegistry::new();
        assert_eq!(reg.create("", 0).unwrap_err(), RegistryError::EmptyName);
        assert!(reg.is_empty());
    }

    #[test]
    fn iteration_is_ordered_by_name() {
        let mut reg = MemoryRegistry::new();
        reg.create("#zeta", 0).unwrap();
        reg.create("#alpha", 0).unwrap();
        reg.create("#mid", 0).unwrap();
        assert_eq!(reg.names(), vec!["#alpha", "#mid", "#zeta"]);
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn remove_returns_channel() {
        let mut reg = MemoryRegistry::new();
        reg.create("#gone", 0).unwrap();
        assert!(reg.remove("#gone").is_some());
        assert!(reg.remove("#gone").is_none());
        assert!(reg.is_empty());
    }
}
