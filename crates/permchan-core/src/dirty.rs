//! Dirty flag recording that the snapshot on disk is out of date.

/// Tracks whether a permanent channel changed since the last flush.
///
/// The flag says nothing about *what* changed: every flush rewrites the
/// whole snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirtyTracker {
    /// Whether a relevant mutation happened since the last clear.
    dirty: bool,
}

impl DirtyTracker {
    /// Create a clean tracker.
    pub const fn new() -> Self {
        Self { dirty: false }
    }

    /// Record a relevant mutation.
    pub const fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Return whether a flush is pending.
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Forget pending mutations.
    pub const fn clear(&mut self) {
        self.dirty = false;
    }
}
