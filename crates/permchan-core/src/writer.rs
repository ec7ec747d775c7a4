//! Crash-safe replacement of the snapshot file.
//!
//! [`AtomicWriter::write`] never modifies the target in place. The payload
//! goes to `<target>.tmp`, is flushed and synced to storage, and the temp
//! file is then renamed over the target. A reader of the target therefore
//! sees either the previous complete file or the new complete file.
//!
//! `std::fs::rename` replaces an existing target on both Unix and Windows.
//! On any other platform the old target is removed first, which opens a
//! short window where the file is missing (but never partial).
//!
//! A failure at any step leaves the target untouched, removes the leftover
//! temp file on a best-effort basis, and returns the step's
//! [`PersistError`] with the underlying [`std::io::Error`].

use std::fs::{self, File};
use std::io::{self, BufWriter, Write as _};
use std::path::{Path, PathBuf};

use tracing::debug;

/// Whether `fs::rename` overwrites an existing target on this platform.
const RENAME_REPLACES_TARGET: bool = cfg!(any(unix, windows));

/// Errors that can occur while replacing the snapshot file.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// The temp file could not be created.
    #[error("cannot create new db {}: {source}", path.display())]
    Create {
        /// The temp file path.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },

    /// Writing the payload to the temp file failed.
    #[error("cannot write to new db {}: {source}", path.display())]
    Write {
        /// The temp file path.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },

    /// Flushing buffered data to the temp file failed.
    #[error("cannot flush new db {}: {source}", path.display())]
    Flush {
        /// The temp file path.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },

    /// Syncing the temp file to storage failed.
    #[error("cannot sync new db {}: {source}", path.display())]
    Sync {
        /// The temp file path.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },

    /// Removing the old target before the rename failed.
    #[error("cannot remove old db {}: {source}", path.display())]
    Remove {
        /// The target path.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },

    /// Renaming the temp file over the target failed.
    #[error("cannot replace old db {} with new db: {source}", path.display())]
    Rename {
        /// The target path.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },
}

impl PersistError {
    /// Return the underlying I/O error.
    pub const fn io_error(&self) -> &io::Error {
        match self {
            Self::Create { source, .. }
            | Self::Write { source, .. }
            | Self::Flush { source, .. }
            | Self::Sync { source, .. }
            | Self::Remove { source, .. }
            | Self::Rename { source, .. } => source,
        }
    }
}

/// Atomically replaces one target file.
///
/// An empty target path disables persistence: every write succeeds
/// without touching the filesystem.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AtomicWriter {
    /// Path of the snapshot file.
    target: PathBuf,
}

impl AtomicWriter {
    /// Create a writer for the given target path.
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
        }
    }

    /// Return the target path.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Return whether persistence is disabled (empty path).
    pub fn is_disabled(&self) -> bool {
        self.target.as_os_str().is_empty()
    }

    /// Return the temp file path: the target with `.tmp` appended.
    pub fn temp_path(&self) -> PathBuf {
        let mut name = self.target.clone().into_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }

    /// Replace the target's contents with `payload`.
    ///
    /// # Errors
    ///
    /// Returns the [`PersistError`] of the first failing step. The target
    /// is unchanged in that case.
    pub fn write(&self, payload: &[u8]) -> Result<(), PersistError> {
        self.write_with(payload, RENAME_REPLACES_TARGET, |_| Ok(()))
    }

    /// [`write`](Self::write) with a hook run after the temp file is
    /// synced and closed, just before the target is replaced.
    ///
    /// When `rename_replaces` is false an existing target is removed
    /// before the rename.
    fn write_with<F>(
        &self,
        payload: &[u8],
        rename_replaces: bool,
        before_replace: F,
    ) -> Result<(), PersistError>
    where
        F: FnOnce(&Path) -> Result<(), PersistError>,
    {
        if self.is_disabled() {
            debug!("Snapshot path is empty, persistence disabled");
            return Ok(());
        }

        let temp = self.temp_path();
        let result = self.replace(&temp, payload, rename_replaces, before_replace);
        if result.is_err()
            && let Err(e) = fs::remove_file(&temp)
            && e.kind() != io::ErrorKind::NotFound
        {
            debug!(path = %temp.display(), error = %e, "Could not remove leftover temp file");
        }
        result
    }

    /// Write, flush, sync, and close the temp file, then move it over the
    /// target.
    fn replace<F>(
        &self,
        temp: &Path,
        payload: &[u8],
        rename_replaces: bool,
        before_replace: F,
    ) -> Result<(), PersistError>
    where
        F: FnOnce(&Path) -> Result<(), PersistError>,
    {
        let file = File::create(temp).map_err(|source| PersistError::Create {
            path: temp.to_path_buf(),
            source,
        })?;
        let mut out = BufWriter::new(file);
        out.write_all(payload).map_err(|source| PersistError::Write {
            path: temp.to_path_buf(),
            source,
        })?;
        let file = out.into_inner().map_err(|e| PersistError::Flush {
            path: temp.to_path_buf(),
            source: e.into_error(),
        })?;
        file.sync_all().map_err(|source| PersistError::Sync {
            path: temp.to_path_buf(),
            source,
        })?;
        drop(file);

        before_replace(temp)?;

        if !rename_replaces && self.target.exists() {
            fs::remove_file(&self.target).map_err(|source| PersistError::Remove {
                path: self.target.clone(),
                source,
            })?;
        }
        fs::rename(temp, &self.target).map_err(|source| PersistError::Rename {
            path: self.target.clone(),
            source,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn writes_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("perm.conf");
        let writer = AtomicWriter::new(&target);
        writer.write(b"hello\n").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "hello\n");
        assert!(!writer.temp_path().exists());
    }

    #[test]
    fn replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("perm.conf");
        fs::write(&target, "old contents that are longer\n").unwrap();
        let writer = AtomicWriter::new(&target);
        writer.write(b"new\n").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "new\n");
    }

    #[test]
    fn temp_path_appends_suffix() {
        let writer = AtomicWriter::new("/var/lib/ircd/perm.conf");
        assert_eq!(writer.temp_path(), PathBuf::from("/var/lib/ircd/perm.conf.tmp"));
    }

    #[test]
    fn empty_path_is_a_successful_noop() {
        let writer = AtomicWriter::new("");
        assert!(writer.is_disabled());
        assert!(writer.write(b"ignored").is_ok());
    }

    #[test]
    fn failure_before_replace_keeps_original() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("perm.conf");
        fs::write(&target, b"original bytes\n").unwrap();
        let writer = AtomicWriter::new(&target);

        let result = writer.write_with(b"replacement\n", RENAME_REPLACES_TARGET, |temp| {
            // The temp file is complete at this point.
            assert_eq!(fs::read(temp).unwrap(), b"replacement\n");
            Err(PersistError::Rename {
                path: target.clone(),
                source: io::Error::other("injected"),
            })
        });

        let err = result.unwrap_err();
        assert!(matches!(err, PersistError::Rename { .. }));
        assert_eq!(err.io_error().to_string(), "injected");
        assert_eq!(fs::read(&target).unwrap(), b"original bytes\n");
        assert!(!writer.temp_path().exists());
    }

    #[test]
    fn removes_old_target_when_rename_cannot_replace() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("perm.conf");
        let writer = AtomicWriter::new(&target);

        writer.write_with(b"first\n", false, |_| Ok(())).unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "first\n");

        writer
            .write_with(b"second\n", false, |temp| {
                assert!(target.exists());
                assert_eq!(fs::read(temp).unwrap(), b"second\n");
                Ok(())
            })
            .unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "second\n");
        assert!(!writer.temp_path().exists());
    }

    #[cfg(unix)]
    #[test]
    fn remove_failure_is_reported_and_keeps_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("occupied");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("keep"), b"x").unwrap();
        let writer = AtomicWriter::new(&target);

        let err = writer.write_with(b"data", false, |_| Ok(())).unwrap_err();
        assert!(matches!(&err, PersistError::Remove { path, .. } if path == &target));
        assert!(err.to_string().starts_with("cannot remove old db"));
        assert!(target.join("keep").exists());
        assert!(!writer.temp_path().exists());
    }

    #[test]
    fn create_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("missing-dir").join("perm.conf");
        let writer = AtomicWriter::new(&target);
        let err = writer.write(b"data").unwrap_err();
        assert!(matches!(err, PersistError::Create { .. }));
        assert_eq!(err.io_error().kind(), io::ErrorKind::NotFound);
        assert!(!target.exists());
    }

    #[cfg(unix)]
    #[test]
    fn rename_failure_keeps_original_directory_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("occupied");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("keep"), b"x").unwrap();
        let writer = AtomicWriter::new(&target);
        let err = writer.write(b"data").unwrap_err();
        assert!(matches!(err, PersistError::Rename { .. }));
        assert!(target.join("keep").exists());
        assert!(!writer.temp_path().exists());
    }
}
