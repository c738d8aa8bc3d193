//! store::lock
//!
//! Exclusive single-writer lock for a repository.
//!
//! # Storage
//!
//! - `<root>/.folio/lock` - Lock file holding an OS-level exclusive lock
//!
//! # Invariants
//!
//! - The lock is held for the whole lifetime of an open file store
//! - Acquisition is non-blocking and fails fast if another process holds it
//! - The lock is released on drop
//!
//! # Example
//!
//! ```
//! use folio::core::paths::FolioPaths;
//! use folio::store::lock::{LockError, RepoLock};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let paths = FolioPaths::new(dir.path());
//!
//! let lock = RepoLock::acquire(&paths).unwrap();
//! assert!(lock.is_held());
//! assert!(matches!(RepoLock::acquire(&paths), Err(LockError::AlreadyLocked)));
//!
//! drop(lock);
//! assert!(RepoLock::acquire(&paths).is_ok());
//! ```

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

use crate::core::paths::FolioPaths;

/// Errors from locking.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another process already holds the lock.
    #[error("repository is locked by another folio process")]
    AlreadyLocked,

    /// The lock file or its directory could not be created.
    #[error("failed to create lock: {0}")]
    CreateFailed(String),

    /// The OS refused the lock for a reason other than contention.
    #[error("failed to acquire lock: {0}")]
    AcquireFailed(String),

    /// Unlocking failed.
    #[error("failed to release lock: {0}")]
    ReleaseFailed(String),
}

/// An exclusive lock on a repository, released on drop.
#[derive(Debug)]
pub struct RepoLock {
    path: PathBuf,
    file: Option<File>,
}

impl RepoLock {
    /// Acquire the repository lock without blocking.
    ///
    /// # Errors
    ///
    /// - [`LockError::AlreadyLocked`] if another handle holds the lock
    /// - [`LockError::CreateFailed`] if the lock file cannot be created
    /// - [`LockError::AcquireFailed`] if the OS lock cannot be taken
    pub fn acquire(paths: &FolioPaths) -> Result<Self, LockError> {
        let dir = paths.data_dir();
        fs::create_dir_all(&dir).map_err(|e| {
            LockError::CreateFailed(format!("cannot create {}: {}", dir.display(), e))
        })?;

        let path = paths.lock_path();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| {
                LockError::CreateFailed(format!("cannot open {}: {}", path.display(), e))
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Self {
                path,
                file: Some(file),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Err(LockError::AlreadyLocked),
            Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {
                Err(LockError::AlreadyLocked)
            }
            Err(e) => Err(LockError::AcquireFailed(e.to_string())),
        }
    }

    /// Whether this guard still holds the lock.
    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock before the guard is dropped.
    pub fn release(&mut self) -> Result<(), LockError> {
        if let Some(file) = self.file.take() {
            file.unlock()
                .map_err(|e| LockError::ReleaseFailed(e.to_string()))?;
        }
        Ok(())
    }
}

impl Drop for RepoLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = file.unlock();
        }
    }
}
