//! Advisory lock around mutating operations on one documentation root

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, warn};

use crate::error::{EngineError, IoOperation, Result};

/// Lock file guard (RAII-style lock release)
///
/// Holds an OS-level exclusive lock on a file in the docs root. The file
/// itself is left in place; the lock is released when the guard drops, or by
/// the OS when the holding process dies.
#[derive(Debug)]
pub struct RootLock {
    path: PathBuf,
    file: File,
}

impl RootLock {
    /// Takes the lock or fails with [`EngineError::Locked`]
    pub fn acquire(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)
            .map_err(|e| EngineError::io(path, IoOperation::Write, e))?;

        if let Err(e) = file.try_lock_exclusive() {
            if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() {
                return Err(EngineError::Locked(path.to_path_buf()));
            }
            return Err(EngineError::io(path, IoOperation::Write, e));
        }

        debug!(path = %path.display(), "lock acquired");
        Ok(RootLock {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Lock file location
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RootLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            warn!(path = %self.path.display(), "failed to release lock: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_second_acquire_is_locked() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".docdelta.lock");

        let guard = RootLock::acquire(&path).unwrap();
        assert!(matches!(RootLock::acquire(&path), Err(EngineError::Locked(_))));

        drop(guard);
        assert!(RootLock::acquire(&path).is_ok());
    }

    #[test]
    fn test_leftover_lock_file_does_not_block() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".docdelta.lock");
        // a holder that died leaves the file but no OS lock
        std::fs::write(&path, "4242\n").unwrap();

        let guard = RootLock::acquire(&path).unwrap();
        assert_eq!(guard.path(), path.as_path());
    }
}
