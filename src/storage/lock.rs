//! Exclusive advisory file locks.

use std::{
    fs::{File, OpenOptions},
    io,
    path::{Path, PathBuf},
};

use fs2::FileExt;

/// An exclusive lock on a lock file, held until dropped.
///
/// The lock is advisory: it serialises every process that goes through
/// [`FileLock::acquire`] for the same path, nothing more.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Blocks until an exclusive lock on `path` is held.
    ///
    /// The lock file and its parent directories are created if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock file cannot be created or locked.
    pub fn acquire(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        FileExt::lock_exclusive(&file)?;
        tracing::trace!("Acquired lock {}", path.display());

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::debug!("Failed to release lock {}: {e}", self.path.display());
        } else {
            tracing::trace!("Released lock {}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_can_be_reacquired_after_drop() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("registry.lock");

        let lock = FileLock::acquire(&path).unwrap();
        assert!(lock.path().exists());
        drop(lock);

        let file = OpenOptions::new().write(true).open(&path).unwrap();
        FileExt::try_lock_exclusive(&file).expect("lock should be free after drop");
    }

    #[test]
    fn held_lock_excludes_others() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("index.lock");

        let _lock = FileLock::acquire(&path).unwrap();
        let other = OpenOptions::new().write(true).open(&path).unwrap();
        assert!(FileExt::try_lock_exclusive(&other).is_err());
    }
}
