//! File-backed state: the registry, the catalog index and the locks that
//! guard them.

use std::{io::Write, path::Path};

/// The per-document ledger of provisioned items.
pub mod index;
mod lock;
/// The global counter and header-name registry.
pub mod registry;

pub use index::{CatalogIndex, IndexEntry, IndexError, Ledger};
pub use lock::FileLock;
pub use registry::{Registry, RegistryError, RegistryStore};

/// Replaces the contents of `path` so that readers see either the old file or
/// the complete new one, never a partial write.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    sync_dir(dir)
}

/// Flushes a directory entry so a rename into it survives a crash.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    std::fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
#[allow(clippy::unnecessary_wraps)]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_replace_the_whole_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested/state/registry.yaml");

        write_atomic(&path, b"last_number: 12\nheaders: {}\n").unwrap();
        write_atomic(&path, b"last_number: 3\n").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "last_number: 3\n");
        let leftovers = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}
