//! The on-disk layout of a catalog workspace.
//!
//! ```text
//! <root>/
//!   .catalog/
//!     config.toml     catalog configuration
//!     registry.yaml   global counter and header names
//!     registry.lock
//!     index.yaml      per-document ledgers
//!     index.lock
//!   reqs/             document engine tree (configurable)
//! ```

use std::path::{Path, PathBuf};

use crate::domain::{Config, ConfigError};

/// Paths of a catalog workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Name of the metadata directory under the workspace root.
    pub const DIR: &'static str = ".catalog";

    /// A workspace rooted at `root`.
    #[must_use]
    pub const fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// The workspace root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The metadata directory.
    #[must_use]
    pub fn dir(&self) -> PathBuf {
        self.root.join(Self::DIR)
    }

    /// The configuration file.
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.dir().join("config.toml")
    }

    /// The registry file.
    #[must_use]
    pub fn registry_path(&self) -> PathBuf {
        self.dir().join("registry.yaml")
    }

    /// The catalog index file.
    #[must_use]
    pub fn index_path(&self) -> PathBuf {
        self.dir().join("index.yaml")
    }

    /// The lock serialising provisioning runs.
    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        self.dir().join("index.lock")
    }

    /// Whether the workspace has been initialized.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.config_path().exists()
    }

    /// Loads the workspace configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is missing or invalid.
    pub fn load_config(&self) -> Result<Config, ConfigError> {
        let path = self.config_path();
        Config::load(&path).inspect(|_| tracing::debug!("Loaded config from {}", path.display()))
    }
}
