//! Provisioning: allocating catalog ids, numbering items beneath their
//! headers and stamping provenance before handing items to the document
//! engine.
//!
//! A [`Provisioner`] holds the workspace lock for as long as it lives, so two
//! provisioning runs against the same workspace never interleave.

use chrono::NaiveDate;

use crate::{
    domain::{Config, ConfigError},
    engine::{DocumentEngine, EngineError},
    storage::{CatalogIndex, FileLock, IndexError, RegistryError, RegistryStore},
    workspace::Workspace,
};

mod document;
mod item;

pub use document::{DocumentRequest, ProvisionedDocument};
pub use item::{HEADER_TYPE, ItemRequest, Preview};

/// Errors surfaced by provisioning operations.
///
/// None are retried. On any error, nothing is recorded in the catalog index;
/// a catalog id may already have been allocated (see
/// [`Provisioner::provision`]).
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    /// Configuration or attribute defaults are missing or malformed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The document type has no configured headers.
    #[error("unknown document type '{document_type}' (known types: {})", .known.join(", "))]
    UnknownDocumentType {
        /// The requested type.
        document_type: String,
        /// Types that have headers.
        known: Vec<String>,
    },

    /// The type label does not name a header of the document.
    #[error(
        "header '{label}' not found in document '{document}'; valid headers: {}",
        .valid.join(", ")
    )]
    HeaderNotFound {
        /// The offending type label.
        label: String,
        /// The document uid.
        document: String,
        /// The document's headers.
        valid: Vec<String>,
    },

    /// The registry could not be read, written or locked.
    #[error("registry unavailable")]
    RegistryIo(#[source] RegistryError),

    /// The catalog index could not be read, written or locked.
    #[error("catalog index unavailable")]
    Index(#[from] IndexError),

    /// The document engine rejected or failed the request.
    #[error("document engine failed")]
    ExternalStore(#[from] EngineError),

    /// A document with this uid already exists.
    #[error("document '{0}' already exists")]
    DuplicateDocument(String),

    /// The document is not in the catalog index.
    #[error("document '{0}' is not in the catalog; create it first")]
    UnknownDocument(String),

    /// The document already has a header item with this title.
    #[error("document '{document}' already has a header '{header}'")]
    DuplicateHeader {
        /// The document uid.
        document: String,
        /// The header title.
        header: String,
    },
}

impl From<RegistryError> for ProvisionError {
    fn from(error: RegistryError) -> Self {
        match error {
            RegistryError::UnknownDocumentType {
                document_type,
                known,
            } => Self::UnknownDocumentType {
                document_type,
                known,
            },
            duplicate @ RegistryError::DuplicateHeader { .. } => {
                Self::Config(ConfigError::Invalid(duplicate.to_string()))
            }
            other => Self::RegistryIo(other),
        }
    }
}

/// Provisions documents and items in a workspace.
#[derive(Debug)]
pub struct Provisioner<E> {
    config: Config,
    registry: RegistryStore,
    index: CatalogIndex,
    engine: E,
    today: NaiveDate,
    _lock: FileLock,
}

impl<E: DocumentEngine> Provisioner<E> {
    /// Opens a workspace for provisioning, blocking until no other
    /// provisioner holds it.
    ///
    /// # Errors
    ///
    /// Returns an error if the workspace cannot be locked or its index cannot
    /// be read.
    pub fn open(workspace: &Workspace, config: Config, engine: E) -> Result<Self, ProvisionError> {
        let lock_path = workspace.lock_path();
        let lock = FileLock::acquire(&lock_path).map_err(|source| IndexError::Io {
            path: lock_path,
            source,
        })?;

        let registry = RegistryStore::new(workspace.registry_path(), &config);
        let index = CatalogIndex::load(workspace.index_path())?;

        Ok(Self {
            config,
            registry,
            index,
            engine,
            today: chrono::Local::now().date_naive(),
            _lock: lock,
        })
    }

    /// Stamps items with `today` instead of the current date.
    #[must_use]
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// The catalog configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// The registry store.
    #[must_use]
    pub const fn registry(&self) -> &RegistryStore {
        &self.registry
    }

    /// The catalog index.
    #[must_use]
    pub const fn index(&self) -> &CatalogIndex {
        &self.index
    }

    /// The document engine.
    #[must_use]
    pub const fn engine(&self) -> &E {
        &self.engine
    }
}
