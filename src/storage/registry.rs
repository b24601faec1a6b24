//! The registry: a global catalog counter and the header names of each
//! document type.
//!
//! Both live in a single YAML file. Every mutation happens under an exclusive
//! [`FileLock`] and is written atomically before its result is returned, so
//! concurrent allocations never hand out the same catalog id.

use std::{
    collections::BTreeMap,
    io,
    num::NonZeroU64,
    path::{Path, PathBuf},
};

use nonempty::NonEmpty;
use serde::{Deserialize, Serialize};

use crate::{
    domain::{CatalogId, CatalogNumber, Config, duplicate_header},
    storage::{FileLock, write_atomic},
};

/// The persisted state of the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    /// The most recently allocated counter value.
    pub last_number: u64,
    /// Header names keyed by lowercase document type, in level order.
    #[serde(default)]
    pub headers: BTreeMap<String, Vec<String>>,
}

/// A file-backed registry store.
#[derive(Debug, Clone)]
pub struct RegistryStore {
    path: PathBuf,
    lock_path: PathBuf,
    config: Config,
}

/// Errors raised by the registry store.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The registry file could not be read, written or locked.
    #[error("registry I/O error at {path}: {source}")]
    Io {
        /// Path of the registry file.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The registry file could not be parsed or serialized.
    #[error("malformed registry {path}: {source}")]
    Format {
        /// Path of the registry file.
        path: PathBuf,
        /// Underlying YAML error.
        source: serde_yaml::Error,
    },

    /// No headers are configured for the requested document type.
    #[error("unknown document type '{document_type}' (known types: {})", .known.join(", "))]
    UnknownDocumentType {
        /// The requested type.
        document_type: String,
        /// All types with configured headers.
        known: Vec<String>,
    },

    /// A document type lists the same header more than once.
    #[error("document type '{document_type}' lists header '{header}' more than once")]
    DuplicateHeader {
        /// The document type.
        document_type: String,
        /// The repeated header name.
        header: String,
    },

    /// The counter cannot be incremented any further.
    #[error("the catalog counter is exhausted")]
    Exhausted,
}

impl RegistryStore {
    /// Creates a store backed by the YAML file at `path`.
    ///
    /// The file is created on the first mutation. Until then the registry
    /// reads as the configured counter floor and header map.
    #[must_use]
    pub fn new(path: PathBuf, config: &Config) -> Self {
        let lock_path = path.with_extension("lock");
        Self {
            path,
            lock_path,
            config: config.clone(),
        }
    }

    /// Path of the registry file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the current registry state.
    ///
    /// Document types configured in the catalog config but absent from the
    /// registry file are filled in from the config. The counter never reads
    /// below the configured floor.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry file exists but cannot be read or
    /// parsed.
    pub fn load(&self) -> Result<Registry, RegistryError> {
        let mut registry = match std::fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Registry::default(),
            Ok(content) => serde_yaml::from_str(&content).map_err(|source| {
                RegistryError::Format {
                    path: self.path.clone(),
                    source,
                }
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("No registry at {}; starting fresh", self.path.display());
                Registry::default()
            }
            Err(source) => return Err(self.io_error(source)),
        };

        registry.last_number = registry.last_number.max(self.config.counter_floor());
        for (document_type, headers) in self.config.headers() {
            registry
                .headers
                .entry(document_type.clone())
                .or_insert_with(|| headers.clone());
        }
        Ok(registry)
    }

    fn save(&self, registry: &Registry) -> Result<(), RegistryError> {
        let content = serde_yaml::to_string(registry).map_err(|source| RegistryError::Format {
            path: self.path.clone(),
            source,
        })?;
        write_atomic(&self.path, content.as_bytes()).map_err(|source| self.io_error(source))
    }

    fn lock(&self) -> Result<FileLock, RegistryError> {
        FileLock::acquire(&self.lock_path).map_err(|source| RegistryError::Io {
            path: self.lock_path.clone(),
            source,
        })
    }

    fn io_error(&self, source: io::Error) -> RegistryError {
        RegistryError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// Allocates the next catalog id.
    ///
    /// The incremented counter is durably written before the id is returned.
    /// If the write fails, no id is returned and the counter is unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be locked, read or written.
    pub fn allocate_catalog_id(&self) -> Result<CatalogId, RegistryError> {
        let _lock = self.lock()?;

        let mut registry = self.load()?;
        let number = next_number(registry.last_number)?;
        registry.last_number = number.get();
        self.save(&registry)?;

        let catalog_id = number.to_catalog_id(&self.config);
        tracing::info!("Allocated catalog id {catalog_id}");
        Ok(catalog_id)
    }

    /// The catalog id the next allocation would return, without allocating it.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be read.
    pub fn peek_catalog_id(&self) -> Result<CatalogId, RegistryError> {
        let registry = self.load()?;
        Ok(next_number(registry.last_number)?.to_catalog_id(&self.config))
    }

    /// The ordered header names for a document type.
    ///
    /// The type label is case-insensitive.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownDocumentType`] if the type has no
    /// headers, [`RegistryError::DuplicateHeader`] if a header is listed
    /// twice, or an error if the registry cannot be read.
    pub fn header_names(&self, document_type: &str) -> Result<NonEmpty<String>, RegistryError> {
        let mut registry = self.load()?;
        let key = document_type.to_lowercase();
        let headers = registry
            .headers
            .remove(&key)
            .and_then(NonEmpty::from_vec)
            .ok_or_else(|| RegistryError::UnknownDocumentType {
                document_type: document_type.to_string(),
                known: registry.headers.into_keys().collect(),
            })?;
        check_unique(&key, &headers)?;
        Ok(headers)
    }

    /// Replaces the header names of a document type.
    ///
    /// Existing documents keep the headers they were created with.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateHeader`] if a name is repeated, or
    /// an error if the registry cannot be locked, read or written.
    pub fn set_header_names(
        &self,
        document_type: &str,
        headers: NonEmpty<String>,
    ) -> Result<(), RegistryError> {
        check_unique(&document_type.to_lowercase(), &headers)?;
        let _lock = self.lock()?;

        let mut registry = self.load()?;
        registry
            .headers
            .insert(document_type.to_lowercase(), headers.into());
        self.save(&registry)?;

        tracing::info!("Updated headers for document type '{document_type}'");
        Ok(())
    }
}

fn check_unique(document_type: &str, headers: &NonEmpty<String>) -> Result<(), RegistryError> {
    let names: Vec<String> = headers.iter().cloned().collect();
    match duplicate_header(&names) {
        Some(header) => Err(RegistryError::DuplicateHeader {
            document_type: document_type.to_string(),
            header: header.to_string(),
        }),
        None => Ok(()),
    }
}

fn next_number(last: u64) -> Result<CatalogNumber, RegistryError> {
    last.checked_add(1)
        .and_then(NonZeroU64::new)
        .map(CatalogNumber::new)
        .ok_or(RegistryError::Exhausted)
}
