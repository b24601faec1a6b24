//! Requirements Catalog
//!
//! Provisions requirement items inside documents kept by an external document
//! engine, stamping each with a globally unique catalog id and a level
//! numbered beneath its document's headers.

pub mod domain;
pub use domain::{
    CatalogId, CatalogNumber, Config, ConfigError, Document, Item, ItemAttributes, ItemDefaults,
    Level, merge_links,
};

/// File-backed catalog state.
pub mod storage;
pub use storage::{CatalogIndex, RegistryStore};

/// Document engine adapters.
pub mod engine;
pub use engine::{DocumentEngine, Doorstop, MemoryEngine};

pub mod provision;
pub use provision::{DocumentRequest, ItemRequest, ProvisionError, Provisioner};

mod workspace;
pub use workspace::Workspace;
