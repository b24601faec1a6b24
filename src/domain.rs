//! Domain models for the requirements catalog.
//!
//! This module contains the filesystem-agnostic types: configuration, catalog
//! ids, levels, documents and items.

/// Catalog id formatting and parsing.
pub mod catalog_id;
pub use catalog_id::{CatalogId, CatalogNumber, InvalidCatalogIdError};

mod config;
pub use config::{Config, ConfigError, DocumentSettings};
pub(crate) use config::duplicate_header;

mod document;
pub use document::Document;

/// Items, attribute defaults and link merging.
pub mod item;
pub use item::{Item, ItemAttributes, ItemDefaults, Provenance, merge_links};

mod level;
pub use level::{InvalidLevelError, Level};
