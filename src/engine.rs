//! The document engine: the external system that stores documents and items
//! and renders them for publication.
//!
//! The catalog never stores items itself. It computes and stamps everything
//! an item needs, then hands it to a [`DocumentEngine`].

use std::{fmt, io, path::Path, path::PathBuf, str::FromStr};

use crate::domain::ItemAttributes;

mod doorstop;
mod memory;

pub use doorstop::Doorstop;
pub use memory::MemoryEngine;

/// A request to create a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDocument {
    /// Document uid (prefix), e.g. `APP-QL-CNI`.
    pub uid: String,
    /// Directory name for the document.
    pub name: String,
    /// Document title.
    pub title: String,
    /// Parent document uid, if any.
    pub parent: Option<String>,
}

impl NewDocument {
    /// Builds a request, deriving the parent from the uid.
    ///
    /// The parent of `APP-QL-CNI` is `APP-QL`; a single-segment uid has no
    /// parent.
    #[must_use]
    pub fn new(uid: impl Into<String>, name: impl Into<String>, title: impl Into<String>) -> Self {
        let uid = uid.into();
        let parent = uid
            .trim()
            .rsplit_once('-')
            .map(|(parent, _)| parent.to_string())
            .filter(|parent| !parent.is_empty());
        Self {
            uid,
            name: name.into(),
            title: title.into(),
            parent,
        }
    }
}

/// What to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishTarget {
    /// Every document.
    All,
    /// A single document.
    Document(String),
}

impl FromStr for PublishTarget {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(if s.eq_ignore_ascii_case("all") {
            Self::All
        } else {
            Self::Document(s.to_string())
        })
    }
}

impl fmt::Display for PublishTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Document(uid) => f.write_str(uid),
        }
    }
}

/// The outcome of an engine validation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    /// Whether validation passed.
    pub passed: bool,
    /// The engine's report.
    pub output: String,
}

/// Errors raised by a document engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The engine executable could not be started.
    #[error("failed to run '{program}': {source}")]
    Spawn {
        /// The executable.
        program: String,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The engine ran but reported failure.
    #[error("'{command}' failed ({status}): {stderr}")]
    Failed {
        /// The command line that failed.
        command: String,
        /// Exit status description.
        status: String,
        /// What the engine wrote to stderr.
        stderr: String,
    },

    /// The engine's output did not contain the expected information.
    #[error("could not find the new item uid in engine output: {0}")]
    UnrecognisedOutput(String),

    /// A referenced document does not exist in the engine.
    #[error("document '{0}' not found")]
    DocumentNotFound(String),

    /// More than one document has the same uid.
    #[error("multiple documents share uid '{uid}': {}", display_paths(.paths))]
    AmbiguousDocument {
        /// The duplicated uid.
        uid: String,
        /// The directories claiming it.
        paths: Vec<PathBuf>,
    },

    /// An engine file could not be read or written.
    #[error("engine I/O error at {path}: {source}")]
    Io {
        /// The file involved.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// An engine file could not be parsed or serialized.
    #[error("malformed engine file {path}: {source}")]
    Format {
        /// The file involved.
        path: PathBuf,
        /// Underlying YAML error.
        source: serde_yaml::Error,
    },

    /// The engine refused the request.
    #[error("engine rejected the request: {0}")]
    Rejected(String),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// The operations the catalog needs from a document engine.
///
/// Methods take `&self`; engines that keep state in memory use interior
/// mutability.
pub trait DocumentEngine {
    /// Whether a document with this uid exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot be queried.
    fn document_exists(&self, uid: &str) -> Result<bool, EngineError>;

    /// Creates a document, returning where the engine stored it, if that is
    /// meaningful for the engine.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine refuses or fails to create it.
    fn create_document(&self, document: &NewDocument) -> Result<Option<String>, EngineError>;

    /// Creates an item with the given attributes, returning the uid the
    /// engine assigned.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine refuses or fails to create it.
    fn add_item(&self, document_uid: &str, attributes: &ItemAttributes)
    -> Result<String, EngineError>;

    /// Validates one document, or every document.
    ///
    /// # Errors
    ///
    /// Returns an error if validation could not be run at all. A failed
    /// validation is reported through [`ValidationReport::passed`].
    fn validate(&self, document_uid: Option<&str>) -> Result<ValidationReport, EngineError>;

    /// Renders documents to `destination`.
    ///
    /// # Errors
    ///
    /// Returns an error if publishing fails.
    fn publish(&self, target: &PublishTarget, destination: &Path) -> Result<(), EngineError>;
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("APP-QL-CNI", Some("APP-QL"); "nested")]
    #[test_case("APP-QL", Some("APP"); "one level")]
    #[test_case("APP", None; "root document")]
    #[test_case("-APP", None; "leading separator")]
    fn parent_is_derived_from_uid(uid: &str, parent: Option<&str>) {
        assert_eq!(NewDocument::new(uid, "dir", "Title").parent.as_deref(), parent);
    }

    #[test]
    fn publish_target_parses_all() {
        assert_eq!("ALL".parse::<PublishTarget>().unwrap(), PublishTarget::All);
        assert_eq!(
            "APP".parse::<PublishTarget>().unwrap(),
            PublishTarget::Document("APP".to_string())
        );
    }
}
