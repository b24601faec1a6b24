//! The catalog index: a per-document ledger of provisioned items.
//!
//! The index answers the numbering questions the provisioner asks (does this
//! header exist, what is its position, what is the next sequence under it)
//! without consulting the document engine or the live registry.

use std::{
    collections::{BTreeMap, HashMap},
    io,
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    domain::{CatalogId, Document, Item, Level},
    storage::write_atomic,
};

/// One provisioned item, as recorded in the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Engine-assigned item uid.
    pub uid: String,
    /// Global catalog id.
    pub catalog_id: CatalogId,
    /// Item title.
    pub title: String,
    /// Assigned level.
    pub level: Level,
    /// Governing header name, empty for header items.
    #[serde(default)]
    pub header: String,
    /// Whether this is a header item.
    #[serde(default)]
    pub is_header: bool,
}

impl From<&Item> for IndexEntry {
    fn from(item: &Item) -> Self {
        Self {
            uid: item.uid.clone(),
            catalog_id: item.attributes.catalog_id.clone(),
            title: item.attributes.title.clone(),
            level: item.attributes.level,
            header: item.attributes.header.clone(),
            is_header: item.attributes.is_header,
        }
    }
}

/// The ledger of a single document.
///
/// Item counts per header are derived from the entries when the ledger is
/// loaded, and kept current as entries are appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "LedgerFile", into = "LedgerFile")]
pub struct Ledger {
    document: Document,
    location: Option<String>,
    entries: Vec<IndexEntry>,
    items_per_header: HashMap<String, usize>,
}

impl Ledger {
    fn new(document: Document, location: Option<String>) -> Self {
        Self {
            document,
            location,
            entries: Vec::new(),
            items_per_header: HashMap::new(),
        }
    }

    fn push(&mut self, entry: IndexEntry) {
        if !entry.is_header {
            *self
                .items_per_header
                .entry(entry.header.clone())
                .or_default() += 1;
        }
        self.entries.push(entry);
    }

    /// The document this ledger belongs to.
    #[must_use]
    pub const fn document(&self) -> &Document {
        &self.document
    }

    /// Where the engine stores the document, if known.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Recorded items, in provisioning order.
    #[must_use]
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }
}

/// On-disk form of a [`Ledger`].
#[derive(Debug, Serialize, Deserialize)]
struct LedgerFile {
    title: String,
    #[serde(rename = "type")]
    document_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    location: Option<String>,
    headers: Vec<String>,
    #[serde(default)]
    items: Vec<IndexEntry>,
    // The uid is the map key; it is filled in by `CatalogIndex::load`.
    #[serde(skip)]
    uid: String,
}

impl From<LedgerFile> for Ledger {
    fn from(file: LedgerFile) -> Self {
        let document = Document::new(file.uid, file.title, file.document_type, file.headers);
        let mut ledger = Self::new(document, file.location);
        for entry in file.items {
            ledger.push(entry);
        }
        ledger
    }
}

impl From<Ledger> for LedgerFile {
    fn from(ledger: Ledger) -> Self {
        Self {
            title: ledger.document.title,
            document_type: ledger.document.document_type,
            location: ledger.location,
            headers: ledger.document.headers,
            items: ledger.entries,
            uid: ledger.document.uid,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct IndexFile {
    #[serde(default)]
    documents: BTreeMap<String, Ledger>,
}

/// Errors raised by the catalog index.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// The index file could not be read or written.
    #[error("catalog index I/O error at {path}: {source}")]
    Io {
        /// Path of the index file.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The index file could not be parsed or serialized.
    #[error("malformed catalog index {path}: {source}")]
    Format {
        /// Path of the index file.
        path: PathBuf,
        /// Underlying YAML error.
        source: serde_yaml::Error,
    },

    /// The document has no ledger.
    #[error("document '{0}' is not in the catalog index")]
    UnknownDocument(String),

    /// A ledger for the document already exists.
    #[error("document '{0}' is already in the catalog index")]
    DocumentExists(String),
}

/// A file-backed index of provisioned items, one ledger per document.
#[derive(Debug, Clone)]
pub struct CatalogIndex {
    path: PathBuf,
    documents: BTreeMap<String, Ledger>,
}

impl CatalogIndex {
    /// Loads the index at `path`. A missing file is an empty index.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: PathBuf) -> Result<Self, IndexError> {
        let file = match std::fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => IndexFile::default(),
            Ok(content) => serde_yaml::from_str(&content).map_err(|source| IndexError::Format {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => IndexFile::default(),
            Err(source) => return Err(IndexError::Io { path, source }),
        };

        let documents = file
            .documents
            .into_iter()
            .map(|(uid, mut ledger)| {
                ledger.document.uid.clone_from(&uid);
                (uid, ledger)
            })
            .collect();

        Ok(Self { path, documents })
    }

    /// Writes the index back to its file, atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be serialized or written.
    pub fn save(&self) -> Result<(), IndexError> {
        let file = IndexFile {
            documents: self.documents.clone(),
        };
        let content = serde_yaml::to_string(&file).map_err(|source| IndexError::Format {
            path: self.path.clone(),
            source,
        })?;
        write_atomic(&self.path, content.as_bytes()).map_err(|source| IndexError::Io {
            path: self.path.clone(),
            source,
        })
    }

    /// Applies `change` to a copy of the index and saves the copy.
    ///
    /// The index only takes on the change once it has been written, so a
    /// failed change or save leaves it as it was.
    ///
    /// # Errors
    ///
    /// Returns the error from `change`, or an error if the index cannot be
    /// saved.
    pub fn update<T>(
        &mut self,
        change: impl FnOnce(&mut Self) -> Result<T, IndexError>,
    ) -> Result<T, IndexError> {
        let mut next = self.clone();
        let value = change(&mut next)?;
        next.save()?;
        *self = next;
        Ok(value)
    }

    /// Path of the index file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the ledger of a document.
    #[must_use]
    pub fn ledger(&self, document_uid: &str) -> Option<&Ledger> {
        self.documents.get(document_uid)
    }

    /// Returns a document by uid.
    #[must_use]
    pub fn document(&self, document_uid: &str) -> Option<&Document> {
        self.ledger(document_uid).map(Ledger::document)
    }

    /// Iterates over all ledgers, ordered by document uid.
    pub fn ledgers(&self) -> impl Iterator<Item = &Ledger> {
        self.documents.values()
    }

    /// Starts a ledger for a new document.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::DocumentExists`] if the document already has one.
    pub fn record_document(
        &mut self,
        document: Document,
        location: Option<String>,
    ) -> Result<(), IndexError> {
        if self.documents.contains_key(&document.uid) {
            return Err(IndexError::DocumentExists(document.uid));
        }
        self.documents
            .insert(document.uid.clone(), Ledger::new(document, location));
        Ok(())
    }

    /// Appends a header name to a document's header list.
    ///
    /// Names already in the list are left where they are.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::UnknownDocument`] if the document has no ledger.
    pub fn append_header(&mut self, document_uid: &str, name: &str) -> Result<(), IndexError> {
        let ledger = self.ledger_mut(document_uid)?;
        if !ledger.document.has_header(name) {
            ledger.document.headers.push(name.to_string());
        }
        Ok(())
    }

    /// Appends an item to its document's ledger.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::UnknownDocument`] if the document has no ledger.
    pub fn record_item(&mut self, document_uid: &str, item: &Item) -> Result<(), IndexError> {
        self.ledger_mut(document_uid)?.push(IndexEntry::from(item));
        Ok(())
    }

    fn ledger_mut(&mut self, document_uid: &str) -> Result<&mut Ledger, IndexError> {
        self.documents
            .get_mut(document_uid)
            .ok_or_else(|| IndexError::UnknownDocument(document_uid.to_string()))
    }

    /// Returns `true` if `header` is one of the document's headers.
    #[must_use]
    pub fn header_exists(&self, document_uid: &str, header: &str) -> bool {
        self.document(document_uid)
            .is_some_and(|document| document.has_header(header))
    }

    /// The 1-based position of `header` in the document's header list.
    #[must_use]
    pub fn header_ordinal(&self, document_uid: &str, header: &str) -> Option<NonZeroUsize> {
        self.document(document_uid)?.header_ordinal(header)
    }

    /// Returns `true` if a header item titled `header` has been recorded.
    #[must_use]
    pub fn has_header_item(&self, document_uid: &str, header: &str) -> bool {
        self.ledger(document_uid).is_some_and(|ledger| {
            ledger
                .entries
                .iter()
                .any(|entry| entry.is_header && entry.title == header)
        })
    }

    /// The sequence number the next normal item under `header` receives.
    ///
    /// One more than the number of normal items already recorded under that
    /// header; 1 for a header with no items.
    #[must_use]
    pub fn next_sequence(&self, document_uid: &str, header: &str) -> NonZeroUsize {
        let recorded = self
            .ledger(document_uid)
            .and_then(|ledger| ledger.items_per_header.get(header))
            .copied()
            .unwrap_or_default();
        NonZeroUsize::MIN.saturating_add(recorded)
    }

    /// The top-level position of the header item titled `header`.
    ///
    /// This is the header's position in the document's header list, or the
    /// position after the last header if it is not listed yet.
    #[must_use]
    pub fn header_level(&self, document_uid: &str, header: &str) -> NonZeroUsize {
        self.header_ordinal(document_uid, header).unwrap_or_else(|| {
            let listed = self
                .document(document_uid)
                .map_or(0, |document| document.headers.len());
            NonZeroUsize::MIN.saturating_add(listed)
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::domain::{ItemDefaults, Provenance};

    fn application() -> Document {
        Document::new(
            "APP",
            "Application",
            "application",
            vec!["Form Fields".into(), "UI Behavior".into()],
        )
    }

    fn item(document: &Document, uid: &str, number: &str, header: &str, level: Level) -> Item {
        let attributes = ItemDefaults::default().stamp(Provenance {
            document,
            title: if header.is_empty() { "Form Fields" } else { "Item" },
            header,
            catalog_id: number.parse().unwrap(),
            level,
            today: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            links: &[],
        });
        Item {
            uid: uid.to_string(),
            attributes,
        }
    }

    fn nz(value: usize) -> NonZeroUsize {
        NonZeroUsize::new(value).unwrap()
    }

    #[test]
    fn sequences_count_normal_items_per_header() {
        let tmp = tempfile::tempdir().unwrap();
        let mut index = CatalogIndex::load(tmp.path().join("index.yaml")).unwrap();
        let document = application();
        index.record_document(document.clone(), None).unwrap();

        assert_eq!(index.header_level("APP", "Form Fields"), nz(1));
        assert_eq!(index.header_level("APP", "UI Behavior"), nz(2));
        assert_eq!(index.header_level("APP", "Navigation"), nz(3));
        assert_eq!(index.next_sequence("APP", "Form Fields"), nz(1));

        index
            .record_item("APP", &item(&document, "APP-001", "RQ-1", "", Level::Header(nz(1))))
            .unwrap();
        index
            .record_item(
                "APP",
                &item(
                    &document,
                    "APP-002",
                    "RQ-2",
                    "Form Fields",
                    Level::Item {
                        header: nz(1),
                        sequence: nz(1),
                    },
                ),
            )
            .unwrap();

        assert_eq!(index.header_level("APP", "UI Behavior"), nz(2));
        assert_eq!(index.next_sequence("APP", "Form Fields"), nz(2));
        assert_eq!(index.next_sequence("APP", "UI Behavior"), nz(1));
        assert!(index.has_header_item("APP", "Form Fields"));
        assert!(!index.has_header_item("APP", "UI Behavior"));
    }

    #[test]
    fn counts_are_rebuilt_on_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("index.yaml");
        let document = application();
        {
            let mut index = CatalogIndex::load(path.clone()).unwrap();
            index
                .record_document(document.clone(), Some("reqs/app".into()))
                .unwrap();
            index
                .record_item(
                    "APP",
                    &item(
                        &document,
                        "APP-001",
                        "RQ-00001",
                        "UI Behavior",
                        Level::Item {
                            header: nz(2),
                            sequence: nz(1),
                        },
                    ),
                )
                .unwrap();
            index.save().unwrap();
        }

        let index = CatalogIndex::load(path).unwrap();
        assert_eq!(index.document("APP").unwrap(), &document);
        assert_eq!(index.ledger("APP").unwrap().location(), Some("reqs/app"));
        assert_eq!(index.next_sequence("APP", "UI Behavior"), nz(2));
        assert_eq!(index.ledger("APP").unwrap().entries().len(), 1);
    }

    #[test]
    fn header_lookups_use_the_document_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        let mut index = CatalogIndex::load(tmp.path().join("index.yaml")).unwrap();
        index.record_document(application(), None).unwrap();

        assert!(index.header_exists("APP", "UI Behavior"));
        assert!(!index.header_exists("APP", "Navigation"));
        assert!(!index.header_exists("OTHER", "UI Behavior"));
        assert_eq!(index.header_ordinal("APP", "UI Behavior"), Some(nz(2)));

        index.append_header("APP", "Navigation").unwrap();
        index.append_header("APP", "Form Fields").unwrap();
        assert_eq!(index.header_ordinal("APP", "Navigation"), Some(nz(3)));
        assert_eq!(index.document("APP").unwrap().headers.len(), 3);
    }

    #[test]
    fn duplicate_and_unknown_documents_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let mut index = CatalogIndex::load(tmp.path().join("index.yaml")).unwrap();
        index.record_document(application(), None).unwrap();

        assert!(matches!(
            index.record_document(application(), None),
            Err(IndexError::DocumentExists(_))
        ));
        assert!(matches!(
            index.append_header("NOPE", "Header"),
            Err(IndexError::UnknownDocument(_))
        ));
    }

    #[test]
    fn failed_update_leaves_index_unchanged() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("index.yaml");
        let mut index = CatalogIndex::load(path.clone()).unwrap();
        index
            .update(|index| index.record_document(application(), None))
            .unwrap();
        assert!(path.is_file());

        // A directory in place of the file makes the save fail.
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        let result = index.update(|index| index.append_header("APP", "Navigation"));
        assert!(matches!(result, Err(IndexError::Io { .. })));
        assert!(!index.header_exists("APP", "Navigation"));

        let result = index.update(|index| index.append_header("NOPE", "Navigation"));
        assert!(matches!(result, Err(IndexError::UnknownDocument(_))));
    }
}
