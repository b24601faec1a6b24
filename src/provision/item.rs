use tracing::instrument;

use super::{ProvisionError, Provisioner};
use crate::{
    domain::{CatalogId, Document, Item, ItemDefaults, Level, Provenance},
    engine::DocumentEngine,
};

/// The type label that provisions a header item rather than a normal item.
pub const HEADER_TYPE: &str = "header";

/// A request to provision one item.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemRequest {
    /// The owning document.
    pub document_uid: String,
    /// The item title. For header items, the header name.
    pub title: String,
    /// Either [`HEADER_TYPE`] or the name of the governing header.
    pub type_label: String,
    /// Attribute defaults, overridden by anything stamped.
    pub defaults: ItemDefaults,
    /// Links supplied explicitly, merged ahead of any default links.
    pub links: Vec<String>,
}

impl ItemRequest {
    /// A request with empty defaults and no links.
    #[must_use]
    pub fn new(
        document_uid: impl Into<String>,
        title: impl Into<String>,
        type_label: impl Into<String>,
    ) -> Self {
        Self {
            document_uid: document_uid.into(),
            title: title.into(),
            type_label: type_label.into(),
            defaults: ItemDefaults::default(),
            links: Vec::new(),
        }
    }

    /// A request for a header item named `name`.
    #[must_use]
    pub fn header(document_uid: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(document_uid, name, HEADER_TYPE)
    }

    /// Sets the attribute defaults.
    #[must_use]
    pub fn with_defaults(mut self, defaults: ItemDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Sets the explicit links.
    #[must_use]
    pub fn with_links(mut self, links: Vec<String>) -> Self {
        self.links = links;
        self
    }

    /// Returns `true` if this request provisions a header item.
    #[must_use]
    pub fn is_header(&self) -> bool {
        self.type_label.trim().eq_ignore_ascii_case(HEADER_TYPE)
    }
}

/// What provisioning a request would do, without doing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    /// The level the item would receive.
    pub level: Level,
    /// The governing header, empty for header items.
    pub header: String,
    /// The catalog id the next allocation would return.
    pub catalog_id: CatalogId,
}

/// Where an item goes within its document.
struct Placement {
    document: Document,
    header: String,
    level: Level,
}

impl<E: DocumentEngine> Provisioner<E> {
    /// Provisions an item: validates its header, assigns its level and
    /// catalog id, stamps provenance, and creates it through the engine.
    ///
    /// Header validation happens before anything is written. The catalog id
    /// is allocated before the engine is called, so an engine failure leaves
    /// that id permanently unused.
    ///
    /// # Errors
    ///
    /// - [`ProvisionError::UnknownDocument`] if the document is not catalogued
    /// - [`ProvisionError::HeaderNotFound`] if the type label names no header
    /// - [`ProvisionError::DuplicateHeader`] if a header item already has this title
    /// - [`ProvisionError::RegistryIo`] if no catalog id could be allocated
    /// - [`ProvisionError::ExternalStore`] if the engine fails
    /// - [`ProvisionError::Index`] if the catalog index cannot be saved
    #[instrument(skip(self, request), fields(document = %request.document_uid, title = %request.title))]
    pub fn provision(&mut self, request: ItemRequest) -> Result<Item, ProvisionError> {
        let placement = self.place(&request)?;
        let catalog_id = self.registry.allocate_catalog_id()?;

        let ItemRequest {
            document_uid,
            title,
            defaults,
            links,
            ..
        } = request;

        let attributes = defaults.stamp(Provenance {
            document: &placement.document,
            title: &title,
            header: &placement.header,
            catalog_id: catalog_id.clone(),
            level: placement.level,
            today: self.today,
            links: &links,
        });

        let uid = self
            .engine
            .add_item(&document_uid, &attributes)
            .inspect_err(|_| {
                tracing::warn!("Catalog id {catalog_id} was allocated but no item was created");
            })?;

        let item = Item { uid, attributes };
        self.index.update(|index| {
            if item.is_header() {
                index.append_header(&document_uid, &title)?;
            }
            index.record_item(&document_uid, &item)
        })?;

        tracing::info!(
            "Provisioned {} ({}) at level {}",
            item.uid,
            item.catalog_id(),
            item.level()
        );
        Ok(item)
    }

    /// Reports the level and catalog id a request would receive, without
    /// allocating anything.
    ///
    /// # Errors
    ///
    /// Returns the same validation errors as [`Provisioner::provision`], or
    /// [`ProvisionError::RegistryIo`] if the registry cannot be read.
    pub fn preview(&self, request: &ItemRequest) -> Result<Preview, ProvisionError> {
        let placement = self.place(request)?;
        let catalog_id = self.registry.peek_catalog_id()?;
        Ok(Preview {
            level: placement.level,
            header: placement.header,
            catalog_id,
        })
    }

    fn place(&self, request: &ItemRequest) -> Result<Placement, ProvisionError> {
        let document_uid = request.document_uid.as_str();
        let document = self
            .index
            .document(document_uid)
            .cloned()
            .ok_or_else(|| ProvisionError::UnknownDocument(document_uid.to_string()))?;

        if request.is_header() {
            if self.index.has_header_item(document_uid, &request.title) {
                return Err(ProvisionError::DuplicateHeader {
                    document: document_uid.to_string(),
                    header: request.title.clone(),
                });
            }
            let level = Level::Header(self.index.header_level(document_uid, &request.title));
            return Ok(Placement {
                document,
                header: String::new(),
                level,
            });
        }

        let header = request.type_label.as_str();
        let Some(ordinal) = self.index.header_ordinal(document_uid, header) else {
            return Err(ProvisionError::HeaderNotFound {
                label: header.to_string(),
                document: document_uid.to_string(),
                valid: document.headers,
            });
        };
        let level = Level::Item {
            header: ordinal,
            sequence: self.index.next_sequence(document_uid, header),
        };

        Ok(Placement {
            document,
            header: header.to_string(),
            level,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use chrono::NaiveDate;
    use tempfile::TempDir;

    use super::*;
    use crate::{
        domain::Config,
        engine::MemoryEngine,
        provision::{DocumentRequest, ProvisionError},
        storage::Registry,
        workspace::Workspace,
    };

    fn nz(value: usize) -> NonZeroUsize {
        NonZeroUsize::new(value).unwrap()
    }

    fn setup() -> (TempDir, Provisioner<MemoryEngine>) {
        let tmp = tempfile::tempdir().unwrap();
        let workspace = Workspace::new(tmp.path().to_path_buf());
        let mut config = Config::default();
        config.set_headers(
            "application",
            vec!["Form Fields".into(), "UI Behavior".into(), "Navigation".into()],
        );
        let mut provisioner = Provisioner::open(&workspace, config, MemoryEngine::new())
            .unwrap()
            .with_today(NaiveDate::from_ymd_opt(2025, 3, 14).unwrap());
        provisioner
            .create_document(DocumentRequest::new("APP", "app", "application", "Application"))
            .unwrap();
        (tmp, provisioner)
    }

    fn snapshot(provisioner: &Provisioner<MemoryEngine>) -> (Registry, usize, usize) {
        (
            provisioner.registry().load().unwrap(),
            provisioner.index().ledger("APP").unwrap().entries().len(),
            provisioner.engine().items("APP").len(),
        )
    }

    #[test]
    fn normal_items_are_numbered_under_their_header() {
        let (_tmp, mut provisioner) = setup();

        let first = provisioner
            .provision(ItemRequest::new("APP", "Name field", "Form Fields"))
            .unwrap();
        let second = provisioner
            .provision(ItemRequest::new("APP", "Email field", "Form Fields"))
            .unwrap();

        assert_eq!(first.level().to_string(), "1.1");
        assert_eq!(second.level().to_string(), "1.2");
        assert_eq!(first.attributes.header, "Form Fields");
        assert!(!first.is_header());
        assert!(first.catalog_id() < second.catalog_id());
    }

    #[test]
    fn provenance_is_stamped() {
        let (_tmp, mut provisioner) = setup();

        let item = provisioner
            .provision(ItemRequest::new("APP", "Back button", "Navigation"))
            .unwrap();

        let today = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        assert_eq!(item.attributes.form_id, "APP");
        assert_eq!(item.attributes.form_name, "Application");
        assert_eq!(item.attributes.created_date, today);
        assert_eq!(item.attributes.reviewed, today);
        assert_eq!(item.level(), Level::Item { header: nz(3), sequence: nz(1) });
    }

    #[test]
    fn unknown_header_is_rejected_without_side_effects() {
        let (_tmp, mut provisioner) = setup();
        let before = snapshot(&provisioner);

        let error = provisioner
            .provision(ItemRequest::new("APP", "Orphan", "Nonexistent"))
            .unwrap_err();

        match error {
            ProvisionError::HeaderNotFound { label, valid, .. } => {
                assert_eq!(label, "Nonexistent");
                assert_eq!(valid, ["Form Fields", "UI Behavior", "Navigation"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(snapshot(&provisioner), before);
    }

    #[test]
    fn unknown_document_is_rejected() {
        let (_tmp, mut provisioner) = setup();

        assert!(matches!(
            provisioner.provision(ItemRequest::new("NOPE", "Item", "Form Fields")),
            Err(ProvisionError::UnknownDocument(uid)) if uid == "NOPE"
        ));
    }

    #[test]
    fn engine_failure_burns_the_catalog_id() {
        let (_tmp, mut provisioner) = setup();
        let before = provisioner.registry().load().unwrap().last_number;
        let entries = provisioner.index().ledger("APP").unwrap().entries().len();

        provisioner.engine().set_simulate_failure(true);
        let result = provisioner.provision(ItemRequest::new("APP", "Item", "Form Fields"));
        assert!(matches!(result, Err(ProvisionError::ExternalStore(_))));

        assert_eq!(provisioner.registry().load().unwrap().last_number, before + 1);
        assert_eq!(provisioner.index().ledger("APP").unwrap().entries().len(), entries);

        provisioner.engine().set_simulate_failure(false);
        let item = provisioner
            .provision(ItemRequest::new("APP", "Item", "Form Fields"))
            .unwrap();
        assert_eq!(item.level().to_string(), "1.1");
        assert_eq!(item.catalog_id().number().get(), before + 2);
    }

    #[test]
    fn failed_index_save_leaves_the_ledger_unchanged() {
        let (_tmp, mut provisioner) = setup();
        let entries = provisioner.index().ledger("APP").unwrap().entries().len();

        let path = provisioner.index().path().to_path_buf();
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        let result = provisioner.provision(ItemRequest::header("APP", "Accessibility"));
        assert!(matches!(result, Err(ProvisionError::Index(_))));
        assert_eq!(provisioner.index().ledger("APP").unwrap().entries().len(), entries);
        assert!(!provisioner.index().header_exists("APP", "Accessibility"));
    }

    #[test]
    fn ad_hoc_headers_extend_the_document() {
        let (_tmp, mut provisioner) = setup();

        let header = provisioner
            .provision(ItemRequest::header("APP", "Accessibility"))
            .unwrap();
        assert_eq!(header.level(), Level::Header(nz(4)));
        assert!(header.is_header());
        assert!(header.attributes.header.is_empty());

        let item = provisioner
            .provision(ItemRequest::new("APP", "Screen reader", "Accessibility"))
            .unwrap();
        assert_eq!(item.level().to_string(), "4.1");
    }

    #[test]
    fn duplicate_header_items_are_rejected() {
        let (_tmp, mut provisioner) = setup();

        assert!(matches!(
            provisioner.provision(ItemRequest::header("APP", "Form Fields")),
            Err(ProvisionError::DuplicateHeader { .. })
        ));
    }

    #[test]
    fn header_label_is_case_insensitive() {
        let request = ItemRequest::new("APP", "Title", " Header ");
        assert!(request.is_header());
        assert!(!ItemRequest::new("APP", "Title", "Form Fields").is_header());
    }

    #[test]
    fn explicit_links_come_first() {
        let (_tmp, mut provisioner) = setup();
        let defaults = ItemDefaults {
            links: vec!["SYS-001".into(), "SYS-002".into()],
            ..ItemDefaults::default()
        };

        let item = provisioner
            .provision(
                ItemRequest::new("APP", "Linked", "UI Behavior")
                    .with_defaults(defaults)
                    .with_links(vec!["SYS-002".into(), "SYS-009".into()]),
            )
            .unwrap();

        assert_eq!(item.attributes.links, ["SYS-002", "SYS-009", "SYS-001"]);
    }

    #[test]
    fn preview_allocates_nothing() {
        let (_tmp, mut provisioner) = setup();
        let request = ItemRequest::new("APP", "Item", "UI Behavior");

        let preview = provisioner.preview(&request).unwrap();
        assert_eq!(preview.level.to_string(), "2.1");
        assert_eq!(preview.header, "UI Behavior");

        let item = provisioner.provision(request).unwrap();
        assert_eq!(item.catalog_id(), &preview.catalog_id);
        assert_eq!(item.level(), preview.level);
    }
}
