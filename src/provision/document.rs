use tracing::instrument;

use super::{ItemRequest, ProvisionError, Provisioner};
use crate::{
    domain::{Document, Item, ItemDefaults},
    engine::{DocumentEngine, NewDocument},
};

/// A request to create a document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRequest {
    /// Document uid, e.g. `APP-QL-CNI`.
    pub uid: String,
    /// Directory name for the document.
    pub name: String,
    /// Document type; selects the configured headers.
    pub document_type: String,
    /// Document title.
    pub title: String,
    /// Defaults applied to each seeded header item.
    pub header_defaults: ItemDefaults,
}

impl DocumentRequest {
    /// A request with empty header defaults.
    #[must_use]
    pub fn new(
        uid: impl Into<String>,
        name: impl Into<String>,
        document_type: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            uid: uid.into(),
            name: name.into(),
            document_type: document_type.into(),
            title: title.into(),
            header_defaults: ItemDefaults::default(),
        }
    }

    /// Sets the defaults for seeded header items.
    #[must_use]
    pub fn with_header_defaults(mut self, defaults: ItemDefaults) -> Self {
        self.header_defaults = defaults;
        self
    }
}

/// A newly created document and the header items seeded into it.
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisionedDocument {
    /// The document, with its header snapshot.
    pub document: Document,
    /// One header item per header, in header order.
    pub headers: Vec<Item>,
}

impl<E: DocumentEngine> Provisioner<E> {
    /// Creates a document and seeds one header item per configured header.
    ///
    /// The header list is copied from the registry when the document is
    /// created. Later registry edits do not affect it.
    ///
    /// The document type is resolved before the engine is called. If seeding
    /// fails partway, the document and the header items seeded so far remain.
    ///
    /// # Errors
    ///
    /// - [`ProvisionError::DuplicateDocument`] if the uid is already taken
    /// - [`ProvisionError::UnknownDocumentType`] if the type has no headers
    /// - [`ProvisionError::ExternalStore`] if the engine fails
    /// - any error of [`Provisioner::provision`] while seeding headers
    #[instrument(skip(self, request), fields(document = %request.uid))]
    pub fn create_document(
        &mut self,
        request: DocumentRequest,
    ) -> Result<ProvisionedDocument, ProvisionError> {
        let DocumentRequest {
            uid,
            name,
            document_type,
            title,
            header_defaults,
        } = request;

        if self.index.document(&uid).is_some() || self.engine.document_exists(&uid)? {
            return Err(ProvisionError::DuplicateDocument(uid));
        }

        let headers: Vec<String> = self.registry.header_names(&document_type)?.into();

        let location = self
            .engine
            .create_document(&NewDocument::new(uid.as_str(), name, title.as_str()))?;
        tracing::debug!("Created document {uid} at {location:?}");

        let document = Document::new(uid, title, document_type.to_lowercase(), headers);
        self.index
            .update(|index| index.record_document(document.clone(), location))?;

        let header_items = document
            .headers
            .iter()
            .map(|header| {
                self.provision(
                    ItemRequest::header(document.uid.as_str(), header.as_str())
                        .with_defaults(header_defaults.clone()),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!(
            "Created document {} with {} header(s)",
            document.uid,
            header_items.len()
        );
        Ok(ProvisionedDocument {
            document,
            headers: header_items,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use tempfile::TempDir;

    use super::*;
    use crate::{
        domain::{Config, Level},
        engine::MemoryEngine,
        workspace::Workspace,
    };

    fn open(config: Config) -> (TempDir, Provisioner<MemoryEngine>) {
        let tmp = tempfile::tempdir().unwrap();
        let workspace = Workspace::new(tmp.path().to_path_buf());
        let provisioner = Provisioner::open(&workspace, config, MemoryEngine::new()).unwrap();
        (tmp, provisioner)
    }

    fn config() -> Config {
        let mut config = Config::default();
        config.set_headers(
            "application",
            vec!["Form Fields".into(), "UI Behavior".into(), "Navigation".into()],
        );
        config
    }

    #[test]
    fn headers_are_seeded_in_order() {
        let (_tmp, mut provisioner) = open(config());

        let created = provisioner
            .create_document(DocumentRequest::new("APP", "app", "Application", "App"))
            .unwrap();

        assert_eq!(created.document.document_type, "application");
        let seeded: Vec<_> = created
            .headers
            .iter()
            .map(|item| (item.attributes.title.as_str(), item.level()))
            .collect();
        assert_eq!(
            seeded,
            [
                ("Form Fields", Level::Header(NonZeroUsize::new(1).unwrap())),
                ("UI Behavior", Level::Header(NonZeroUsize::new(2).unwrap())),
                ("Navigation", Level::Header(NonZeroUsize::new(3).unwrap())),
            ]
        );
        assert!(created.headers.iter().all(|item| item.is_header()));
        assert!(
            created
                .headers
                .iter()
                .all(|item| !item.attributes.derived && !item.attributes.normative)
        );
        assert_eq!(provisioner.engine().items("APP").len(), 3);
    }

    #[test]
    fn header_defaults_reach_every_header() {
        let (_tmp, mut provisioner) = open(config());
        let defaults = ItemDefaults {
            text: Some("Section".into()),
            ..ItemDefaults::default()
        };

        let created = provisioner
            .create_document(
                DocumentRequest::new("APP", "app", "application", "App")
                    .with_header_defaults(defaults),
            )
            .unwrap();

        assert!(
            created
                .headers
                .iter()
                .all(|item| item.attributes.text == "Section")
        );
    }

    #[test]
    fn unknown_type_creates_nothing() {
        let (_tmp, mut provisioner) = open(config());

        let result = provisioner.create_document(DocumentRequest::new("LIB", "lib", "library", "Lib"));

        assert!(matches!(
            result,
            Err(ProvisionError::UnknownDocumentType { document_type, .. }) if document_type == "library"
        ));
        assert_eq!(provisioner.engine().document_count(), 0);
        assert!(provisioner.index().document("LIB").is_none());
    }

    #[test]
    fn duplicate_documents_are_rejected() {
        let (_tmp, mut provisioner) = open(config());
        let request = DocumentRequest::new("APP", "app", "application", "App");
        provisioner.create_document(request.clone()).unwrap();

        assert!(matches!(
            provisioner.create_document(request),
            Err(ProvisionError::DuplicateDocument(uid)) if uid == "APP"
        ));
    }

    #[test]
    fn engine_failure_leaves_no_ledger() {
        let (_tmp, mut provisioner) = open(config());
        provisioner.engine().set_simulate_failure(true);

        let result =
            provisioner.create_document(DocumentRequest::new("APP", "app", "application", "App"));

        assert!(matches!(result, Err(ProvisionError::ExternalStore(_))));
        assert!(provisioner.index().document("APP").is_none());
        assert_eq!(provisioner.registry().load().unwrap().last_number, 0);
    }

    #[test]
    fn repeated_header_names_create_nothing() {
        let mut config = config();
        config.set_headers("form", vec!["Fields".into(), "Fields".into()]);
        let (_tmp, mut provisioner) = open(config);

        let result = provisioner.create_document(DocumentRequest::new("FRM", "frm", "form", "Form"));

        assert!(matches!(result, Err(ProvisionError::Config(_))));
        assert_eq!(provisioner.engine().document_count(), 0);
        assert!(provisioner.index().document("FRM").is_none());
    }

    #[test]
    fn partially_seeded_document_can_be_completed() {
        let (_tmp, mut provisioner) = open(config());
        provisioner.engine().set_fail_adds_after(Some(1));

        let result =
            provisioner.create_document(DocumentRequest::new("APP", "app", "application", "App"));
        assert!(matches!(result, Err(ProvisionError::ExternalStore(_))));
        assert!(provisioner.index().has_header_item("APP", "Form Fields"));
        assert!(!provisioner.index().has_header_item("APP", "UI Behavior"));

        provisioner.engine().set_fail_adds_after(None);
        let level = |item: Item| item.level().to_string();

        let accessibility = provisioner
            .provision(ItemRequest::header("APP", "Accessibility"))
            .unwrap();
        assert_eq!(level(accessibility), "4");
        let item = provisioner
            .provision(ItemRequest::new("APP", "Screen reader", "Accessibility"))
            .unwrap();
        assert_eq!(level(item), "4.1");

        let behaviour = provisioner
            .provision(ItemRequest::header("APP", "UI Behavior"))
            .unwrap();
        assert_eq!(level(behaviour), "2");
        let item = provisioner
            .provision(ItemRequest::new("APP", "Spinner", "UI Behavior"))
            .unwrap();
        assert_eq!(level(item), "2.1");

        let navigation = provisioner
            .provision(ItemRequest::header("APP", "Navigation"))
            .unwrap();
        assert_eq!(level(navigation), "3");
        assert_eq!(
            provisioner.index().document("APP").unwrap().headers,
            ["Form Fields", "UI Behavior", "Navigation", "Accessibility"]
        );
    }

    #[test]
    fn header_snapshot_survives_registry_edits() {
        let (_tmp, mut provisioner) = open(config());
        provisioner
            .create_document(DocumentRequest::new("APP", "app", "application", "App"))
            .unwrap();

        provisioner
            .registry()
            .set_header_names(
                "application",
                nonempty::nonempty!["Overview".to_string()],
            )
            .unwrap();

        let headers = &provisioner.index().document("APP").unwrap().headers;
        assert_eq!(headers, &["Form Fields", "UI Behavior", "Navigation"]);
        assert!(matches!(
            provisioner.provision(ItemRequest::new("APP", "Item", "Overview")),
            Err(ProvisionError::HeaderNotFound { .. })
        ));
    }
}
