use std::{
    cell::{Cell, RefCell},
    collections::BTreeMap,
    path::Path,
};

use super::{DocumentEngine, EngineError, NewDocument, PublishTarget, ValidationReport};
use crate::domain::ItemAttributes;

#[derive(Debug, Clone)]
struct StoredDocument {
    request: NewDocument,
    items: Vec<(String, ItemAttributes)>,
}

/// In-memory document engine.
///
/// Uses `RefCell` for interior mutability since the catalog is
/// single-threaded. Item uids are assigned as `<DOCUMENT>-<NNN>`.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    documents: RefCell<BTreeMap<String, StoredDocument>>,
    simulate_failure: Cell<bool>,
    adds_before_failure: Cell<Option<usize>>,
}

impl MemoryEngine {
    /// Creates an empty engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent create call fail, for testing error handling.
    pub fn set_simulate_failure(&self, simulate: bool) {
        self.simulate_failure.set(simulate);
    }

    /// Lets the next `adds` item additions succeed and fails the ones after.
    /// `None` removes the limit.
    pub fn set_fail_adds_after(&self, adds: Option<usize>) {
        self.adds_before_failure.set(adds);
    }

    /// The items stored in a document, in creation order.
    #[must_use]
    pub fn items(&self, document_uid: &str) -> Vec<(String, ItemAttributes)> {
        self.documents
            .borrow()
            .get(document_uid)
            .map(|document| document.items.clone())
            .unwrap_or_default()
    }

    /// The number of stored documents.
    #[must_use]
    pub fn document_count(&self) -> usize {
        self.documents.borrow().len()
    }

    fn check_failure(&self, operation: &str) -> Result<(), EngineError> {
        if self.simulate_failure.get() {
            return Err(EngineError::Rejected(format!("simulated {operation} failure")));
        }
        Ok(())
    }

    fn take_add(&self) -> Result<(), EngineError> {
        match self.adds_before_failure.get() {
            Some(0) => Err(EngineError::Rejected("simulated add failure".into())),
            Some(remaining) => {
                self.adds_before_failure.set(Some(remaining - 1));
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl DocumentEngine for MemoryEngine {
    fn document_exists(&self, uid: &str) -> Result<bool, EngineError> {
        Ok(self.documents.borrow().contains_key(uid))
    }

    fn create_document(&self, document: &NewDocument) -> Result<Option<String>, EngineError> {
        self.check_failure("create")?;

        let mut documents = self.documents.borrow_mut();
        if documents.contains_key(&document.uid) {
            return Err(EngineError::Rejected(format!(
                "document '{}' already exists",
                document.uid
            )));
        }
        if let Some(parent) = &document.parent {
            if !documents.contains_key(parent) {
                tracing::debug!("Parent '{parent}' of '{}' is not stored", document.uid);
            }
        }
        documents.insert(
            document.uid.clone(),
            StoredDocument {
                request: document.clone(),
                items: Vec::new(),
            },
        );
        Ok(None)
    }

    fn add_item(
        &self,
        document_uid: &str,
        attributes: &ItemAttributes,
    ) -> Result<String, EngineError> {
        self.check_failure("add")?;
        self.take_add()?;

        let mut documents = self.documents.borrow_mut();
        let document = documents
            .get_mut(document_uid)
            .ok_or_else(|| EngineError::DocumentNotFound(document_uid.to_string()))?;

        let uid = format!("{}-{:03}", document.request.uid, document.items.len() + 1);
        document.items.push((uid.clone(), attributes.clone()));
        Ok(uid)
    }

    fn validate(&self, document_uid: Option<&str>) -> Result<ValidationReport, EngineError> {
        let documents = self.documents.borrow();
        if let Some(uid) = document_uid {
            if !documents.contains_key(uid) {
                return Err(EngineError::DocumentNotFound(uid.to_string()));
            }
        }
        Ok(ValidationReport {
            passed: true,
            output: format!("{} document(s) valid", documents.len()),
        })
    }

    fn publish(&self, target: &PublishTarget, _destination: &Path) -> Result<(), EngineError> {
        match target {
            PublishTarget::Document(uid) if !self.documents.borrow().contains_key(uid) => {
                Err(EngineError::DocumentNotFound(uid.clone()))
            }
            _ => Ok(()),
        }
    }
}
