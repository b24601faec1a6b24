use std::{
    collections::{BTreeMap, HashSet},
    path::Path,
};

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::{CatalogId, ConfigError, Document, Level};

/// Attributes the provisioner always stamps, whatever a defaults file says.
const STAMPED: &[&str] = &[
    "uid",
    "title",
    "catalog_id",
    "created_date",
    "reviewed",
    "level",
    "header",
    "form_id",
    "form_name",
    "is_header",
];

/// A typed partial item record, read from an attribute-defaults file.
///
/// Every field is optional. Fields the provisioner stamps (title, catalog id,
/// level, dates, form fields) are discarded from defaults; the rest fill in whatever
/// the caller did not supply explicitly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemDefaults {
    /// Default item body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Default links, by item uid.
    #[serde(deserialize_with = "deserialize_links")]
    pub links: Vec<String>,
    /// Default tags.
    pub tags: Vec<String>,
    /// Whether the item is derived.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub derived: Option<bool>,
    /// Whether the item is normative.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normative: Option<bool>,
    /// Whether the item is active.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    /// Any other attributes, passed through to the engine untouched.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl ItemDefaults {
    /// Loads defaults from a YAML file.
    ///
    /// An empty file yields empty defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Defaults`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let defaults_error = |reason: String| ConfigError::Defaults {
            path: path.display().to_string(),
            reason,
        };
        let content = std::fs::read_to_string(path).map_err(|e| defaults_error(e.to_string()))?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&content).map_err(|e| defaults_error(e.to_string()))
    }

    /// Combines these defaults with the stamped provenance of a new item.
    ///
    /// Stamped values take precedence over anything in the defaults. Links are
    /// merged with [`merge_links`], explicit links first.
    #[must_use]
    pub fn stamp(mut self, provenance: Provenance<'_>) -> ItemAttributes {
        for key in STAMPED {
            if self.extra.remove(*key).is_some() {
                tracing::debug!("Ignoring '{key}' from item defaults; it is always stamped");
            }
        }

        let is_header = provenance.level.is_header();
        let links = merge_links(provenance.links, &self.links);

        ItemAttributes {
            title: provenance.title.to_string(),
            text: self.text.unwrap_or_default(),
            catalog_id: provenance.catalog_id,
            created_date: provenance.today,
            reviewed: provenance.today,
            level: provenance.level,
            header: provenance.header.to_string(),
            form_id: provenance.document.uid.clone(),
            form_name: provenance.document.title.clone(),
            links,
            tags: self.tags,
            // Headers are organisational, never requirements.
            derived: !is_header && self.derived.unwrap_or(true),
            normative: !is_header && self.normative.unwrap_or(true),
            active: self.active.unwrap_or(true),
            is_header,
            extra: self.extra,
        }
    }
}

/// The identity and provenance stamped onto a new item.
#[derive(Debug, Clone)]
pub struct Provenance<'a> {
    /// The owning document.
    pub document: &'a Document,
    /// The item title. For header items, this is the header name.
    pub title: &'a str,
    /// The governing header name, empty for header items.
    pub header: &'a str,
    /// The allocated catalog id.
    pub catalog_id: CatalogId,
    /// The assigned level.
    pub level: Level,
    /// The assignment date.
    pub today: NaiveDate,
    /// Links supplied explicitly by the caller.
    pub links: &'a [String],
}

/// The full attribute set of an item, as handed to the document engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemAttributes {
    /// Item title.
    pub title: String,
    /// Item body.
    pub text: String,
    /// Globally unique catalog id.
    pub catalog_id: CatalogId,
    /// Date the item was provisioned.
    pub created_date: NaiveDate,
    /// Date the item was last reviewed.
    pub reviewed: NaiveDate,
    /// Position in the document's header hierarchy.
    pub level: Level,
    /// Name of the governing header; empty for header items.
    pub header: String,
    /// Owning document uid.
    pub form_id: String,
    /// Owning document title.
    pub form_name: String,
    /// Referenced item uids, first-seen order, no duplicates.
    pub links: Vec<String>,
    /// Tags.
    pub tags: Vec<String>,
    /// Whether the item is derived.
    pub derived: bool,
    /// Whether the item is normative.
    pub normative: bool,
    /// Whether the item is active.
    pub active: bool,
    /// Whether this is a header item.
    pub is_header: bool,
    /// Pass-through attributes from the defaults file.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// A provisioned item: its attributes plus the uid the engine assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Engine-assigned item uid.
    pub uid: String,
    /// The stamped attributes.
    #[serde(flatten)]
    pub attributes: ItemAttributes,
}

impl Item {
    /// Returns `true` for header items.
    #[must_use]
    pub const fn is_header(&self) -> bool {
        self.attributes.is_header
    }

    /// The item's catalog id.
    #[must_use]
    pub const fn catalog_id(&self) -> &CatalogId {
        &self.attributes.catalog_id
    }

    /// The item's level.
    #[must_use]
    pub const fn level(&self) -> Level {
        self.attributes.level
    }
}

/// Merges link lists, keeping the first-seen order of `explicit` followed by
/// any of `existing` not already present.
///
/// Merging a list into itself is a no-op, and duplicates within either input
/// are dropped.
///
/// # Examples
///
/// ```
/// use req_catalog::merge_links;
///
/// let explicit = vec!["B".to_string(), "A".to_string()];
/// let existing = vec!["A".to_string(), "C".to_string()];
/// assert_eq!(merge_links(&explicit, &existing), ["B", "A", "C"]);
/// ```
#[must_use]
pub fn merge_links(explicit: &[String], existing: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    explicit
        .iter()
        .chain(existing)
        .filter(|link| seen.insert(link.as_str()))
        .cloned()
        .collect()
}

/// Accepts links either as plain uids or as the single-key mappings
/// (`- UID: fingerprint`) outline engines write.
fn deserialize_links<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Link {
        Uid(String),
        Stamped(BTreeMap<String, Option<String>>),
    }

    let links = Option::<Vec<Link>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(links
        .into_iter()
        .flat_map(|link| match link {
            Link::Uid(uid) => vec![uid],
            Link::Stamped(map) => map.into_keys().collect(),
        })
        .collect())
}
