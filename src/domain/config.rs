use std::{
    collections::{BTreeMap, HashSet},
    path::Path,
};

use serde::{Deserialize, Serialize};

/// Configuration for the requirements catalog.
///
/// This struct holds the settings that control how catalog ids are formatted,
/// which headers each document type is seeded with, and how documents are
/// handed to the document engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Versions", into = "Versions")]
pub struct Config {
    /// The prefix of every catalog id.
    ///
    /// For example, 'RQ' in 'RQ-00042'.
    prefix: String,

    /// The number of digits in a catalog id.
    ///
    /// The counter is padded to this width with leading zeros.
    digits: usize,

    /// The text placed between the prefix and the padded counter.
    separator: String,

    /// The counter value a fresh registry starts at.
    ///
    /// The first allocated catalog id is `counter_floor + 1`.
    counter_floor: u64,

    /// Header names used to seed the registry, keyed by document type.
    ///
    /// The order of each list is the order headers are seeded and numbered in.
    headers: BTreeMap<String, Vec<String>>,

    /// Settings passed to the document engine when documents are created.
    pub documents: DocumentSettings,

    /// The executable used to drive the document engine.
    pub engine: String,
}

/// Settings applied to documents created through the document engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSettings {
    /// Root directory of the engine's documents, relative to the workspace
    /// root.
    #[serde(default = "default_documents_root")]
    pub root: String,

    /// Digits in the engine-assigned item uids.
    #[serde(default = "default_document_digits")]
    pub digits: usize,

    /// Separator in the engine-assigned item uids.
    #[serde(default = "default_separator")]
    pub separator: String,

    /// File format of the engine's item files.
    #[serde(default = "default_item_format")]
    pub item_format: String,

    /// Document author attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by: Option<String>,

    /// Document major version attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub major: Option<String>,

    /// Document minor version attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minor: Option<String>,

    /// Document copyright attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
}

impl Default for DocumentSettings {
    fn default() -> Self {
        Self {
            root: default_documents_root(),
            digits: default_document_digits(),
            separator: default_separator(),
            item_format: default_item_format(),
            by: None,
            major: None,
            minor: None,
            copyright: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            digits: default_digits(),
            separator: default_separator(),
            counter_floor: 0,
            headers: BTreeMap::new(),
            documents: DocumentSettings::default(),
            engine: default_engine(),
        }
    }
}

/// Errors raised while loading or validating the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Path of the configuration file.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML, or has the wrong shape.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Path of the configuration file.
        path: String,
        /// Underlying TOML error.
        source: toml::de::Error,
    },

    /// The configuration parsed, but holds values that cannot be used.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// An attribute-defaults file could not be read or parsed.
    #[error("invalid item defaults {path}: {reason}")]
    Defaults {
        /// Path of the defaults file.
        path: String,
        /// Description of the failure.
        reason: String,
    },

    /// The configuration could not be written.
    #[error("failed to write config file {path}: {reason}")]
    Write {
        /// Path of the configuration file.
        path: String,
        /// Description of the failure.
        reason: String,
    },
}

impl Config {
    /// Creates a configuration with the given catalog id format.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `digits` is zero or `prefix` is
    /// empty.
    pub fn new(
        prefix: impl Into<String>,
        digits: usize,
        separator: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            prefix: prefix.into(),
            digits,
            separator: separator.into(),
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Loads the configuration from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, if the TOML content is
    /// invalid, or if the values fail validation.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let mut config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.normalize_document_types()?;
        config.validate()?;
        Ok(config)
    }

    /// Saves the configuration to a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized to TOML or if
    /// the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_error = |reason: String| ConfigError::Write {
            path: path.display().to_string(),
            reason,
        };
        let content = toml::to_string_pretty(self).map_err(|e| write_error(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| write_error(e.to_string()))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.digits == 0 {
            return Err(ConfigError::Invalid("digits must be at least 1".to_string()));
        }
        if self.prefix.trim().is_empty() {
            return Err(ConfigError::Invalid("prefix must not be empty".to_string()));
        }
        if let Some((kind, _)) = self.headers.iter().find(|(_, names)| names.is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "document type '{kind}' has an empty header list"
            )));
        }
        for (kind, names) in &self.headers {
            if let Some(name) = duplicate_header(names) {
                return Err(ConfigError::Invalid(format!(
                    "document type '{kind}' lists header '{name}' more than once"
                )));
            }
        }
        Ok(())
    }

    /// Lowercases document type labels, rejecting labels that differ only in
    /// case.
    fn normalize_document_types(&mut self) -> Result<(), ConfigError> {
        let mut normalized = BTreeMap::new();
        for (kind, names) in std::mem::take(&mut self.headers) {
            let key = kind.to_lowercase();
            if normalized.contains_key(&key) {
                return Err(ConfigError::Invalid(format!(
                    "document type '{key}' is configured more than once (type labels are \
                     case-insensitive)"
                )));
            }
            normalized.insert(key, names);
        }
        self.headers = normalized;
        Ok(())
    }

    /// Returns the catalog id prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the number of digits the counter is padded to.
    #[must_use]
    pub const fn digits(&self) -> usize {
        self.digits
    }

    /// Returns the separator between prefix and counter.
    #[must_use]
    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Returns the counter value a fresh registry starts at.
    #[must_use]
    pub const fn counter_floor(&self) -> u64 {
        self.counter_floor
    }

    /// Sets the counter value a fresh registry starts at.
    pub const fn set_counter_floor(&mut self, floor: u64) {
        self.counter_floor = floor;
    }

    /// Returns the configured headers, keyed by lowercase document type.
    #[must_use]
    pub const fn headers(&self) -> &BTreeMap<String, Vec<String>> {
        &self.headers
    }

    /// Sets the headers for a document type.
    ///
    /// The type label is normalized to lowercase.
    pub fn set_headers(&mut self, document_type: &str, headers: Vec<String>) {
        self.headers.insert(document_type.to_lowercase(), headers);
    }
}

/// Returns the first header name that appears more than once.
pub(crate) fn duplicate_header(names: &[String]) -> Option<&str> {
    let mut seen = HashSet::new();
    names
        .iter()
        .find(|name| !seen.insert(name.as_str()))
        .map(String::as_str)
}

fn default_prefix() -> String {
    "RQ".to_string()
}

const fn default_digits() -> usize {
    5
}

fn default_separator() -> String {
    "-".to_string()
}

fn default_documents_root() -> String {
    "reqs".to_string()
}

const fn default_document_digits() -> usize {
    3
}

fn default_item_format() -> String {
    "yaml".to_string()
}

fn default_engine() -> String {
    "doorstop".to_string()
}

/// The serialized versions of the configuration.
/// This allows for future changes to the configuration format and to the domain
/// type without breaking compatibility.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default = "default_prefix")]
        prefix: String,

        /// The number of digits in the catalog id.
        ///
        /// Digits are padded to this width with leading zeros.
        #[serde(default = "default_digits")]
        digits: usize,

        #[serde(default = "default_separator")]
        separator: String,

        #[serde(default)]
        counter_floor: u64,

        #[serde(default = "default_engine")]
        engine: String,

        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        headers: BTreeMap<String, Vec<String>>,

        #[serde(default)]
        documents: DocumentSettings,
    },
}

impl From<Versions> for Config {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 {
                prefix,
                digits,
                separator,
                counter_floor,
                headers,
                documents,
                engine,
            } => Self {
                prefix,
                digits,
                separator,
                counter_floor,
                headers,
                documents,
                engine,
            },
        }
    }
}

impl From<Config> for Versions {
    fn from(config: Config) -> Self {
        Self::V1 {
            prefix: config.prefix,
            digits: config.digits,
            separator: config.separator,
            counter_floor: config.counter_floor,
            headers: config.headers,
            documents: config.documents,
            engine: config.engine,
        }
    }
}
