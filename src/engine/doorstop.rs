//! A [`DocumentEngine`] backed by the `doorstop` command-line tool.

use std::{
    ffi::OsString,
    io::Write,
    path::{Path, PathBuf},
    process::{Command, Output},
    sync::LazyLock,
};

use regex::Regex;
use serde_yaml::{Mapping, Value};
use walkdir::WalkDir;

use super::{DocumentEngine, EngineError, NewDocument, PublishTarget, ValidationReport};
use crate::{
    domain::{Config, DocumentSettings, ItemAttributes},
    storage::write_atomic,
};

/// File holding a Doorstop document's settings.
const DOCUMENT_FILE: &str = ".doorstop.yml";

static ADDED_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?mi)^\s*added item:\s*(\S+)").expect("this regex is valid")
});

/// Drives a Doorstop tree rooted at a directory.
#[derive(Debug, Clone)]
pub struct Doorstop {
    program: String,
    root: PathBuf,
    settings: DocumentSettings,
}

impl Doorstop {
    /// Creates an adapter running `program` against the tree at `root`.
    #[must_use]
    pub const fn new(program: String, root: PathBuf, settings: DocumentSettings) -> Self {
        Self {
            program,
            root,
            settings,
        }
    }

    /// Creates an adapter for the documents root configured under
    /// `workspace`.
    #[must_use]
    pub fn from_config(workspace: &Path, config: &Config) -> Self {
        Self::new(
            config.engine.clone(),
            workspace.join(&config.documents.root),
            config.documents.clone(),
        )
    }

    fn command_line(&self, args: &[OsString]) -> String {
        std::iter::once(self.program.clone())
            .chain(args.iter().map(|arg| arg.to_string_lossy().into_owned()))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn run(&self, args: &[OsString]) -> Result<Output, EngineError> {
        tracing::debug!("Running {}", self.command_line(args));
        Command::new(&self.program)
            .args(args)
            .current_dir(&self.root)
            .output()
            .map_err(|source| EngineError::Spawn {
                program: self.program.clone(),
                source,
            })
    }

    fn run_checked(&self, args: &[OsString]) -> Result<String, EngineError> {
        let output = self.run(args)?;
        if !output.status.success() {
            return Err(EngineError::Failed {
                command: self.command_line(args),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Finds the directory of the document whose settings prefix is `uid`.
    fn find_document_dir(&self, uid: &str) -> Result<Option<PathBuf>, EngineError> {
        let mut found = Vec::new();
        for entry in WalkDir::new(&self.root)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name() == DOCUMENT_FILE)
        {
            let path = entry.path();
            match read_yaml(path) {
                Ok(settings) if document_prefix(&settings) == Some(uid) => {
                    if let Some(dir) = path.parent() {
                        found.push(dir.to_path_buf());
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::debug!("Skipping unreadable {}: {e}", path.display()),
            }
        }

        match found.len() {
            0 => Ok(None),
            1 => Ok(found.pop()),
            _ => Err(EngineError::AmbiguousDocument {
                uid: uid.to_string(),
                paths: found,
            }),
        }
    }

    /// Writes catalog settings and document attributes into a new document's
    /// settings file.
    fn patch_document(&self, dir: &Path, document: &NewDocument) -> Result<(), EngineError> {
        let path = dir.join(DOCUMENT_FILE);
        if !path.exists() {
            return Err(EngineError::Io {
                path,
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "the engine did not write a document settings file",
                ),
            });
        }
        let mut root = read_yaml(&path)?;
        let mapping = ensure_mapping(&mut root);

        let settings = child_mapping(mapping, "settings");
        settings.insert("digits".into(), Value::from(self.settings.digits));
        settings.insert(
            "itemformat".into(),
            Value::from(self.settings.item_format.as_str()),
        );
        if let Some(parent) = &document.parent {
            settings.insert("parent".into(), Value::from(parent.as_str()));
        }
        settings.insert("prefix".into(), Value::from(document.uid.as_str()));
        settings.insert("sep".into(), Value::from(self.settings.separator.as_str()));

        let doc = child_mapping(
            child_mapping(child_mapping(mapping, "attributes"), "defaults"),
            "doc",
        );
        doc.insert("title".into(), Value::from(document.title.as_str()));
        for (key, value) in [
            ("by", &self.settings.by),
            ("major", &self.settings.major),
            ("minor", &self.settings.minor),
            ("copyright", &self.settings.copyright),
        ] {
            if let Some(value) = value {
                doc.insert(key.into(), Value::from(value.as_str()));
            }
        }

        let content = serde_yaml::to_string(&root).map_err(|source| EngineError::Format {
            path: path.clone(),
            source,
        })?;
        write_atomic(&path, content.as_bytes()).map_err(|source| EngineError::Io { path, source })
    }

    fn relative_to_root(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .display()
            .to_string()
    }
}

impl DocumentEngine for Doorstop {
    fn document_exists(&self, uid: &str) -> Result<bool, EngineError> {
        Ok(self.find_document_dir(uid)?.is_some())
    }

    fn create_document(&self, document: &NewDocument) -> Result<Option<String>, EngineError> {
        let parent_dir = match &document.parent {
            Some(parent) => self
                .find_document_dir(parent)?
                .ok_or_else(|| EngineError::DocumentNotFound(parent.clone()))?,
            None => self.root.clone(),
        };
        let dir = parent_dir.join(&document.name);
        std::fs::create_dir_all(&dir).map_err(|source| EngineError::Io {
            path: dir.clone(),
            source,
        })?;

        let mut args: Vec<OsString> = vec![
            "create".into(),
            document.uid.clone().into(),
            dir.clone().into(),
        ];
        if let Some(parent) = &document.parent {
            args.push("--parent".into());
            args.push(parent.clone().into());
        }
        self.run_checked(&args)?;

        self.patch_document(&dir, document)?;
        tracing::info!("Created document {} at {}", document.uid, dir.display());
        Ok(Some(self.relative_to_root(&dir)))
    }

    fn add_item(
        &self,
        document_uid: &str,
        attributes: &ItemAttributes,
    ) -> Result<String, EngineError> {
        let defaults = engine_defaults(attributes).map_err(|source| EngineError::Format {
            path: PathBuf::from("<item defaults>"),
            source,
        })?;

        let mut file = tempfile::Builder::new()
            .prefix("item-defaults-")
            .suffix(".yml")
            .tempfile()
            .map_err(|source| EngineError::Io {
                path: std::env::temp_dir(),
                source,
            })?;
        file.write_all(defaults.as_bytes())
            .map_err(|source| EngineError::Io {
                path: file.path().to_path_buf(),
                source,
            })?;

        let args: Vec<OsString> = vec![
            "add".into(),
            document_uid.into(),
            "-d".into(),
            file.path().into(),
            "--level".into(),
            attributes.level.heading_form().into(),
        ];
        let stdout = self.run_checked(&args)?;

        parse_added_uid(&stdout, document_uid, &self.settings.separator)
            .ok_or_else(|| EngineError::UnrecognisedOutput(stdout.trim().to_string()))
    }

    fn validate(&self, document_uid: Option<&str>) -> Result<ValidationReport, EngineError> {
        if let Some(uid) = document_uid {
            if !self.document_exists(uid)? {
                return Err(EngineError::DocumentNotFound(uid.to_string()));
            }
        }
        // Doorstop validates the whole tree; links cross document boundaries.
        let output = self.run(&[])?;
        Ok(ValidationReport {
            passed: output.status.success(),
            output: [output.stdout, output.stderr]
                .iter()
                .map(|bytes| String::from_utf8_lossy(bytes).trim().to_string())
                .filter(|text| !text.is_empty())
                .collect::<Vec<_>>()
                .join("\n"),
        })
    }

    fn publish(&self, target: &PublishTarget, destination: &Path) -> Result<(), EngineError> {
        let args: Vec<OsString> = vec![
            "publish".into(),
            target.to_string().into(),
            destination.into(),
        ];
        self.run_checked(&args)?;
        Ok(())
    }
}

/// Serializes attributes as a Doorstop defaults file. Levels use Doorstop's
/// heading form.
fn engine_defaults(attributes: &ItemAttributes) -> Result<String, serde_yaml::Error> {
    let mut value = serde_yaml::to_value(attributes)?;
    if let Value::Mapping(mapping) = &mut value {
        mapping.insert(
            "level".into(),
            Value::from(attributes.level.heading_form()),
        );
    }
    serde_yaml::to_string(&value)
}

/// Extracts the uid of a newly added item from `doorstop add` output.
fn parse_added_uid(stdout: &str, document_uid: &str, separator: &str) -> Option<String> {
    if let Some(captures) = ADDED_ITEM.captures(stdout) {
        return Some(captures[1].to_string());
    }

    let pattern = format!(
        r"\b{}{}\d+\b",
        regex::escape(document_uid),
        regex::escape(separator)
    );
    Regex::new(&pattern)
        .ok()?
        .find(stdout)
        .map(|found| found.as_str().to_string())
}

fn read_yaml(path: &Path) -> Result<Value, EngineError> {
    let content = std::fs::read_to_string(path).map_err(|source| EngineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if content.trim().is_empty() {
        return Ok(Value::Mapping(Mapping::new()));
    }
    serde_yaml::from_str(&content).map_err(|source| EngineError::Format {
        path: path.to_path_buf(),
        source,
    })
}

fn document_prefix(settings: &Value) -> Option<&str> {
    settings.get("settings")?.get("prefix")?.as_str()
}

/// Makes `value` a mapping if it is not one already.
fn ensure_mapping(value: &mut Value) -> &mut Mapping {
    if !value.is_mapping() {
        *value = Value::Mapping(Mapping::new());
    }
    value
        .as_mapping_mut()
        .expect("value was just made a mapping")
}

/// Returns the mapping stored under `key`, replacing any non-mapping value.
fn child_mapping<'a>(mapping: &'a mut Mapping, key: &str) -> &'a mut Mapping {
    ensure_mapping(mapping.entry(Value::from(key)).or_insert(Value::Null))
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use chrono::NaiveDate;

    use super::*;
    use crate::domain::{Document, ItemDefaults, Level, Provenance};

    fn doorstop(root: &Path) -> Doorstop {
        let settings = DocumentSettings {
            by: Some("QA Team".into()),
            ..DocumentSettings::default()
        };
        Doorstop::new("doorstop".into(), root.to_path_buf(), settings)
    }

    fn write_document(dir: &Path, prefix: &str) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(
            dir.join(DOCUMENT_FILE),
            format!("settings:\n  prefix: {prefix}\n  digits: 3\n"),
        )
        .unwrap();
    }

    #[test]
    fn parses_added_item_line() {
        let stdout = "building tree...\nadded item: APP-QL-004 (@/reqs/app/APP-QL-004.yml)\n";
        assert_eq!(
            parse_added_uid(stdout, "APP-QL", "-").as_deref(),
            Some("APP-QL-004")
        );
    }

    #[test]
    fn falls_back_to_uid_pattern() {
        let stdout = "created APP-QL-012.yml";
        assert_eq!(
            parse_added_uid(stdout, "APP-QL", "-").as_deref(),
            Some("APP-QL-012")
        );
        assert!(parse_added_uid("nothing here", "APP-QL", "-").is_none());
    }

    #[test]
    fn finds_documents_by_prefix() {
        let tmp = tempfile::tempdir().unwrap();
        write_document(&tmp.path().join("app"), "APP");
        write_document(&tmp.path().join("app").join("ql"), "APP-QL");

        let engine = doorstop(tmp.path());
        assert_eq!(
            engine.find_document_dir("APP-QL").unwrap(),
            Some(tmp.path().join("app").join("ql"))
        );
        assert!(engine.document_exists("APP").unwrap());
        assert!(!engine.document_exists("SYS").unwrap());
    }

    #[test]
    fn duplicate_prefixes_are_ambiguous() {
        let tmp = tempfile::tempdir().unwrap();
        write_document(&tmp.path().join("one"), "APP");
        write_document(&tmp.path().join("two"), "APP");

        assert!(matches!(
            doorstop(tmp.path()).find_document_dir("APP"),
            Err(EngineError::AmbiguousDocument { .. })
        ));
    }

    #[test]
    fn patch_writes_settings_and_title() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("app").join("form");
        write_document(&dir, "APP-FRM");

        let engine = doorstop(tmp.path());
        let request = NewDocument::new("APP-FRM", "form", "Application Form");
        engine.patch_document(&dir, &request).unwrap();

        let patched = read_yaml(&dir.join(DOCUMENT_FILE)).unwrap();
        assert_eq!(document_prefix(&patched), Some("APP-FRM"));
        assert_eq!(patched["settings"]["parent"].as_str(), Some("APP"));
        assert_eq!(patched["settings"]["sep"].as_str(), Some("-"));
        assert_eq!(patched["settings"]["itemformat"].as_str(), Some("yaml"));
        assert_eq!(
            patched["attributes"]["defaults"]["doc"]["title"].as_str(),
            Some("Application Form")
        );
        assert_eq!(
            patched["attributes"]["defaults"]["doc"]["by"].as_str(),
            Some("QA Team")
        );
    }

    #[test]
    fn defaults_use_heading_levels() {
        let document = Document::new("APP", "Application", "form", vec!["Fields".into()]);
        let attributes = ItemDefaults::default().stamp(Provenance {
            document: &document,
            title: "Fields",
            header: "",
            catalog_id: "RQ-00001".parse().unwrap(),
            level: Level::Header(NonZeroUsize::MIN),
            today: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            links: &[],
        });

        let yaml: Value = serde_yaml::from_str(&engine_defaults(&attributes).unwrap()).unwrap();
        assert_eq!(yaml["level"].as_str(), Some("1.0"));
        assert_eq!(yaml["catalog_id"].as_str(), Some("RQ-00001"));
        assert_eq!(yaml["form_id"].as_str(), Some("APP"));
        assert_eq!(yaml["normative"].as_bool(), Some(false));
    }

    #[test]
    fn defaults_keep_the_stamped_title() {
        let document = Document::new("APP", "Application", "form", vec!["Fields".into()]);
        let defaults: ItemDefaults = serde_yaml::from_str("title: TEMPLATE\nowner: qa\n").unwrap();
        let attributes = defaults.stamp(Provenance {
            document: &document,
            title: "Name is required",
            header: "Fields",
            catalog_id: "RQ-00002".parse().unwrap(),
            level: Level::Item {
                header: NonZeroUsize::MIN,
                sequence: NonZeroUsize::MIN,
            },
            today: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            links: &[],
        });

        let yaml: Value = serde_yaml::from_str(&engine_defaults(&attributes).unwrap()).unwrap();
        assert_eq!(yaml["title"].as_str(), Some("Name is required"));
        assert_eq!(yaml["owner"].as_str(), Some("qa"));
        assert_eq!(yaml["level"].as_str(), Some("1.1"));
    }
}
