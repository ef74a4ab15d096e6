use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::path::Path;
use thiserror::Error;

use crate::catalog::dichotomous::{DichotomousKey, DichotomousKeySummary};
use crate::catalog::multi_access::{MultiAccessKey, MultiKeySummary};
use crate::core::types::KeyId;
use crate::parsing::lucid::LucidError;
use crate::parsing::{keybase, lucid};

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read catalog: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse catalog: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Failed to parse key bundle: {0}")]
    BundleError(#[from] LucidError),

    #[error("Invalid key: {0}")]
    Schema(#[from] SchemaViolation),

    #[error("Unrecognized key format: {0}")]
    UnrecognizedFormat(String),
}

/// A structural problem that makes one key unusable. Other keys are unaffected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaViolation {
    #[error("Key has no identifier")]
    MissingKeyId,

    #[error("Key {key} has no root node")]
    MissingRootNode { key: KeyId },

    #[error("Key {key} has no characters")]
    NoCharacters { key: KeyId },

    #[error("Key {key} declares character {character} more than once")]
    DuplicateCharacter { key: KeyId, character: String },

    #[error("Key {key} has a malformed record: {detail}")]
    MalformedRecord { key: KeyId, detail: String },

    #[error("Key {key}: {detail}")]
    TooManyRecords { key: KeyId, detail: String },
}

/// A problem found while loading that was worked around
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadIssue {
    #[error("Score row for taxon {taxon} could not be decoded: {reason}")]
    ScoreDecodeFailure { taxon: String, reason: String },

    #[error("Taxon {taxon} has no score row")]
    MissingScores { taxon: String },

    #[error("Measurement of character {character} for taxon {taxon} could not be decoded: {reason}")]
    MeasureDecodeFailure {
        character: String,
        taxon: String,
        reason: String,
    },

    #[error("Unknown taxon {taxon} referenced by {context}")]
    UnknownTaxon { taxon: String, context: String },

    #[error("Unknown character {character} referenced by {context}")]
    UnknownCharacter { character: String, context: String },

    #[error("Character {character} has unknown type {code}; it will not be asked")]
    UnknownCharacterKind { character: String, code: i64 },

    #[error("Duplicate {kind} {id} ignored")]
    DuplicateId { kind: &'static str, id: String },

    #[error("Lead {lead} refers to missing item {item}")]
    MissingItem { lead: String, item: String },

    #[error("Skipped malformed record: {detail}")]
    MalformedRecord { detail: String },

    #[error("Skipped {source_name}: {reason}")]
    Skipped { source_name: String, reason: String },
}

/// Collects load issues for one key, logging each as it is found
pub(crate) struct IssueLog {
    key: String,
    issues: Vec<LoadIssue>,
}

impl IssueLog {
    pub(crate) fn new(key: &KeyId) -> Self {
        Self {
            key: key.to_string(),
            issues: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, issue: LoadIssue) {
        tracing::warn!("{}: {}", self.key, issue);
        self.issues.push(issue);
    }

    pub(crate) fn into_issues(self) -> Vec<LoadIssue> {
        self.issues
    }
}

/// Catalog version for compatibility checking
pub const CATALOG_VERSION: &str = "1.0.0";

/// Serializable catalog bundle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogData {
    pub version: String,

    #[serde(default)]
    pub generated_at: String,

    /// Key ID -> multi-access key record
    #[serde(default)]
    pub multi_access: BTreeMap<String, serde_json::Value>,

    /// Key ID -> dichotomous key record
    #[serde(default)]
    pub dichotomous: BTreeMap<String, serde_json::Value>,
}

/// File extensions recognised when loading a directory
const KEY_FILE_SUFFIXES: [&str; 3] = [".json.gz", ".json", ".js"];

/// Key ID implied by a file name: the name without its key file suffix
fn key_id_from_path(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    KEY_FILE_SUFFIXES
        .iter()
        .find_map(|suffix| name.strip_suffix(suffix))
        .map(str::to_string)
}

fn is_key_file(path: &Path) -> bool {
    path.is_file() && key_id_from_path(path).is_some()
}

/// What a parsed JSON document looks like
enum Document {
    Bundle(CatalogData),
    MultiAccess(serde_json::Value),
    Dichotomous(serde_json::Value),
}

fn classify(value: serde_json::Value) -> Result<Document, CatalogError> {
    let has = |field: &str| value.get(field).is_some();
    if has("multi_access") || has("dichotomous") {
        Ok(Document::Bundle(serde_json::from_value(value)?))
    } else if has("keybase") || has("leads") || has("first_step") {
        Ok(Document::Dichotomous(value))
    } else if has("features") {
        Ok(Document::MultiAccess(value))
    } else {
        Err(CatalogError::UnrecognizedFormat(
            "expected a catalog bundle, a multi-access key or a dichotomous key".to_string(),
        ))
    }
}

/// A collection of identification keys of both kinds
#[derive(Debug, Default)]
pub struct KeyCatalog {
    multi_access: Vec<MultiAccessKey>,

    /// Index: key ID -> index in multi_access vec
    multi_index: HashMap<KeyId, usize>,

    dichotomous: Vec<DichotomousKey>,

    /// Index: key ID -> index in dichotomous vec
    dichotomous_index: HashMap<KeyId, usize>,

    /// Entries and files that were skipped while loading
    issues: Vec<LoadIssue>,
}

impl KeyCatalog {
    /// Create an empty catalog
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the embedded demo catalog
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded catalog cannot be parsed.
    pub fn load_embedded() -> Result<Self, CatalogError> {
        // Embedded at compile time, validated by build.rs
        const EMBEDDED_CATALOG: &str = include_str!("../../catalogs/demo_keys.json");
        Self::from_json(EMBEDDED_CATALOG)
    }

    /// Load a catalog from a path: a directory of key files, or a single file
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be read, or if it is a single file that
    /// holds no usable key.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        if path.is_dir() {
            Self::load_from_dir(path)
        } else {
            Self::load_from_file(path)
        }
    }

    /// Load a catalog from one file: a bundle, a single key, or a Lucid player bundle.
    /// Files ending in `.gz` are decompressed first.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self, CatalogError> {
        let text = read_text(path)?;
        let fallback_id = key_id_from_path(path);
        let mut catalog = Self::new();
        catalog.add_text(&text, fallback_id.as_deref())?;
        catalog.log_loaded(&path.display().to_string());
        Ok(catalog)
    }

    /// Load every key file in a directory. Files that fail to load are skipped and
    /// recorded in [`KeyCatalog::issues`].
    ///
    /// # Errors
    ///
    /// Returns an error only if the directory itself cannot be read.
    pub fn load_from_dir(dir: &Path) -> Result<Self, CatalogError> {
        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| is_key_file(path))
            .collect();
        paths.sort();

        let mut catalog = Self::new();
        for path in paths {
            let fallback_id = key_id_from_path(&path);
            let loaded = read_text(&path)
                .and_then(|text| catalog.add_text(&text, fallback_id.as_deref()));
            if let Err(e) = loaded {
                catalog.record(LoadIssue::Skipped {
                    source_name: path.display().to_string(),
                    reason: e.to_string(),
                });
            }
        }

        catalog.log_loaded(&dir.display().to_string());
        Ok(catalog)
    }

    /// Parse a catalog bundle from a JSON string. Entries that fail validation are
    /// skipped and recorded in [`KeyCatalog::issues`].
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a catalog bundle.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let data: CatalogData = serde_json::from_str(json)?;
        let mut catalog = Self::new();
        catalog.add_bundle(data);
        Ok(catalog)
    }

    fn add_text(&mut self, text: &str, fallback_id: Option<&str>) -> Result<(), CatalogError> {
        if !text.trim_start().starts_with('{') {
            let raw = lucid::parse_bundle(text)?;
            let id = fallback_id.ok_or(SchemaViolation::MissingKeyId)?;
            self.add_multi_access(MultiAccessKey::from_raw(KeyId::new(id), raw)?);
            return Ok(());
        }

        match classify(serde_json::from_str(text)?)? {
            Document::Bundle(data) => self.add_bundle(data),
            Document::Dichotomous(value) => {
                let raw = keybase::parse_key_value(value)?;
                self.add_dichotomous(DichotomousKey::from_raw(raw, fallback_id)?);
            }
            Document::MultiAccess(value) => {
                let raw: lucid::RawMultiAccessKey = serde_json::from_value(value)?;
                let id = fallback_id.ok_or(SchemaViolation::MissingKeyId)?;
                self.add_multi_access(MultiAccessKey::from_raw(KeyId::new(id), raw)?);
            }
        }
        Ok(())
    }

    fn add_bundle(&mut self, data: CatalogData) {
        if data.version != CATALOG_VERSION {
            tracing::warn!(
                "Catalog version mismatch (expected {}, found {})",
                CATALOG_VERSION,
                data.version
            );
        }

        for (id, value) in data.multi_access {
            let loaded = serde_json::from_value::<lucid::RawMultiAccessKey>(value)
                .map_err(CatalogError::from)
                .and_then(|raw| Ok(MultiAccessKey::from_raw(KeyId::new(id.as_str()), raw)?));
            match loaded {
                Ok(key) => self.add_multi_access(key),
                Err(e) => self.record(LoadIssue::Skipped {
                    source_name: format!("multi-access key {id}"),
                    reason: e.to_string(),
                }),
            }
        }

        for (id, value) in data.dichotomous {
            let loaded = keybase::parse_key_value(value)
                .map_err(CatalogError::from)
                .and_then(|raw| Ok(DichotomousKey::from_raw(raw, Some(&id))?));
            match loaded {
                Ok(key) => self.add_dichotomous(key),
                Err(e) => self.record(LoadIssue::Skipped {
                    source_name: format!("dichotomous key {id}"),
                    reason: e.to_string(),
                }),
            }
        }
    }

    fn record(&mut self, issue: LoadIssue) {
        tracing::warn!("{issue}");
        self.issues.push(issue);
    }

    fn log_loaded(&self, source: &str) {
        tracing::info!(
            "Loaded {} multi-access and {} dichotomous keys from {}",
            self.multi_access.len(),
            self.dichotomous.len(),
            source
        );
    }

    /// Add a multi-access key, replacing any key with the same ID
    pub fn add_multi_access(&mut self, key: MultiAccessKey) {
        if let Some(&index) = self.multi_index.get(&key.id) {
            tracing::warn!("Replacing multi-access key {}", key.id);
            self.multi_access[index] = key;
        } else {
            self.multi_index.insert(key.id.clone(), self.multi_access.len());
            self.multi_access.push(key);
        }
    }

    /// Add a dichotomous key, replacing any key with the same ID
    pub fn add_dichotomous(&mut self, key: DichotomousKey) {
        if let Some(&index) = self.dichotomous_index.get(&key.id) {
            tracing::warn!("Replacing dichotomous key {}", key.id);
            self.dichotomous[index] = key;
        } else {
            self.dichotomous_index
                .insert(key.id.clone(), self.dichotomous.len());
            self.dichotomous.push(key);
        }
    }

    /// Get a multi-access key by ID
    #[must_use]
    pub fn multi_access(&self, id: &KeyId) -> Option<&MultiAccessKey> {
        self.multi_index.get(id).map(|&idx| &self.multi_access[idx])
    }

    /// Get a dichotomous key by ID
    #[must_use]
    pub fn dichotomous(&self, id: &KeyId) -> Option<&DichotomousKey> {
        self.dichotomous_index
            .get(id)
            .map(|&idx| &self.dichotomous[idx])
    }

    #[must_use]
    pub fn multi_access_keys(&self) -> &[MultiAccessKey] {
        &self.multi_access
    }

    #[must_use]
    pub fn dichotomous_keys(&self) -> &[DichotomousKey] {
        &self.dichotomous
    }

    /// Multi-access keys sorted by title
    #[must_use]
    pub fn list_multi_keys(&self) -> Vec<MultiKeySummary> {
        let mut keys: Vec<_> = self.multi_access.iter().map(MultiAccessKey::summary).collect();
        keys.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id)));
        keys
    }

    /// Dichotomous keys with `start` first (when present), the rest sorted by title
    #[must_use]
    pub fn list_dichotomous_keys(&self, start: &KeyId) -> Vec<DichotomousKeySummary> {
        let mut keys: Vec<_> = self
            .dichotomous
            .iter()
            .map(DichotomousKey::summary)
            .collect();
        keys.sort_by(|a, b| {
            (&a.id != start)
                .cmp(&(&b.id != start))
                .then_with(|| a.title.cmp(&b.title))
                .then_with(|| a.id.cmp(&b.id))
        });
        keys
    }

    /// Entries and files skipped while loading
    #[must_use]
    pub fn issues(&self) -> &[LoadIssue] {
        &self.issues
    }

    /// Export catalog to JSON, with matrices in decoded form
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, CatalogError> {
        let mut multi_access = BTreeMap::new();
        for key in &self.multi_access {
            multi_access.insert(key.id.to_string(), serde_json::to_value(key.to_raw())?);
        }
        let mut dichotomous = BTreeMap::new();
        for key in &self.dichotomous {
            dichotomous.insert(key.id.to_string(), serde_json::to_value(key.to_raw())?);
        }

        let data = CatalogData {
            version: CATALOG_VERSION.to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            multi_access,
            dichotomous,
        };
        Ok(serde_json::to_string_pretty(&data)?)
    }

    /// Number of keys of both kinds
    #[must_use]
    pub fn len(&self) -> usize {
        self.multi_access.len() + self.dichotomous.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn read_text(path: &Path) -> Result<String, CatalogError> {
    let is_gzip = path.extension().is_some_and(|ext| ext == "gz");
    if is_gzip {
        let file = std::fs::File::open(path)?;
        let mut text = String::new();
        flate2::read::GzDecoder::new(file).read_to_string(&mut text)?;
        Ok(text)
    } else {
        Ok(std::fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MULTI_KEY: &str = r#"{"title": "Tiny", "features": [{"id": 1, "name": "Colour", "type": 1}],
        "states": [{"id": 10, "feature": 1, "name": "red"}, {"id": 11, "feature": 1, "name": "blue"}],
        "entities": [{"id": 1, "name": "Rubra"}, {"id": 2, "name": "Caerulea"}],
        "decompressedScores": {"1": [0], "2": [1]}}"#;

    const DICHOTOMOUS_KEY: &str = r#"{"keybase": {"key_title": "Genera", "first_step": {"root_node_id": 1},
        "leads": [{"lead_id": 2, "parent_id": 1, "lead_text": "Red", "item": 5}],
        "items": [{"item_id": 5, "item_name": "Rubra"}]}}"#;

    #[test]
    fn test_load_embedded_catalog() {
        let catalog = KeyCatalog::load_embedded().unwrap();
        assert!(!catalog.multi_access_keys().is_empty());
        assert!(catalog.dichotomous(&KeyId::new("1903")).is_some());
        assert!(catalog.issues().is_empty());
    }

    #[test]
    fn test_key_id_from_path() {
        assert_eq!(
            key_id_from_path(Path::new("/data/key-abc-complete.json")).as_deref(),
            Some("key-abc-complete")
        );
        assert_eq!(key_id_from_path(Path::new("1903.json.gz")).as_deref(), Some("1903"));
        assert_eq!(key_id_from_path(Path::new("player.js")).as_deref(), Some("player"));
        assert_eq!(key_id_from_path(Path::new("notes.txt")), None);
    }

    #[test]
    fn test_bundle_skips_bad_entries() {
        let json = format!(
            r#"{{"version": "1.0.0", "multi_access": {{"tiny": {MULTI_KEY}, "broken": {{"features": []}}}},
                "dichotomous": {{"7": {DICHOTOMOUS_KEY}, "8": {{"key_title": "no root"}}}}}}"#
        );
        let catalog = KeyCatalog::from_json(&json).unwrap();
        assert_eq!(catalog.len(), 2);
        assert!(catalog.multi_access(&KeyId::new("tiny")).is_some());
        assert_eq!(catalog.dichotomous(&KeyId::new("7")).unwrap().title, "Genera");
        assert_eq!(catalog.issues().len(), 2);
    }

    #[test]
    fn test_load_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("key-tiny.json"), MULTI_KEY).unwrap();
        std::fs::write(dir.path().join("42.json"), DICHOTOMOUS_KEY).unwrap();
        std::fs::write(dir.path().join("bad.json"), "{ not json").unwrap();
        std::fs::write(dir.path().join("README.md"), "ignored").unwrap();
        std::fs::write(
            dir.path().join("player.js"),
            format!("var key = {MULTI_KEY};"),
        )
        .unwrap();

        let gz = std::fs::File::create(dir.path().join("43.json.gz")).unwrap();
        let mut encoder = flate2::write::GzEncoder::new(gz, flate2::Compression::default());
        encoder.write_all(DICHOTOMOUS_KEY.as_bytes()).unwrap();
        encoder.finish().unwrap();

        let catalog = KeyCatalog::load(dir.path()).unwrap();
        assert!(catalog.multi_access(&KeyId::new("key-tiny")).is_some());
        assert!(catalog.multi_access(&KeyId::new("player")).is_some());
        assert!(catalog.dichotomous(&KeyId::new("42")).is_some());
        assert!(catalog.dichotomous(&KeyId::new("43")).is_some());
        assert_eq!(catalog.issues().len(), 1);
        assert!(catalog.issues()[0].to_string().contains("bad.json"));
    }

    #[test]
    fn test_unrecognized_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("other.json");
        std::fs::write(&path, r#"{"hello": "world"}"#).unwrap();
        assert!(matches!(
            KeyCatalog::load(&path),
            Err(CatalogError::UnrecognizedFormat(_))
        ));
    }

    #[test]
    fn test_listing_order() {
        let json = r#"{"version": "1.0.0", "dichotomous": {
            "1": {"key_title": "Zygophyllaceae", "first_step": {"root_node_id": 1}},
            "2": {"key_title": "Apiaceae", "first_step": {"root_node_id": 1}},
            "3": {"key_title": "Myrtaceae", "first_step": {"root_node_id": 1}}}}"#;
        let catalog = KeyCatalog::from_json(json).unwrap();
        let titles: Vec<_> = catalog
            .list_dichotomous_keys(&KeyId::new("3"))
            .into_iter()
            .map(|k| k.title)
            .collect();
        assert_eq!(titles, vec!["Myrtaceae", "Apiaceae", "Zygophyllaceae"]);
    }

    #[test]
    fn test_export_round_trip() {
        let catalog = KeyCatalog::load_embedded().unwrap();
        let json = catalog.to_json().unwrap();
        let data: CatalogData = serde_json::from_str(&json).unwrap();
        assert!(!data.generated_at.is_empty());

        let reloaded = KeyCatalog::from_json(&json).unwrap();
        assert_eq!(reloaded.len(), catalog.len());
        for key in catalog.multi_access_keys() {
            let other = reloaded.multi_access(&key.id).unwrap();
            assert_eq!(other.scores().scored_count(), key.scores().scored_count());
        }
    }
}
