use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::snbt::Substitution;

pub const DEFAULT_CATALOG_PATH: &str = "all.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// File name (not path) the text was first seen in.
    #[serde(rename = "file")]
    pub source_file: String,
    #[serde(rename = "en")]
    pub source_text: String,
    /// Empty while the entry is pending.
    #[serde(rename = "ja", default)]
    pub translated_text: String,
}

impl CatalogEntry {
    pub fn new(source_file: impl Into<String>, source_text: impl Into<String>) -> Self {
        Self {
            source_file: source_file.into(),
            source_text: source_text.into(),
            translated_text: String::new(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.translated_text.is_empty() && !self.source_text.is_empty()
    }
}

/// Ordered translation catalog, unique by source text.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
    index: HashMap<String, usize>,
}

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    #[serde(default)]
    descriptions: Vec<CatalogEntry>,
}

#[derive(Debug, Serialize)]
struct CatalogDocumentRef<'a> {
    descriptions: &'a [CatalogEntry],
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a catalog from stored entries. Later entries repeating an
    /// earlier source text are kept in place but never become the lookup
    /// target for that text.
    pub fn from_entries(entries: Vec<CatalogEntry>) -> Self {
        let mut index = HashMap::with_capacity(entries.len());
        for (idx, entry) in entries.iter().enumerate() {
            if index.contains_key(&entry.source_text) {
                warn!(
                    "catalog contains a duplicate entry for \"{}\"; the first one wins",
                    entry.source_text
                );
                continue;
            }
            index.insert(entry.source_text.clone(), idx);
        }
        Self { entries, index }
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let document: CatalogDocument =
            serde_json::from_str(content).with_context(|| "failed to parse catalog JSON")?;
        Ok(Self::from_entries(document.descriptions))
    }

    pub fn to_json(&self) -> Result<String> {
        let document = CatalogDocumentRef {
            descriptions: &self.entries,
        };
        serde_json::to_string_pretty(&document).with_context(|| "failed to serialize catalog")
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn entry(&self, idx: usize) -> Option<&CatalogEntry> {
        self.entries.get(idx)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, source_text: &str) -> bool {
        self.index.contains_key(source_text)
    }

    pub fn get(&self, source_text: &str) -> Option<&CatalogEntry> {
        self.index
            .get(source_text)
            .and_then(|idx| self.entries.get(*idx))
    }

    /// Appends texts not yet present anywhere in the catalog, tagged with
    /// `file`. Returns how many entries were added.
    pub fn merge<I, S>(&mut self, file: &str, texts: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut added = 0usize;
        for text in texts {
            let text = text.into();
            if text.is_empty() || self.index.contains_key(&text) {
                continue;
            }
            self.index.insert(text.clone(), self.entries.len());
            self.entries.push(CatalogEntry::new(file, text));
            added += 1;
        }
        added
    }

    /// Indices of pending entries, in catalog order.
    pub fn pending_indices(&self) -> Vec<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.is_pending())
            .map(|(idx, _)| idx)
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.is_pending()).count()
    }

    pub fn translated_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| !entry.translated_text.is_empty())
            .count()
    }

    pub fn set_translation(&mut self, idx: usize, translation: impl Into<String>) -> Result<()> {
        let entry = self
            .entries
            .get_mut(idx)
            .ok_or_else(|| anyhow!("catalog index {} out of range", idx))?;
        entry.translated_text = translation.into();
        Ok(())
    }

    /// Translated pairs recorded for `file`, in catalog order.
    pub fn translations_for(&self, file: &str) -> Vec<Substitution<'_>> {
        self.entries
            .iter()
            .filter(|entry| entry.source_file == file && !entry.translated_text.is_empty())
            .map(|entry| Substitution {
                source: &entry.source_text,
                translation: &entry.translated_text,
            })
            .collect()
    }
}

/// Where the catalog lives between runs.
pub trait CatalogStore {
    fn exists(&self) -> bool;
    fn load(&self) -> Result<Catalog>;
    fn save(&self, catalog: &Catalog) -> Result<()>;
}

/// JSON catalog on disk: `{"descriptions": [{"file", "en", "ja"}, ...]}`.
#[derive(Debug, Clone)]
pub struct CatalogFile {
    path: PathBuf,
}

impl CatalogFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CatalogStore for CatalogFile {
    fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// An absent file loads as an empty catalog.
    fn load(&self) -> Result<Catalog> {
        if !self.path.exists() {
            debug!("catalog {} not found; starting empty", self.path.display());
            return Ok(Catalog::new());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read catalog: {}", self.path.display()))?;
        Catalog::from_json(&content)
            .with_context(|| format!("invalid catalog: {}", self.path.display()))
    }

    /// Rewrites the whole file through a temp file in the same directory so
    /// an interrupted save leaves the previous catalog intact.
    fn save(&self, catalog: &Catalog) -> Result<()> {
        let content = catalog.to_json()?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create catalog dir: {}", dir.display()))?;
        let mut file = tempfile::Builder::new()
            .prefix(".catalog-")
            .suffix(".json")
            .tempfile_in(&dir)
            .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
        file.write_all(content.as_bytes())
            .with_context(|| "failed to write catalog temp file")?;
        file.persist(&self.path)
            .map_err(|err| err.error)
            .with_context(|| format!("failed to write catalog: {}", self.path.display()))?;
        debug!(
            "saved {} catalog entries to {}",
            catalog.len(),
            self.path.display()
        );
        Ok(())
    }
}
