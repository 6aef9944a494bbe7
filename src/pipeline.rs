use anyhow::{Context, Result, anyhow};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::backup::{self, BackupStatus};
use crate::catalog::{Catalog, CatalogStore};
use crate::diff;
use crate::invoker::{self, InvokeOptions, InvokeReport};
use crate::providers::Provider;
use crate::snbt::{self, BlockPattern};
use crate::translator::Translator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Extract,
    Translate,
    Apply,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Extract, Phase::Translate, Phase::Apply];

    pub fn from_number(number: u8) -> Result<Self> {
        match number {
            1 => Ok(Phase::Extract),
            2 => Ok(Phase::Translate),
            3 => Ok(Phase::Apply),
            _ => Err(anyhow!("phase must be 1, 2 or 3 (got {})", number)),
        }
    }

    /// The phases to run: the given one, or all of them in order.
    pub fn selected(number: Option<u8>) -> Result<Vec<Phase>> {
        match number {
            Some(number) => Ok(vec![Phase::from_number(number)?]),
            None => Ok(Phase::ALL.to_vec()),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Phase::Extract => "phase 1 (extract)",
            Phase::Translate => "phase 2 (translate)",
            Phase::Apply => "phase 3 (apply)",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractReport {
    pub files: usize,
    pub skipped: usize,
    pub added: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub files: usize,
    pub applied: usize,
    pub unchanged: usize,
    pub skipped: usize,
}

/// Source files of one target directory plus the catalog store they feed.
#[derive(Debug, Clone)]
pub struct Workspace<S: CatalogStore> {
    dir: PathBuf,
    extension: String,
    pattern: BlockPattern,
    store: S,
    show_diff: bool,
}

impl<S: CatalogStore> Workspace<S> {
    pub fn new(
        dir: impl Into<PathBuf>,
        extension: &str,
        pattern: BlockPattern,
        store: S,
    ) -> Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(anyhow!("{} is not a directory", dir.display()));
        }
        Ok(Self {
            dir,
            extension: extension.trim_start_matches('.').to_string(),
            pattern,
            store,
            show_diff: true,
        })
    }

    pub fn with_diff(mut self, show_diff: bool) -> Self {
        self.show_diff = show_diff;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Files directly inside the directory with the source extension,
    /// sorted by name. Symlinks are followed. Backups never match since they
    /// end in `.bak`.
    pub fn source_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name()
        {
            let entry = entry
                .with_context(|| format!("failed to list directory: {}", self.dir.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some(self.extension.as_str()) {
                files.push(path.to_path_buf());
            }
        }
        Ok(files)
    }

    /// Phase 1: back up, extract and merge every source file, then save the
    /// catalog once.
    pub fn extract(&self, catalog: &mut Catalog) -> Result<ExtractReport> {
        let mut report = ExtractReport::default();
        for path in self.source_files()? {
            report.files += 1;
            let name = file_name(&path);
            info!("processing {}", name);
            match self.extract_file(&path, &name, catalog) {
                Ok(added) => {
                    if added > 0 {
                        info!("{}: {} new entries", name, added);
                    }
                    report.added += added;
                }
                Err(err) => {
                    warn!("skipping {}: {:#}", name, err);
                    report.skipped += 1;
                }
            }
        }
        self.store.save(catalog)?;
        report.total = catalog.len();
        info!(
            "extraction finished: {} new entries, {} in catalog",
            report.added, report.total
        );
        Ok(report)
    }

    fn extract_file(&self, path: &Path, name: &str, catalog: &mut Catalog) -> Result<usize> {
        if let Err(err) = backup::ensure_backup(path) {
            warn!("backup failed for {}: {:#}", name, err);
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let texts = snbt::extract_entries(&self.pattern, &content);
        Ok(catalog.merge(name, texts))
    }

    /// Phase 2: translate every pending entry, saving after each batch.
    pub async fn translate<P: Provider>(
        &self,
        catalog: &mut Catalog,
        translator: &Translator<P>,
        options: InvokeOptions,
    ) -> Result<InvokeReport> {
        let report = invoker::translate_pending(catalog, translator, &self.store, options).await?;
        if report.pending > 0 {
            info!(
                "translation finished: {} translated, {} still pending",
                report.translated, report.failed
            );
        }
        Ok(report)
    }

    /// Phase 3: rewrite each source file from its backup using the
    /// translations recorded for that file name.
    pub fn apply(&self, catalog: &Catalog) -> Result<ApplyReport> {
        info!(
            "{}/{} catalog entries translated",
            catalog.translated_count(),
            catalog.len()
        );
        let mut report = ApplyReport::default();
        for path in self.source_files()? {
            report.files += 1;
            let name = file_name(&path);
            match self.apply_file(&path, &name, catalog) {
                Ok(true) => report.applied += 1,
                Ok(false) => report.unchanged += 1,
                Err(err) => {
                    warn!("skipping {}: {:#}", name, err);
                    report.skipped += 1;
                }
            }
        }
        info!(
            "apply finished: {} updated, {} unchanged, {} skipped",
            report.applied, report.unchanged, report.skipped
        );
        Ok(report)
    }

    fn apply_file(&self, path: &Path, name: &str, catalog: &Catalog) -> Result<bool> {
        if backup::ensure_backup(path)? == BackupStatus::Created {
            warn!(
                "{} had no backup; the new backup is a copy of the current file",
                name
            );
        }
        let backup_path = backup::backup_path(path);
        let original = fs::read_to_string(&backup_path)
            .with_context(|| format!("failed to read {}", backup_path.display()))?;

        let pairs = catalog.translations_for(name);
        if pairs.is_empty() {
            info!("no translations recorded for {}", name);
            return Ok(false);
        }

        let outcome = snbt::substitute_blocks(&self.pattern, &original, &pairs);
        if self.show_diff {
            diff::print_change_summary(&original, &outcome.content, name);
        }
        if !outcome.changed(&original) {
            return Ok(false);
        }

        let current = fs::read_to_string(path).ok();
        if current.as_deref() == Some(outcome.content.as_str()) {
            info!("{} is already up to date", name);
            return Ok(false);
        }
        fs::write(path, &outcome.content)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!("applied {} replacements to {}", outcome.replaced, name);
        Ok(true)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
