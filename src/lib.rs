use anyhow::{Context, Result, anyhow};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;

pub mod backup;
pub mod catalog;
pub mod diff;
pub mod invoker;
pub mod logging;
pub mod pipeline;
pub mod providers;
pub mod settings;
pub mod snbt;
pub mod translator;

#[cfg(test)]
mod test_util;

pub use catalog::{Catalog, CatalogEntry, CatalogFile, CatalogStore};
pub use invoker::{InvokeOptions, InvokeReport};
pub use pipeline::{ApplyReport, ExtractReport, Phase, Workspace};
pub use providers::{Provider, ProviderKind, ProviderUsage};
pub use translator::{TranslateOptions, Translator};

#[derive(Debug, Clone)]
pub struct Config {
    pub directory: PathBuf,
    /// Run only this phase (1, 2 or 3); all three when absent.
    pub phase: Option<u8>,
    pub catalog_path: Option<String>,
    pub model: Option<String>,
    pub key: Option<String>,
    pub settings_path: Option<String>,
    pub show_diff: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub extract: Option<ExtractReport>,
    pub translate: Option<InvokeReport>,
    pub apply: Option<ApplyReport>,
    pub catalog_entries: usize,
    pub pending: usize,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(report) = &self.extract {
            writeln!(
                f,
                "extract: {} files, {} new entries, {} skipped",
                report.files, report.added, report.skipped
            )?;
        }
        if let Some(report) = &self.translate {
            writeln!(
                f,
                "translate: {} translated, {} failed",
                report.translated, report.failed
            )?;
        }
        if let Some(report) = &self.apply {
            writeln!(
                f,
                "apply: {} updated, {} unchanged, {} skipped",
                report.applied, report.unchanged, report.skipped
            )?;
        }
        write!(
            f,
            "catalog: {} entries, {} pending",
            self.catalog_entries, self.pending
        )
    }
}

pub async fn run(config: Config) -> Result<RunSummary> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let settings = settings::load_settings(settings_path)?;
    let phases = Phase::selected(config.phase)?;

    let catalog_path = config
        .catalog_path
        .clone()
        .unwrap_or_else(|| settings.catalog_path.clone());
    let store = CatalogFile::new(&catalog_path);
    let pattern = snbt::BlockPattern::new(&settings.block_key)?;
    let workspace = Workspace::new(&config.directory, &settings.extension, pattern, store)?
        .with_diff(config.show_diff);

    if phases == [Phase::Translate] && !workspace.store().exists() {
        return Err(anyhow!(
            "catalog {} not found; run phase 1 first",
            catalog_path
        ));
    }

    let mut catalog = workspace.store().load()?;

    // Credentials are checked before any file is touched. A translate-only
    // run with nothing pending never needs them.
    let nothing_pending = phases == [Phase::Translate] && catalog.pending_count() == 0;
    let translator = if phases.contains(&Phase::Translate) && !nothing_pending {
        let model = config.model.clone().or_else(|| settings.model.clone());
        let selection =
            providers::resolve_provider_selection(model.as_deref(), config.key.as_deref())?;
        let key = providers::resolve_key(selection.provider, config.key.as_deref())
            .with_context(|| "no API key found for selected provider")?;
        info!("using provider {}", selection.provider.as_str());
        let provider = providers::build_provider(
            selection.provider,
            key,
            selection.requested_model,
            settings.retry,
        );
        Some(Translator::new(
            provider,
            TranslateOptions::from_settings(&settings),
        )?)
    } else {
        None
    };

    let mut summary = RunSummary::default();
    for phase in phases {
        info!("starting {}", phase);
        match phase {
            Phase::Extract => {
                summary.extract = Some(workspace.extract(&mut catalog)?);
            }
            Phase::Translate => {
                let report = match translator.as_ref() {
                    Some(translator) => {
                        let options = InvokeOptions::from_settings(&settings);
                        workspace.translate(&mut catalog, translator, options).await?
                    }
                    None => {
                        info!("no pending entries; nothing to translate");
                        InvokeReport::default()
                    }
                };
                summary.translate = Some(report);
            }
            Phase::Apply => {
                summary.apply = Some(workspace.apply(&catalog)?);
            }
        }
    }

    summary.catalog_entries = catalog.len();
    summary.pending = catalog.pending_count();
    Ok(summary)
}
