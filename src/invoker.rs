use anyhow::Result;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::catalog::{Catalog, CatalogStore};
use crate::providers::Provider;
use crate::settings::Settings;
use crate::translator::Translator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvokeOptions {
    pub batch_size: usize,
    /// Pause after every backend call.
    pub pacing: Duration,
}

impl Default for InvokeOptions {
    fn default() -> Self {
        Self {
            batch_size: 10,
            pacing: Duration::from_secs(1),
        }
    }
}

impl InvokeOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            batch_size: settings.batch_size.max(1),
            pacing: settings.pacing,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvokeReport {
    pub pending: usize,
    pub translated: usize,
    pub failed: usize,
    pub batches: usize,
}

/// Translates every pending entry in catalog order, one request per entry.
///
/// A failed request leaves its entry pending for the next run. The whole
/// catalog is saved after each batch, so an interruption loses at most the
/// batch in flight. Only a failed save aborts the run.
pub async fn translate_pending<P, S>(
    catalog: &mut Catalog,
    translator: &Translator<P>,
    store: &S,
    options: InvokeOptions,
) -> Result<InvokeReport>
where
    P: Provider,
    S: CatalogStore,
{
    let pending = catalog.pending_indices();
    let mut report = InvokeReport {
        pending: pending.len(),
        ..InvokeReport::default()
    };
    if pending.is_empty() {
        info!("no pending entries; nothing to translate");
        return Ok(report);
    }
    info!("found {} pending entries", pending.len());

    let batch_size = options.batch_size.max(1);
    let total_batches = pending.len().div_ceil(batch_size);
    for (batch_no, batch) in pending.chunks(batch_size).enumerate() {
        info!("batch {}/{}", batch_no + 1, total_batches);
        for &idx in batch {
            let Some(source) = catalog.entry(idx).map(|entry| entry.source_text.clone()) else {
                continue;
            };
            info!("translating: {}", source);
            match translator.translate(&source).await {
                Ok(output) => {
                    info!("translated: {}", output.text);
                    catalog.set_translation(idx, output.text)?;
                    report.translated += 1;
                }
                Err(err) => {
                    warn!(
                        "translation failed for \"{}\": {:#}; it stays pending for the next run",
                        source, err
                    );
                    report.failed += 1;
                }
            }
            if !options.pacing.is_zero() {
                sleep(options.pacing).await;
            }
        }
        store.save(catalog)?;
        report.batches += 1;
        info!(
            "progress saved: {}/{} processed",
            report.translated + report.failed,
            report.pending
        );
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{ScriptedProvider, default_options};
    use anyhow::anyhow;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryStore {
        saves: Mutex<Vec<Catalog>>,
    }

    impl MemoryStore {
        fn saves(&self) -> Vec<Catalog> {
            self.saves.lock().expect("saves lock").clone()
        }
    }

    impl CatalogStore for MemoryStore {
        fn exists(&self) -> bool {
            !self.saves.lock().expect("saves lock").is_empty()
        }

        fn load(&self) -> Result<Catalog> {
            Ok(self.saves().pop().unwrap_or_default())
        }

        fn save(&self, catalog: &Catalog) -> Result<()> {
            self.saves.lock().expect("saves lock").push(catalog.clone());
            Ok(())
        }
    }

    struct FailingStore;

    impl CatalogStore for FailingStore {
        fn exists(&self) -> bool {
            false
        }

        fn load(&self) -> Result<Catalog> {
            Ok(Catalog::new())
        }

        fn save(&self, _catalog: &Catalog) -> Result<()> {
            Err(anyhow!("disk full"))
        }
    }

    fn options() -> InvokeOptions {
        InvokeOptions {
            batch_size: 10,
            pacing: Duration::ZERO,
        }
    }

    fn uppercase(input: &str) -> Result<String> {
        Ok(input.to_uppercase())
    }

    fn fail_on_marker(input: &str) -> Result<String> {
        if input.contains("FAIL") {
            Err(anyhow!("backend unavailable"))
        } else {
            Ok(input.to_lowercase())
        }
    }

    #[tokio::test]
    async fn nothing_pending_makes_no_calls() {
        let mut catalog = Catalog::new();
        catalog.merge("a.snbt", ["Done"]);
        catalog.set_translation(0, "済").expect("set");
        let provider = ScriptedProvider::new(uppercase);
        let translator = Translator::new(provider.clone(), default_options()).expect("translator");
        let store = MemoryStore::default();

        let report = translate_pending(&mut catalog, &translator, &store, options())
            .await
            .expect("invoke");
        assert_eq!(report, InvokeReport::default());
        assert!(provider.calls().is_empty());
        assert!(store.saves().is_empty());
    }

    #[tokio::test]
    async fn failure_leaves_only_that_entry_pending() {
        let mut catalog = Catalog::new();
        let texts = (0..10)
            .map(|n| if n == 4 { "FAIL 4".to_string() } else { format!("Line {}", n) })
            .collect::<Vec<_>>();
        catalog.merge("a.snbt", texts);
        let provider = ScriptedProvider::new(fail_on_marker);
        let translator = Translator::new(provider, default_options()).expect("translator");
        let store = MemoryStore::default();

        let report = translate_pending(&mut catalog, &translator, &store, options())
            .await
            .expect("invoke");
        assert_eq!(report.translated, 9);
        assert_eq!(report.failed, 1);
        assert_eq!(catalog.pending_indices(), vec![4]);
        assert_eq!(catalog.entries()[3].translated_text, "line 3");
        assert_eq!(catalog.entries()[5].translated_text, "line 5");
        assert_eq!(catalog.entries()[4].translated_text, "");
    }

    #[tokio::test]
    async fn saves_after_every_batch() {
        let mut catalog = Catalog::new();
        catalog.merge("a.snbt", (0..25).map(|n| format!("Line {}", n)));
        let provider = ScriptedProvider::new(uppercase);
        let translator = Translator::new(provider.clone(), default_options()).expect("translator");
        let store = MemoryStore::default();

        let report = translate_pending(&mut catalog, &translator, &store, options())
            .await
            .expect("invoke");
        assert_eq!(report.batches, 3);
        assert_eq!(report.translated, 25);
        assert_eq!(provider.calls().len(), 25);

        let saves = store.saves();
        assert_eq!(saves.len(), 3);
        assert_eq!(saves[0].translated_count(), 10);
        assert_eq!(saves[1].translated_count(), 20);
        assert_eq!(saves[2].translated_count(), 25);
    }

    #[tokio::test]
    async fn calls_follow_catalog_order() {
        let mut catalog = Catalog::new();
        catalog.merge("a.snbt", ["First", "Second"]);
        catalog.merge("b.snbt", ["Third"]);
        let provider = ScriptedProvider::new(uppercase);
        let translator = Translator::new(provider.clone(), default_options()).expect("translator");
        let store = MemoryStore::default();

        translate_pending(&mut catalog, &translator, &store, options())
            .await
            .expect("invoke");
        let sources = provider
            .calls()
            .into_iter()
            .map(|call| call.source)
            .collect::<Vec<_>>();
        assert_eq!(sources, vec!["First", "Second", "Third"]);
    }

    #[tokio::test]
    async fn save_failure_is_fatal() {
        let mut catalog = Catalog::new();
        catalog.merge("a.snbt", ["One"]);
        let provider = ScriptedProvider::new(uppercase);
        let translator = Translator::new(provider, default_options()).expect("translator");

        let result = translate_pending(&mut catalog, &translator, &FailingStore, options()).await;
        assert!(result.is_err());
    }
}
