use std::fs;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use snbt_translator::providers::{Provider, ProviderFuture, ProviderResponse, Sampling};
use snbt_translator::settings::Settings;
use snbt_translator::snbt::BlockPattern;
use snbt_translator::{
    CatalogFile, CatalogStore, InvokeOptions, TranslateOptions, Translator, Workspace,
};

/// Upper-cases the text after the prompt header and counts requests.
#[derive(Debug, Clone, Default)]
struct UppercaseProvider {
    user: Vec<String>,
    requests: Arc<Mutex<usize>>,
}

impl UppercaseProvider {
    fn requests(&self) -> usize {
        *self.requests.lock().unwrap()
    }
}

impl Provider for UppercaseProvider {
    fn append_system_input(self, _input: String) -> Self {
        self
    }

    fn append_user_input(mut self, input: String) -> Self {
        self.user.push(input);
        self
    }

    fn with_sampling(self, _sampling: Sampling) -> Self {
        self
    }

    fn complete(self) -> ProviderFuture {
        *self.requests.lock().unwrap() += 1;
        let prompt = self.user.join("\n\n");
        let text = prompt
            .split_once("\n\n")
            .map(|(_, text)| text.to_uppercase())
            .unwrap_or_default();
        Box::pin(async move {
            Ok(ProviderResponse {
                text,
                model: None,
                usage: None,
            })
        })
    }
}

fn no_pacing() -> InvokeOptions {
    InvokeOptions {
        batch_size: 10,
        pacing: Duration::ZERO,
    }
}

#[tokio::test]
async fn three_phases_rewrite_quest_file() {
    let dir = tempfile::tempdir().unwrap();
    let quests = dir.path().join("quests");
    fs::create_dir_all(&quests).unwrap();
    let original = "{\n\tid: \"0001\"\n\tdescription: [\"Welcome\", \"Goodbye\"]\n}\n";
    fs::write(quests.join("a.snbt"), original).unwrap();

    let catalog_path = dir.path().join("all.json");
    let store = CatalogFile::new(&catalog_path);
    let pattern = BlockPattern::new("description").unwrap();
    let workspace = Workspace::new(&quests, "snbt", pattern, store)
        .unwrap()
        .with_diff(false);

    let mut catalog = workspace.store().load().unwrap();
    let extracted = workspace.extract(&mut catalog).unwrap();
    assert_eq!(extracted.added, 2);
    let texts = catalog
        .entries()
        .iter()
        .map(|entry| (entry.source_file.as_str(), entry.source_text.as_str()))
        .collect::<Vec<_>>();
    assert_eq!(texts, vec![("a.snbt", "Welcome"), ("a.snbt", "Goodbye")]);

    let provider = UppercaseProvider::default();
    let options = TranslateOptions::from_settings(&Settings::default());
    let translator = Translator::new(provider.clone(), options).unwrap();
    let report = workspace
        .translate(&mut catalog, &translator, no_pacing())
        .await
        .unwrap();
    assert_eq!(report.translated, 2);
    assert_eq!(provider.requests(), 2);

    let stored: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&catalog_path).unwrap()).unwrap();
    assert_eq!(
        stored,
        serde_json::json!({
            "descriptions": [
                {"file": "a.snbt", "en": "Welcome", "ja": "WELCOME"},
                {"file": "a.snbt", "en": "Goodbye", "ja": "GOODBYE"}
            ]
        })
    );

    let applied = workspace.apply(&catalog).unwrap();
    assert_eq!(applied.applied, 1);
    assert_eq!(
        fs::read_to_string(quests.join("a.snbt")).unwrap(),
        "{\n\tid: \"0001\"\n\tdescription: [\"WELCOME\", \"GOODBYE\"]\n}\n"
    );
    assert_eq!(fs::read_to_string(quests.join("a.snbt.bak")).unwrap(), original);

    // A second translate run has nothing left to send.
    let mut reloaded = workspace.store().load().unwrap();
    assert_eq!(reloaded.pending_count(), 0);
    let second = workspace
        .translate(&mut reloaded, &translator, no_pacing())
        .await
        .unwrap();
    assert_eq!(second.pending, 0);
    assert_eq!(provider.requests(), 2);
}

#[tokio::test]
async fn rerun_extraction_keeps_catalog_stable() {
    let dir = tempfile::tempdir().unwrap();
    let quests = dir.path().join("quests");
    fs::create_dir_all(&quests).unwrap();
    fs::write(
        quests.join("chapter.snbt"),
        "description: [\n\t\"&aFirst line\"\n\t\"\"\n\t\"Second line\"\n]\n",
    )
    .unwrap();

    let store = CatalogFile::new(dir.path().join("all.json"));
    let pattern = BlockPattern::new("description").unwrap();
    let workspace = Workspace::new(&quests, "snbt", pattern, store)
        .unwrap()
        .with_diff(false);

    let mut catalog = workspace.store().load().unwrap();
    workspace.extract(&mut catalog).unwrap();
    let first = fs::read_to_string(dir.path().join("all.json")).unwrap();

    let mut again = workspace.store().load().unwrap();
    let report = workspace.extract(&mut again).unwrap();
    assert_eq!(report.added, 0);
    assert_eq!(report.total, 2);
    assert_eq!(fs::read_to_string(dir.path().join("all.json")).unwrap(), first);
}
