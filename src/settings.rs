use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::catalog::DEFAULT_CATALOG_PATH;
use crate::providers::RetryPolicy;
use crate::snbt::DEFAULT_BLOCK_KEY;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");
const SETTINGS_DIR_NAME: &str = ".snbt-translator";

const DEFAULT_REJECT_PHRASES: &[&str] = &[
    "Human:",
    "申し訳ありませんが",
    "以下のように翻訳",
    "翻訳は以下の通り",
    "翻訳結果は以下",
    "はい、",
    "わかりました",
    "理解しました",
    "著作権で保護された",
    "著作権保護の対象",
    "著作権の関係",
];

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub extension: String,
    pub block_key: String,
    pub catalog_path: String,
    pub model: Option<String>,
    pub batch_size: usize,
    pub pacing: Duration,
    pub max_tokens: u32,
    pub temperature: f32,
    pub source_lang: String,
    pub target_lang: String,
    pub reject_phrases: Vec<String>,
    pub retry: RetryPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            extension: "snbt".to_string(),
            block_key: DEFAULT_BLOCK_KEY.to_string(),
            catalog_path: DEFAULT_CATALOG_PATH.to_string(),
            model: None,
            batch_size: 10,
            pacing: Duration::from_secs(1),
            max_tokens: 1000,
            temperature: 0.0,
            source_lang: "English".to_string(),
            target_lang: "Japanese".to_string(),
            reject_phrases: DEFAULT_REJECT_PHRASES
                .iter()
                .map(|phrase| phrase.to_string())
                .collect(),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    source: Option<SourceSettings>,
    catalog: Option<CatalogSettings>,
    translation: Option<TranslationSettings>,
    retry: Option<RetrySettings>,
}

#[derive(Debug, Default, Deserialize)]
struct SourceSettings {
    extension: Option<String>,
    block_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogSettings {
    path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TranslationSettings {
    model: Option<String>,
    batch_size: Option<usize>,
    pacing_ms: Option<u64>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    source_lang: Option<String>,
    target_lang: Option<String>,
    reject_phrases: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct RetrySettings {
    max_attempts: Option<usize>,
    base_delay_ms: Option<u64>,
    max_delay_ms: Option<u64>,
}

/// Defaults, then `./settings.toml`, `./settings.local.toml`,
/// `~/.snbt-translator/settings.toml` and finally `extra_path`. Later files
/// override individual keys of earlier ones.
pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = parse_settings(DEFAULT_SETTINGS_TOML)
        .with_context(|| "failed to parse built-in settings")?;

    let mut ordered_paths = vec![
        PathBuf::from("settings.toml"),
        PathBuf::from("settings.local.toml"),
    ];
    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
    }
    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.is_file() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            settings
                .merge_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
        }
    }

    Ok(settings)
}

/// Settings from a single TOML document applied over the defaults.
pub fn parse_settings(content: &str) -> Result<Settings> {
    let mut settings = Settings::default();
    settings.merge_str(content)?;
    Ok(settings)
}

impl Settings {
    fn merge_str(&mut self, content: &str) -> Result<()> {
        let parsed: SettingsFile = toml::from_str(content)?;
        self.merge(parsed);
        Ok(())
    }

    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(source) = incoming.source {
            if let Some(extension) = non_empty(source.extension) {
                self.extension = extension.trim_start_matches('.').to_string();
            }
            if let Some(key) = non_empty(source.block_key) {
                self.block_key = key;
            }
        }
        if let Some(catalog) = incoming.catalog
            && let Some(path) = non_empty(catalog.path)
        {
            self.catalog_path = path;
        }
        if let Some(translation) = incoming.translation {
            if let Some(model) = non_empty(translation.model) {
                self.model = Some(model);
            }
            if let Some(size) = translation.batch_size
                && size > 0
            {
                self.batch_size = size;
            }
            if let Some(ms) = translation.pacing_ms {
                self.pacing = Duration::from_millis(ms);
            }
            if let Some(tokens) = translation.max_tokens
                && tokens > 0
            {
                self.max_tokens = tokens;
            }
            if let Some(temperature) = translation.temperature
                && temperature >= 0.0
            {
                self.temperature = temperature;
            }
            if let Some(lang) = non_empty(translation.source_lang) {
                self.source_lang = lang;
            }
            if let Some(lang) = non_empty(translation.target_lang) {
                self.target_lang = lang;
            }
            if let Some(phrases) = translation.reject_phrases {
                self.reject_phrases = phrases
                    .into_iter()
                    .filter(|phrase| !phrase.trim().is_empty())
                    .collect();
            }
        }
        if let Some(retry) = incoming.retry {
            if let Some(attempts) = retry.max_attempts
                && attempts > 0
            {
                self.retry.max_attempts = attempts;
            }
            if let Some(ms) = retry.base_delay_ms {
                self.retry.base_delay = Duration::from_millis(ms);
            }
            if let Some(ms) = retry.max_delay_ms {
                self.retry.max_delay = Duration::from_millis(ms);
            }
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(SETTINGS_DIR_NAME))
        }
    })
}
