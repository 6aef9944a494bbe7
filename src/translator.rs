use anyhow::{Context, Result, anyhow};
use tera::{Context as TeraContext, Tera};

use crate::providers::{Provider, ProviderUsage, Sampling};
use crate::settings::Settings;

const SYSTEM_PROMPT_TEMPLATE: &str = include_str!("prompts/system_prompt.tera");
const USER_PROMPT_TEMPLATE: &str = include_str!("prompts/user_prompt.tera");

#[derive(Debug, Clone, PartialEq)]
pub struct TranslateOptions {
    pub source_lang: String,
    pub target_lang: String,
    pub sampling: Sampling,
    pub reject_phrases: Vec<String>,
}

impl TranslateOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            source_lang: settings.source_lang.clone(),
            target_lang: settings.target_lang.clone(),
            sampling: Sampling {
                temperature: settings.temperature,
                max_tokens: settings.max_tokens,
            },
            reject_phrases: settings.reject_phrases.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TranslationOutput {
    pub text: String,
    pub model: Option<String>,
    pub usage: Option<ProviderUsage>,
}

/// Sends one source string per request through a configured provider.
#[derive(Debug, Clone)]
pub struct Translator<P: Provider> {
    provider: P,
    options: TranslateOptions,
    system_prompt: String,
}

impl<P: Provider> Translator<P> {
    pub fn new(provider: P, options: TranslateOptions) -> Result<Self> {
        let system_prompt = render_system_prompt(&options)?;
        Ok(Self {
            provider,
            options,
            system_prompt,
        })
    }

    pub async fn translate(&self, text: &str) -> Result<TranslationOutput> {
        let user_prompt = render_user_prompt(&self.options, text)?;
        let response = self
            .provider
            .clone()
            .with_sampling(self.options.sampling)
            .append_system_input(self.system_prompt.clone())
            .append_user_input(user_prompt)
            .complete()
            .await?;
        let translated = validate_response(text, &response.text, &self.options.reject_phrases)?;
        Ok(TranslationOutput {
            text: translated,
            model: response.model,
            usage: response.usage,
        })
    }
}

pub fn render_system_prompt(options: &TranslateOptions) -> Result<String> {
    let mut context = TeraContext::new();
    context.insert("source_lang", options.source_lang.as_str());
    context.insert("target_lang", options.target_lang.as_str());
    let rendered = Tera::one_off(SYSTEM_PROMPT_TEMPLATE, &context, false)
        .with_context(|| "failed to render system prompt")?;
    Ok(rendered.trim().to_string())
}

pub fn render_user_prompt(options: &TranslateOptions, text: &str) -> Result<String> {
    let mut context = TeraContext::new();
    context.insert("source_lang", options.source_lang.as_str());
    context.insert("target_lang", options.target_lang.as_str());
    context.insert("text", text);
    let rendered = Tera::one_off(USER_PROMPT_TEMPLATE, &context, false)
        .with_context(|| "failed to render user prompt")?;
    Ok(rendered.trim().to_string())
}

/// Trims the raw response and rejects empty output or assistant chatter. A
/// reject phrase that already occurs in the source text is allowed.
fn validate_response(source: &str, raw: &str, reject_phrases: &[String]) -> Result<String> {
    let translated = raw.trim();
    if translated.is_empty() {
        return Err(anyhow!("backend returned an empty translation"));
    }
    if let Some(phrase) = reject_phrases
        .iter()
        .find(|phrase| translated.contains(phrase.as_str()) && !source.contains(phrase.as_str()))
    {
        return Err(anyhow!("translation rejected: response contains \"{}\"", phrase));
    }
    Ok(translated.to_string())
}
