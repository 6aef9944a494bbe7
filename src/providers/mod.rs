use anyhow::{Result, anyhow};
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;

mod claude;
mod openai;
mod retry;

pub use claude::Claude;
pub use openai::OpenAI;
pub use retry::RetryPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Claude,
    OpenAI,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Claude => "claude",
            ProviderKind::OpenAI => "openai",
        }
    }

    pub fn key_env(&self) -> &'static str {
        match self {
            ProviderKind::Claude => "ANTHROPIC_API_KEY",
            ProviderKind::OpenAI => "OPENAI_API_KEY",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSelection {
    pub provider: ProviderKind,
    pub requested_model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderUsage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderResponse {
    pub text: String,
    pub model: Option<String>,
    pub usage: Option<ProviderUsage>,
}

/// Decoding parameters sent with every request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sampling {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for Sampling {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    System,
    User,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: String) -> Self {
        Self {
            role: MessageRole::System,
            content,
        }
    }

    pub fn user(content: String) -> Self {
        Self {
            role: MessageRole::User,
            content,
        }
    }
}

pub(crate) fn system_text(messages: &[Message]) -> String {
    messages
        .iter()
        .filter(|message| message.role == MessageRole::System)
        .map(|message| message.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub type ProviderFuture = Pin<Box<dyn Future<Output = Result<ProviderResponse>> + Send>>;

/// A text-in, text-out completion backend. Builders consume `self` so a
/// configured base provider can be cloned per request.
pub trait Provider: Clone + Send + Sync {
    fn append_system_input(self, input: String) -> Self;
    fn append_user_input(self, input: String) -> Self;
    fn with_sampling(self, sampling: Sampling) -> Self;
    fn complete(self) -> ProviderFuture;
}

#[derive(Debug, Clone)]
pub enum ProviderImpl {
    Claude(Claude),
    OpenAI(OpenAI),
}

impl Provider for ProviderImpl {
    fn append_system_input(self, input: String) -> Self {
        match self {
            ProviderImpl::Claude(provider) => {
                ProviderImpl::Claude(provider.append_system_input(input))
            }
            ProviderImpl::OpenAI(provider) => {
                ProviderImpl::OpenAI(provider.append_system_input(input))
            }
        }
    }

    fn append_user_input(self, input: String) -> Self {
        match self {
            ProviderImpl::Claude(provider) => {
                ProviderImpl::Claude(provider.append_user_input(input))
            }
            ProviderImpl::OpenAI(provider) => {
                ProviderImpl::OpenAI(provider.append_user_input(input))
            }
        }
    }

    fn with_sampling(self, sampling: Sampling) -> Self {
        match self {
            ProviderImpl::Claude(provider) => {
                ProviderImpl::Claude(provider.with_sampling(sampling))
            }
            ProviderImpl::OpenAI(provider) => {
                ProviderImpl::OpenAI(provider.with_sampling(sampling))
            }
        }
    }

    fn complete(self) -> ProviderFuture {
        match self {
            ProviderImpl::Claude(provider) => provider.complete(),
            ProviderImpl::OpenAI(provider) => provider.complete(),
        }
    }
}

pub fn build_provider(
    provider: ProviderKind,
    key: String,
    model: Option<String>,
    retry: RetryPolicy,
) -> ProviderImpl {
    match provider {
        ProviderKind::Claude => {
            let mut claude = Claude::new(key).with_retry(retry);
            if let Some(model) = model {
                claude = claude.with_model(model);
            }
            ProviderImpl::Claude(claude)
        }
        ProviderKind::OpenAI => {
            let mut openai = OpenAI::new(key).with_retry(retry);
            if let Some(model) = model {
                openai = openai.with_model(model);
            }
            ProviderImpl::OpenAI(openai)
        }
    }
}

pub fn resolve_provider_selection(
    model_arg: Option<&str>,
    override_key: Option<&str>,
) -> Result<ProviderSelection> {
    match model_arg {
        Some(model) => parse_model_arg(model),
        None => default_provider_selection(override_key),
    }
}

pub fn resolve_key(provider: ProviderKind, override_key: Option<&str>) -> Result<String> {
    if let Some(key) = override_key
        && !key.trim().is_empty()
    {
        return Ok(key.trim().to_string());
    }
    get_env(provider.key_env())
        .ok_or_else(|| anyhow!("{} is not set", provider.key_env()))
}

fn default_provider_selection(override_key: Option<&str>) -> Result<ProviderSelection> {
    for provider in [ProviderKind::Claude, ProviderKind::OpenAI] {
        if get_env(provider.key_env()).is_some() {
            return Ok(ProviderSelection {
                provider,
                requested_model: None,
            });
        }
    }

    if override_key.is_some() {
        return Ok(ProviderSelection {
            provider: ProviderKind::Claude,
            requested_model: None,
        });
    }

    Err(anyhow!(
        "no API keys found (checked ANTHROPIC_API_KEY, OPENAI_API_KEY)"
    ))
}

fn parse_model_arg(model_arg: &str) -> Result<ProviderSelection> {
    let raw = model_arg.trim();
    if raw.is_empty() {
        return Err(anyhow!("model argument is empty"));
    }

    if let Some(provider) = provider_from_name(&raw.to_lowercase()) {
        return Ok(ProviderSelection {
            provider,
            requested_model: None,
        });
    }

    if let Some((provider, model)) = parse_provider_model_pair(raw) {
        return Ok(ProviderSelection {
            provider,
            requested_model: model,
        });
    }

    if let Some(provider) = provider_from_model_name(&raw.to_lowercase()) {
        return Ok(ProviderSelection {
            provider,
            requested_model: Some(raw.to_string()),
        });
    }

    Err(anyhow!(
        "unable to infer provider from model '{}'. Use provider:model (claude:, openai:)",
        raw
    ))
}

fn parse_provider_model_pair(input: &str) -> Option<(ProviderKind, Option<String>)> {
    let (provider_part, model_part) = input.split_once(':')?;
    let provider = provider_from_name(&provider_part.trim().to_lowercase())?;
    let model = Some(model_part.trim().to_string()).filter(|model| !model.is_empty());
    Some((provider, model))
}

fn provider_from_name(name: &str) -> Option<ProviderKind> {
    match name {
        "claude" | "anthropic" => Some(ProviderKind::Claude),
        "openai" => Some(ProviderKind::OpenAI),
        _ => None,
    }
}

fn provider_from_model_name(model: &str) -> Option<ProviderKind> {
    if model.starts_with("claude-") {
        Some(ProviderKind::Claude)
    } else if model.starts_with("gpt-")
        || ["o1", "o3", "o4"]
            .iter()
            .any(|prefix| model.starts_with(prefix))
    {
        Some(ProviderKind::OpenAI)
    } else {
        None
    }
}

fn get_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}
