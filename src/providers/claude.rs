use anyhow::{Result, anyhow};
use serde::Deserialize;
use serde_json::json;

use super::retry::{RetryPolicy, is_rate_limited, retry_after};
use super::{
    Message, MessageRole, Provider, ProviderFuture, ProviderResponse, ProviderUsage, Sampling,
    system_text,
};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
pub(crate) const DEFAULT_MODEL: &str = "claude-3-5-haiku-20241022";

#[derive(Debug, Clone)]
pub struct Claude {
    key: String,
    model: String,
    messages: Vec<Message>,
    sampling: Sampling,
    retry: RetryPolicy,
    client: reqwest::Client,
}

impl Claude {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            model: DEFAULT_MODEL.to_string(),
            messages: Vec::new(),
            sampling: Sampling::default(),
            retry: RetryPolicy::default(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        if !model.trim().is_empty() {
            self.model = model;
        }
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn request_body(&self) -> serde_json::Value {
        let system = system_text(&self.messages);
        let messages = self
            .messages
            .iter()
            .filter(|message| message.role == MessageRole::User)
            .map(|message| json!({"role": "user", "content": message.content}))
            .collect::<Vec<_>>();

        let mut body = json!({
            "model": self.model,
            "max_tokens": self.sampling.max_tokens,
            "temperature": self.sampling.temperature,
            "messages": messages,
        });
        if !system.trim().is_empty() {
            body["system"] = json!(system);
        }
        body
    }
}

impl Provider for Claude {
    fn append_system_input(mut self, input: String) -> Self {
        self.messages.push(Message::system(input));
        self
    }

    fn append_user_input(mut self, input: String) -> Self {
        self.messages.push(Message::user(input));
        self
    }

    fn with_sampling(mut self, sampling: Sampling) -> Self {
        self.sampling = sampling;
        self
    }

    fn complete(self) -> ProviderFuture {
        Box::pin(async move {
            let url = base_url();
            let body = self.request_body();

            let mut attempt = 0usize;
            let mut delay = self.retry.base_delay;
            loop {
                attempt += 1;
                let response = self
                    .client
                    .post(&url)
                    .header("x-api-key", self.key.as_str())
                    .header("anthropic-version", API_VERSION)
                    .json(&body)
                    .send()
                    .await?;

                let status = response.status();
                let retry_after = retry_after(response.headers());
                let text = response.text().await.unwrap_or_default();
                if status.is_success() {
                    return extract_text_response(&text, &self.model);
                }
                if is_rate_limited(status, &text) && self.retry.should_retry(attempt) {
                    delay = self
                        .retry
                        .wait_with_backoff("Claude", attempt, delay, retry_after)
                        .await;
                    continue;
                }
                return Err(anyhow!(
                    "Claude API error ({}): {}",
                    status,
                    extract_claude_error(&text).unwrap_or(text)
                ));
            }
        })
    }
}

fn base_url() -> String {
    std::env::var("ANTHROPIC_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
}

fn extract_text_response(text: &str, fallback_model: &str) -> Result<ProviderResponse> {
    let payload: ClaudeResponse = serde_json::from_str(text)
        .map_err(|err| anyhow!("failed to parse Claude response JSON: {}", err))?;
    let parts = payload
        .content
        .iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text.as_deref())
        .collect::<Vec<_>>();
    if parts.is_empty() {
        return Err(anyhow!("no text content returned from Claude"));
    }

    let model = payload
        .model
        .filter(|value| !value.trim().is_empty())
        .or_else(|| Some(fallback_model.to_string()));
    let usage = payload.usage.map(|usage| ProviderUsage {
        prompt_tokens: usage.input_tokens,
        completion_tokens: usage.output_tokens,
        total_tokens: usage
            .input_tokens
            .zip(usage.output_tokens)
            .map(|(input, output)| input + output),
    });
    Ok(ProviderResponse {
        text: parts.join(""),
        model,
        usage,
    })
}

fn extract_claude_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<ClaudeError>,
    }

    #[derive(Deserialize)]
    struct ClaudeError {
        #[serde(rename = "type")]
        kind: Option<String>,
        message: Option<String>,
    }

    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    let error = parsed.error?;
    let mut parts = Vec::new();
    if let Some(message) = error.message
        && !message.trim().is_empty()
    {
        parts.push(message);
    }
    if let Some(kind) = error.kind
        && !kind.trim().is_empty()
    {
        parts.push(format!("type: {}", kind));
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" | "))
    }
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    #[serde(default)]
    content: Vec<ClaudeContent>,
    model: Option<String>,
    usage: Option<ClaudeUsage>,
}

#[derive(Debug, Deserialize)]
struct ClaudeUsage {
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ClaudeContent {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}
