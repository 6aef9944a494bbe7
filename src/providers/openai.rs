use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::json;

use super::retry::{RetryPolicy, is_rate_limited, retry_after};
use super::{
    Message, MessageRole, Provider, ProviderFuture, ProviderResponse, ProviderUsage, Sampling,
};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub(crate) const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone)]
pub struct OpenAI {
    key: String,
    model: String,
    messages: Vec<Message>,
    sampling: Sampling,
    retry: RetryPolicy,
    client: reqwest::Client,
}

impl OpenAI {
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
        let messages = self
            .messages
            .iter()
            .map(|message| match message.role {
                MessageRole::System => json!({"role": "system", "content": message.content}),
                MessageRole::User => json!({"role": "user", "content": message.content}),
            })
            .collect::<Vec<_>>();

        json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.sampling.temperature,
            "max_tokens": self.sampling.max_tokens,
        })
    }
}

impl Provider for OpenAI {
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
            let url = format!("{}/chat/completions", base_url());
            let body = self.request_body();

            let mut attempt = 0usize;
            let mut delay = self.retry.base_delay;
            loop {
                attempt += 1;
                let response = self
                    .client
                    .post(&url)
                    .bearer_auth(self.key.as_str())
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
                        .wait_with_backoff("OpenAI", attempt, delay, retry_after)
                        .await;
                    continue;
                }
                return Err(anyhow!(
                    "OpenAI API error ({}): {}",
                    status,
                    extract_openai_error(&text).unwrap_or(text)
                ));
            }
        })
    }
}

fn base_url() -> String {
    std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
}

fn extract_text_response(text: &str, fallback_model: &str) -> Result<ProviderResponse> {
    let payload: OpenAIResponse =
        serde_json::from_str(text).with_context(|| "failed to parse OpenAI response JSON")?;
    let content = payload
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| anyhow!("no message content returned from OpenAI"))?;

    let model = payload
        .model
        .filter(|value| !value.trim().is_empty())
        .or_else(|| Some(fallback_model.to_string()));
    let usage = payload.usage.map(|usage| ProviderUsage {
        prompt_tokens: usage.prompt_tokens,
        completion_tokens: usage.completion_tokens,
        total_tokens: usage.total_tokens,
    });
    Ok(ProviderResponse {
        text: content,
        model,
        usage,
    })
}

fn extract_openai_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<OpenAIError>,
    }

    #[derive(Deserialize)]
    struct OpenAIError {
        message: Option<String>,
        #[serde(rename = "type")]
        kind: Option<String>,
        code: Option<String>,
    }

    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    let error = parsed.error?;
    let parts = [
        error.message,
        error.kind.map(|kind| format!("type: {}", kind)),
        error.code.map(|code| format!("code: {}", code)),
    ]
    .into_iter()
    .flatten()
    .filter(|part| !part.trim().is_empty())
    .collect::<Vec<_>>();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" | "))
    }
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    model: Option<String>,
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
    total_tokens: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_keeps_message_order() {
        let openai = OpenAI::new("key")
            .with_model("gpt-4.1-mini")
            .append_system_input("system".to_string())
            .append_user_input("Hello".to_string());
        let body = openai.request_body();
        assert_eq!(body["model"], "gpt-4.1-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Hello");
        assert_eq!(body["max_tokens"], 1000);
    }

    #[test]
    fn extracts_first_choice() {
        let payload = r#"{
            "model": "gpt-4o-mini-2024-07-18",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "さようなら"}}],
            "usage": {"prompt_tokens": 9, "completion_tokens": 3, "total_tokens": 12}
        }"#;
        let response = extract_text_response(payload, DEFAULT_MODEL).expect("response");
        assert_eq!(response.text, "さようなら");
        assert_eq!(response.model.as_deref(), Some("gpt-4o-mini-2024-07-18"));
        assert_eq!(response.usage.and_then(|usage| usage.total_tokens), Some(12));
    }

    #[test]
    fn null_content_is_an_error() {
        let payload = r#"{"choices": [{"message": {"content": null}}]}"#;
        assert!(extract_text_response(payload, DEFAULT_MODEL).is_err());
    }

    #[test]
    fn formats_api_errors() {
        let body = r#"{"error": {"message": "bad key", "type": "invalid_request_error", "code": null}}"#;
        assert_eq!(
            extract_openai_error(body).as_deref(),
            Some("bad key | type: invalid_request_error")
        );
    }
}
