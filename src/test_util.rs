use anyhow::Result;
use std::sync::{Arc, Mutex};

use crate::providers::{Provider, ProviderFuture, ProviderResponse, Sampling};
use crate::settings::Settings;
use crate::translator::TranslateOptions;

pub(crate) type Script = fn(&str) -> Result<String>;

#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub(crate) system: String,
    pub(crate) source: String,
    pub(crate) sampling: Sampling,
}

/// Answers every request by running `script` on the source text, which is
/// the part of the user prompt after the first blank line.
#[derive(Debug, Clone)]
pub(crate) struct ScriptedProvider {
    script: Script,
    system: Vec<String>,
    user: Vec<String>,
    sampling: Sampling,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl ScriptedProvider {
    pub(crate) fn new(script: Script) -> Self {
        Self {
            script,
            system: Vec::new(),
            user: Vec::new(),
            sampling: Sampling::default(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("calls lock").clone()
    }
}

impl Provider for ScriptedProvider {
    fn append_system_input(mut self, input: String) -> Self {
        self.system.push(input);
        self
    }

    fn append_user_input(mut self, input: String) -> Self {
        self.user.push(input);
        self
    }

    fn with_sampling(mut self, sampling: Sampling) -> Self {
        self.sampling = sampling;
        self
    }

    fn complete(self) -> ProviderFuture {
        let prompt = self.user.join("\n\n");
        let source = prompt
            .split_once("\n\n")
            .map(|(_, text)| text.to_string())
            .unwrap_or(prompt);
        self.calls.lock().expect("calls lock").push(RecordedCall {
            system: self.system.join("\n\n"),
            source: source.clone(),
            sampling: self.sampling,
        });
        let result = (self.script)(&source);
        Box::pin(async move {
            Ok(ProviderResponse {
                text: result?,
                model: Some("scripted".to_string()),
                usage: None,
            })
        })
    }
}

pub(crate) fn default_options() -> TranslateOptions {
    TranslateOptions::from_settings(&Settings::default())
}
