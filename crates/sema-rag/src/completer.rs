//! Language-model backends behind the `TextCompleter` capability.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use sema_core::config::LlmConfig;

use crate::error::{RagError, Result};

/// Reply used when no language model is configured.
pub const UNCONFIGURED_REPLY: &str = "LLM not configured. Please provide an LLM endpoint.";

/// Anything that can turn a prompt into a completion.
#[async_trait]
pub trait TextCompleter: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Short backend name used in logs and health output.
    fn name(&self) -> &str;
}

/// Build the completer described by `config`.
///
/// Without an endpoint this is an [`UnconfiguredCompleter`].
pub fn build_completer(config: &LlmConfig) -> Arc<dyn TextCompleter> {
    match &config.endpoint {
        Some(endpoint) => {
            info!(endpoint = %endpoint, model = %config.model, "Using OpenAI-compatible completer");
            Arc::new(OpenAiCompleter::from_config(endpoint, config))
        }
        None => {
            info!("No LLM endpoint configured");
            Arc::new(UnconfiguredCompleter)
        }
    }
}

/// Placeholder completer that always returns [`UNCONFIGURED_REPLY`].
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredCompleter;

#[async_trait]
impl TextCompleter for UnconfiguredCompleter {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        Ok(UNCONFIGURED_REPLY.to_string())
    }

    fn name(&self) -> &str {
        "unconfigured"
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Client for an OpenAI-compatible `chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiCompleter {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    system_prompt: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiCompleter {
    /// Create a completer for `endpoint`, reading the API key from the
    /// environment variable named by `config.api_key_env`.
    pub fn from_config(endpoint: &str, config: &LlmConfig) -> Self {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.is_empty());
        if api_key.is_none() {
            warn!(env = %config.api_key_env, "API key not set, sending unauthenticated requests");
        }
        Self {
            client: Client::new(),
            base_url: endpoint.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            system_prompt: config.system_prompt.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    fn endpoint_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn request_body<'a>(&'a self, prompt: &'a str) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &self.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

fn first_choice(response: ChatCompletionResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content.unwrap_or_default())
        .ok_or_else(|| RagError::Llm("no choices returned".to_string()))
}

#[async_trait]
impl TextCompleter for OpenAiCompleter {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = self.endpoint_url();
        let mut request = self.client.post(&url).json(&self.request_body(prompt));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RagError::Llm(format!("HTTP {}: {}", status, body)));
        }

        let parsed: ChatCompletionResponse = response.json().await?;
        let answer = first_choice(parsed)?;
        debug!(chars = answer.len(), "Completion received");
        Ok(answer)
    }

    fn name(&self) -> &str {
        &self.model
    }
}
