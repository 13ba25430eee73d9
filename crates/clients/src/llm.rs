use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use joey_agent::llm::{ChatMessage, ChatOutcome, LlmClient, Role, TokenUsage};
use joey_core::config::{LlmConfig, LlmProvider};

const GEMINI_OPENAI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
const OPENAI_BASE: &str = "https://api.openai.com/v1";
const ANTHROPIC_BASE: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const EMBEDDING_MODEL: &str = "text-embedding-ada-002";

/// Build the configured provider. Gemini rides the OpenAI-compatible
/// surface with a different base URL, exactly one client per process.
pub fn build_llm_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    let api_key =
        config.api_key.clone().ok_or_else(|| anyhow!("llm.api_key is not configured"))?;

    Ok(match config.provider {
        LlmProvider::OpenAi => Arc::new(OpenAiCompatClient::new(
            api_key,
            config.base_url.clone().unwrap_or_else(|| OPENAI_BASE.to_owned()),
            config.model.clone(),
            config.timeout_secs,
        )),
        LlmProvider::Gemini => Arc::new(OpenAiCompatClient::new(
            api_key,
            config.base_url.clone().unwrap_or_else(|| GEMINI_OPENAI_BASE.to_owned()),
            config.model.clone(),
            config.timeout_secs,
        )),
        LlmProvider::Anthropic => Arc::new(AnthropicClient::new(
            api_key,
            config.base_url.clone().unwrap_or_else(|| ANTHROPIC_BASE.to_owned()),
            config.model.clone(),
            config.timeout_secs,
        )),
    })
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

fn wire_messages(messages: &[ChatMessage]) -> Vec<WireMessage<'_>> {
    messages
        .iter()
        .map(|message| WireMessage { role: message.role.as_str(), content: &message.content })
        .collect()
}

/// OpenAI-compatible chat completions (OpenAI itself, and Gemini via its
/// compatibility layer).
pub struct OpenAiCompatClient {
    http: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
}

#[derive(Deserialize)]
struct CompletionResponse {
    model: Option<String>,
    choices: Vec<CompletionChoice>,
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

impl OpenAiCompatClient {
    pub fn new(
        api_key: SecretString,
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout_secs: u64,
    ) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_default(),
            api_key,
            base_url: base_url.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatClient {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<ChatOutcome> {
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url.trim_end_matches('/')))
            .bearer_auth(self.api_key.expose_secret())
            .json(&serde_json::json!({
                "model": self.model,
                "messages": wire_messages(messages),
                "temperature": 0.7,
                "max_tokens": 2048,
            }))
            .send()
            .await
            .context("chat completion request failed")?;

        if !response.status().is_success() {
            bail!("chat completion returned {}", response.status());
        }

        let completion: CompletionResponse =
            response.json().await.context("chat completion payload was malformed")?;
        let content = completion
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .unwrap_or_default();

        Ok(ChatOutcome {
            content,
            model: completion.model.unwrap_or_else(|| self.model.clone()),
            usage: completion.usage.map(|usage| TokenUsage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
            }),
        })
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .http
            .post(format!("{}/embeddings", self.base_url.trim_end_matches('/')))
            .bearer_auth(self.api_key.expose_secret())
            .json(&serde_json::json!({ "model": EMBEDDING_MODEL, "input": text }))
            .send()
            .await
            .context("embedding request failed")?;

        if !response.status().is_success() {
            bail!("embedding returned {}", response.status());
        }

        let body: Value = response.json().await.context("embedding payload was malformed")?;
        let embedding = body
            .pointer("/data/0/embedding")
            .and_then(Value::as_array)
            .ok_or_else(|| anyhow!("embedding payload had no vector"))?;
        Ok(embedding.iter().filter_map(Value::as_f64).map(|v| v as f32).collect())
    }
}

/// Anthropic Messages API. System messages are lifted into the top-level
/// `system` field; Anthropic has no embedding endpoint.
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    model: Option<String>,
    content: Vec<AnthropicContent>,
    usage: Option<AnthropicUsage>,
}

#[derive(Deserialize)]
struct AnthropicContent {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

impl AnthropicClient {
    pub fn new(
        api_key: SecretString,
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout_secs: u64,
    ) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_default(),
            api_key,
            base_url: base_url.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<ChatOutcome> {
        let mut system: Option<&str> = None;
        let mut chat_messages = Vec::new();
        for message in messages {
            match message.role {
                Role::System => system = Some(&message.content),
                _ => chat_messages
                    .push(WireMessage { role: message.role.as_str(), content: &message.content }),
            }
        }

        let response = self
            .http
            .post(format!("{}/messages", self.base_url.trim_end_matches('/')))
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&serde_json::json!({
                "model": self.model,
                "max_tokens": 2048,
                "system": system.unwrap_or("You are a helpful assistant."),
                "messages": chat_messages,
            }))
            .send()
            .await
            .context("anthropic request failed")?;

        if !response.status().is_success() {
            bail!("anthropic returned {}", response.status());
        }

        let body: AnthropicResponse =
            response.json().await.context("anthropic payload was malformed")?;
        Ok(ChatOutcome {
            content: body.content.first().map(|block| block.text.clone()).unwrap_or_default(),
            model: body.model.unwrap_or_else(|| self.model.clone()),
            usage: body.usage.map(|usage| TokenUsage {
                prompt_tokens: usage.input_tokens,
                completion_tokens: usage.output_tokens,
            }),
        })
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        bail!("anthropic has no embedding endpoint; configure openai or gemini for embeddings")
    }
}
