//! Chat-completion provider abstraction and implementations.
//!
//! The [`ChatModel`] trait is the seam between the pipeline and the
//! language-model capability; the intent extractor and the response
//! generator both go through it, and tests substitute scripted doubles.
//!
//! Two production backends, selected by `llm.provider` in the config:
//! - **openai** — `POST /v1/chat/completions`; JSON-constrained responses
//!   use `response_format: {"type": "json_object"}`.
//! - **ollama** — `POST /api/chat` with `stream: false`; JSON-constrained
//!   responses use `format: "json"`.
//!
//! Retry strategy matches [`crate::embedding`]: exponential backoff on 429,
//! 5xx, and network errors; immediate failure on other 4xx.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::models::ChatMessage;

/// A chat-completion capability: given messages, returns model-authored
/// text, optionally constrained to valid JSON.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage], json_mode: bool) -> Result<String>;
}

/// Creates the configured chat model backend.
pub fn create_chat_model(config: &LlmConfig) -> Result<Box<dyn ChatModel>> {
    match config.provider.as_str() {
        "openai" => Ok(Box::new(OpenAiChat::new(config)?)),
        "ollama" => Ok(Box::new(OllamaChat::new(config.clone()))),
        other => bail!("Unknown llm provider: {}", other),
    }
}

// ============ OpenAI ============

/// Chat model backed by the OpenAI chat completions API.
///
/// Requires the `OPENAI_API_KEY` environment variable.
pub struct OpenAiChat {
    config: LlmConfig,
}

impl OpenAiChat {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        if std::env::var("OPENAI_API_KEY").is_err() {
            bail!("OPENAI_API_KEY environment variable not set");
        }
        Ok(Self {
            config: config.clone(),
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    async fn complete(&self, messages: &[ChatMessage], json_mode: bool) -> Result<String> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set"))?;

        let model = self
            .config
            .model
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("llm.model required"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .build()?;

        let mut body = serde_json::json!({
            "model": model,
            "messages": messages,
        });
        if json_mode {
            body["response_format"] = serde_json::json!({ "type": "json_object" });
        }

        let mut last_err = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = client
                .post("https://api.openai.com/v1/chat/completions")
                .header("Authorization", format!("Bearer {}", api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_openai_chat_response(&json);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow::anyhow!(
                            "OpenAI API error {}: {}",
                            status,
                            body_text
                        ));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("OpenAI API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Chat completion failed after retries")))
    }
}

/// Extract `choices[0].message.content` from a chat completions response.
fn parse_openai_chat_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing message content"))
}

// ============ Ollama ============

/// Chat model backed by a local Ollama instance's `/api/chat` endpoint.
pub struct OllamaChat {
    config: LlmConfig,
}

impl OllamaChat {
    pub fn new(config: LlmConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ChatModel for OllamaChat {
    async fn complete(&self, messages: &[ChatMessage], json_mode: bool) -> Result<String> {
        let model = self
            .config
            .model
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("llm.model required"))?;

        let url = self
            .config
            .url
            .as_deref()
            .unwrap_or("http://localhost:11434");

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .build()?;

        let mut body = serde_json::json!({
            "model": model,
            "messages": messages,
            "stream": false,
        });
        if json_mode {
            body["format"] = serde_json::json!("json");
        }

        let mut last_err = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = client
                .post(format!("{}/api/chat", url))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_ollama_chat_response(&json);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow::anyhow!(
                            "Ollama API error {}: {}",
                            status,
                            body_text
                        ));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("Ollama API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(anyhow::anyhow!(
                        "Ollama connection error (is Ollama running at {}?): {}",
                        url,
                        e
                    ));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Ollama chat failed after retries")))
    }
}

fn parse_ollama_chat_response(json: &serde_json::Value) -> Result<String> {
    json.get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing message content"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_openai_chat_content() {
        let json = serde_json::json!({
            "choices": [
                { "message": { "role": "assistant", "content": "hello there" } }
            ]
        });
        assert_eq!(parse_openai_chat_response(&json).unwrap(), "hello there");
    }

    #[test]
    fn rejects_openai_response_without_choices() {
        let json = serde_json::json!({ "object": "chat.completion" });
        assert!(parse_openai_chat_response(&json).is_err());
    }

    #[test]
    fn parses_ollama_chat_content() {
        let json = serde_json::json!({
            "message": { "role": "assistant", "content": "namaste" },
            "done": true
        });
        assert_eq!(parse_ollama_chat_response(&json).unwrap(), "namaste");
    }
}
