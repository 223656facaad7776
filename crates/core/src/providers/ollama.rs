use crate::embeddings::Embedder;
use crate::error::ModelError;
use crate::llm::ChatModel;
use crate::models::ChatMessage;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_CHAT_MODEL: &str = "llama3";
pub const DEFAULT_EMBEDDING_MODEL: &str = "mxbai-embed-large";

const BACKEND: &str = "ollama";

pub struct OllamaEmbedder {
    client: Client,
    endpoint: Url,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(base_url: &str, model: impl Into<String>) -> Result<Self, ModelError> {
        Ok(Self {
            client: Client::new(),
            endpoint: Url::parse(base_url)?.join("api/embed")?,
            model: model.into(),
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&json!({
                "model": self.model,
                "input": text,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ModelError::BackendResponse {
                backend: BACKEND.to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        parse_embed_response(&parsed)
    }
}

pub struct OllamaChatModel {
    client: Client,
    endpoint: Url,
    model: String,
}

impl OllamaChatModel {
    pub fn new(base_url: &str, model: impl Into<String>) -> Result<Self, ModelError> {
        Ok(Self {
            client: Client::new(),
            endpoint: Url::parse(base_url)?.join("api/chat")?,
            model: model.into(),
        })
    }
}

#[async_trait]
impl ChatModel for OllamaChatModel {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ModelError> {
        let messages = messages
            .iter()
            .map(|message| {
                json!({
                    "role": message.role.as_str(),
                    "content": message.content,
                })
            })
            .collect::<Vec<_>>();

        debug!(model = %self.model, message_count = messages.len(), "ollama chat request");

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&json!({
                "model": self.model,
                "messages": messages,
                "stream": false,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ModelError::BackendResponse {
                backend: BACKEND.to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        parse_chat_response(&parsed)
    }
}

fn parse_embed_response(parsed: &Value) -> Result<Vec<f32>, ModelError> {
    let vector = parsed
        .pointer("/embeddings/0")
        .and_then(Value::as_array)
        .ok_or_else(|| malformed("response has no embeddings"))?;

    let vector = vector
        .iter()
        .map(|value| value.as_f64().map(|number| number as f32))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| malformed("embedding contains a non-numeric value"))?;

    if vector.is_empty() {
        return Err(malformed("embedding is empty"));
    }

    Ok(vector)
}

fn parse_chat_response(parsed: &Value) -> Result<String, ModelError> {
    if let Some(error) = parsed.pointer("/error").and_then(Value::as_str) {
        return Err(malformed(error));
    }

    parsed
        .pointer("/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| malformed("response has no message content"))
}

fn malformed(details: &str) -> ModelError {
    ModelError::BackendResponse {
        backend: BACKEND.to_string(),
        details: details.to_string(),
    }
}
