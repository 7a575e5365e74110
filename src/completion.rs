//! Chat-completion client.
//!
//! [`CompletionClient`] is the seam between answer assembly and the hosted
//! model. [`ChatCompletionClient`] speaks the OpenAI-compatible
//! `POST {base_url}/chat/completions` protocol (Groq by default).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::CompletionConfig;
use crate::error::{RagError, Result};
use crate::http;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// Request body for a single, non-streaming completion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Return the text of the first choice.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// Read the API key from `env_var` and check its prefix.
///
/// Called per request so key rotation takes effect without a restart.
pub fn resolve_api_key(env_var: &str, prefix: &str) -> Result<String> {
    let key = std::env::var(env_var).map_err(|_| {
        RagError::Config(format!("{} is not set (check your environment or .env)", env_var))
    })?;
    let key = key.trim().to_string();
    if key.is_empty() || !key.starts_with(prefix) || key.chars().any(char::is_whitespace) {
        return Err(RagError::Config(format!(
            "{} is malformed (expected a key starting with '{}')",
            env_var, prefix
        )));
    }
    Ok(key)
}

pub struct ChatCompletionClient {
    base_url: String,
    api_key_env: String,
    api_key_prefix: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl ChatCompletionClient {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let client = http::client_with_timeout(config.timeout_secs)
            .map_err(|e| RagError::Config(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key_env: config.api_key_env.clone(),
            api_key_prefix: config.api_key_prefix.clone(),
            max_retries: config.max_retries,
            client,
        })
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl CompletionClient for ChatCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let api_key = resolve_api_key(&self.api_key_env, &self.api_key_prefix)?;
        let endpoint = format!("{}/chat/completions", self.base_url);

        let response = http::send_with_retry("completion", self.max_retries, || {
            self.client
                .post(&endpoint)
                .bearer_auth(&api_key)
                .json(request)
                .send()
        })
        .await
        .map_err(RagError::AnswerGeneration)?;

        let text = response
            .text()
            .await
            .map_err(|e| RagError::AnswerGeneration(format!("cannot read response: {}", e)))?;
        let parsed: ChatResponse = serde_json::from_str(&text).map_err(|e| {
            RagError::AnswerGeneration(format!("invalid completion response: {}", e))
        })?;

        match parsed.choices.into_iter().next() {
            Some(Choice {
                message:
                    ResponseMessage {
                        content: Some(content),
                    },
            }) if !content.is_empty() => Ok(content),
            _ => Err(RagError::AnswerGeneration(
                "completion service returned no answer".to_string(),
            )),
        }
    }
}
