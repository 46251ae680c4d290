//! OpenAI-compatible API backend
//!
//! Implements `TextGenerator` by making HTTP calls to any OpenAI-compatible
//! chat completions endpoint (OpenAI, TogetherAI, Ollama, vLLM, LM Studio).

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

use super::{ChatMessage, Generation, TextGenerator, TokenUsage};

// ─────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────

/// Configuration for the OpenAI-compatible backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// API base URL (e.g., "https://api.together.xyz/v1", "http://localhost:11434/v1")
    pub base_url: String,

    /// API key (empty string for local servers like Ollama)
    pub api_key: String,

    /// Model identifier
    pub model: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Optional cap on reply length
    pub max_tokens: Option<u32>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum retries on transient errors
    pub max_retries: u32,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434/v1".to_string(),
            api_key: String::new(),
            model: "llama3.1".to_string(),
            temperature: 0.3,
            max_tokens: Some(256),
            timeout_secs: 120,
            max_retries: 3,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// OpenAI API types (request/response)
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

// ─────────────────────────────────────────────────────────────────
// OpenAI Backend
// ─────────────────────────────────────────────────────────────────

/// OpenAI-compatible chat completions backend
pub struct OpenAiBackend {
    config: OpenAiConfig,
    client: Client,
    total_requests: RwLock<u64>,
    total_tokens: RwLock<u64>,
}

impl OpenAiBackend {
    /// Create a new backend with the given configuration
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::BackendUnavailable {
                backend: "openai".to_string(),
                message: format!("failed to create HTTP client: {}", e),
            })?;

        info!(
            base_url = %config.base_url,
            model = %config.model,
            "OpenAI-compatible backend created"
        );

        Ok(Self {
            config,
            client,
            total_requests: RwLock::new(0),
            total_tokens: RwLock::new(0),
        })
    }

    /// Successful requests served so far
    pub fn total_requests(&self) -> u64 {
        *self.total_requests.read()
    }

    /// Tokens consumed so far, as reported by the server
    pub fn total_tokens(&self) -> u64 {
        *self.total_tokens.read()
    }

    fn auth_header(&self) -> Option<String> {
        if self.config.api_key.is_empty() {
            None
        } else {
            Some(format!("Bearer {}", self.config.api_key))
        }
    }

    fn failure(message: impl Into<String>) -> Error {
        Error::generation_failed("openai", message)
    }

    /// Make a chat completion request with retry logic
    async fn chat_completion(&self, messages: &[ChatMessage]) -> Result<Generation> {
        let request_body = ChatCompletionRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let mut last_error: Option<Error> = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let backoff = backoff_delay(attempt);
                debug!(attempt, ?backoff, "Retrying after error");
                tokio::time::sleep(backoff).await;
            }

            let mut req = self.client.post(&url).json(&request_body);
            if let Some(ref auth) = self.auth_header() {
                req = req.header("Authorization", auth);
            }

            match req.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let parsed = response
                            .json::<ChatCompletionResponse>()
                            .await
                            .map_err(|e| Self::failure(format!("failed to parse API response: {}", e)))?;

                        *self.total_requests.write() += 1;

                        let choice = parsed
                            .choices
                            .into_iter()
                            .next()
                            .ok_or_else(|| Self::failure("no choices in API response"))?;

                        let usage = parsed.usage.map(|u| {
                            *self.total_tokens.write() += u64::from(u.prompt_tokens + u.completion_tokens);
                            TokenUsage {
                                prompt_tokens: u.prompt_tokens,
                                completion_tokens: u.completion_tokens,
                            }
                        });

                        return Ok(Generation {
                            content: choice.message.content.unwrap_or_default(),
                            usage,
                        });
                    } else if status.as_u16() == 429 || status.is_server_error() {
                        let body = response.text().await.unwrap_or_default();
                        warn!(status = %status, attempt, "Retryable API error: {}", body);
                        last_error = Some(Self::failure(format!("API error {}: {}", status, body)));
                    } else {
                        let body = response.text().await.unwrap_or_default();
                        return Err(Self::failure(format!("API error {}: {}", status, body)));
                    }
                }
                Err(e) => {
                    if e.is_timeout() || e.is_connect() {
                        warn!(attempt, error = %e, "Retryable connection error");
                        last_error = Some(Self::failure(format!("connection error: {}", e)));
                    } else {
                        return Err(Self::failure(format!("request error: {}", e)));
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Self::failure("all retry attempts exhausted")))
    }
}

#[async_trait]
impl TextGenerator for OpenAiBackend {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn generate(&self, messages: &[ChatMessage]) -> Result<Generation> {
        self.chat_completion(messages).await
    }
}

/// Pause before retry `attempt` (1-based): 500ms, doubling, saturating.
fn backoff_delay(attempt: u32) -> Duration {
    let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
    Duration::from_millis(500u64.saturating_mul(factor))
}
