//! Chat-completion client.
//!
//! One call to [`CompletionBackend::complete`] is one logical completion
//! request. Transient failures (rate limiting, timeouts, 5xx) are retried on
//! an exponential schedule; anything else fails on the first attempt.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio_retry::strategy::jitter;
use tokio_retry::RetryIf;

use crate::config::CompletionConfig;
use crate::embeddings::ApiErrorResponse;
use crate::prompt::Prompt;

/// What to send for a single completion.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: Prompt,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Ask the provider to constrain output to a JSON object.
    pub json_output: bool,
}

#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("Missing API key")]
    MissingApiKey,

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Completion response had no content")]
    EmptyCompletion,

    #[error("Giving up after {attempts} attempts: {last}")]
    RetryExhausted {
        attempts: usize,
        last: Box<CompletionError>,
    },
}

impl CompletionError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            CompletionError::Timeout(_) | CompletionError::Connect(_) => true,
            CompletionError::Api { code, .. } => matches!(*code, 408 | 429 | 500 | 502 | 503 | 504),
            _ => false,
        }
    }

    fn from_send(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            CompletionError::Timeout(e.to_string())
        } else if e.is_connect() {
            CompletionError::Connect(e.to_string())
        } else {
            CompletionError::Client(e)
        }
    }
}

/// `base_ms * 2^n` capped at `cap_ms`, one entry per allowed retry.
pub(crate) fn doubling_schedule(base_ms: u64, cap_ms: u64, retries: usize) -> Vec<Duration> {
    (0..retries)
        .map(|n| {
            let factor = 1u64.checked_shl(n as u32).unwrap_or(u64::MAX);
            Duration::from_millis(base_ms.saturating_mul(factor).min(cap_ms))
        })
        .collect()
}

/// Abstraction over completion providers.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Run one completion and return the raw text of the first choice.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;

    /// Model identifier, for logging.
    fn model(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
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

/// Client for OpenAI-compatible `/chat/completions` endpoints.
#[derive(Debug, Clone)]
pub struct OpenAiCompletionClient {
    client: Client,
    api_key: String,
    config: CompletionConfig,
}

impl OpenAiCompletionClient {
    pub fn new(api_key: impl Into<String>, config: CompletionConfig) -> Result<Self, CompletionError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(CompletionError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key,
            config,
        })
    }

    /// Delays slept between attempts, before jitter: `retry_delay_ms * 2^n`
    /// capped at `max_delay_ms`, one entry per allowed retry.
    pub fn backoff_schedule(&self) -> Vec<Duration> {
        doubling_schedule(
            self.config.retry_delay_ms,
            self.config.max_delay_ms,
            self.config.max_retries,
        )
    }

    async fn complete_once(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));

        let body = ChatRequest {
            model: &self.config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt.user,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: request.json_output.then_some(ResponseFormat { kind: "json_object" }),
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(CompletionError::from_send)?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorResponse>(&error_body)
                .ok()
                .and_then(|e| e.error)
                .map(|e| e.message)
                .unwrap_or(error_body);

            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                tracing::warn!(code = status.as_u16(), message = %message, "Completion API transient error");
            } else {
                tracing::error!(code = status.as_u16(), message = %message, "Completion API error");
            }

            return Err(CompletionError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let chat: ChatResponse = response.json().await.map_err(CompletionError::from_send)?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(CompletionError::EmptyCompletion)
    }
}

#[async_trait]
impl CompletionBackend for OpenAiCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let use_jitter = self.config.jitter;
        let strategy = self
            .backoff_schedule()
            .into_iter()
            .map(move |d| if use_jitter { jitter(d) } else { d });

        let mut attempts = 0usize;
        let result = RetryIf::spawn(
            strategy,
            || {
                attempts += 1;
                self.complete_once(request)
            },
            |e: &CompletionError| e.is_transient(),
        )
        .await;

        match result {
            Ok(text) => {
                tracing::debug!(attempts, chars = text.len(), model = %self.config.model, "Completion received");
                Ok(text)
            }
            Err(e) if e.is_transient() => {
                tracing::error!(attempts, error = %e, "All completion retry attempts failed");
                Err(CompletionError::RetryExhausted {
                    attempts,
                    last: Box::new(e),
                })
            }
            Err(e) => Err(e),
        }
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}
