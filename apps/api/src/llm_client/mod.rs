//! LLM Client: the single point of entry for all chat-completion calls in JDmatch.
//!
//! ARCHITECTURAL RULE: No other module may call the Groq API directly.
//! All LLM interactions MUST go through this module.
//!
//! Model: llama-3.3-70b-versatile (hardcoded, not configurable)
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::analysis::progress::{ProgressEvent, ProgressSink};

pub mod prompts;
#[cfg(test)]
pub mod testing;

pub const GROQ_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
/// The model used for all LLM calls in JDmatch.
/// This is intentionally hardcoded to prevent accidental drift.
pub const MODEL: &str = "llama-3.3-70b-versatile";
pub const TEMPERATURE: f32 = 0.7;
pub const MAX_TOKENS: u32 = 2048;
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Coarse classification surfaced to callers so they can tell transient
/// exhaustion apart from hard failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmErrorKind {
    RetryExhausted,
    TransportOrServerError,
    MalformedResponse,
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Max retries reached: rate limited on all {attempts} attempts")]
    RetryExhausted { attempts: u32 },
}

impl LlmError {
    pub fn kind(&self) -> LlmErrorKind {
        match self {
            LlmError::Http(_) | LlmError::Api { .. } => LlmErrorKind::TransportOrServerError,
            LlmError::MalformedResponse(_) => LlmErrorKind::MalformedResponse,
            LlmError::RetryExhausted { .. } => LlmErrorKind::RetryExhausted,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage<'a>>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Serialize)]
pub struct ChatMessage<'a> {
    pub role: &'a str,
    pub content: &'a str,
}

impl<'a> ChatRequest<'a> {
    pub fn new(system: &'a str, user: &'a str) -> Self {
        Self {
            model: MODEL,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Status and raw body of one HTTP exchange with the completions endpoint.
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

/// One POST to the chat-completions endpoint. The retry policy lives in
/// `LlmClient`; implementations only move bytes.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, request: &ChatRequest<'_>, api_key: &str) -> Result<HttpReply, LlmError>;
}

/// `ChatTransport` backed by a pooled reqwest client.
pub struct ReqwestTransport {
    client: Client,
    url: String,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .expect("Failed to build HTTP client"),
            url: GROQ_API_URL.to_string(),
        }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatTransport for ReqwestTransport {
    async fn send(&self, request: &ChatRequest<'_>, api_key: &str) -> Result<HttpReply, LlmError> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HttpReply { status, body })
    }
}

/// Per-run LLM client. Holds the caller's credential and reports retries to the
/// run's progress sink.
#[derive(Clone)]
pub struct LlmClient {
    transport: Arc<dyn ChatTransport>,
    api_key: String,
    max_retries: u32,
    progress: Arc<dyn ProgressSink>,
}

impl LlmClient {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        api_key: String,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            transport,
            api_key,
            max_retries: DEFAULT_MAX_RETRIES,
            progress,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Sends one system + user prompt pair and returns the first choice's content verbatim.
    ///
    /// Only 429 is retried, with exponential backoff plus jitter. Any other HTTP
    /// status, transport failure or malformed body is returned immediately.
    pub async fn generate(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let request = ChatRequest::new(system, user);

        for attempt in 0..self.max_retries {
            let reply = self.transport.send(&request, &self.api_key).await?;

            if reply.status == 429 {
                let remaining = self.max_retries - attempt - 1;
                if remaining == 0 {
                    break;
                }

                // Logged by the run's progress sink.
                let delay = backoff_delay(attempt, jitter_secs());
                self.progress.notify(ProgressEvent::RetryScheduled {
                    attempt: attempt + 1,
                    max_retries: self.max_retries,
                    wait_secs: delay.as_secs_f64(),
                });
                tokio::time::sleep(delay).await;
                continue;
            }

            if !(200..300).contains(&reply.status) {
                let message = serde_json::from_str::<ApiErrorEnvelope>(&reply.body)
                    .map(|e| e.error.message)
                    .unwrap_or(reply.body);
                return Err(LlmError::Api {
                    status: reply.status,
                    message,
                });
            }

            let content = extract_content(&reply.body)?;
            debug!(
                "LLM call succeeded on attempt {}: {} chars",
                attempt + 1,
                content.len()
            );
            return Ok(content);
        }

        Err(LlmError::RetryExhausted {
            attempts: self.max_retries,
        })
    }
}

/// Pulls `choices[0].message.content` out of a 2xx body.
fn extract_content(body: &str) -> Result<String, LlmError> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| LlmError::MalformedResponse(format!("invalid JSON body: {e}")))?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| LlmError::MalformedResponse("missing choices[0].message.content".into()))
}

/// Wait before the retry that follows `attempt` (0-based): 2^attempt seconds plus jitter.
pub fn backoff_delay(attempt: u32, jitter_secs: f64) -> Duration {
    let base = 2f64.powi(attempt.min(16) as i32);
    Duration::from_secs_f64(base + jitter_secs)
}

/// Uniform jitter in [1, 3) seconds.
fn jitter_secs() -> f64 {
    rand::rng().random_range(1.0..3.0)
}
