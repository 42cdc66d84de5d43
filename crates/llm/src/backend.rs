//! Completion Backend implementations
//!
//! The assistant does not run a model itself; it forwards each question to a
//! Flowise prediction endpoint together with the prior turns and a per-intent
//! system message.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use helpdesk_core::{ChatTurn, HistoryMessage};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::LlmError;

/// Reply used when the service answers without any text
pub const FALLBACK_REPLY: &str = "I'm sorry, I couldn't process that request.";

/// Completion client configuration
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    /// Full prediction URL
    pub endpoint: String,
    /// Bearer token (optional)
    pub api_key: Option<String>,
    /// Request timeout
    pub timeout: Duration,
    /// Maximum retry attempts for transient failures
    pub max_retries: u32,
    /// Initial backoff duration (doubles each retry)
    pub initial_backoff: Duration,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self::from(&helpdesk_config::FlowiseConfig::default())
    }
}

impl From<&helpdesk_config::FlowiseConfig> for CompletionConfig {
    fn from(config: &helpdesk_config::FlowiseConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            timeout: Duration::from_secs(config.timeout_seconds),
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
        }
    }
}

/// One question to answer
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub question: String,
    /// Prior turns, oldest first, not including `question`
    pub history: Vec<ChatTurn>,
    /// Per-intent instruction for the model
    pub system_message: String,
}

/// Completion result
#[derive(Debug, Clone)]
pub struct CompletionResult {
    pub text: String,
    /// Whether the service sent no usable text and [`FALLBACK_REPLY`] was used
    pub fallback: bool,
    pub total_time_ms: u64,
    /// Attempts made, including the successful one
    pub attempts: u32,
}

/// Conversation-completion backend
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Answer a question
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResult, LlmError>;

    /// Check if the service is reachable
    async fn is_available(&self) -> bool;

    /// Identifier for logs and health output
    fn endpoint(&self) -> &str;
}

/// Flowise prediction backend
#[derive(Clone)]
pub struct FlowiseBackend {
    client: Client,
    config: CompletionConfig,
}

impl FlowiseBackend {
    pub fn new(config: CompletionConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Request body for a completion
    pub(crate) fn build_request(request: &CompletionRequest) -> FlowiseRequest {
        FlowiseRequest {
            question: request.question.clone(),
            history: request.history.iter().map(HistoryMessage::from).collect(),
            override_config: OverrideConfig {
                system_message: request.system_message.clone(),
            },
        }
    }

    /// Execute a single request (used by retry logic)
    async fn execute_request(&self, body: &FlowiseRequest) -> Result<FlowiseResponse, LlmError> {
        let mut builder = self.client.post(&self.config.endpoint).json(body);
        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: error,
            });
        }

        response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))
    }

    /// Network failures, timeouts and 5xx answers
    fn is_retryable(error: &LlmError) -> bool {
        match error {
            LlmError::Network(_) | LlmError::Timeout => true,
            LlmError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[async_trait]
impl CompletionBackend for FlowiseBackend {
    /// Answer with exponential-backoff retry for transient failures
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResult, LlmError> {
        let start = Instant::now();
        let body = Self::build_request(request);

        let mut last_error = None;
        let mut backoff = self.config.initial_backoff;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tracing::warn!(
                    "Completion request failed, retrying in {:?} (attempt {}/{})",
                    backoff,
                    attempt,
                    self.config.max_retries
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }

            match self.execute_request(&body).await {
                Ok(response) => {
                    let (text, fallback) = response.into_text();
                    if fallback {
                        tracing::warn!("Completion service returned no text, using fallback reply");
                    }
                    return Ok(CompletionResult {
                        text,
                        fallback,
                        total_time_ms: start.elapsed().as_millis() as u64,
                        attempts: attempt + 1,
                    });
                }
                Err(e) if Self::is_retryable(&e) => {
                    last_error = Some(e);
                }
                Err(e) => {
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| LlmError::Network("Max retries exceeded".to_string())))
    }

    async fn is_available(&self) -> bool {
        // Flowise exposes a cheap liveness route next to /api/v1/prediction
        let ping = match self.config.endpoint.find("/api/v1/") {
            Some(idx) => format!("{}/api/v1/ping", &self.config.endpoint[..idx]),
            None => self.config.endpoint.clone(),
        };
        self.client
            .get(ping)
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    fn endpoint(&self) -> &str {
        &self.config.endpoint
    }
}

// Flowise API types
#[derive(Debug, Serialize)]
pub(crate) struct FlowiseRequest {
    question: String,
    history: Vec<HistoryMessage>,
    #[serde(rename = "overrideConfig")]
    override_config: OverrideConfig,
}

#[derive(Debug, Serialize)]
struct OverrideConfig {
    #[serde(rename = "systemMessage")]
    system_message: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct FlowiseResponse {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    result: Option<String>,
}

impl FlowiseResponse {
    /// `text`, else `result`, else the fallback reply
    pub(crate) fn into_text(self) -> (String, bool) {
        match self
            .text
            .filter(|t| !t.is_empty())
            .or(self.result.filter(|r| !r.is_empty()))
        {
            Some(text) => (text, false),
            None => (FALLBACK_REPLY.to_string(), true),
        }
    }
}
