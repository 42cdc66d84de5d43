//! Completion-service integration
//!
//! Features:
//! - Flowise prediction backend behind the [`CompletionBackend`] trait
//! - Exponential-backoff retry for transient failures
//! - Per-request system message override

pub mod backend;

pub use backend::{
    CompletionBackend, CompletionConfig, CompletionRequest, CompletionResult, FlowiseBackend,
    FALLBACK_REPLY,
};

use thiserror::Error;

/// Completion errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout")]
    Timeout,

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl LlmError {
    /// Upstream HTTP status, when the service answered with one
    pub fn status(&self) -> Option<u16> {
        match self {
            LlmError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

