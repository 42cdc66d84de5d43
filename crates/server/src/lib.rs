//! Customer-Service Assistant Server
//!
//! HTTP endpoints for the chat assistant, conversation archive, analytics,
//! feedback form and Google Sheets diagnostics.

pub mod auth;
pub mod http;
pub mod metrics;
pub mod state;

pub use auth::auth_middleware;
pub use http::create_router;
pub use metrics::{
    init_metrics, record_archive_failure, record_chat_request, record_completion_error,
    record_completion_latency, record_feedback,
};
pub use state::AppState;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use helpdesk_llm::LlmError;
use helpdesk_persistence::PersistenceError;
use thiserror::Error;

/// Reply body used when the completion service fails
pub const AI_FAILURE_MESSAGE: &str = "Failed to get response from AI";

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Upstream error ({status}): {message}")]
    Upstream { status: StatusCode, message: String },

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Upstream { status, .. } => *status,
            ServerError::Auth(_) => StatusCode::UNAUTHORIZED,
            ServerError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Map a storage failure, hiding details behind `public_message`
    ///
    /// Caller mistakes keep their own message.
    pub fn from_persistence(err: PersistenceError, public_message: &str) -> Self {
        match err {
            PersistenceError::InvalidInput(msg) => ServerError::InvalidRequest(msg),
            other => {
                tracing::error!(error = %other, "{}", public_message);
                ServerError::Internal(public_message.to_string())
            }
        }
    }

    fn message(&self) -> &str {
        match self {
            ServerError::InvalidRequest(msg)
            | ServerError::Auth(msg)
            | ServerError::Forbidden(msg)
            | ServerError::Internal(msg) => msg,
            ServerError::Upstream { message, .. } => message,
        }
    }
}

impl From<helpdesk_core::Error> for ServerError {
    fn from(err: helpdesk_core::Error) -> Self {
        match err {
            helpdesk_core::Error::InvalidArgument(msg) => ServerError::InvalidRequest(msg),
        }
    }
}

/// Upstream error statuses pass through; everything else becomes a gateway error
impl From<LlmError> for ServerError {
    fn from(err: LlmError) -> Self {
        let status = match &err {
            LlmError::Api { status, .. } => StatusCode::from_u16(*status)
                .ok()
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::BAD_GATEWAY),
            LlmError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            LlmError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            LlmError::Network(_) | LlmError::InvalidResponse(_) => StatusCode::BAD_GATEWAY,
        };
        ServerError::Upstream {
            status,
            message: AI_FAILURE_MESSAGE.to_string(),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.message() }));
        (self.status(), body).into_response()
    }
}
